mod backend;
mod math;

pub use backend::CpuBackend;
pub use math::{argmax, DTypeOps};
