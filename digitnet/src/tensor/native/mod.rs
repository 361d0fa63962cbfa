#[cfg(any(test, feature = "approx"))]
mod approx;
pub mod base;
mod debug;
pub mod owned;
pub mod view;
