use num_traits::{Float, NumAssignOps};
use std::fmt::Debug;

pub trait DType: 'static + Sized + Copy + Debug + Default + Float + NumAssignOps + Send + Sync {
    const ZERO: Self;
    const ONE: Self;
    /// Smallest probability used when taking logarithms of model outputs.
    const PROB_EPSILON: Self;
    fn from_f64(val: f64) -> Self;
    fn from_usize(val: usize) -> Self;
    fn as_f64(self) -> f64;
}

macro_rules! impl_dtype {
    ($ty:ty, $one:expr, $zero:expr, $eps:expr) => {
        impl DType for $ty {
            const ZERO: Self = $zero;
            const ONE: Self = $one;
            const PROB_EPSILON: Self = $eps;
            #[inline]
            fn from_f64(val: f64) -> Self {
                val as $ty
            }
            #[inline]
            fn from_usize(val: usize) -> Self {
                val as $ty
            }
            #[inline]
            fn as_f64(self) -> f64 {
                self as f64
            }
        }
    };
}

impl_dtype!(f32, 1.0, 0.0, 1e-7);
impl_dtype!(f64, 1.0, 0.0, 1e-7);
