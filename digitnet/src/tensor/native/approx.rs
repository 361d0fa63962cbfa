use crate::tensor::{Dims, ITensor, Tensor};
use ::approx::AbsDiffEq;
use std::iter::zip;

impl<T: AbsDiffEq, D: Dims> AbsDiffEq for Tensor<T, D>
where
    T::Epsilon: Copy,
{
    type Epsilon = T::Epsilon;
    fn default_epsilon() -> Self::Epsilon {
        T::default_epsilon()
    }
    fn abs_diff_eq(&self, other: &Tensor<T, D>, epsilon: Self::Epsilon) -> bool {
        self.dims() == other.dims()
            && zip(self.as_ref(), other.as_ref()).all(|(a, b)| T::abs_diff_eq(a, b, epsilon))
    }
}
