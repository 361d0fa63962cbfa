use crate::tensor::{Dims, ITensor, Tensor, TensorView};
use std::fmt::{Debug, Formatter};

impl<T: Debug, D: Dims> Debug for Tensor<T, D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("dims", &format_args!("{}", self.dims()))
            .field("data", &self.as_ref())
            .finish()
    }
}

impl<T: Debug, D: Dims> Debug for TensorView<'_, T, D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TensorView")
            .field("dims", &format_args!("{}", self.dims()))
            .field("data", &self.as_ref())
            .finish()
    }
}
