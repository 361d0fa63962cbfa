use crate::dtype::DType;
use crate::tensor::{Dim2, Dim3, Dims, Tensor1, Tensor2, TensorBase, TensorBaseMut, TensorView2, TensorViewMut};
use std::fmt::Debug;

mod cpu;

pub use cpu::*;

pub trait TensorTyped {
    type Float: DType;
}

pub trait MatrixMultiplication: TensorTyped {
    /// performs a generic matrix multiplication (gemm) operation
    #[allow(clippy::too_many_arguments)]
    fn matmul<Ta, Tb, Tc>(
        &self,
        alpha: Self::Float,
        a: &Ta,
        ta: bool,
        b: &Tb,
        tb: bool,
        beta: Self::Float,
        c: &mut Tc,
    ) where
        Ta: TensorBase<Self::Float, Dim2>,
        Tb: TensorBase<Self::Float, Dim2>,
        Tc: TensorBaseMut<Self::Float, Dim2>;
}

/// Sliding window over an HWC feature map with "valid" padding.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Window2d {
    pub input: Dim3,
    pub kernel: usize,
    pub stride: usize,
    pub output: Dim3,
}

impl Window2d {
    /// Returns `None` when the kernel does not fit into the input at least once.
    pub fn new(input: Dim3, kernel: usize, stride: usize, out_channels: usize) -> Option<Self> {
        if kernel == 0 || stride == 0 || kernel > input.height() || kernel > input.width() {
            return None;
        }
        let out_height = (input.height() - kernel) / stride + 1;
        let out_width = (input.width() - kernel) / stride + 1;
        Some(Window2d {
            input,
            kernel,
            stride,
            output: Dim3(out_height, out_width, out_channels),
        })
    }

    /// number of input values covered by one window position
    #[inline]
    pub fn patch_len(&self) -> usize {
        self.kernel * self.kernel * self.input.channels()
    }

    #[inline]
    pub fn positions(&self) -> usize {
        self.output.height() * self.output.width()
    }
}

pub trait BackendOther: TensorTyped {
    fn column_sum(&self, alpha: Self::Float, a: TensorView2<Self::Float>, beta: Self::Float, b: &mut Tensor1<Self::Float>);

    fn add_row_bias(&self, a: &mut TensorViewMut<Self::Float, Dim2>, bias: &Tensor1<Self::Float>);

    /// computes the leaky ReLU function for all elements in a given tensor
    fn relu(&self, leak: Self::Float, activation: &Tensor2<Self::Float>, output: &mut Tensor2<Self::Float>);
    fn relu_error(
        &self,
        leak: Self::Float,
        activation: &Tensor2<Self::Float>,
        out_error: &Tensor2<Self::Float>,
        result: &mut Tensor2<Self::Float>,
    );

    fn softmax(&self, activation: &Tensor2<Self::Float>, output: &mut Tensor2<Self::Float>);
    fn softmax_error(
        &self,
        output: &Tensor2<Self::Float>,
        out_error: &Tensor2<Self::Float>,
        result: &mut Tensor2<Self::Float>,
    );

    /// per-row loss in `result`, derivative of the batch mean loss in `result_deriv`
    fn categorical_cross_entropy(
        &self,
        output: &Tensor2<Self::Float>,
        expected: TensorView2<Self::Float>,
        result: &mut Tensor1<Self::Float>,
        result_deriv: &mut Tensor2<Self::Float>,
    );

    /// unfolds every window position of every image into one row of `cols`
    fn im2col(&self, window: &Window2d, input: TensorView2<Self::Float>, cols: &mut Tensor2<Self::Float>);

    /// inverse of [`BackendOther::im2col`], overlapping positions are summed
    fn col2im(&self, window: &Window2d, cols: &Tensor2<Self::Float>, output: &mut Tensor2<Self::Float>);

    fn max_pool(
        &self,
        window: &Window2d,
        input: TensorView2<Self::Float>,
        output: &mut Tensor2<Self::Float>,
        indices: &mut Vec<usize>,
    );
    fn max_pool_error(
        &self,
        window: &Window2d,
        out_error: &Tensor2<Self::Float>,
        indices: &[usize],
        input_error: &mut Tensor2<Self::Float>,
    );

    fn accum_confusion_matrix_multiclass(
        &self,
        matrix: &mut Tensor2<usize>,
        output: &Tensor2<Self::Float>,
        expected: TensorView2<Self::Float>,
    );

    /// number of rows whose arg-max matches the arg-max of the expected row
    fn count_correct(&self, output: &Tensor2<Self::Float>, expected: TensorView2<Self::Float>) -> usize;
}

pub trait Backend: 'static + Debug + Clone + TensorTyped + MatrixMultiplication + BackendOther {}

#[inline]
pub(crate) fn assert_same_dims<D: Dims>(a: &D, b: &D, what: &str) {
    assert_eq!(a, b, "Invalid dimensions for {what} tensor");
}
