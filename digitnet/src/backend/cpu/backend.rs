use super::math::{argmax, DTypeOps};
use crate::backend::{assert_same_dims, Backend, BackendOther, MatrixMultiplication, TensorTyped, Window2d};
use crate::tensor::{
    Dim1, Dim2, Dims, ITensor, Tensor1, Tensor2, TensorBase, TensorBaseMut, TensorView2, TensorViewMut,
};
use std::fmt::{Debug, Formatter, Write};
use std::iter::zip;
use std::marker::PhantomData;

pub struct CpuBackend<DT: DTypeOps> {
    _dtype: PhantomData<DT>,
}

impl<DT: DTypeOps> CpuBackend<DT> {
    pub fn new() -> Self {
        CpuBackend { _dtype: PhantomData }
    }
}

impl<DT: DTypeOps> Default for CpuBackend<DT> {
    fn default() -> Self {
        Self::new()
    }
}

impl<DT: DTypeOps> Clone for CpuBackend<DT> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<DT: DTypeOps> TensorTyped for CpuBackend<DT> {
    type Float = DT;
}

impl<DT: DTypeOps> MatrixMultiplication for CpuBackend<DT> {
    #[inline]
    fn matmul<Ta, Tb, Tc>(&self, alpha: DT, a: &Ta, ta: bool, b: &Tb, tb: bool, beta: DT, c: &mut Tc)
    where
        Ta: TensorBase<DT, Dim2>,
        Tb: TensorBase<DT, Dim2>,
        Tc: TensorBaseMut<DT, Dim2>,
    {
        DT::matrix_multiply(alpha, a, ta, b, tb, beta, c);
    }
}

impl<DT: DTypeOps> BackendOther for CpuBackend<DT> {
    fn column_sum(&self, alpha: DT, a: TensorView2<DT>, beta: DT, b: &mut Tensor1<DT>) {
        let &Dim2(_, cols) = a.dims();
        assert_same_dims(b.dims(), &Dim1(cols), "column sum");
        for (i, out) in b.iter_mut().enumerate() {
            let mut sum = DT::ZERO;
            for row in a.iter_major_axis() {
                sum += row[i];
            }
            *out = sum * alpha + *out * beta;
        }
    }

    fn add_row_bias(&self, a: &mut TensorViewMut<DT, Dim2>, bias: &Tensor1<DT>) {
        assert_eq!(a.dims().cols(), bias.len(), "Bias length does not match columns");
        for row in a.iter_major_axis_mut() {
            for (x, &b) in zip(row, bias) {
                *x += b;
            }
        }
    }

    fn relu(&self, leak: DT, activation: &Tensor2<DT>, output: &mut Tensor2<DT>) {
        assert_same_dims(activation.dims(), output.dims(), "output");
        for (o, &a) in zip(output, activation) {
            *o = if a < DT::ZERO { a * leak } else { a }
        }
    }

    fn relu_error(&self, leak: DT, activation: &Tensor2<DT>, out_error: &Tensor2<DT>, result: &mut Tensor2<DT>) {
        assert_same_dims(activation.dims(), result.dims(), "result");
        assert_same_dims(activation.dims(), out_error.dims(), "out_error");
        for ((r, &act), &err) in zip(zip(result, activation), out_error) {
            *r = if act < DT::ZERO { leak * err } else { err };
        }
    }

    fn softmax(&self, activation: &Tensor2<DT>, output: &mut Tensor2<DT>) {
        assert_same_dims(activation.dims(), output.dims(), "output");
        for (output_row, activation_row) in zip(output.iter_major_axis_mut(), activation.iter_major_axis()) {
            // shift the values by -max(inputs) to prevent overflow (does not affect derivative)
            let max = activation_row[argmax(activation_row)];
            let mut sum = DT::ZERO;
            for (t, &a) in zip(output_row.iter_mut(), activation_row) {
                let x = (a - max).exp();
                sum += x;
                *t = x;
            }
            for t in output_row.iter_mut() {
                *t /= sum
            }
        }
    }

    fn softmax_error(&self, output: &Tensor2<DT>, out_error: &Tensor2<DT>, result: &mut Tensor2<DT>) {
        assert_same_dims(output.dims(), result.dims(), "result");
        assert_same_dims(output.dims(), out_error.dims(), "out_error");
        // jacobian-vector product: r_i = p_i * (g_i - sum_j g_j p_j)
        for (result_row, (output_row, err_row)) in zip(
            result.iter_major_axis_mut(),
            zip(output.iter_major_axis(), out_error.iter_major_axis()),
        ) {
            let mut dot = DT::ZERO;
            for (&p, &g) in zip(output_row, err_row) {
                dot += p * g;
            }
            for (r, (&p, &g)) in zip(result_row, zip(output_row, err_row)) {
                *r = p * (g - dot);
            }
        }
    }

    fn categorical_cross_entropy(
        &self,
        output: &Tensor2<DT>,
        expected: TensorView2<DT>,
        result: &mut Tensor1<DT>,
        result_deriv: &mut Tensor2<DT>,
    ) {
        assert_same_dims(output.dims(), expected.dims(), "expected");
        assert_same_dims(output.dims(), result_deriv.dims(), "result_deriv");
        assert_eq!(output.dims().rows(), result.len(), "Invalid dimensions for result tensor");
        let batch = DT::from_usize(output.dims().rows().max(1));
        for (r, (rd_row, (o_row, e_row))) in zip(
            result.iter_mut(),
            zip(
                result_deriv.iter_major_axis_mut(),
                zip(output.iter_major_axis(), expected.iter_major_axis()),
            ),
        ) {
            let mut loss = DT::ZERO;
            for (rd, (&o, &e)) in zip(rd_row, zip(o_row, e_row)) {
                let p = o.max(DT::PROB_EPSILON);
                loss -= e * p.ln();
                *rd = -e / p / batch;
            }
            *r = loss;
        }
    }

    fn im2col(&self, window: &Window2d, input: TensorView2<DT>, cols: &mut Tensor2<DT>) {
        let &Dim2(rows, input_len) = input.dims();
        let (height, width, channels) = (window.input.height(), window.input.width(), window.input.channels());
        let (out_height, out_width) = (window.output.height(), window.output.width());
        let (k, stride) = (window.kernel, window.stride);
        let patch = window.patch_len();
        let span = k * channels;
        assert_eq!(input_len, height * width * channels, "Invalid dimensions for input tensor");
        assert_same_dims(cols.dims(), &Dim2(rows * window.positions(), patch), "cols");

        let dst = cols.as_mut();
        for (n, image) in input.iter_major_axis().enumerate() {
            for oy in 0..out_height {
                for ox in 0..out_width {
                    let r = (n * out_height + oy) * out_width + ox;
                    let row = &mut dst[r * patch..(r + 1) * patch];
                    for ky in 0..k {
                        let src = ((oy * stride + ky) * width + ox * stride) * channels;
                        row[ky * span..(ky + 1) * span].copy_from_slice(&image[src..src + span]);
                    }
                }
            }
        }
    }

    fn col2im(&self, window: &Window2d, cols: &Tensor2<DT>, output: &mut Tensor2<DT>) {
        let &Dim2(rows, output_len) = output.dims();
        let (width, channels) = (window.input.width(), window.input.channels());
        let (out_height, out_width) = (window.output.height(), window.output.width());
        let (k, stride) = (window.kernel, window.stride);
        let patch = window.patch_len();
        let span = k * channels;
        assert_eq!(output_len, window.input.tensor_len(), "Invalid dimensions for output tensor");
        assert_same_dims(cols.dims(), &Dim2(rows * window.positions(), patch), "cols");

        output.fill_zero();
        let src = cols.as_ref();
        for (n, image) in output.iter_major_axis_mut().enumerate() {
            for oy in 0..out_height {
                for ox in 0..out_width {
                    let r = (n * out_height + oy) * out_width + ox;
                    let row = &src[r * patch..(r + 1) * patch];
                    for ky in 0..k {
                        let dst = ((oy * stride + ky) * width + ox * stride) * channels;
                        for (d, &s) in zip(&mut image[dst..dst + span], &row[ky * span..(ky + 1) * span]) {
                            *d += s;
                        }
                    }
                }
            }
        }
    }

    fn max_pool(&self, window: &Window2d, input: TensorView2<DT>, output: &mut Tensor2<DT>, indices: &mut Vec<usize>) {
        let &Dim2(rows, input_len) = input.dims();
        let (width, channels) = (window.input.width(), window.input.channels());
        let (out_height, out_width) = (window.output.height(), window.output.width());
        let (k, stride) = (window.kernel, window.stride);
        assert_eq!(input_len, window.input.tensor_len(), "Invalid dimensions for input tensor");
        assert_eq!(channels, window.output.channels(), "Pooling must keep the channel count");
        assert_same_dims(output.dims(), &Dim2(rows, window.output.tensor_len()), "output");

        indices.clear();
        indices.reserve(output.len());
        for (image, out_row) in zip(input.iter_major_axis(), output.iter_major_axis_mut()) {
            for oy in 0..out_height {
                for ox in 0..out_width {
                    for ch in 0..channels {
                        let mut best = ((oy * stride) * width + ox * stride) * channels + ch;
                        for ky in 0..k {
                            for kx in 0..k {
                                let i = ((oy * stride + ky) * width + ox * stride + kx) * channels + ch;
                                if image[i] > image[best] {
                                    best = i;
                                }
                            }
                        }
                        out_row[(oy * out_width + ox) * channels + ch] = image[best];
                        indices.push(best);
                    }
                }
            }
        }
    }

    fn max_pool_error(&self, window: &Window2d, out_error: &Tensor2<DT>, indices: &[usize], input_error: &mut Tensor2<DT>) {
        let &Dim2(rows, input_len) = input_error.dims();
        let output_len = window.output.tensor_len();
        assert_eq!(input_len, window.input.tensor_len(), "Invalid dimensions for input_error tensor");
        assert_same_dims(out_error.dims(), &Dim2(rows, output_len), "out_error");
        assert_eq!(indices.len(), rows * output_len, "Pooling indices do not match the batch");

        input_error.fill_zero();
        for ((err_row, in_row), row_indices) in zip(
            zip(out_error.iter_major_axis(), input_error.iter_major_axis_mut()),
            indices.chunks_exact(output_len.max(1)),
        ) {
            for (&err, &i) in zip(err_row, row_indices) {
                in_row[i] += err;
            }
        }
    }

    fn accum_confusion_matrix_multiclass(
        &self,
        matrix: &mut Tensor2<usize>,
        output: &Tensor2<DT>,
        expected: TensorView2<DT>,
    ) {
        assert_same_dims(output.dims(), expected.dims(), "expected");
        for (output_row, expected_row) in zip(output.iter_major_axis(), expected.iter_major_axis()) {
            let out_idx = argmax(output_row);
            let expected_idx = argmax(expected_row);
            matrix[[expected_idx, out_idx]] += 1;
        }
    }

    fn count_correct(&self, output: &Tensor2<DT>, expected: TensorView2<DT>) -> usize {
        assert_same_dims(output.dims(), expected.dims(), "expected");
        zip(output.iter_major_axis(), expected.iter_major_axis())
            .filter(|(o, e)| argmax(*o) == argmax(*e))
            .count()
    }
}

impl<DT: DTypeOps> Backend for CpuBackend<DT> {}

impl<DT: DTypeOps> Debug for CpuBackend<DT> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("CpuBackend<")?;
        f.write_str(std::any::type_name::<DT>())?;
        f.write_char('>')
    }
}
