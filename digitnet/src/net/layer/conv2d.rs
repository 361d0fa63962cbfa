use super::{check_dims, ConcreteLayerParams, Layer, LayerParams, LayerType, ParamMut, ParamRef};
use crate::activation::ActivationFn;
use crate::backend::{Backend, Window2d};
use crate::dtype::DType;
use crate::error::Error;
use crate::net::initializer::NetInitializer;
use crate::optimizer::{Optimizer, ParamId};
use crate::tensor::{Dim1, Dim2, Dim3, Dims, ITensor, Tensor, Tensor1, Tensor2, TensorBase, TensorBaseMut, TensorView2};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};

/// 2D convolution with square kernels and "valid" padding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conv2dLayerParams {
    pub filters: usize,
    pub kernel_size: usize,
    pub strides: usize,
    pub activation: ActivationFn,
}

impl<B: Backend> LayerParams<B> for Conv2dLayerParams {
    type Layer = Conv2dLayer<B>;

    fn create_layer(
        &self,
        _backend: &B,
        layer_idx: usize,
        input_shape: Dim3,
        initializer: &mut dyn NetInitializer<B::Float>,
    ) -> Result<Self::Layer, Error> {
        if self.filters == 0 {
            return Err(Error::InvalidTopology(format!("conv2d layer {layer_idx} has no filters")));
        }
        let window = Window2d::new(input_shape, self.kernel_size, self.strides, self.filters).ok_or_else(|| {
            Error::InvalidTopology(format!(
                "conv2d layer {layer_idx}: kernel {k}x{k} with stride {s} does not fit input {input_shape}",
                k = self.kernel_size,
                s = self.strides,
            ))
        })?;
        let fan_in = window.patch_len();
        let fan_out = self.kernel_size * self.kernel_size * self.filters;
        let weights = initializer.get_weights(
            LayerType::Conv2d,
            Dim2(fan_in, self.filters),
            layer_idx,
            fan_in,
            fan_out,
        );
        let biases = initializer.get_biases(LayerType::Conv2d, Dim1(self.filters), layer_idx);
        Ok(Conv2dLayer {
            window,
            weights,
            biases,
            cols: Tensor::empty(),
            activation: Tensor::empty(),
            training_tensors: None,
            activation_fn: self.activation,
        })
    }
}

impl From<Conv2dLayerParams> for ConcreteLayerParams {
    fn from(value: Conv2dLayerParams) -> Self {
        ConcreteLayerParams::Conv2d(value)
    }
}

/// The convolution is computed as a GEMM over the im2col matrix:
/// every window position of every image becomes one row of `cols`, and
/// `weights` is a `(kernel * kernel * in_channels, filters)` matrix.
pub struct Conv2dLayer<B: Backend> {
    window: Window2d,
    weights: Tensor2<B::Float>,
    biases: Tensor1<B::Float>,
    cols: Tensor2<B::Float>,
    activation: Tensor2<B::Float>,
    training_tensors: Option<TrainingTensors<B>>,
    activation_fn: ActivationFn,
}

struct TrainingTensors<B: Backend> {
    activation_error: Tensor2<B::Float>,
    col_error: Tensor2<B::Float>,
    weight_grad: Tensor2<B::Float>,
    bias_grad: Tensor1<B::Float>,
}

impl<B: Backend> Conv2dLayer<B> {
    #[inline]
    fn filters(&self) -> usize {
        self.window.output.channels()
    }

    /// dims of `activation` when each window position is one row
    #[inline]
    fn position_dims(&self, num_rows: usize) -> Dim2 {
        Dim2(num_rows * self.window.positions(), self.filters())
    }

    fn kernel_shape(&self) -> Vec<usize> {
        let k = self.window.kernel;
        vec![k, k, self.window.input.channels(), self.filters()]
    }
}

impl<B: Backend> Layer<B> for Conv2dLayer<B> {
    fn forward(&mut self, backend: &B, input: TensorView2<B::Float>, output: &mut Tensor2<B::Float>) {
        let num_rows = input.dims().rows();
        let output_size = self.output_size();
        check_dims(num_rows, self.input_size(), input.dims(), "input");
        check_dims(num_rows, output_size, output.dims(), "output");

        let position_dims = self.position_dims(num_rows);
        let patch_len = self.window.patch_len();
        self.cols.resize(B::Float::ZERO, Dim2(position_dims.rows(), patch_len));
        backend.im2col(&self.window, input, &mut self.cols);

        self.activation.resize(B::Float::ZERO, Dim2(num_rows, output_size));
        let mut activation = self.activation.view_as_mut(position_dims);
        backend.matmul(
            B::Float::ONE,
            &self.cols,
            false,
            &self.weights,
            false,
            B::Float::ZERO,
            &mut activation,
        );
        backend.add_row_bias(&mut activation, &self.biases);

        self.activation_fn.compute(backend, &self.activation, output);
    }

    fn backprop(
        &mut self,
        backend: &B,
        input: TensorView2<B::Float>,
        output: &Tensor2<B::Float>,
        input_error: Option<&mut Tensor2<B::Float>>,
        output_error: &Tensor2<B::Float>,
    ) {
        let num_rows = input.dims().rows();
        let output_size = self.output_size();
        check_dims(num_rows, self.input_size(), input.dims(), "input");
        check_dims(num_rows, output_size, output.dims(), "output");
        check_dims(num_rows, output_size, output_error.dims(), "output_error");
        assert_eq!(
            self.cols.dims().rows(),
            num_rows * self.window.positions(),
            "backprop called without a matching forward pass"
        );

        let position_dims = self.position_dims(num_rows);
        let weight_dims = *self.weights.dims();
        let filters = self.filters();
        let tt = self.training_tensors.get_or_insert_with(|| TrainingTensors {
            activation_error: Tensor::empty(),
            col_error: Tensor::empty(),
            weight_grad: Tensor::zeroed(weight_dims),
            bias_grad: Tensor::zeroed(Dim1(filters)),
        });

        tt.activation_error.resize(B::Float::ZERO, Dim2(num_rows, output_size));
        self.activation_fn.compute_error(
            backend,
            &self.activation,
            output,
            output_error,
            &mut tt.activation_error,
        );
        let position_error = tt.activation_error.view_as(position_dims);

        if let Some(input_error) = input_error {
            check_dims(num_rows, self.window.input.tensor_len(), input_error.dims(), "input_error");
            tt.col_error.resize(B::Float::ZERO, *self.cols.dims());
            backend.matmul(
                B::Float::ONE,
                &position_error,
                false,
                &self.weights,
                true,
                B::Float::ZERO,
                &mut tt.col_error,
            );
            backend.col2im(&self.window, &tt.col_error, input_error);
        }

        backend.matmul(
            B::Float::ONE,
            &self.cols,
            true,
            &position_error,
            false,
            B::Float::ZERO,
            &mut tt.weight_grad,
        );
        backend.column_sum(B::Float::ONE, position_error, B::Float::ZERO, &mut tt.bias_grad);
    }

    fn update_params(&mut self, layer_idx: usize, optimizer: &mut dyn Optimizer<B::Float>) {
        if let Some(tt) = &self.training_tensors {
            optimizer.update(ParamId { layer: layer_idx, slot: 0 }, self.weights.as_mut(), tt.weight_grad.as_ref());
            optimizer.update(ParamId { layer: layer_idx, slot: 1 }, self.biases.as_mut(), tt.bias_grad.as_ref());
        }
    }

    fn params(&self) -> Vec<ParamRef<'_, B::Float>> {
        vec![
            ParamRef {
                name: "kernel",
                shape: self.kernel_shape(),
                data: self.weights.as_ref(),
            },
            ParamRef {
                name: "bias",
                shape: vec![self.filters()],
                data: self.biases.as_ref(),
            },
        ]
    }

    fn params_mut(&mut self) -> Vec<ParamMut<'_, B::Float>> {
        let kernel_shape = self.kernel_shape();
        let filters = self.filters();
        vec![
            ParamMut {
                name: "kernel",
                shape: kernel_shape,
                data: self.weights.as_mut(),
            },
            ParamMut {
                name: "bias",
                shape: vec![filters],
                data: self.biases.as_mut(),
            },
        ]
    }

    #[inline]
    fn layer_type(&self) -> LayerType {
        LayerType::Conv2d
    }

    #[inline]
    fn input_shape(&self) -> Dim3 {
        self.window.input
    }

    #[inline]
    fn output_shape(&self) -> Dim3 {
        self.window.output
    }
}

impl<B: Backend> Debug for Conv2dLayer<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conv2dLayer")
            .field("window", &self.window)
            .field("activation_fn", &self.activation_fn)
            .finish_non_exhaustive()
    }
}
