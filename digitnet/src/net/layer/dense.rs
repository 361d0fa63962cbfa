use super::{check_dims, ConcreteLayerParams, Layer, LayerParams, LayerType, ParamMut, ParamRef};
use crate::activation::ActivationFn;
use crate::backend::Backend;
use crate::dtype::DType;
use crate::error::Error;
use crate::net::initializer::NetInitializer;
use crate::optimizer::{Optimizer, ParamId};
use crate::tensor::{Dim1, Dim2, Dim3, Dims, ITensor, Tensor, Tensor1, Tensor2, TensorBase, TensorBaseMut, TensorView2};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DenseLayerParams {
    pub units: usize,
    pub activation: ActivationFn,
}

impl<B: Backend> LayerParams<B> for DenseLayerParams {
    type Layer = DenseLayer<B>;

    fn create_layer(
        &self,
        _backend: &B,
        layer_idx: usize,
        input_shape: Dim3,
        initializer: &mut dyn NetInitializer<B::Float>,
    ) -> Result<Self::Layer, Error> {
        let input_size = input_shape.tensor_len();
        let output_size = self.units;
        if output_size == 0 || input_size == 0 {
            return Err(Error::InvalidTopology(format!(
                "dense layer {layer_idx} needs a non-empty input and at least one unit"
            )));
        }
        let weights = initializer.get_weights(
            LayerType::Dense,
            Dim2(input_size, output_size),
            layer_idx,
            input_size,
            output_size,
        );
        let biases = initializer.get_biases(LayerType::Dense, Dim1(output_size), layer_idx);
        Ok(DenseLayer {
            input_shape,
            output_size,
            weights,
            biases,
            activation: Tensor::empty(),
            training_tensors: None,
            activation_fn: self.activation,
        })
    }
}

impl From<DenseLayerParams> for ConcreteLayerParams {
    fn from(value: DenseLayerParams) -> Self {
        ConcreteLayerParams::Dense(value)
    }
}

/// Fully connected layer, `output = activation_fn(input * weights + biases)`.
/// The weights are stored as an `(inputs, units)` matrix.
pub struct DenseLayer<B: Backend> {
    input_shape: Dim3,
    output_size: usize,
    weights: Tensor2<B::Float>,
    biases: Tensor1<B::Float>,
    activation: Tensor2<B::Float>,
    training_tensors: Option<TrainingTensors<B>>,
    activation_fn: ActivationFn,
}

struct TrainingTensors<B: Backend> {
    activation_error: Tensor2<B::Float>,
    weight_grad: Tensor2<B::Float>,
    bias_grad: Tensor1<B::Float>,
}

impl<B: Backend> TrainingTensors<B> {
    fn new(size: usize, prev_size: usize) -> Self {
        TrainingTensors {
            activation_error: Tensor::empty(),
            weight_grad: Tensor::zeroed(Dim2(prev_size, size)),
            bias_grad: Tensor::zeroed(Dim1(size)),
        }
    }
}

impl<B: Backend> Layer<B> for DenseLayer<B> {
    fn forward(&mut self, backend: &B, input: TensorView2<B::Float>, output: &mut Tensor2<B::Float>) {
        let num_rows = input.dims().rows();
        check_dims(num_rows, self.input_size(), input.dims(), "input");
        check_dims(num_rows, self.output_size, output.dims(), "output");

        self.activation.resize(B::Float::ZERO, Dim2(num_rows, self.output_size));
        backend.matmul(
            B::Float::ONE,
            &input,
            false,
            &self.weights,
            false,
            B::Float::ZERO,
            &mut self.activation,
        );
        backend.add_row_bias(&mut self.activation.view_mut(), &self.biases);

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
        check_dims(num_rows, self.input_size(), input.dims(), "input");
        check_dims(num_rows, self.output_size, output.dims(), "output");
        check_dims(num_rows, self.output_size, output_error.dims(), "output_error");

        let input_size = self.input_size();
        let tt = self
            .training_tensors
            .get_or_insert_with(|| TrainingTensors::new(self.output_size, input_size));

        tt.activation_error.resize(B::Float::ZERO, Dim2(num_rows, self.output_size));
        self.activation_fn.compute_error(
            backend,
            &self.activation,
            output,
            output_error,
            &mut tt.activation_error,
        );

        if let Some(input_error) = input_error {
            check_dims(num_rows, input_size, input_error.dims(), "input_error");
            backend.matmul(
                B::Float::ONE,
                &tt.activation_error,
                false,
                &self.weights,
                true,
                B::Float::ZERO,
                input_error,
            );
        }

        backend.matmul(
            B::Float::ONE,
            &input,
            true,
            &tt.activation_error,
            false,
            B::Float::ZERO,
            &mut tt.weight_grad,
        );

        backend.column_sum(B::Float::ONE, tt.activation_error.view(), B::Float::ZERO, &mut tt.bias_grad);
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
                shape: vec![self.input_size(), self.output_size],
                data: self.weights.as_ref(),
            },
            ParamRef {
                name: "bias",
                shape: vec![self.output_size],
                data: self.biases.as_ref(),
            },
        ]
    }

    fn params_mut(&mut self) -> Vec<ParamMut<'_, B::Float>> {
        let shape = vec![self.input_size(), self.output_size];
        vec![
            ParamMut {
                name: "kernel",
                shape,
                data: self.weights.as_mut(),
            },
            ParamMut {
                name: "bias",
                shape: vec![self.output_size],
                data: self.biases.as_mut(),
            },
        ]
    }

    #[inline]
    fn layer_type(&self) -> LayerType {
        LayerType::Dense
    }

    #[inline]
    fn input_shape(&self) -> Dim3 {
        self.input_shape
    }

    #[inline]
    fn output_shape(&self) -> Dim3 {
        Dim3(1, 1, self.output_size)
    }
}

impl<B: Backend> Debug for DenseLayer<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DenseLayer")
            .field("units", &self.output_size)
            .field("activation_fn", &self.activation_fn)
            .field("weights", &self.weights.dims())
            .finish_non_exhaustive()
    }
}
