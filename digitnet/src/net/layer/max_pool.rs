use super::{check_dims, ConcreteLayerParams, Layer, LayerParams, LayerType};
use crate::backend::{Backend, Window2d};
use crate::error::Error;
use crate::net::initializer::NetInitializer;
use crate::tensor::{Dim3, Dims, ITensor, Tensor2, TensorView2};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaxPool2dLayerParams {
    pub pool_size: usize,
    pub strides: usize,
}

impl<B: Backend> LayerParams<B> for MaxPool2dLayerParams {
    type Layer = MaxPool2dLayer<B>;

    fn create_layer(
        &self,
        _backend: &B,
        layer_idx: usize,
        input_shape: Dim3,
        _initializer: &mut dyn NetInitializer<B::Float>,
    ) -> Result<Self::Layer, Error> {
        let window =
            Window2d::new(input_shape, self.pool_size, self.strides, input_shape.channels()).ok_or_else(|| {
                Error::InvalidTopology(format!(
                    "max_pooling2d layer {layer_idx}: pool {p}x{p} with stride {s} does not fit input {input_shape}",
                    p = self.pool_size,
                    s = self.strides,
                ))
            })?;
        Ok(MaxPool2dLayer {
            window,
            indices: Vec::new(),
            _backend: PhantomData,
        })
    }
}

impl From<MaxPool2dLayerParams> for ConcreteLayerParams {
    fn from(value: MaxPool2dLayerParams) -> Self {
        ConcreteLayerParams::MaxPool2d(value)
    }
}

pub struct MaxPool2dLayer<B: Backend> {
    window: Window2d,
    // input position of the maximum for every output value of the last forward pass
    indices: Vec<usize>,
    _backend: PhantomData<B>,
}

impl<B: Backend> Layer<B> for MaxPool2dLayer<B> {
    fn forward(&mut self, backend: &B, input: TensorView2<B::Float>, output: &mut Tensor2<B::Float>) {
        let num_rows = input.dims().rows();
        check_dims(num_rows, self.window.input.tensor_len(), input.dims(), "input");
        check_dims(num_rows, self.window.output.tensor_len(), output.dims(), "output");
        backend.max_pool(&self.window, input, output, &mut self.indices);
    }

    fn backprop(
        &mut self,
        backend: &B,
        input: TensorView2<B::Float>,
        _output: &Tensor2<B::Float>,
        input_error: Option<&mut Tensor2<B::Float>>,
        output_error: &Tensor2<B::Float>,
    ) {
        if let Some(input_error) = input_error {
            let num_rows = input.dims().rows();
            check_dims(num_rows, self.window.input.tensor_len(), input_error.dims(), "input_error");
            backend.max_pool_error(&self.window, output_error, &self.indices, input_error);
        }
    }

    #[inline]
    fn layer_type(&self) -> LayerType {
        LayerType::MaxPool2d
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

impl<B: Backend> Debug for MaxPool2dLayer<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaxPool2dLayer")
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}
