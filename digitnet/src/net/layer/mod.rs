mod concrete;
mod conv2d;
mod dense;
mod flatten;
mod max_pool;

use crate::backend::Backend;
use crate::error::Error;
use crate::net::initializer::NetInitializer;
use crate::optimizer::Optimizer;
use crate::tensor::{Dim2, Dim3, Dims, Tensor2, TensorView2};
use std::fmt::Debug;

pub use concrete::{ConcreteLayer, ConcreteLayerParams};
pub use conv2d::{Conv2dLayer, Conv2dLayerParams};
pub use dense::{DenseLayer, DenseLayerParams};
pub use flatten::{FlattenLayer, FlattenLayerParams};
pub use max_pool::{MaxPool2dLayer, MaxPool2dLayerParams};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LayerType {
    Conv2d,
    MaxPool2d,
    Flatten,
    Dense,
}

impl LayerType {
    /// prefix used when naming the layer's weights
    pub fn prefix(&self) -> &'static str {
        match self {
            LayerType::Conv2d => "conv2d",
            LayerType::MaxPool2d => "max_pooling2d",
            LayerType::Flatten => "flatten",
            LayerType::Dense => "dense",
        }
    }
}

/// Borrowed view of one trainable parameter tensor.
pub struct ParamRef<'a, T> {
    pub name: &'static str,
    pub shape: Vec<usize>,
    pub data: &'a [T],
}

/// Mutable view of one trainable parameter tensor.
pub struct ParamMut<'a, T> {
    pub name: &'static str,
    pub shape: Vec<usize>,
    pub data: &'a mut [T],
}

pub trait LayerParams<B: Backend>: Clone + Debug {
    type Layer: Layer<B>;

    /// `input_shape` is the (height, width, channels) shape of one example
    fn create_layer(
        &self,
        backend: &B,
        layer_idx: usize,
        input_shape: Dim3,
        initializer: &mut dyn NetInitializer<B::Float>,
    ) -> Result<Self::Layer, Error>;
}

/// A layer works on `(batch, features)` matrices where every row is one
/// example flattened in (height, width, channels) order.
pub trait Layer<B: Backend>: Debug {
    fn forward(&mut self, backend: &B, input: TensorView2<B::Float>, output: &mut Tensor2<B::Float>);

    /// Computes the parameter gradients for the last forward pass and, when
    /// `input_error` is given, the error with respect to the layer input.
    fn backprop(
        &mut self,
        backend: &B,
        input: TensorView2<B::Float>,
        output: &Tensor2<B::Float>,
        input_error: Option<&mut Tensor2<B::Float>>,
        output_error: &Tensor2<B::Float>,
    );

    /// applies the gradients of the last backprop through `optimizer`
    fn update_params(&mut self, _layer_idx: usize, _optimizer: &mut dyn Optimizer<B::Float>) {}

    fn params(&self) -> Vec<ParamRef<'_, B::Float>> {
        Vec::new()
    }

    fn params_mut(&mut self) -> Vec<ParamMut<'_, B::Float>> {
        Vec::new()
    }

    fn layer_type(&self) -> LayerType;
    fn input_shape(&self) -> Dim3;
    fn output_shape(&self) -> Dim3;

    #[inline]
    fn input_size(&self) -> usize {
        self.input_shape().tensor_len()
    }

    #[inline]
    fn output_size(&self) -> usize {
        self.output_shape().tensor_len()
    }
}

pub(crate) fn check_dims(num_rows: usize, size: usize, actual: &Dim2, what: &str) {
    assert_eq!(actual, &Dim2(num_rows, size), "Invalid dimensions for {what} tensor");
}

#[cfg(test)]
mod test;
