use super::{
    Conv2dLayer, Conv2dLayerParams, DenseLayer, DenseLayerParams, FlattenLayer, FlattenLayerParams, Layer,
    LayerParams, LayerType, MaxPool2dLayer, MaxPool2dLayerParams, ParamMut, ParamRef,
};
use crate::backend::Backend;
use crate::error::Error;
use crate::net::initializer::NetInitializer;
use crate::optimizer::Optimizer;
use crate::tensor::{Dim3, Tensor2, TensorView2};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};

// LayerParams has an associated type, so it can't be boxed as a trait object.
// The enums below stand in for `Box<dyn LayerParams>` / `Box<dyn Layer>`.

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "className", content = "config")]
pub enum ConcreteLayerParams {
    #[serde(rename = "Conv2D")]
    Conv2d(Conv2dLayerParams),
    #[serde(rename = "MaxPooling2D")]
    MaxPool2d(MaxPool2dLayerParams),
    Flatten(FlattenLayerParams),
    Dense(DenseLayerParams),
}

impl<B: Backend> LayerParams<B> for ConcreteLayerParams {
    type Layer = ConcreteLayer<B>;

    fn create_layer(
        &self,
        backend: &B,
        layer_idx: usize,
        input_shape: Dim3,
        initializer: &mut dyn NetInitializer<B::Float>,
    ) -> Result<Self::Layer, Error> {
        Ok(match self {
            ConcreteLayerParams::Conv2d(params) => {
                ConcreteLayer::Conv2d(params.create_layer(backend, layer_idx, input_shape, initializer)?)
            }
            ConcreteLayerParams::MaxPool2d(params) => {
                ConcreteLayer::MaxPool2d(params.create_layer(backend, layer_idx, input_shape, initializer)?)
            }
            ConcreteLayerParams::Flatten(params) => {
                ConcreteLayer::Flatten(params.create_layer(backend, layer_idx, input_shape, initializer)?)
            }
            ConcreteLayerParams::Dense(params) => {
                ConcreteLayer::Dense(params.create_layer(backend, layer_idx, input_shape, initializer)?)
            }
        })
    }
}

pub enum ConcreteLayer<B: Backend> {
    Conv2d(Conv2dLayer<B>),
    MaxPool2d(MaxPool2dLayer<B>),
    Flatten(FlattenLayer),
    Dense(DenseLayer<B>),
}

impl<B: Backend> ConcreteLayer<B> {
    fn inner(&self) -> &dyn Layer<B> {
        match self {
            ConcreteLayer::Conv2d(inner) => inner,
            ConcreteLayer::MaxPool2d(inner) => inner,
            ConcreteLayer::Flatten(inner) => inner,
            ConcreteLayer::Dense(inner) => inner,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Layer<B> {
        match self {
            ConcreteLayer::Conv2d(inner) => inner,
            ConcreteLayer::MaxPool2d(inner) => inner,
            ConcreteLayer::Flatten(inner) => inner,
            ConcreteLayer::Dense(inner) => inner,
        }
    }
}

impl<B: Backend> Layer<B> for ConcreteLayer<B> {
    #[inline]
    fn forward(&mut self, backend: &B, input: TensorView2<B::Float>, output: &mut Tensor2<B::Float>) {
        self.inner_mut().forward(backend, input, output)
    }

    #[inline]
    fn backprop(
        &mut self,
        backend: &B,
        input: TensorView2<B::Float>,
        output: &Tensor2<B::Float>,
        input_error: Option<&mut Tensor2<B::Float>>,
        output_error: &Tensor2<B::Float>,
    ) {
        self.inner_mut()
            .backprop(backend, input, output, input_error, output_error)
    }

    #[inline]
    fn update_params(&mut self, layer_idx: usize, optimizer: &mut dyn Optimizer<B::Float>) {
        self.inner_mut().update_params(layer_idx, optimizer)
    }

    #[inline]
    fn params(&self) -> Vec<ParamRef<'_, B::Float>> {
        self.inner().params()
    }

    #[inline]
    fn params_mut(&mut self) -> Vec<ParamMut<'_, B::Float>> {
        self.inner_mut().params_mut()
    }

    #[inline]
    fn layer_type(&self) -> LayerType {
        self.inner().layer_type()
    }

    #[inline]
    fn input_shape(&self) -> Dim3 {
        self.inner().input_shape()
    }

    #[inline]
    fn output_shape(&self) -> Dim3 {
        self.inner().output_shape()
    }
}

impl<B: Backend> Debug for ConcreteLayer<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self.inner(), f)
    }
}
