use super::{check_dims, ConcreteLayerParams, Layer, LayerParams, LayerType};
use crate::backend::Backend;
use crate::error::Error;
use crate::net::initializer::NetInitializer;
use crate::tensor::{Dim3, Dims, ITensor, Tensor2, TensorView2};
use serde::{Deserialize, Serialize};

/// Rows are already stored flattened, so this only changes the reported shape.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlattenLayerParams {}

impl<B: Backend> LayerParams<B> for FlattenLayerParams {
    type Layer = FlattenLayer;

    fn create_layer(
        &self,
        _backend: &B,
        _layer_idx: usize,
        input_shape: Dim3,
        _initializer: &mut dyn NetInitializer<B::Float>,
    ) -> Result<Self::Layer, Error> {
        Ok(FlattenLayer { input_shape })
    }
}

impl From<FlattenLayerParams> for ConcreteLayerParams {
    fn from(value: FlattenLayerParams) -> Self {
        ConcreteLayerParams::Flatten(value)
    }
}

#[derive(Debug)]
pub struct FlattenLayer {
    input_shape: Dim3,
}

impl<B: Backend> Layer<B> for FlattenLayer {
    fn forward(&mut self, _backend: &B, input: TensorView2<B::Float>, output: &mut Tensor2<B::Float>) {
        let num_rows = input.dims().rows();
        let size = self.input_shape.tensor_len();
        check_dims(num_rows, size, input.dims(), "input");
        check_dims(num_rows, size, output.dims(), "output");
        output.as_mut().copy_from_slice(input.as_slice());
    }

    fn backprop(
        &mut self,
        _backend: &B,
        _input: TensorView2<B::Float>,
        _output: &Tensor2<B::Float>,
        input_error: Option<&mut Tensor2<B::Float>>,
        output_error: &Tensor2<B::Float>,
    ) {
        if let Some(input_error) = input_error {
            assert_eq!(input_error.dims(), output_error.dims(), "Invalid dimensions for input_error tensor");
            input_error.as_mut().copy_from_slice(output_error.as_ref());
        }
    }

    #[inline]
    fn layer_type(&self) -> LayerType {
        LayerType::Flatten
    }

    #[inline]
    fn input_shape(&self) -> Dim3 {
        self.input_shape
    }

    #[inline]
    fn output_shape(&self) -> Dim3 {
        Dim3(1, 1, self.input_shape.tensor_len())
    }
}
