use crate::backend::Backend;
use crate::tensor::{Tensor1, Tensor2, TensorView2};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum LossFn {
    #[default]
    CategoricalCrossentropy,
}

impl LossFn {
    pub fn compute<B: Backend>(
        &self,
        backend: &B,
        output: &Tensor2<B::Float>,
        expected: TensorView2<B::Float>,
        result: &mut Tensor1<B::Float>,
        result_deriv: &mut Tensor2<B::Float>,
    ) {
        match self {
            LossFn::CategoricalCrossentropy => {
                backend.categorical_cross_entropy(output, expected, result, result_deriv)
            }
        }
    }
}
