use crate::backend::Backend;
use crate::dtype::DType;
use crate::tensor::Tensor2;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum ActivationFn {
    #[serde(rename = "relu")]
    ReLU {
        #[serde(default)]
        leak: f64,
    },
    Softmax,
}

impl ActivationFn {
    pub const RELU: ActivationFn = ActivationFn::ReLU { leak: 0.0 };

    pub fn compute<B: Backend>(&self, backend: &B, activation: &Tensor2<B::Float>, output: &mut Tensor2<B::Float>) {
        match self {
            &ActivationFn::ReLU { leak } => backend.relu(B::Float::from_f64(leak), activation, output),
            ActivationFn::Softmax => backend.softmax(activation, output),
        }
    }

    pub fn compute_error<B: Backend>(
        &self,
        backend: &B,
        activation: &Tensor2<B::Float>,
        output: &Tensor2<B::Float>,
        out_error: &Tensor2<B::Float>,
        result: &mut Tensor2<B::Float>,
    ) {
        match self {
            &ActivationFn::ReLU { leak } => {
                backend.relu_error(B::Float::from_f64(leak), activation, out_error, result)
            }
            ActivationFn::Softmax => backend.softmax_error(output, out_error, result),
        }
    }
}

#[cfg(test)]
mod test {
    use super::ActivationFn;
    use crate::backend::CpuBackend;
    use crate::tensor::{Dim2, Tensor2};
    use crate::tensor;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_relu() {
        let backend = CpuBackend::<f32>::new();
        let activation = tensor![[-1.0, 0.0, 2.5], [3.0, -0.5, 1.0]];
        let mut output = Tensor2::zeroed(Dim2(2, 3));
        ActivationFn::RELU.compute(&backend, &activation, &mut output);
        assert_abs_diff_eq!(output, tensor![[0.0, 0.0, 2.5], [3.0, 0.0, 1.0]]);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let backend = CpuBackend::<f64>::new();
        let activation = tensor![[1.0, 2.0, 3.0], [1000.0, 1000.0, -1000.0]];
        let mut output = Tensor2::zeroed(Dim2(2, 3));
        ActivationFn::Softmax.compute(&backend, &activation, &mut output);
        for row in 0..2 {
            let sum: f64 = output.row(row).iter().sum();
            assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(output[[1, 0]], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(output[[1, 2]], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_activation_serde_names() {
        let json = serde_json::to_string(&ActivationFn::RELU).unwrap();
        assert_eq!(json, r#"{"name":"relu","leak":0.0}"#);
        let parsed: ActivationFn = serde_json::from_str(r#"{"name":"softmax"}"#).unwrap();
        assert_eq!(parsed, ActivationFn::Softmax);
    }
}
