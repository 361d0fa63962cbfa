use super::{
    Conv2dLayerParams, DenseLayerParams, FlattenLayerParams, Layer, LayerParams, MaxPool2dLayerParams,
};
use crate::activation::ActivationFn;
use crate::backend::CpuBackend;
use crate::net::initializer::VarianceScalingInitializer;
use crate::optimizer::{Optimizer, ParamId};
use crate::tensor::{Dim2, Dim3, Dims, ITensor, Tensor, Tensor2, TensorBase};
use approx::assert_abs_diff_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::StandardNormal;
use std::collections::HashMap;

type B = CpuBackend<f64>;

const FD_EPSILON: f64 = 1e-6;

/// Keeps the gradients it is handed instead of applying them.
#[derive(Default)]
struct GradRecorder {
    grads: HashMap<usize, Vec<f64>>,
}

impl Optimizer<f64> for GradRecorder {
    fn begin_step(&mut self) {}

    fn update(&mut self, id: ParamId, _param: &mut [f64], grad: &[f64]) {
        self.grads.insert(id.slot, grad.to_vec());
    }
}

fn random(rng: &mut StdRng, dims: Dim2) -> Tensor2<f64> {
    Tensor::from_distribution(rng, StandardNormal, dims)
}

fn randomize_params<L: Layer<B>>(layer: &mut L, rng: &mut StdRng) {
    for param in layer.params_mut() {
        let n = param.data.len();
        for (x, r) in param.data.iter_mut().zip(random(rng, Dim2(1, n))) {
            *x = r;
        }
    }
}

/// `sum(forward(input) * weights)`, a scalar whose gradient w.r.t. the output is `weights`
fn weighted_output<L: Layer<B>>(layer: &mut L, input: &Tensor2<f64>, weights: &Tensor2<f64>) -> f64 {
    let backend = B::new();
    let mut output = Tensor::zeroed(Dim2(input.dims().rows(), layer.output_size()));
    layer.forward(&backend, input.view(), &mut output);
    output.iter().zip(weights.iter()).map(|(o, w)| o * w).sum()
}

fn check_gradients<L: Layer<B>>(layer: &mut L, rows: usize, seed: u64) {
    let backend = B::new();
    let mut rng = StdRng::seed_from_u64(seed);
    let input = random(&mut rng, Dim2(rows, layer.input_size()));
    let out_weights = random(&mut rng, Dim2(rows, layer.output_size()));

    let mut output = Tensor::zeroed(*out_weights.dims());
    let mut input_error = Tensor::zeroed(*input.dims());
    layer.forward(&backend, input.view(), &mut output);
    layer.backprop(&backend, input.view(), &output, Some(&mut input_error), &out_weights);
    let mut recorder = GradRecorder::default();
    layer.update_params(0, &mut recorder);

    for i in (0..input.len()).step_by(3) {
        let mut plus = input.clone();
        plus.as_mut()[i] += FD_EPSILON;
        let mut minus = input.clone();
        minus.as_mut()[i] -= FD_EPSILON;
        let numeric = (weighted_output(layer, &plus, &out_weights) - weighted_output(layer, &minus, &out_weights))
            / (2.0 * FD_EPSILON);
        assert_abs_diff_eq!(input_error.as_ref()[i], numeric, epsilon = 1e-5);
    }

    let num_params = layer.params().len();
    assert_eq!(recorder.grads.len(), num_params);
    for slot in 0..num_params {
        let grad = &recorder.grads[&slot];
        for i in (0..grad.len()).step_by(2) {
            layer.params_mut()[slot].data[i] += FD_EPSILON;
            let plus = weighted_output(layer, &input, &out_weights);
            layer.params_mut()[slot].data[i] -= 2.0 * FD_EPSILON;
            let minus = weighted_output(layer, &input, &out_weights);
            layer.params_mut()[slot].data[i] += FD_EPSILON;
            let numeric = (plus - minus) / (2.0 * FD_EPSILON);
            assert_abs_diff_eq!(grad[i], numeric, epsilon = 1e-5);
        }
    }
}

#[test]
fn test_conv2d_forward_matches_naive() {
    let backend = B::new();
    let mut rng = StdRng::seed_from_u64(11);
    let input_shape = Dim3(6, 5, 2);
    let (k, stride, filters) = (3, 2, 3);
    let params = Conv2dLayerParams {
        filters,
        kernel_size: k,
        strides: stride,
        activation: ActivationFn::ReLU { leak: 0.0 },
    };
    let mut layer = params
        .create_layer(&backend, 0, input_shape, &mut VarianceScalingInitializer::seed_from_u64(1))
        .unwrap();
    randomize_params(&mut layer, &mut rng);
    assert_eq!(layer.output_shape(), Dim3(2, 2, filters));

    let input = random(&mut rng, Dim2(2, input_shape.tensor_len()));
    let mut output = Tensor::zeroed(Dim2(2, layer.output_size()));
    layer.forward(&backend, input.view(), &mut output);

    let layer_params = layer.params();
    let (w, b) = (layer_params[0].data, layer_params[1].data);
    assert_eq!(layer_params[0].shape, vec![k, k, 2, filters]);
    for n in 0..2 {
        let image = input.row(n);
        for oy in 0..2 {
            for ox in 0..2 {
                for f in 0..filters {
                    let mut sum = b[f];
                    for ky in 0..k {
                        for kx in 0..k {
                            for c in 0..2 {
                                let x = image[((oy * stride + ky) * 5 + ox * stride + kx) * 2 + c];
                                sum += x * w[((ky * k + kx) * 2 + c) * filters + f];
                            }
                        }
                    }
                    let expected = sum.max(0.0);
                    assert_abs_diff_eq!(output[[n, (oy * 2 + ox) * filters + f]], expected, epsilon = 1e-12);
                }
            }
        }
    }
}

#[test]
fn test_conv2d_gradients() {
    let backend = B::new();
    let params = Conv2dLayerParams {
        filters: 3,
        kernel_size: 3,
        strides: 1,
        activation: ActivationFn::ReLU { leak: 0.1 },
    };
    let mut layer = params
        .create_layer(&backend, 0, Dim3(5, 4, 2), &mut VarianceScalingInitializer::seed_from_u64(2))
        .unwrap();
    randomize_params(&mut layer, &mut StdRng::seed_from_u64(3));
    check_gradients(&mut layer, 2, 4);
}

#[test]
fn test_conv2d_rejects_oversized_kernel() {
    let backend = B::new();
    let params = Conv2dLayerParams {
        filters: 8,
        kernel_size: 5,
        strides: 1,
        activation: ActivationFn::RELU,
    };
    let result = params.create_layer(&backend, 0, Dim3(4, 4, 1), &mut VarianceScalingInitializer::seed_from_u64(0));
    assert!(result.is_err());
}

#[test]
fn test_max_pool_forward() {
    let backend = B::new();
    let params = MaxPool2dLayerParams { pool_size: 2, strides: 2 };
    let mut layer = params
        .create_layer(&backend, 1, Dim3(4, 4, 1), &mut VarianceScalingInitializer::seed_from_u64(0))
        .unwrap();
    assert_eq!(layer.output_shape(), Dim3(2, 2, 1));
    let input = Tensor::from_vec(
        vec![
            1.0, 2.0, 0.0, -1.0, //
            3.0, 4.0, 5.0, 6.0, //
            -2.0, -3.0, 7.0, 1.0, //
            -4.0, -1.0, 2.0, 0.0,
        ],
        Dim2(1, 16),
    );
    let mut output = Tensor::zeroed(Dim2(1, 4));
    layer.forward(&backend, input.view(), &mut output);
    assert_eq!(output.as_ref(), &[4.0, 6.0, -1.0, 7.0]);

    let out_error = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], Dim2(1, 4));
    let mut input_error = Tensor::zeroed(Dim2(1, 16));
    layer.backprop(&backend, input.view(), &output, Some(&mut input_error), &out_error);
    let mut expected = vec![0.0; 16];
    expected[5] = 1.0;
    expected[7] = 2.0;
    expected[13] = 3.0;
    expected[10] = 4.0;
    assert_eq!(input_error.as_ref(), expected.as_slice());
}

#[test]
fn test_max_pool_gradients_multichannel() {
    let backend = B::new();
    let params = MaxPool2dLayerParams { pool_size: 2, strides: 2 };
    let mut layer = params
        .create_layer(&backend, 0, Dim3(4, 6, 3), &mut VarianceScalingInitializer::seed_from_u64(0))
        .unwrap();
    check_gradients(&mut layer, 3, 5);
}

#[test]
fn test_flatten_keeps_values() {
    let backend = B::new();
    let mut layer = LayerParams::<B>::create_layer(
        &FlattenLayerParams {},
        &backend,
        4,
        Dim3(4, 4, 16),
        &mut VarianceScalingInitializer::seed_from_u64(0),
    )
    .unwrap();
    assert_eq!(Layer::<B>::output_shape(&layer), Dim3(1, 1, 256));
    let input = random(&mut StdRng::seed_from_u64(6), Dim2(2, 256));
    let mut output = Tensor::zeroed(Dim2(2, 256));
    Layer::<B>::forward(&mut layer, &backend, input.view(), &mut output);
    assert_eq!(output, input);
}

#[test]
fn test_dense_forward() {
    let backend = B::new();
    let params = DenseLayerParams {
        units: 2,
        activation: ActivationFn::ReLU { leak: 0.0 },
    };
    let mut layer = params
        .create_layer(&backend, 0, Dim3(1, 1, 3), &mut VarianceScalingInitializer::seed_from_u64(0))
        .unwrap();
    {
        let mut layer_params = layer.params_mut();
        layer_params[0].data.copy_from_slice(&[1.0, -1.0, 2.0, 0.5, -1.0, 1.0]);
        layer_params[1].data.copy_from_slice(&[0.5, -10.0]);
    }
    let input = Tensor::from_vec(vec![1.0, 2.0, 3.0], Dim2(1, 3));
    let mut output = Tensor::zeroed(Dim2(1, 2));
    layer.forward(&backend, input.view(), &mut output);
    // [1*1 + 2*2 + 3*-1 + 0.5, max(0, 1*-1 + 2*0.5 + 3*1 - 10)]
    assert_abs_diff_eq!(output, Tensor::from_vec(vec![2.5, 0.0], Dim2(1, 2)));
}

#[test]
fn test_dense_softmax_gradients() {
    let backend = B::new();
    let params = DenseLayerParams {
        units: 4,
        activation: ActivationFn::Softmax,
    };
    let mut layer = params
        .create_layer(&backend, 0, Dim3(2, 2, 3), &mut VarianceScalingInitializer::seed_from_u64(7))
        .unwrap();
    randomize_params(&mut layer, &mut StdRng::seed_from_u64(8));
    check_gradients(&mut layer, 3, 9);
}
