use crate::dtype::DType;
use crate::net::layer::LayerType;
use crate::tensor::{Dim1, Dim2, Dims, Tensor, Tensor1, Tensor2};
use rand::SeedableRng;
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand_distr::StandardNormal;

pub trait NetInitializer<T: DType> {
    fn get_weights(
        &mut self,
        layer_type: LayerType,
        dims: Dim2,
        layer_idx: usize,
        fan_in: usize,
        fan_out: usize,
    ) -> Tensor2<T>;
    fn get_biases(&mut self, layer_type: LayerType, dims: Dim1, layer_idx: usize) -> Tensor1<T>;
}

/// Variance scaling over fan-in: samples a normal distribution truncated at
/// two standard deviations with `std = sqrt(1 / fan_in)`. Biases start at zero.
pub struct VarianceScalingInitializer {
    rng: StdRng,
}

impl VarianceScalingInitializer {
    pub fn seed_from_u64(seed: u64) -> Self {
        VarianceScalingInitializer {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for VarianceScalingInitializer {
    fn default() -> Self {
        VarianceScalingInitializer {
            rng: StdRng::from_entropy(),
        }
    }
}

impl<T: DType> NetInitializer<T> for VarianceScalingInitializer {
    fn get_weights(
        &mut self,
        _layer_type: LayerType,
        dims: Dim2,
        _layer_idx: usize,
        fan_in: usize,
        _fan_out: usize,
    ) -> Tensor2<T> {
        let std = (1.0 / fan_in.max(1) as f64).sqrt();
        let mut data = Vec::with_capacity(dims.tensor_len());
        while data.len() < dims.tensor_len() {
            let x: f64 = StandardNormal.sample(&mut self.rng);
            // re-draw anything beyond two standard deviations
            if x.abs() <= 2.0 {
                data.push(T::from_f64(x * std));
            }
        }
        Tensor::from_vec(data, dims)
    }

    fn get_biases(&mut self, _layer_type: LayerType, dims: Dim1, _layer_idx: usize) -> Tensor1<T> {
        Tensor::zeroed(dims)
    }
}

/// Produces all-zero parameters, for networks whose weights are loaded afterwards.
#[derive(Copy, Clone, Debug, Default)]
pub struct ZeroInitializer;

impl<T: DType> NetInitializer<T> for ZeroInitializer {
    fn get_weights(&mut self, _: LayerType, dims: Dim2, _: usize, _: usize, _: usize) -> Tensor2<T> {
        Tensor::zeroed(dims)
    }

    fn get_biases(&mut self, _: LayerType, dims: Dim1, _: usize) -> Tensor1<T> {
        Tensor::zeroed(dims)
    }
}

#[cfg(test)]
mod test {
    use super::{NetInitializer, VarianceScalingInitializer};
    use crate::net::layer::LayerType;
    use crate::tensor::{Dim2, Tensor2};

    #[test]
    fn test_variance_scaling_statistics() {
        let mut init = VarianceScalingInitializer::seed_from_u64(0x5eed);
        let fan_in = 25;
        let weights: Tensor2<f64> = init.get_weights(LayerType::Conv2d, Dim2(fan_in, 2000), 0, fan_in, 200);
        let std = (1.0 / fan_in as f64).sqrt();
        assert!(weights.iter().all(|w| w.abs() <= 2.0 * std));
        let n = weights.iter().count() as f64;
        let mean = weights.iter().sum::<f64>() / n;
        let var = weights.iter().map(|w| (w - mean).powi(2)).sum::<f64>() / n;
        assert!(mean.abs() < 0.01, "mean {mean}");
        // truncation at 2 sigma shrinks the variance to about 0.774 * sigma^2
        assert!((var / (std * std) - 0.774).abs() < 0.03, "variance {var}");
    }

    #[test]
    fn test_seeded_initializer_is_deterministic() {
        let a: Tensor2<f32> =
            VarianceScalingInitializer::seed_from_u64(7).get_weights(LayerType::Dense, Dim2(10, 256), 5, 256, 10);
        let b: Tensor2<f32> =
            VarianceScalingInitializer::seed_from_u64(7).get_weights(LayerType::Dense, Dim2(10, 256), 5, 256, 10);
        assert!(a == b);
    }
}
