use crate::activation::ActivationFn;
use crate::backend::Backend;
use crate::dtype::DType;
use crate::error::Error;
use crate::model::{image_shape, NUM_CLASSES};
use crate::net::initializer::VarianceScalingInitializer;
use crate::net::layer::{Conv2dLayer, Conv2dLayerParams, LayerParams};
use crate::tensor::{Dim2, Dims, Tensor, Tensor2};
use rand::distributions::uniform::SampleUniform;
use rand::distributions::Uniform;
use rand::rngs::StdRng;
use rand::SeedableRng;

pub const BATCH_LG: usize = 512;
pub const BATCH_MD: usize = 128;
pub const BATCH_SM: usize = 32;
const SEED: u64 = 0x8371943;

/// Flattened `(batch, 28 * 28)` images in `[0, 1]` and matching one-hot labels.
pub fn get_image_batch<T>(batch: usize) -> (Tensor2<T>, Tensor2<T>)
where
    T: DType + SampleUniform,
{
    let mut rng = StdRng::seed_from_u64(SEED);
    let images = Tensor::from_distribution(
        &mut rng,
        Uniform::new_inclusive(T::ZERO, T::ONE),
        Dim2(batch, image_shape().tensor_len()),
    );
    let mut labels = Tensor::zeroed(Dim2(batch, NUM_CLASSES));
    for row in 0..batch {
        labels[[row, row % NUM_CLASSES]] = T::ONE;
    }
    (images, labels)
}

/// The first convolution of the digit classifier.
pub fn get_conv_layer<B: Backend>(backend: &B) -> Result<Conv2dLayer<B>, Error> {
    let params = Conv2dLayerParams {
        filters: 8,
        kernel_size: 5,
        strides: 1,
        activation: ActivationFn::RELU,
    };
    let mut initializer = VarianceScalingInitializer::seed_from_u64(SEED);
    params.create_layer(backend, 0, image_shape(), &mut initializer)
}
