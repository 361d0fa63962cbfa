use crate::activation::ActivationFn;
use crate::backend::{Backend, argmax};
use crate::error::Error;
use crate::loss::LossFn;
use crate::net::initializer::NetInitializer;
use crate::net::layer::{
    ConcreteLayerParams, Conv2dLayerParams, DenseLayerParams, FlattenLayerParams, MaxPool2dLayerParams,
};
use crate::net::{Net, NetBuilder};
use crate::optimizer::{Adam, AdamConfig};
use crate::tensor::{Dim3, Tensor2, TensorBase, TensorView4};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};

pub const IMAGE_SIZE: usize = 28;
pub const IMAGE_CHANNELS: usize = 1;
pub const NUM_CLASSES: usize = 10;

/// Index `i` names digit `i`.
pub const CLASS_NAMES: [&str; NUM_CLASSES] = [
    "Zero", "One", "Two", "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine",
];

#[inline]
pub fn class_name(class: usize) -> Option<&'static str> {
    CLASS_NAMES.get(class).copied()
}

#[inline]
pub const fn image_shape() -> Dim3 {
    Dim3(IMAGE_SIZE, IMAGE_SIZE, IMAGE_CHANNELS)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Accuracy,
}

/// Optimizer, loss and metrics a model is trained with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileConfig {
    #[serde(default)]
    pub optimizer: AdamConfig,
    #[serde(default)]
    pub loss: LossFn,
    #[serde(default)]
    pub metrics: Vec<Metric>,
}

impl Default for CompileConfig {
    fn default() -> Self {
        CompileConfig {
            optimizer: AdamConfig::default(),
            loss: LossFn::CategoricalCrossentropy,
            metrics: vec![Metric::Accuracy],
        }
    }
}

/// A network together with the loss and optimizer state used to train it.
pub struct Model<B: Backend> {
    net: Net<B>,
    compile: CompileConfig,
    optimizer: Adam<B::Float>,
}

impl<B: Backend> Model<B> {
    pub fn new(net: Net<B>, compile: CompileConfig) -> Self {
        let optimizer = Adam::new(compile.optimizer);
        Model { net, compile, optimizer }
    }

    /// Builds a model from a serialized layer stack.
    pub fn from_topology<I>(
        backend: B,
        input_shape: Dim3,
        topology: Vec<ConcreteLayerParams>,
        compile: CompileConfig,
        initializer: I,
    ) -> Result<Self, Error>
    where
        I: 'static + NetInitializer<B::Float>,
    {
        let net = NetBuilder::new(backend, input_shape)
            .with_initializer(initializer)
            .with_layers(topology)
            .build()?;
        Ok(Model::new(net, compile))
    }

    /// Class probabilities, one row per image.
    pub fn predict(&mut self, images: TensorView4<B::Float>) -> Result<&Tensor2<B::Float>, Error> {
        self.net.predict_images(images)
    }

    /// Arg-max class of every image.
    pub fn predict_classes(&mut self, images: TensorView4<B::Float>) -> Result<Vec<usize>, Error> {
        let output = self.net.predict_images(images)?;
        Ok(output.iter_major_axis().map(argmax).collect())
    }

    #[inline]
    pub fn net(&self) -> &Net<B> {
        &self.net
    }

    #[inline]
    pub fn net_mut(&mut self) -> &mut Net<B> {
        &mut self.net
    }

    #[inline]
    pub fn compile_config(&self) -> &CompileConfig {
        &self.compile
    }

    #[inline]
    pub fn loss(&self) -> LossFn {
        self.compile.loss
    }

    #[inline]
    pub fn optimizer(&self) -> &Adam<B::Float> {
        &self.optimizer
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut Net<B>, &mut Adam<B::Float>, LossFn) {
        (&mut self.net, &mut self.optimizer, self.compile.loss)
    }
}

impl<B: Backend> Debug for Model<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("net", &self.net)
            .field("compile", &self.compile)
            .finish_non_exhaustive()
    }
}

/// conv(8@5x5) -> pool -> conv(16@5x5) -> pool -> flatten -> dense(10, softmax)
pub fn digit_classifier_topology() -> Vec<ConcreteLayerParams> {
    vec![
        Conv2dLayerParams {
            filters: 8,
            kernel_size: 5,
            strides: 1,
            activation: ActivationFn::RELU,
        }
        .into(),
        MaxPool2dLayerParams { pool_size: 2, strides: 2 }.into(),
        Conv2dLayerParams {
            filters: 16,
            kernel_size: 5,
            strides: 1,
            activation: ActivationFn::RELU,
        }
        .into(),
        MaxPool2dLayerParams { pool_size: 2, strides: 2 }.into(),
        FlattenLayerParams {}.into(),
        DenseLayerParams {
            units: NUM_CLASSES,
            activation: ActivationFn::Softmax,
        }
        .into(),
    ]
}

/// Builds the digit classifier compiled with Adam and categorical cross-entropy.
pub fn digit_classifier<B, I>(backend: B, initializer: I) -> Result<Model<B>, Error>
where
    B: Backend,
    I: 'static + NetInitializer<B::Float>,
{
    Model::from_topology(
        backend,
        image_shape(),
        digit_classifier_topology(),
        CompileConfig::default(),
        initializer,
    )
}

#[cfg(test)]
mod test {
    use super::{class_name, digit_classifier, CLASS_NAMES};
    use crate::backend::CpuBackend;
    use crate::net::initializer::VarianceScalingInitializer;
    use crate::net::layer::Layer;
    use crate::tensor::{Dim2, Dim3, Dim4, ITensor, Tensor, TensorBase};
    use rand::distributions::Uniform;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_class_names() {
        assert_eq!(class_name(0), Some("Zero"));
        assert_eq!(class_name(9), Some("Nine"));
        assert_eq!(class_name(10), None);
        for (i, name) in CLASS_NAMES.iter().enumerate() {
            assert_eq!(class_name(i), Some(*name));
        }
    }

    #[test]
    fn test_digit_classifier_shapes() {
        let model = digit_classifier(CpuBackend::<f32>::new(), VarianceScalingInitializer::seed_from_u64(1)).unwrap();
        let shapes: Vec<Dim3> = model.net().layers().iter().map(|l| l.output_shape()).collect();
        assert_eq!(
            shapes,
            vec![
                Dim3(24, 24, 8),
                Dim3(12, 12, 8),
                Dim3(8, 8, 16),
                Dim3(4, 4, 16),
                Dim3(1, 1, 256),
                Dim3(1, 1, 10),
            ]
        );
        let param_counts: Vec<usize> = model
            .net()
            .layers()
            .iter()
            .map(|l| l.params().iter().map(|p| p.data.len()).sum())
            .collect();
        assert_eq!(param_counts, vec![208, 0, 3216, 0, 0, 2570]);
    }

    #[test]
    fn test_outputs_are_probabilities() {
        let mut model =
            digit_classifier(CpuBackend::<f32>::new(), VarianceScalingInitializer::seed_from_u64(2)).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let images = Tensor::from_distribution(&mut rng, Uniform::new_inclusive(0.0f32, 1.0), Dim4(4, 28, 28, 1));
        let output = model.predict(images.view()).unwrap();
        assert_eq!(output.dims(), &Dim2(4, 10));
        for row in output.iter_major_axis() {
            assert!(row.iter().all(|p| (0.0..=1.0).contains(p)));
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5, "row sums to {sum}");
        }
    }

    #[test]
    fn test_same_seed_same_model() {
        let backend = CpuBackend::<f64>::new();
        let a = digit_classifier(backend.clone(), VarianceScalingInitializer::seed_from_u64(9)).unwrap();
        let b = digit_classifier(backend, VarianceScalingInitializer::seed_from_u64(9)).unwrap();
        for (la, lb) in a.net().layers().iter().zip(b.net().layers()) {
            for (pa, pb) in la.params().iter().zip(lb.params()) {
                assert_eq!(pa.data, pb.data);
            }
        }
    }
}
