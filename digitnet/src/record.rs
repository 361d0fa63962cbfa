use crate::backend::Backend;
use crate::dtype::DType;
use crate::error::Error;
use crate::model::{CompileConfig, Model};
use crate::net::initializer::ZeroInitializer;
use crate::net::layer::{ConcreteLayerParams, Layer};
use crate::tensor::Dim3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const WEIGHT_DTYPE: &str = "float32";
const BYTES_PER_WEIGHT: usize = 4;
/// Upper bound on the values one example may occupy in any layer.
const MAX_ACTIVATION_LEN: usize = 1 << 24;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactFormat {
    /// trainable, carries its training configuration
    LayersModel,
    /// inference only
    GraphModel,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelTopology {
    /// (height, width, channels) of one example
    pub input_shape: [usize; 3],
    pub layers: Vec<ConcreteLayerParams>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightSpec {
    pub name: String,
    pub shape: Vec<usize>,
    pub dtype: String,
}

impl WeightSpec {
    /// Number of values, or `None` when the shape overflows `usize`.
    #[inline]
    pub fn checked_len(&self) -> Option<usize> {
        self.shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }
}

/// Weights stored in the files `paths`, concatenated in that order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightsGroup {
    pub paths: Vec<String>,
    pub weights: Vec<WeightSpec>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelManifest {
    pub format: ArtifactFormat,
    #[serde(default)]
    pub generated_by: Option<String>,
    pub model_topology: ModelTopology,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_config: Option<CompileConfig>,
    pub weights_manifest: Vec<WeightsGroup>,
}

impl ModelManifest {
    pub fn weight_specs(&self) -> impl Iterator<Item = &WeightSpec> {
        self.weights_manifest.iter().flat_map(|group| group.weights.iter())
    }
}

/// A manifest plus the little-endian `f32` weight bytes it describes.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelArtifact {
    pub manifest: ModelManifest,
    pub weights: Vec<u8>,
}

fn activation_len(shape: [usize; 3], what: &str) -> Result<usize, Error> {
    shape
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .filter(|&len| len <= MAX_ACTIVATION_LEN)
        .ok_or_else(|| Error::InvalidArtifact(format!("{what} {shape:?} is too large")))
}

fn window_output(input: [usize; 3], kernel: usize, stride: usize, layer_idx: usize) -> Result<[usize; 2], Error> {
    let [h, w, _] = input;
    if kernel == 0 || stride == 0 || kernel > h || kernel > w {
        return Err(Error::InvalidArtifact(format!(
            "layer {layer_idx}: window {kernel}x{kernel} with stride {stride} does not fit input {input:?}"
        )));
    }
    Ok([(h - kernel) / stride + 1, (w - kernel) / stride + 1])
}

/// Parameter shapes the topology implies, in the order the weights are stored.
/// Only checked arithmetic, nothing is allocated per layer.
fn expected_weight_shapes(input_shape: [usize; 3], layers: &[ConcreteLayerParams]) -> Result<Vec<Vec<usize>>, Error> {
    let overflow = |layer_idx: usize| Error::InvalidArtifact(format!("layer {layer_idx} parameter count overflows"));
    let mut shape = input_shape;
    activation_len(shape, "input shape")?;
    let mut shapes = Vec::new();
    for (layer_idx, layer) in layers.iter().enumerate() {
        match layer {
            ConcreteLayerParams::Conv2d(params) => {
                let [oh, ow] = window_output(shape, params.kernel_size, params.strides, layer_idx)?;
                let k = params.kernel_size;
                let kernel = vec![k, k, shape[2], params.filters];
                kernel
                    .iter()
                    .try_fold(1usize, |acc, &d| acc.checked_mul(d))
                    .ok_or_else(|| overflow(layer_idx))?;
                shapes.push(kernel);
                shapes.push(vec![params.filters]);
                shape = [oh, ow, params.filters];
            }
            ConcreteLayerParams::MaxPool2d(params) => {
                let [oh, ow] = window_output(shape, params.pool_size, params.strides, layer_idx)?;
                shape = [oh, ow, shape[2]];
            }
            ConcreteLayerParams::Flatten(_) => {
                shape = [1, 1, activation_len(shape, "flatten input")?];
            }
            ConcreteLayerParams::Dense(params) => {
                let inputs = activation_len(shape, "dense input")?;
                inputs.checked_mul(params.units).ok_or_else(|| overflow(layer_idx))?;
                shapes.push(vec![inputs, params.units]);
                shapes.push(vec![params.units]);
                shape = [1, 1, params.units];
            }
        }
        activation_len(shape, &format!("layer {layer_idx} output"))?;
    }
    Ok(shapes)
}

/// Checks the weight specs against the topology and the byte count against the
/// specs.
fn validate_weights(manifest: &ModelManifest, weights: &[u8]) -> Result<(), Error> {
    let specs: Vec<&WeightSpec> = manifest.weight_specs().collect();
    if let Some(spec) = specs.iter().find(|s| s.dtype != WEIGHT_DTYPE) {
        return Err(Error::InvalidArtifact(format!(
            "weight {} has unsupported dtype {}",
            spec.name, spec.dtype
        )));
    }
    let expected = expected_weight_shapes(
        manifest.model_topology.input_shape,
        &manifest.model_topology.layers,
    )?;
    if specs.len() != expected.len() {
        return Err(Error::InvalidArtifact(format!(
            "topology has {} weights, manifest lists {}",
            expected.len(),
            specs.len()
        )));
    }
    let mut total = 0usize;
    for (spec, shape) in specs.iter().zip(&expected) {
        if &spec.shape != shape {
            return Err(Error::InvalidArtifact(format!(
                "weight {} has shape {:?}, topology needs {shape:?}",
                spec.name, spec.shape
            )));
        }
        total = spec
            .checked_len()
            .and_then(|len| total.checked_add(len))
            .ok_or_else(|| Error::InvalidArtifact(format!("weight {} is too large", spec.name)))?;
    }
    let expected_bytes = total
        .checked_mul(BYTES_PER_WEIGHT)
        .ok_or_else(|| Error::InvalidArtifact("weights are too large".into()))?;
    if weights.len() != expected_bytes {
        return Err(Error::InvalidArtifact(format!(
            "manifest describes {expected_bytes} weight bytes, found {}",
            weights.len()
        )));
    }
    Ok(())
}

/// Names weights the Keras way: `conv2d_1/kernel`, `conv2d_1/bias`, `dense_1/kernel`, ...
fn weight_names<'a, B, I>(layers: I) -> Vec<Vec<String>>
where
    B: Backend,
    I: IntoIterator<Item = &'a crate::net::layer::ConcreteLayer<B>>,
{
    let mut seen: HashMap<&'static str, usize> = HashMap::new();
    layers
        .into_iter()
        .map(|layer| {
            let prefix = layer.layer_type().prefix();
            let counter = seen.entry(prefix).or_insert(0);
            *counter += 1;
            let n = *counter;
            layer
                .params()
                .iter()
                .map(|p| format!("{prefix}_{n}/{}", p.name))
                .collect()
        })
        .collect()
}

impl<B: Backend> Model<B> {
    /// Snapshot of the topology, training config and weights. `weights_path` is
    /// the file name recorded in the manifest for the weight bytes.
    pub fn to_artifact(&self, weights_path: &str) -> ModelArtifact {
        let net = self.net();
        let Dim3(h, w, c) = net.input_shape();
        let names = weight_names(net.layers());
        let mut specs = Vec::new();
        let mut weights = Vec::new();
        for (layer, layer_names) in net.layers().iter().zip(names) {
            for (param, name) in layer.params().into_iter().zip(layer_names) {
                specs.push(WeightSpec {
                    name,
                    shape: param.shape,
                    dtype: WEIGHT_DTYPE.into(),
                });
                for &x in param.data {
                    weights.extend_from_slice(&(x.as_f64() as f32).to_le_bytes());
                }
            }
        }
        ModelArtifact {
            manifest: ModelManifest {
                format: ArtifactFormat::LayersModel,
                generated_by: Some(format!("digitnet {}", env!("CARGO_PKG_VERSION"))),
                model_topology: ModelTopology {
                    input_shape: [h, w, c],
                    layers: net.topology().to_vec(),
                },
                training_config: Some(self.compile_config().clone()),
                weights_manifest: vec![WeightsGroup {
                    paths: vec![weights_path.into()],
                    weights: specs,
                }],
            },
            weights,
        }
    }

    /// Rebuilds a model from an artifact. Graph models and manifests without a
    /// training config get the default compile settings.
    pub fn from_artifact(backend: B, artifact: &ModelArtifact) -> Result<Self, Error> {
        let manifest = &artifact.manifest;
        validate_weights(manifest, &artifact.weights)?;
        let [h, w, c] = manifest.model_topology.input_shape;
        let compile = match (manifest.format, &manifest.training_config) {
            (ArtifactFormat::LayersModel, Some(config)) => config.clone(),
            _ => CompileConfig::default(),
        };
        let mut model = Model::from_topology(
            backend,
            Dim3(h, w, c),
            manifest.model_topology.layers.clone(),
            compile,
            ZeroInitializer,
        )
        .map_err(|e| Error::InvalidArtifact(e.to_string()))?;

        let names = weight_names(model.net().layers());
        let mut specs = manifest.weight_specs();
        let mut values = artifact
            .weights
            .chunks_exact(BYTES_PER_WEIGHT)
            .map(|b| B::Float::from_f64(f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64));
        for (layer, layer_names) in model.net_mut().layers_mut().iter_mut().zip(names) {
            for (param, name) in layer.params_mut().into_iter().zip(layer_names) {
                let spec = specs
                    .next()
                    .ok_or_else(|| Error::InvalidArtifact(format!("missing weight {name}")))?;
                if spec.name != name || spec.shape != param.shape {
                    return Err(Error::InvalidArtifact(format!(
                        "expected weight {name} {:?}, found {} {:?}",
                        param.shape, spec.name, spec.shape
                    )));
                }
                for (dst, src) in param.data.iter_mut().zip(&mut values) {
                    *dst = src;
                }
            }
        }
        if let Some(spec) = specs.next() {
            return Err(Error::InvalidArtifact(format!("unexpected weight {}", spec.name)));
        }
        Ok(model)
    }
}

#[cfg(test)]
mod test {
    use super::{ArtifactFormat, ModelArtifact, ModelManifest};
    use crate::backend::CpuBackend;
    use crate::error::Error;
    use crate::activation::ActivationFn;
    use crate::model::{digit_classifier, Model};
    use crate::net::initializer::VarianceScalingInitializer;
    use crate::net::layer::{ConcreteLayerParams, DenseLayerParams};
    use crate::tensor::{Dim4, Tensor, TensorBase};
    use rand::distributions::Uniform;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn trained_like_model() -> Model<CpuBackend<f32>> {
        digit_classifier(CpuBackend::<f32>::new(), VarianceScalingInitializer::seed_from_u64(21)).unwrap()
    }

    #[test]
    fn test_manifest_layout() {
        let artifact = trained_like_model().to_artifact("trained-model.weights.bin");
        let json = serde_json::to_value(&artifact.manifest).unwrap();
        assert_eq!(json["format"], "layers-model");
        assert_eq!(json["modelTopology"]["inputShape"], serde_json::json!([28, 28, 1]));
        assert_eq!(json["modelTopology"]["layers"][0]["className"], "Conv2D");
        assert_eq!(json["modelTopology"]["layers"][1]["className"], "MaxPooling2D");
        assert_eq!(json["modelTopology"]["layers"][5]["config"]["units"], 10);
        assert_eq!(json["trainingConfig"]["loss"], "categoricalCrossentropy");
        let names: Vec<&str> = artifact.manifest.weight_specs().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "conv2d_1/kernel",
                "conv2d_1/bias",
                "conv2d_2/kernel",
                "conv2d_2/bias",
                "dense_1/kernel",
                "dense_1/bias",
            ]
        );
        assert_eq!(artifact.weights.len(), (208 + 3216 + 2570) * 4);
    }

    #[test]
    fn test_restored_model_predicts_the_same() {
        let mut model = trained_like_model();
        let artifact = model.to_artifact("w.bin");
        let json = serde_json::to_string(&artifact.manifest).unwrap();
        let manifest: ModelManifest = serde_json::from_str(&json).unwrap();
        let restored_artifact = ModelArtifact {
            manifest,
            weights: artifact.weights.clone(),
        };
        let mut restored = Model::from_artifact(CpuBackend::<f32>::new(), &restored_artifact).unwrap();
        assert_eq!(restored.loss(), model.loss());
        assert_eq!(restored.compile_config().metrics, model.compile_config().metrics);

        let mut rng = StdRng::seed_from_u64(1);
        let images = Tensor::from_distribution(&mut rng, Uniform::new(0.0f32, 1.0), Dim4(3, 28, 28, 1));
        let expected = model.predict(images.view()).unwrap().clone();
        let actual = restored.predict(images.view()).unwrap();
        assert_eq!(actual, &expected);
    }

    #[test]
    fn test_graph_model_uses_default_compile() {
        let mut artifact = trained_like_model().to_artifact("w.bin");
        artifact.manifest.format = ArtifactFormat::GraphModel;
        artifact.manifest.training_config = None;
        let model = Model::from_artifact(CpuBackend::<f64>::new(), &artifact).unwrap();
        assert_eq!(model.compile_config(), &Default::default());
    }

    #[test]
    fn test_rejects_inconsistent_weights() {
        let artifact = trained_like_model().to_artifact("w.bin");

        let mut truncated = artifact.clone();
        truncated.weights.truncate(100);
        let result = Model::from_artifact(CpuBackend::<f32>::new(), &truncated);
        assert!(matches!(result, Err(Error::InvalidArtifact(_))));

        let mut renamed = artifact.clone();
        renamed.manifest.weights_manifest[0].weights[4].name = "dense_7/kernel".into();
        let result = Model::from_artifact(CpuBackend::<f32>::new(), &renamed);
        assert!(matches!(result, Err(Error::InvalidArtifact(_))));

        let mut bad_topology = artifact;
        bad_topology.manifest.model_topology.input_shape = [4, 4, 1];
        let result = Model::from_artifact(CpuBackend::<f32>::new(), &bad_topology);
        assert!(matches!(result, Err(Error::InvalidArtifact(_))));
    }

    #[test]
    fn test_rejects_oversized_topology_before_building() {
        let artifact = trained_like_model().to_artifact("w.bin");

        let mut huge_units = artifact.clone();
        huge_units.manifest.model_topology.layers[5] = DenseLayerParams {
            units: 1 << 60,
            activation: ActivationFn::Softmax,
        }
        .into();
        let result = Model::from_artifact(CpuBackend::<f32>::new(), &huge_units);
        assert!(matches!(result, Err(Error::InvalidArtifact(_))));

        let mut huge_filters = artifact.clone();
        if let ConcreteLayerParams::Conv2d(params) = &mut huge_filters.manifest.model_topology.layers[0] {
            params.filters = usize::MAX / 4;
        } else {
            panic!("first layer should be a convolution");
        }
        let result = Model::from_artifact(CpuBackend::<f32>::new(), &huge_filters);
        assert!(matches!(result, Err(Error::InvalidArtifact(_))));

        let mut huge_input = artifact.clone();
        huge_input.manifest.model_topology.input_shape = [1 << 40, 1 << 40, 1];
        let result = Model::from_artifact(CpuBackend::<f32>::new(), &huge_input);
        assert!(matches!(result, Err(Error::InvalidArtifact(_))));

        // spec shapes must agree with the topology
        let mut huge_spec = artifact;
        huge_spec.manifest.weights_manifest[0].weights[5].shape = vec![usize::MAX, 2];
        let result = Model::from_artifact(CpuBackend::<f32>::new(), &huge_spec);
        assert!(matches!(result, Err(Error::InvalidArtifact(_))));
    }
}
