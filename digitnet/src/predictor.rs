use crate::backend::{argmax, Backend};
use crate::dtype::DType;
use crate::error::Error;
use crate::model::{class_name, Model};
use crate::preprocess::{load_image, preprocess};
use crate::record::ArtifactFormat;
use crate::store::{load_artifact_file, LocalStore, TRAINED_MODEL_KEY};
use crate::tensor::TensorBase;
use image::DynamicImage;
use log::{info, warn};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const PRETRAINED_MODEL_PATH: &str = "SavedModel_to_TFjs/model.json";
pub const KERAS_MODEL_PATH: &str = "keras_h5_to_TFjs/model.json";

/// Where a model can be loaded from. The first entry is the default.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ModelSource {
    /// converted SavedModel, inference only
    #[default]
    Pretrained,
    /// converted Keras HDF5 model
    KerasConverted,
    /// the model last saved by the training driver
    LocalStorage,
}

impl ModelSource {
    pub const ALL: [ModelSource; 3] = [
        ModelSource::Pretrained,
        ModelSource::KerasConverted,
        ModelSource::LocalStorage,
    ];

    /// Format the source is expected to hold.
    pub fn format(&self) -> ArtifactFormat {
        match self {
            ModelSource::Pretrained => ArtifactFormat::GraphModel,
            ModelSource::KerasConverted | ModelSource::LocalStorage => ArtifactFormat::LayersModel,
        }
    }
}

impl Display for ModelSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ModelSource::Pretrained => "pretrained SavedModel",
            ModelSource::KerasConverted => "converted Keras model",
            ModelSource::LocalStorage => "locally trained model",
        })
    }
}

/// Directories the model sources resolve against.
#[derive(Clone, Debug)]
pub struct ModelLocations {
    pub assets_dir: PathBuf,
    pub store: LocalStore,
}

impl ModelLocations {
    pub fn new<P: Into<PathBuf>>(assets_dir: P, store: LocalStore) -> Self {
        ModelLocations {
            assets_dir: assets_dir.into(),
            store,
        }
    }

    pub fn manifest_path(&self, source: ModelSource) -> PathBuf {
        match source {
            ModelSource::Pretrained => self.assets_dir.join(PRETRAINED_MODEL_PATH),
            ModelSource::KerasConverted => self.assets_dir.join(KERAS_MODEL_PATH),
            ModelSource::LocalStorage => self.store.manifest_path(TRAINED_MODEL_KEY),
        }
    }

    pub fn load<B: Backend>(&self, source: ModelSource, backend: B) -> Result<Model<B>, Error> {
        let artifact = load_artifact_file(self.manifest_path(source))?;
        if artifact.manifest.format != source.format() {
            warn!(
                "{source} is stored as {:?}, expected {:?}",
                artifact.manifest.format,
                source.format()
            );
        }
        let model = Model::from_artifact(backend, &artifact)?;
        info!("Loaded {source}");
        Ok(model)
    }
}

/// The currently loaded model, if any.
pub struct ModelSlot<B: Backend> {
    model: Option<Model<B>>,
}

impl<B: Backend> ModelSlot<B> {
    #[inline]
    pub fn empty() -> Self {
        ModelSlot { model: None }
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    #[inline]
    pub fn get(&self) -> Option<&Model<B>> {
        self.model.as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self) -> Option<&mut Model<B>> {
        self.model.as_mut()
    }

    /// Swaps in `model`, returning the previous one.
    pub fn replace(&mut self, model: Model<B>) -> Option<Model<B>> {
        self.model.replace(model)
    }

    pub fn take(&mut self) -> Option<Model<B>> {
        self.model.take()
    }
}

impl<B: Backend> Default for ModelSlot<B> {
    fn default() -> Self {
        ModelSlot::empty()
    }
}

/// Tracks the chosen model source.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ModelSelector {
    selected: ModelSource,
}

impl ModelSelector {
    #[inline]
    pub fn selected(&self) -> ModelSource {
        self.selected
    }

    /// Loads `source` into `slot`. On failure the selection reverts to the
    /// default source and `slot` keeps its current model.
    pub fn select<B: Backend>(
        &mut self,
        source: ModelSource,
        locations: &ModelLocations,
        backend: B,
        slot: &mut ModelSlot<B>,
    ) -> Result<(), Error> {
        match locations.load(source, backend) {
            Ok(model) => {
                slot.replace(model);
                self.selected = source;
                Ok(())
            }
            Err(e) => {
                warn!("No {source} available: {e}");
                self.selected = ModelSource::default();
                Err(e)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    pub class: usize,
    pub name: &'static str,
    pub probabilities: Vec<f64>,
}

impl Display for Prediction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "This is the digit {}", self.name)
    }
}

/// Predicts the digit in user images with whichever model is selected.
pub struct Predictor<B: Backend> {
    backend: B,
    locations: ModelLocations,
    selector: ModelSelector,
    slot: ModelSlot<B>,
}

impl<B: Backend> Predictor<B> {
    pub fn new(backend: B, locations: ModelLocations) -> Self {
        Predictor {
            backend,
            locations,
            selector: ModelSelector::default(),
            slot: ModelSlot::empty(),
        }
    }

    #[inline]
    pub fn selector(&self) -> &ModelSelector {
        &self.selector
    }

    #[inline]
    pub fn slot(&self) -> &ModelSlot<B> {
        &self.slot
    }

    pub fn select(&mut self, source: ModelSource) -> Result<(), Error> {
        self.selector
            .select(source, &self.locations, self.backend.clone(), &mut self.slot)
    }

    /// Installs an in-memory model, e.g. one just trained.
    pub fn replace_model(&mut self, model: Model<B>) -> Option<Model<B>> {
        self.slot.replace(model)
    }

    /// Classifies `image`, loading the pretrained model first if none is loaded.
    pub fn predict(&mut self, image: &DynamicImage) -> Result<Prediction, Error> {
        let input = preprocess::<B::Float>(image)?;
        let model = match self.slot.model {
            Some(ref mut model) => model,
            None => {
                let model = self.locations.load(ModelSource::Pretrained, self.backend.clone())?;
                info!("No model selected, using the default {}", ModelSource::Pretrained);
                self.slot.model.insert(model)
            }
        };
        let output = model.predict(input.view())?;
        let row = output.row(0);
        let class = argmax(row);
        let name = class_name(class).ok_or_else(|| Error::ShapeMismatch {
            expected: "a model with one output per digit".into(),
            actual: format!("{} outputs", row.len()),
        })?;
        Ok(Prediction {
            class,
            name,
            probabilities: row.iter().map(|p| p.as_f64()).collect(),
        })
    }

    pub fn predict_file<P: AsRef<Path>>(&mut self, path: P) -> Result<Prediction, Error> {
        let image = load_image(path)?;
        self.predict(&image)
    }
}
