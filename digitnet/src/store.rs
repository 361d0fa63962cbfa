use crate::backend::Backend;
use crate::error::Error;
use crate::model::Model;
use crate::record::{ModelArtifact, ModelManifest};
use log::{info, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Key the training driver saves under and the predictor loads from.
pub const TRAINED_MODEL_KEY: &str = "trained-model";
const STORED_STEM: &str = "model";

fn read_or_unavailable(path: &Path) -> Result<Vec<u8>, Error> {
    fs::read(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => Error::ArtifactUnavailable {
            path: path.to_path_buf(),
            source,
        },
        _ => Error::Io(source),
    })
}

/// Loads a manifest and the weight files it lists, resolved relative to the manifest.
pub fn load_artifact_file<P: AsRef<Path>>(path: P) -> Result<ModelArtifact, Error> {
    let path = path.as_ref();
    let manifest: ModelManifest = serde_json::from_slice(&read_or_unavailable(path)?)?;
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let mut weights = Vec::new();
    for file in manifest.weights_manifest.iter().flat_map(|group| group.paths.iter()) {
        weights.extend(read_or_unavailable(&dir.join(file))?);
    }
    Ok(ModelArtifact { manifest, weights })
}

/// Writes `<dir>/<stem>.json` and `<dir>/<stem>.weights.bin`, returning the manifest path.
pub fn save_artifact_files<B: Backend>(model: &Model<B>, dir: &Path, stem: &str) -> Result<PathBuf, Error> {
    fs::create_dir_all(dir)?;
    let weights_name = format!("{stem}.weights.bin");
    let artifact = model.to_artifact(&weights_name);
    let manifest_path = dir.join(format!("{stem}.json"));
    fs::write(dir.join(&weights_name), &artifact.weights)?;
    fs::write(&manifest_path, serde_json::to_vec_pretty(&artifact.manifest)?)?;
    Ok(manifest_path)
}

/// Keyed model storage on the local filesystem, one directory per key.
#[derive(Clone, Debug)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        LocalStore { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self, key: &str) -> PathBuf {
        self.root.join(key).join(format!("{STORED_STEM}.json"))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.manifest_path(key).is_file()
    }

    /// Replaces whatever was stored under `key`.
    pub fn save<B: Backend>(&self, key: &str, model: &Model<B>) -> Result<PathBuf, Error> {
        save_artifact_files(model, &self.root.join(key), STORED_STEM)
    }

    pub fn load_artifact(&self, key: &str) -> Result<ModelArtifact, Error> {
        load_artifact_file(self.manifest_path(key))
    }

    pub fn load<B: Backend>(&self, key: &str, backend: B) -> Result<Model<B>, Error> {
        Model::from_artifact(backend, &self.load_artifact(key)?)
    }
}

/// Writes user-facing copies of a model into a downloads directory.
#[derive(Clone, Debug)]
pub struct DownloadSink {
    dir: PathBuf,
}

impl DownloadSink {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        DownloadSink { dir: dir.into() }
    }

    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save<B: Backend>(&self, model: &Model<B>) -> Result<PathBuf, Error> {
        save_artifact_files(model, &self.dir, TRAINED_MODEL_KEY)
    }
}

/// Outcome of each sink. At least one of them succeeded.
#[derive(Debug)]
pub struct SaveReport {
    pub local: Result<PathBuf, Error>,
    pub download: Result<PathBuf, Error>,
}

/// Saves `model` to local storage and the downloads directory. A failing sink
/// is logged and skipped; only both failing is an error.
pub fn persist_trained<B: Backend>(
    model: &Model<B>,
    store: &LocalStore,
    downloads: &DownloadSink,
) -> Result<SaveReport, Error> {
    let local = store.save(TRAINED_MODEL_KEY, model);
    match &local {
        Ok(path) => info!("Saved model to local storage at {}", path.display()),
        Err(e) => warn!("Could not save model to local storage: {e}"),
    }
    let download = downloads.save(model);
    match &download {
        Ok(path) => info!("Wrote model download to {}", path.display()),
        Err(e) => warn!("Could not write model download: {e}"),
    }
    match (local, download) {
        (Err(local), Err(download)) => Err(Error::Persist(format!(
            "local storage: {local}; download: {download}"
        ))),
        (local, download) => Ok(SaveReport { local, download }),
    }
}
