use crate::error::Error;
use crate::evaluate::EVAL_DATA_SIZE;
use crate::train::{FitConfig, TEST_DATA_SIZE, TRAIN_DATA_SIZE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Settings of one training run, usually read from JSON and then overridden
/// from the command line. Missing fields take their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case", deny_unknown_fields)]
pub struct TrainingConfig {
    pub train_size: usize,
    pub test_size: usize,
    pub eval_size: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub shuffle: bool,
    pub seed: Option<u64>,
    /// directory holding the MNIST idx files
    pub data_dir: PathBuf,
    /// directory backing the local model store
    pub store_dir: PathBuf,
    pub downloads_dir: PathBuf,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        let fit = FitConfig::default();
        TrainingConfig {
            train_size: TRAIN_DATA_SIZE,
            test_size: TEST_DATA_SIZE,
            eval_size: EVAL_DATA_SIZE,
            epochs: fit.epochs,
            batch_size: fit.batch_size,
            shuffle: fit.shuffle,
            seed: None,
            data_dir: PathBuf::from("data"),
            store_dir: PathBuf::from("model-store"),
            downloads_dir: PathBuf::from("downloads"),
        }
    }
}

impl TrainingConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let config: TrainingConfig = serde_json::from_slice(&fs::read(path)?)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        let sizes = [
            ("train_size", self.train_size),
            ("test_size", self.test_size),
            ("eval_size", self.eval_size),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, n)| *n == 0) {
            return Err(Error::InvalidConfig(format!("{name} must be positive")));
        }
        self.fit_config().validate()
    }

    pub fn fit_config(&self) -> FitConfig {
        FitConfig {
            epochs: self.epochs,
            batch_size: self.batch_size,
            shuffle: self.shuffle,
            seed: self.seed,
        }
    }
}
