use clap::{Parser, Subcommand, ValueEnum};
use digitnet::predictor::ModelSource;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Train and query a small CNN on MNIST digits", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a new model, evaluate it and save it
    Train {
        /// JSON training config; flags below override it
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Directory holding the MNIST idx files
        #[arg(long, value_name = "DIR")]
        data: Option<PathBuf>,
        /// Local model store directory
        #[arg(long, value_name = "DIR")]
        store: Option<PathBuf>,
        /// Directory the model download is written to
        #[arg(long, value_name = "DIR")]
        downloads: Option<PathBuf>,
        #[arg(long)]
        epochs: Option<usize>,
        #[arg(long)]
        batch_size: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Predict the digit in an image
    Predict {
        image: PathBuf,
        /// Model to predict with
        #[arg(long, value_enum, default_value_t = ModelChoice::Pretrained)]
        model: ModelChoice,
        /// Directory containing the converted pretrained models
        #[arg(long, value_name = "DIR", default_value = ".")]
        assets: PathBuf,
        /// Local model store directory
        #[arg(long, value_name = "DIR", default_value = "model-store")]
        store: PathBuf,
    },
    /// Write example digits from the test set as PNG files
    Show {
        #[arg(long, default_value_t = 20)]
        count: usize,
        #[arg(long, value_name = "DIR", default_value = "examples-out")]
        out: PathBuf,
        /// Directory holding the MNIST idx files
        #[arg(long, value_name = "DIR", default_value = "data")]
        data: PathBuf,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModelChoice {
    Pretrained,
    Keras,
    Local,
}

impl From<ModelChoice> for ModelSource {
    fn from(choice: ModelChoice) -> Self {
        match choice {
            ModelChoice::Pretrained => ModelSource::Pretrained,
            ModelChoice::Keras => ModelSource::KerasConverted,
            ModelChoice::Local => ModelSource::LocalStorage,
        }
    }
}
