mod cli;
mod show;
mod util;

use clap::Parser;
use cli::{Cli, Commands};
use digitnet::backend::CpuBackend;
use digitnet::config::TrainingConfig;
use digitnet::error::Error;
use digitnet::evaluate::{Evaluation, evaluate};
use digitnet::model::{CLASS_NAMES, digit_classifier};
use digitnet::net::initializer::VarianceScalingInitializer;
use digitnet::predictor::{ModelLocations, ModelSource, Predictor};
use digitnet::store::{DownloadSink, LocalStore, persist_trained};
use digitnet::train::{LogCallback, train};
use log::{error, info};
use std::path::PathBuf;
use std::time::Instant;

type Cpu = CpuBackend<f32>;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Error> {
    match cli.command {
        Commands::Train {
            config,
            data,
            store,
            downloads,
            epochs,
            batch_size,
            seed,
        } => {
            let mut config = match config {
                Some(path) => TrainingConfig::from_json_file(path)?,
                None => TrainingConfig::default(),
            };
            if let Some(data) = data {
                config.data_dir = data;
            }
            if let Some(store) = store {
                config.store_dir = store;
            }
            if let Some(downloads) = downloads {
                config.downloads_dir = downloads;
            }
            config.epochs = epochs.unwrap_or(config.epochs);
            config.batch_size = batch_size.unwrap_or(config.batch_size);
            config.seed = seed.or(config.seed);
            config.validate()?;
            run_training(&config)
        }
        Commands::Predict {
            image,
            model,
            assets,
            store,
        } => run_prediction(image, model.into(), assets, store),
        Commands::Show { count, out, data } => {
            let bytes = util::load_mnist_bytes(&data)?;
            for path in show::write_examples(&bytes, count, &out)? {
                println!("{}", path.display());
            }
            Ok(())
        }
    }
}

fn run_training(config: &TrainingConfig) -> Result<(), Error> {
    let seed = config.seed.unwrap_or_else(rand::random);
    info!("Loading MNIST from {}", config.data_dir.display());
    let mut data = util::load_mnist_bytes(&config.data_dir)?.into_dataset(seed)?;
    info!("Loaded {} training and {} test images", data.train_len(), data.test_len());

    let initializer = match config.seed {
        Some(seed) => VarianceScalingInitializer::seed_from_u64(seed),
        None => VarianceScalingInitializer::default(),
    };
    let mut model = digit_classifier(Cpu::new(), initializer)?;
    info!("{model:?}");

    let start = Instant::now();
    let history = train(
        &mut model,
        &mut data,
        config.train_size,
        config.test_size,
        &config.fit_config(),
        &mut LogCallback,
    )?;
    info!(
        "Training time for {} epochs and batch size {}: {:.1} sec",
        history.epochs.len(),
        config.batch_size,
        start.elapsed().as_secs_f32()
    );

    let evaluation = evaluate(&mut model, &mut data, config.eval_size)?;
    print_evaluation(&evaluation);

    let store = LocalStore::new(&config.store_dir);
    let downloads = DownloadSink::new(&config.downloads_dir);
    persist_trained(&model, &store, &downloads)?;
    Ok(())
}

fn print_evaluation(evaluation: &Evaluation) {
    println!("{:>8} {:>9} {:>8}", "Class", "Accuracy", "Samples");
    for (name, class) in CLASS_NAMES.iter().zip(&evaluation.per_class) {
        println!("{name:>8} {:>9.4} {:>8}", class.accuracy, class.count);
    }
    println!("\nConfusion matrix (rows: true class, columns: predicted)");
    println!("{}", evaluation.confusion);
    println!("\nOverall accuracy: {:.4}", evaluation.accuracy());
}

fn run_prediction(image: PathBuf, source: ModelSource, assets: PathBuf, store: PathBuf) -> Result<(), Error> {
    let locations = ModelLocations::new(assets, LocalStore::new(store));
    let mut predictor = Predictor::new(Cpu::new(), locations);
    if source != ModelSource::default() {
        if let Err(e) = predictor.select(source) {
            error!("No {source} found, train a model or download the pre-trained model first: {e}");
            info!("Falling back to the {}", predictor.selector().selected());
        }
    }
    let prediction = predictor.predict_file(image)?;
    println!("{prediction}");
    Ok(())
}
