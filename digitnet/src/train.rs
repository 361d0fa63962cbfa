use crate::backend::Backend;
use crate::data::{DatasetProvider, LabeledBatch};
use crate::dtype::DType;
use crate::error::Error;
use crate::model::Model;
use crate::net::Net;
use crate::tensor::{Dim1, Dim2, ITensor, Tensor, Tensor1, Tensor2, TensorBase, TensorView2};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

pub const TRAIN_DATA_SIZE: usize = 55_000;
pub const TEST_DATA_SIZE: usize = 10_000;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FitConfig {
    pub epochs: usize,
    pub batch_size: usize,
    /// reshuffle the training examples before every epoch
    pub shuffle: bool,
    /// seed for the shuffling, taken from the OS when absent
    pub seed: Option<u64>,
}

impl Default for FitConfig {
    fn default() -> Self {
        FitConfig {
            epochs: 3,
            batch_size: 512,
            shuffle: true,
            seed: None,
        }
    }
}

impl FitConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.epochs == 0 {
            return Err(Error::InvalidConfig("epochs must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch size must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    pub epoch: usize,
    pub batch: usize,
    pub size: usize,
    pub loss: f64,
    pub acc: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    pub epoch: usize,
    pub loss: f64,
    pub acc: f64,
    pub val_loss: Option<f64>,
    pub val_acc: Option<f64>,
}

/// Receives progress reports while a model is being fit.
pub trait FitCallback {
    fn on_batch_end(&mut self, _stats: &BatchStats) {}
    fn on_epoch_end(&mut self, _stats: &EpochStats) {}
}

/// Reports progress through the `log` facade.
#[derive(Copy, Clone, Debug, Default)]
pub struct LogCallback;

impl FitCallback for LogCallback {
    fn on_batch_end(&mut self, stats: &BatchStats) {
        debug!(
            "epoch {} batch {}: loss {:.4}, acc {:.4}",
            stats.epoch + 1,
            stats.batch + 1,
            stats.loss,
            stats.acc
        );
    }

    fn on_epoch_end(&mut self, stats: &EpochStats) {
        match (stats.val_loss, stats.val_acc) {
            (Some(val_loss), Some(val_acc)) => info!(
                "epoch {}: loss {:.4}, acc {:.4}, val_loss {:.4}, val_acc {:.4}",
                stats.epoch + 1,
                stats.loss,
                stats.acc,
                val_loss,
                val_acc
            ),
            _ => info!("epoch {}: loss {:.4}, acc {:.4}", stats.epoch + 1, stats.loss, stats.acc),
        }
    }
}

impl FitCallback for () {}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub epochs: Vec<EpochStats>,
}

impl History {
    pub fn last(&self) -> Option<&EpochStats> {
        self.epochs.last()
    }
}

/// Loss and accuracy summed over several batches.
#[derive(Copy, Clone, Debug, Default)]
struct Totals {
    loss: f64,
    correct: usize,
    count: usize,
}

impl Totals {
    fn add<T: DType>(&mut self, losses: &Tensor1<T>, correct: usize) {
        self.loss += losses.iter().map(|l| l.as_f64()).sum::<f64>();
        self.correct += correct;
        self.count += losses.len();
    }

    fn mean_loss(&self) -> f64 {
        self.loss / self.count.max(1) as f64
    }

    fn accuracy(&self) -> f64 {
        self.correct as f64 / self.count.max(1) as f64
    }
}

fn check_batch<B: Backend>(net: &Net<B>, batch: &LabeledBatch<B::Float>) -> Result<usize, Error> {
    let rows = net.check_image_dims(batch.images.dims())?;
    if batch.labels.dims() != &Dim2(rows, net.output_size()) {
        return Err(Error::ShapeMismatch {
            expected: format!("labels ({rows}, {})", net.output_size()),
            actual: format!("labels {}", batch.labels.dims()),
        });
    }
    Ok(rows)
}

/// copies the rows `indices` of `src` into `dst`
fn gather_rows<T: DType>(src: TensorView2<T>, indices: &[usize], dst: &mut Tensor2<T>) {
    dst.resize_major(T::ZERO, indices.len());
    for (row, &idx) in indices.iter().enumerate() {
        dst.row_mut(row).copy_from_slice(&src.as_slice()[idx * src.dims().cols()..(idx + 1) * src.dims().cols()]);
    }
}

impl<B: Backend> Model<B> {
    /// Mini-batch training with per-epoch validation, in the manner of Keras' `fit`.
    pub fn fit(
        &mut self,
        train: &LabeledBatch<B::Float>,
        validation: Option<&LabeledBatch<B::Float>>,
        config: &FitConfig,
        callback: &mut dyn FitCallback,
    ) -> Result<History, Error> {
        config.validate()?;
        let num_examples = check_batch(self.net(), train)?;
        if num_examples == 0 {
            return Err(Error::InvalidConfig("no training examples".into()));
        }
        if let Some(validation) = validation {
            check_batch(self.net(), validation)?;
        }

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let input_size = self.net().input_size();
        let inputs = train.images.view_as(Dim2(num_examples, input_size));
        let labels = train.labels.view();
        let mut order: Vec<usize> = (0..num_examples).collect();
        let mut input_buff = Tensor::zeroed(Dim2(0, input_size));
        let mut label_buff = Tensor::zeroed(Dim2(0, labels.dims().cols()));
        let mut history = History::default();

        info!(
            "Training on {num_examples} examples for {} epochs, batch size {}",
            config.epochs, config.batch_size
        );
        for epoch in 0..config.epochs {
            if config.shuffle {
                order.shuffle(&mut rng);
            }
            let mut totals = Totals::default();
            for (batch, indices) in order.chunks(config.batch_size).enumerate() {
                gather_rows(inputs, indices, &mut input_buff);
                gather_rows(labels, indices, &mut label_buff);
                let (net, optimizer, loss) = self.parts_mut();
                let backend = net.backend().clone();
                let result = net.train_batch(input_buff.view(), label_buff.view(), &loss, optimizer);
                let correct = backend.count_correct(result.output, label_buff.view());
                let stats = BatchStats {
                    epoch,
                    batch,
                    size: indices.len(),
                    loss: result.mean_loss(),
                    acc: correct as f64 / indices.len() as f64,
                };
                totals.add(result.error, correct);
                callback.on_batch_end(&stats);
            }

            let (val_loss, val_acc) = match validation {
                Some(validation) => {
                    let (val_loss, val_acc) = self.evaluate_loss(validation, config.batch_size)?;
                    (Some(val_loss), Some(val_acc))
                }
                None => (None, None),
            };
            let stats = EpochStats {
                epoch,
                loss: totals.mean_loss(),
                acc: totals.accuracy(),
                val_loss,
                val_acc,
            };
            callback.on_epoch_end(&stats);
            history.epochs.push(stats);
        }
        self.net_mut().release_buffers();
        Ok(history)
    }

    /// Mean loss and accuracy over `batch`, computed `chunk_size` examples at a time.
    pub fn evaluate_loss(&mut self, batch: &LabeledBatch<B::Float>, chunk_size: usize) -> Result<(f64, f64), Error> {
        let rows = check_batch(self.net(), batch)?;
        let chunk_size = chunk_size.max(1);
        let loss = self.loss();
        let net = self.net_mut();
        let backend = net.backend().clone();
        let inputs = batch.images.view_as(Dim2(rows, net.input_size()));
        let mut losses = Tensor::zeroed(Dim1(0));
        let mut loss_deriv = Tensor::zeroed(Dim2(0, net.output_size()));
        let mut totals = Totals::default();
        for start in (0..rows).step_by(chunk_size) {
            let end = (start + chunk_size).min(rows);
            let expected = batch.labels.major_slice(start..end);
            let output = net.predict(inputs.major_slice(start..end));
            losses.resize(B::Float::ZERO, Dim1(end - start));
            loss_deriv.resize_major(B::Float::ZERO, end - start);
            loss.compute(&backend, output, expected, &mut losses, &mut loss_deriv);
            let correct = backend.count_correct(output, expected);
            totals.add(&losses, correct);
        }
        Ok((totals.mean_loss(), totals.accuracy()))
    }
}

/// Draws `train_size` training and `test_size` validation examples from `data` and fits `model`.
pub fn train<B, P>(
    model: &mut Model<B>,
    data: &mut P,
    train_size: usize,
    test_size: usize,
    config: &FitConfig,
    callback: &mut dyn FitCallback,
) -> Result<History, Error>
where
    B: Backend,
    P: DatasetProvider<B::Float> + ?Sized,
{
    config.validate()?;
    let train = data.next_train_batch(train_size)?;
    let test = data.next_test_batch(test_size)?;
    let validation = if test.is_empty() { None } else { Some(&test) };
    model.fit(&train, validation, config, callback)
}

#[cfg(test)]
mod test {
    use super::{train, BatchStats, EpochStats, FitCallback, FitConfig};
    use crate::backend::CpuBackend;
    use crate::data::test::synthetic_dataset;
    use crate::data::{DatasetProvider, LabeledBatch};
    use crate::error::Error;
    use crate::model::digit_classifier;
    use crate::net::initializer::VarianceScalingInitializer;
    use crate::tensor::{Dim2, Dim4, Tensor};

    #[derive(Default)]
    struct Recorder {
        batches: Vec<BatchStats>,
        epochs: Vec<EpochStats>,
    }

    impl FitCallback for Recorder {
        fn on_batch_end(&mut self, stats: &BatchStats) {
            self.batches.push(*stats);
        }

        fn on_epoch_end(&mut self, stats: &EpochStats) {
            self.epochs.push(*stats);
        }
    }

    #[test]
    fn test_train_reports_every_batch_and_epoch() {
        let mut model =
            digit_classifier(CpuBackend::<f32>::new(), VarianceScalingInitializer::seed_from_u64(1)).unwrap();
        let mut data = synthetic_dataset(50, 20);
        let config = FitConfig {
            epochs: 3,
            batch_size: 16,
            shuffle: true,
            seed: Some(5),
        };
        let mut recorder = Recorder::default();
        let history = train(&mut model, &mut data, 40, 20, &config, &mut recorder).unwrap();

        // 40 examples in batches of 16 -> 16, 16, 8
        assert_eq!(recorder.batches.len(), 9);
        assert_eq!(recorder.batches[2].size, 8);
        assert_eq!(recorder.epochs, history.epochs);
        assert_eq!(history.epochs.len(), 3);
        for stats in history.epochs.iter() {
            assert!(stats.loss.is_finite());
            assert!((0.0..=1.0).contains(&stats.acc));
            assert!(stats.val_loss.is_some_and(f64::is_finite));
            assert!(stats.val_acc.is_some_and(|acc| (0.0..=1.0).contains(&acc)));
        }
        assert_eq!(model.optimizer().iterations(), 9);
    }

    #[test]
    fn test_fit_learns_synthetic_digits() {
        // synthetic images are constant per class, so a few epochs separate them
        let mut model =
            digit_classifier(CpuBackend::<f32>::new(), VarianceScalingInitializer::seed_from_u64(2)).unwrap();
        let mut data = synthetic_dataset(100, 20);
        let train_batch: LabeledBatch<f32> = data.next_train_batch(100).unwrap();
        let config = FitConfig {
            epochs: 15,
            batch_size: 20,
            shuffle: true,
            seed: Some(3),
        };
        let history = model.fit(&train_batch, None, &config, &mut ()).unwrap();
        let first = history.epochs[0].loss;
        let last = history.last().unwrap().loss;
        assert!(last < first, "loss went from {first} to {last}");
        assert!(history.last().unwrap().val_loss.is_none());
    }

    #[test]
    fn test_fit_rejects_bad_input() {
        let mut model =
            digit_classifier(CpuBackend::<f32>::new(), VarianceScalingInitializer::seed_from_u64(1)).unwrap();
        let batch = LabeledBatch {
            images: Tensor::zeroed(Dim4(2, 14, 14, 1)),
            labels: Tensor::zeroed(Dim2(2, 10)),
        };
        let result = model.fit(&batch, None, &FitConfig::default(), &mut ());
        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));

        let mut data = synthetic_dataset(10, 10);
        let config = FitConfig {
            batch_size: 0,
            ..FitConfig::default()
        };
        let result = train(&mut model, &mut data, 10, 10, &config, &mut ());
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }
}
