use crate::backend::Backend;
use crate::data::{DatasetProvider, LabeledBatch};
use crate::error::Error;
use crate::model::{Model, NUM_CLASSES};
use crate::scoring::{ClassAccuracy, ConfusionMatrix, MulticlassScorer, Scorer};
use crate::tensor::{Dim2, ITensor, TensorBase};
use log::info;

/// Examples run through the network at once while evaluating.
pub const EVAL_CHUNK_SIZE: usize = 500;
pub const EVAL_DATA_SIZE: usize = 10_000;

#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    pub per_class: Vec<ClassAccuracy>,
    pub confusion: ConfusionMatrix,
}

impl Evaluation {
    #[inline]
    pub fn accuracy(&self) -> f64 {
        self.confusion.accuracy()
    }
}

impl<B: Backend> Model<B> {
    /// Predicts every example of `batch` and scores the arg-max against the
    /// one-hot labels. Parameters are left untouched.
    pub fn score<S: Scorer<B>>(
        &mut self,
        batch: &LabeledBatch<B::Float>,
        chunk_size: usize,
        scorer: &mut S,
    ) -> Result<(), Error> {
        let net = self.net_mut();
        let rows = net.check_image_dims(batch.images.dims())?;
        let chunk_size = chunk_size.max(1);
        let backend = net.backend().clone();
        let inputs = batch.images.view_as(Dim2(rows, net.input_size()));
        for start in (0..rows).step_by(chunk_size) {
            let end = (start + chunk_size).min(rows);
            let output = net.predict(inputs.major_slice(start..end));
            scorer.process_batch(&backend, output, batch.labels.major_slice(start..end));
        }
        net.release_buffers();
        Ok(())
    }
}

/// Per-class accuracy and confusion matrix of `model` on up to `sample_size` test examples.
pub fn evaluate<B, P>(model: &mut Model<B>, data: &mut P, sample_size: usize) -> Result<Evaluation, Error>
where
    B: Backend,
    P: DatasetProvider<B::Float> + ?Sized,
{
    let batch = data.next_test_batch(sample_size)?;
    let mut scorer = MulticlassScorer::new(NUM_CLASSES);
    model.score(&batch, EVAL_CHUNK_SIZE, &mut scorer)?;
    let confusion = scorer.into_confusion_matrix();
    let evaluation = Evaluation {
        per_class: confusion.per_class_accuracy(),
        confusion,
    };
    info!(
        "Evaluated {} examples, accuracy {:.4}",
        evaluation.confusion.total(),
        evaluation.accuracy()
    );
    Ok(evaluation)
}

#[cfg(test)]
mod test {
    use super::evaluate;
    use crate::backend::CpuBackend;
    use crate::data::test::synthetic_dataset;
    use crate::data::{DatasetProvider, LabeledBatch};
    use crate::model::{digit_classifier, NUM_CLASSES};
    use crate::net::initializer::VarianceScalingInitializer;
    use crate::scoring::{MulticlassScorer, Scorer};
    use crate::tensor::{Dim2, Tensor, Tensor2, TensorBase};

    #[test]
    fn test_evaluate_counts_every_example() {
        let mut model =
            digit_classifier(CpuBackend::<f32>::new(), VarianceScalingInitializer::seed_from_u64(4)).unwrap();
        let mut data = synthetic_dataset(10, 30);
        let evaluation = evaluate(&mut model, &mut data, 1234).unwrap();
        assert_eq!(evaluation.confusion.total(), 1234);
        assert_eq!(evaluation.per_class.len(), 10);
        for (class, acc) in evaluation.per_class.iter().enumerate() {
            assert!((0.0..=1.0).contains(&acc.accuracy));
            assert_eq!(evaluation.confusion.row(class).iter().sum::<usize>(), acc.count);
        }
    }

    #[test]
    fn test_evaluate_does_not_change_predictions() {
        let mut model =
            digit_classifier(CpuBackend::<f64>::new(), VarianceScalingInitializer::seed_from_u64(5)).unwrap();
        let mut data = synthetic_dataset(10, 10);
        let sample: LabeledBatch<f64> = data.next_test_batch(10).unwrap();
        let before = model.predict_classes(sample.images.view()).unwrap();
        evaluate(&mut model, &mut data, 50).unwrap();
        let after = model.predict_classes(sample.images.view()).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_perfect_predictions_give_diagonal_matrix() {
        let backend = CpuBackend::<f32>::new();
        let classes = [3, 1, 4, 1, 5, 9, 2, 6, 5, 3];
        let mut labels: Tensor2<f32> = Tensor::zeroed(Dim2(classes.len(), NUM_CLASSES));
        for (row, &class) in classes.iter().enumerate() {
            labels[[row, class]] = 1.0;
        }
        let output = labels.clone();
        let mut scorer = MulticlassScorer::new(NUM_CLASSES);
        scorer.process_batch(&backend, &output, labels.view());
        assert_eq!(scorer.count(), 10);

        let confusion = scorer.into_confusion_matrix();
        assert!(confusion.is_diagonal());
        assert_eq!(confusion.accuracy(), 1.0);
        for (class, acc) in confusion.per_class_accuracy().iter().enumerate() {
            let count = classes.iter().filter(|&&c| c == class).count();
            assert_eq!(acc.count, count);
            if count > 0 {
                assert_eq!(acc.accuracy, 1.0);
            } else {
                assert_eq!(acc.accuracy, 0.0);
            }
        }
    }
}
