use crate::backend::Backend;
use crate::model::CLASS_NAMES;
use crate::tensor::{Dim2, ITensor, Tensor, Tensor2, TensorBase, TensorView2};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::iter::zip;

pub trait Scorer<B: Backend> {
    fn process_batch(&mut self, backend: &B, output: &Tensor2<B::Float>, expected: TensorView2<B::Float>);
}

/// Accumulates a confusion matrix over arg-maxed outputs and one-hot labels.
pub struct MulticlassScorer {
    matrix: Tensor2<usize>,
}

impl MulticlassScorer {
    pub fn new(num_classes: usize) -> Self {
        MulticlassScorer {
            matrix: Tensor::zeroed(Dim2(num_classes, num_classes)),
        }
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.matrix.iter().sum()
    }

    pub fn confusion_matrix(&self) -> ConfusionMatrix {
        ConfusionMatrix {
            counts: self.matrix.clone(),
        }
    }

    pub fn into_confusion_matrix(self) -> ConfusionMatrix {
        ConfusionMatrix { counts: self.matrix }
    }
}

impl<B: Backend> Scorer<B> for MulticlassScorer {
    fn process_batch(&mut self, backend: &B, output: &Tensor2<B::Float>, expected: TensorView2<B::Float>) {
        backend.accum_confusion_matrix_multiclass(&mut self.matrix, output, expected);
    }
}

/// Fraction of one class's examples that were predicted correctly.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassAccuracy {
    pub accuracy: f64,
    pub count: usize,
}

/// Square count table, `counts[[true_class, predicted_class]]`.
#[derive(Clone, Debug, PartialEq)]
pub struct ConfusionMatrix {
    counts: Tensor2<usize>,
}

impl ConfusionMatrix {
    /// Cross-tabulates class ids; panics if a class id is `>= num_classes`.
    pub fn from_classes(labels: &[usize], predictions: &[usize], num_classes: usize) -> Self {
        assert_eq!(labels.len(), predictions.len(), "Label and prediction counts differ");
        let mut counts = Tensor::zeroed(Dim2(num_classes, num_classes));
        for (&label, &prediction) in zip(labels, predictions) {
            counts[[label, prediction]] += 1;
        }
        ConfusionMatrix { counts }
    }

    #[inline]
    pub fn num_classes(&self) -> usize {
        self.counts.dims().rows()
    }

    #[inline]
    pub fn get(&self, true_class: usize, predicted_class: usize) -> usize {
        self.counts[[true_class, predicted_class]]
    }

    #[inline]
    pub fn row(&self, true_class: usize) -> &[usize] {
        self.counts.row(true_class)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn correct(&self) -> usize {
        (0..self.num_classes()).map(|i| self.get(i, i)).sum()
    }

    pub fn accuracy(&self) -> f64 {
        self.correct() as f64 / self.total().max(1) as f64
    }

    /// Accuracy of every true class. A class without examples reports 0.
    pub fn per_class_accuracy(&self) -> Vec<ClassAccuracy> {
        self.counts
            .iter_major_axis()
            .enumerate()
            .map(|(class, row)| {
                let count: usize = row.iter().sum();
                let accuracy = if count == 0 {
                    0.0
                } else {
                    row[class] as f64 / count as f64
                };
                ClassAccuracy { accuracy, count }
            })
            .collect()
    }

    pub fn is_diagonal(&self) -> bool {
        self.counts
            .iter_major_axis()
            .enumerate()
            .all(|(class, row)| row.iter().enumerate().all(|(pred, &n)| pred == class || n == 0))
    }

    pub fn as_rows(&self) -> Vec<Vec<usize>> {
        self.counts.iter_major_axis().map(<[usize]>::to_vec).collect()
    }
}

fn label(class: usize) -> String {
    CLASS_NAMES
        .get(class)
        .map_or_else(|| class.to_string(), |name| name.to_string())
}

impl Display for ConfusionMatrix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let n = self.num_classes();
        write!(f, "{:>8}", "")?;
        for pred in 0..n {
            write!(f, " {:>6}", label(pred))?;
        }
        for class in 0..n {
            write!(f, "\n{:>8}", label(class))?;
            for &count in self.row(class) {
                write!(f, " {count:>6}")?;
            }
        }
        Ok(())
    }
}

/// Per-class accuracy from class id sequences.
pub fn per_class_accuracy(labels: &[usize], predictions: &[usize], num_classes: usize) -> Vec<ClassAccuracy> {
    ConfusionMatrix::from_classes(labels, predictions, num_classes).per_class_accuracy()
}
