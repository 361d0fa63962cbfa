use crate::backend::argmax;
use crate::dtype::DType;
use crate::error::Error;
use crate::model::{IMAGE_CHANNELS, IMAGE_SIZE, NUM_CLASSES};
use crate::tensor::{Dim2, Dim4, Dims, ITensor, Tensor, Tensor2, Tensor4, TensorBase};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

pub const IMAGE_LEN: usize = IMAGE_SIZE * IMAGE_SIZE * IMAGE_CHANNELS;

/// Images in `[0, 1]` with shape `(n, 28, 28, 1)` and one-hot labels `(n, 10)`.
#[derive(Clone, Debug)]
pub struct LabeledBatch<T: DType> {
    pub images: Tensor4<T>,
    pub labels: Tensor2<T>,
}

impl<T: DType> LabeledBatch<T> {
    pub fn new(images: Tensor4<T>, labels: Tensor2<T>) -> Result<Self, Error> {
        let &Dim4(n, h, w, c) = images.dims();
        if (h, w, c) != (IMAGE_SIZE, IMAGE_SIZE, IMAGE_CHANNELS) || labels.dims() != &Dim2(n, NUM_CLASSES) {
            return Err(Error::ShapeMismatch {
                expected: format!("images (N, {IMAGE_SIZE}, {IMAGE_SIZE}, {IMAGE_CHANNELS}) with labels (N, {NUM_CLASSES})"),
                actual: format!("images {} with labels {}", images.dims(), labels.dims()),
            });
        }
        Ok(LabeledBatch { images, labels })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.images.dims().first()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// arg-max of every one-hot label row
    pub fn label_classes(&self) -> Vec<usize> {
        self.labels.iter_major_axis().map(argmax).collect()
    }
}

/// Source of labeled digit images split into a train and a test partition.
pub trait DatasetProvider<T: DType> {
    fn next_train_batch(&mut self, size: usize) -> Result<LabeledBatch<T>, Error>;
    fn next_test_batch(&mut self, size: usize) -> Result<LabeledBatch<T>, Error>;
}

struct Partition {
    images: Vec<u8>,
    labels: Vec<u8>,
    order: Vec<usize>,
    cursor: usize,
}

impl Partition {
    fn new(name: &str, images: Vec<u8>, labels: Vec<u8>, rng: &mut StdRng) -> Result<Self, Error> {
        if labels.is_empty() {
            return Err(Error::Dataset(format!("{name} partition is empty")));
        }
        if images.len() != labels.len() * IMAGE_LEN {
            return Err(Error::Dataset(format!(
                "{name} partition has {} image bytes for {} labels, expected {}",
                images.len(),
                labels.len(),
                labels.len() * IMAGE_LEN
            )));
        }
        if let Some(bad) = labels.iter().find(|&&l| l as usize >= NUM_CLASSES) {
            return Err(Error::Dataset(format!("{name} partition contains label {bad}")));
        }
        let mut order: Vec<usize> = (0..labels.len()).collect();
        order.shuffle(rng);
        Ok(Partition {
            images,
            labels,
            order,
            cursor: 0,
        })
    }

    fn next_batch<T: DType>(&mut self, size: usize) -> LabeledBatch<T> {
        let scale = T::from_f64(1.0 / 255.0);
        let mut images = Vec::with_capacity(size * IMAGE_LEN);
        let mut labels = Tensor::zeroed(Dim2(size, NUM_CLASSES));
        for row in 0..size {
            let idx = self.order[self.cursor];
            self.cursor = (self.cursor + 1) % self.order.len();
            let pixels = &self.images[idx * IMAGE_LEN..(idx + 1) * IMAGE_LEN];
            images.extend(pixels.iter().map(|&p| T::from_usize(p as usize) * scale));
            labels[[row, self.labels[idx] as usize]] = T::ONE;
        }
        LabeledBatch {
            images: Tensor::from_vec(images, Dim4(size, IMAGE_SIZE, IMAGE_SIZE, IMAGE_CHANNELS)),
            labels,
        }
    }
}

/// Keeps raw MNIST bytes in memory. Each partition is shuffled once; batches
/// are then taken in that order and wrap around when the partition runs out.
pub struct InMemoryDataset {
    train: Partition,
    test: Partition,
}

impl InMemoryDataset {
    /// `*_images` holds 784 row-major pixel bytes per example, `*_labels` one digit per example.
    pub fn new(
        train_images: Vec<u8>,
        train_labels: Vec<u8>,
        test_images: Vec<u8>,
        test_labels: Vec<u8>,
        seed: u64,
    ) -> Result<Self, Error> {
        let mut rng = StdRng::seed_from_u64(seed);
        let train = Partition::new("train", train_images, train_labels, &mut rng)?;
        let test = Partition::new("test", test_images, test_labels, &mut rng)?;
        log::debug!(
            "Dataset ready: {} train / {} test examples",
            train.labels.len(),
            test.labels.len()
        );
        Ok(InMemoryDataset { train, test })
    }

    #[inline]
    pub fn train_len(&self) -> usize {
        self.train.labels.len()
    }

    #[inline]
    pub fn test_len(&self) -> usize {
        self.test.labels.len()
    }
}

impl<T: DType> DatasetProvider<T> for InMemoryDataset {
    fn next_train_batch(&mut self, size: usize) -> Result<LabeledBatch<T>, Error> {
        Ok(self.train.next_batch(size))
    }

    fn next_test_batch(&mut self, size: usize) -> Result<LabeledBatch<T>, Error> {
        Ok(self.test.next_batch(size))
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::{DatasetProvider, InMemoryDataset, LabeledBatch, IMAGE_LEN};
    use crate::error::Error;
    use crate::tensor::{Dim2, Dim4, ITensor, Tensor};

    /// every image is filled with `label * 20`, so images and labels can be matched up
    pub(crate) fn synthetic_dataset(train: usize, test: usize) -> InMemoryDataset {
        let make = |n: usize| {
            let labels: Vec<u8> = (0..n).map(|i| (i % 10) as u8).collect();
            let images: Vec<u8> = labels.iter().flat_map(|&l| vec![l * 20; IMAGE_LEN]).collect();
            (images, labels)
        };
        let (train_images, train_labels) = make(train);
        let (test_images, test_labels) = make(test);
        InMemoryDataset::new(train_images, train_labels, test_images, test_labels, 42).unwrap()
    }

    #[test]
    fn test_batches_are_normalized_and_aligned() {
        let mut data = synthetic_dataset(30, 10);
        let batch: LabeledBatch<f32> = data.next_train_batch(12).unwrap();
        assert_eq!(batch.images.dims(), &Dim4(12, 28, 28, 1));
        assert_eq!(batch.labels.dims(), &Dim2(12, 10));
        assert!(batch.images.iter().all(|&p| (0.0..=1.0).contains(&p)));
        let pixels: &[f32] = batch.images.as_ref();
        for (row, class) in batch.label_classes().into_iter().enumerate() {
            let pixel = pixels[row * IMAGE_LEN];
            assert!((pixel - class as f32 * 20.0 / 255.0).abs() < 1e-6);
            assert_eq!(batch.labels.row(row).iter().sum::<f32>(), 1.0);
        }
    }

    #[test]
    fn test_batches_wrap_around() {
        let mut data = synthetic_dataset(10, 7);
        let first: LabeledBatch<f64> = data.next_test_batch(7).unwrap();
        let second: LabeledBatch<f64> = data.next_test_batch(9).unwrap();
        let mut classes = first.label_classes();
        classes.sort_unstable();
        assert_eq!(classes, vec![0, 1, 2, 3, 4, 5, 6]);
        // the shuffled order repeats once exhausted
        assert_eq!(second.label_classes()[..7], first.label_classes()[..]);
        assert_eq!(second.label_classes()[7..], first.label_classes()[..2]);
    }

    #[test]
    fn test_rejects_mismatched_input() {
        let result = InMemoryDataset::new(vec![0; IMAGE_LEN * 2], vec![1], vec![0; IMAGE_LEN], vec![1], 0);
        assert!(matches!(result, Err(Error::Dataset(_))));
        let result = InMemoryDataset::new(vec![0; IMAGE_LEN], vec![10], vec![0; IMAGE_LEN], vec![1], 0);
        assert!(matches!(result, Err(Error::Dataset(_))));
    }

    #[test]
    fn test_labeled_batch_checks_shapes() {
        let images = Tensor::<f32, _>::zeroed(Dim4(2, 28, 28, 1));
        let labels = Tensor::<f32, _>::zeroed(Dim2(3, 10));
        assert!(matches!(LabeledBatch::new(images, labels), Err(Error::ShapeMismatch { .. })));
    }
}
