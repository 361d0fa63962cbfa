use digitnet::data::{IMAGE_LEN, InMemoryDataset};
use digitnet::error::Error;
use mnist::{Mnist, MnistBuilder};
use std::path::Path;

pub const TRAIN_SET_LEN: usize = 60_000;
pub const TEST_SET_LEN: usize = 10_000;

const FILES: [&str; 4] = [
    "train-images-idx3-ubyte",
    "train-labels-idx1-ubyte",
    "t10k-images-idx3-ubyte",
    "t10k-labels-idx1-ubyte",
];

/// Raw MNIST bytes: 784 pixels per image and one digit per label.
pub struct MnistBytes {
    pub train_images: Vec<u8>,
    pub train_labels: Vec<u8>,
    pub test_images: Vec<u8>,
    pub test_labels: Vec<u8>,
}

impl MnistBytes {
    pub fn into_dataset(self, seed: u64) -> Result<InMemoryDataset, Error> {
        InMemoryDataset::new(
            self.train_images,
            self.train_labels,
            self.test_images,
            self.test_labels,
            seed,
        )
    }
}

pub fn load_mnist_bytes(data_dir: &Path) -> Result<MnistBytes, Error> {
    // the mnist crate panics on missing files
    if let Some(missing) = FILES.iter().map(|f| data_dir.join(f)).find(|p| !p.is_file()) {
        return Err(Error::Dataset(format!(
            "{} not found, download the MNIST idx files into {}",
            missing.display(),
            data_dir.display()
        )));
    }
    let base_path = data_dir
        .to_str()
        .ok_or_else(|| Error::Dataset(format!("{} is not valid UTF-8", data_dir.display())))?;
    let base_path = format!("{}/", base_path.trim_end_matches('/'));
    let Mnist {
        trn_img,
        trn_lbl,
        tst_img,
        tst_lbl,
        ..
    } = MnistBuilder::new()
        .base_path(&base_path)
        .label_format_digit()
        .training_set_length(TRAIN_SET_LEN as u32)
        .validation_set_length(0)
        .test_set_length(TEST_SET_LEN as u32)
        .finalize();

    if trn_img.len() != TRAIN_SET_LEN * IMAGE_LEN || tst_img.len() != TEST_SET_LEN * IMAGE_LEN {
        return Err(Error::Dataset(format!(
            "unexpected MNIST sizes: {} train / {} test pixels",
            trn_img.len(),
            tst_img.len()
        )));
    }
    Ok(MnistBytes {
        train_images: trn_img,
        train_labels: trn_lbl,
        test_images: tst_img,
        test_labels: tst_lbl,
    })
}
