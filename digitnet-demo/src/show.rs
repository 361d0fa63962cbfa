use crate::util::MnistBytes;
use digitnet::data::IMAGE_LEN;
use digitnet::error::Error;
use digitnet::model::{IMAGE_SIZE, class_name};
use image::GrayImage;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

/// Writes the first `count` test digits to `out_dir` as `<index>-<name>.png`.
pub fn write_examples(data: &MnistBytes, count: usize, out_dir: &Path) -> Result<Vec<PathBuf>, Error> {
    fs::create_dir_all(out_dir)?;
    let mut written = Vec::with_capacity(count);
    let examples = data.test_images.chunks_exact(IMAGE_LEN).zip(&data.test_labels);
    for (i, (pixels, &label)) in examples.take(count).enumerate() {
        let image = GrayImage::from_raw(IMAGE_SIZE as u32, IMAGE_SIZE as u32, pixels.to_vec())
            .ok_or_else(|| Error::Dataset(format!("example {i} has {} pixels", pixels.len())))?;
        let name = class_name(label as usize).unwrap_or("Unknown");
        let path = out_dir.join(format!("{i:03}-{name}.png"));
        image.save(&path)?;
        written.push(path);
    }
    info!("Wrote {} examples to {}", written.len(), out_dir.display());
    Ok(written)
}
