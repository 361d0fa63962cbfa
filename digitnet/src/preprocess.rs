use crate::dtype::DType;
use crate::error::Error;
use crate::model::{IMAGE_CHANNELS, IMAGE_SIZE};
use crate::tensor::{Dim4, Tensor, Tensor4};
use image::DynamicImage;
use std::path::Path;

const MAX_PIXEL_VALUE: f64 = 255.0;

pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage, Error> {
    Ok(image::open(path)?)
}

/// Source index for `dst` when scaling an axis of length `src_len` to `dst_len`,
/// without corner alignment or half-pixel centers.
#[inline]
fn nearest_index(dst: usize, src_len: usize, dst_len: usize) -> usize {
    (dst * src_len / dst_len).min(src_len - 1)
}

/// Nearest neighbour resize of a single-channel row-major image.
pub fn resize_nearest(src: &[u8], width: usize, height: usize, out_width: usize, out_height: usize) -> Vec<u8> {
    assert_eq!(src.len(), width * height, "Pixel count does not match {width}x{height}");
    let mut out = Vec::with_capacity(out_width * out_height);
    for y in 0..out_height {
        let row = nearest_index(y, height, out_height) * width;
        for x in 0..out_width {
            out.push(src[row + nearest_index(x, width, out_width)]);
        }
    }
    out
}

/// Turns an image of any size into a `(1, 28, 28, 1)` model input in `[0, 1]`.
///
/// Only the first channel is kept (red for color images, luma for grayscale
/// ones), then the image is resized to 28x28 by nearest neighbour and divided
/// by 255.
pub fn preprocess<T: DType>(image: &DynamicImage) -> Result<Tensor4<T>, Error> {
    let (width, height) = (image.width() as usize, image.height() as usize);
    if width == 0 || height == 0 {
        return Err(Error::ShapeMismatch {
            expected: "a non-empty image".into(),
            actual: format!("{width}x{height} pixels"),
        });
    }
    let first_channel: Vec<u8> = image.to_rgba8().pixels().map(|p| p.0[0]).collect();
    let resized = resize_nearest(&first_channel, width, height, IMAGE_SIZE, IMAGE_SIZE);
    let scale = T::from_f64(1.0 / MAX_PIXEL_VALUE);
    let data = resized
        .into_iter()
        .map(|p| T::from_usize(p as usize) * scale)
        .collect();
    Ok(Tensor::from_vec(data, Dim4(1, IMAGE_SIZE, IMAGE_SIZE, IMAGE_CHANNELS)))
}
