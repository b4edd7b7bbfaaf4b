use super::image::Image;
use crate::error::{AlignError, Result};
use image::{GrayImage, Luma};
use std::path::Path;

/// Load any format the `image` crate decodes as a grey image with samples
/// in `[0, 1]`
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<Image> {
    let grey = image::open(path)?.to_luma32f();
    let (width, height) = grey.dimensions();
    Ok(Image::from_fn_2d(width as usize, height as usize, |x, y| {
        grey.get_pixel(x as u32, y as u32)[0]
    }))
}

/// Write a 2D image as 8-bit grey, stretching its range to `0..=255`
pub fn save_image<P: AsRef<Path>>(image: &Image, path: P) -> Result<()> {
    image.ensure_2d("saving an image")?;
    let (min, max) = image
        .data()
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    let scale = if max > min { 255.0 / (max - min) } else { 0.0 };

    let out = GrayImage::from_fn(image.nx() as u32, image.ny() as u32, |x, y| {
        let v = (image.get_2d(x as usize, y as usize) - min) * scale;
        Luma([v.round().clamp(0.0, 255.0) as u8])
    });
    out.save(path)?;
    Ok(())
}

pub fn validate_image_size(image: &Image, min_size: usize) -> Result<()> {
    if image.nx() < min_size || image.ny() < min_size {
        return Err(AlignError::dimension_mismatch(format!(
            "Image too small: {}, minimum: {}x{}",
            image.describe_dims(),
            min_size,
            min_size
        )));
    }
    Ok(())
}
