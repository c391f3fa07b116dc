//! Conversion of RGB images into the CLIP vision encoder's input tensor.

use image::imageops::{self, FilterType};
use image::RgbImage;

/// Per-channel normalization applied after scaling pixels to `[0, 1]`.
#[derive(Debug, Clone, Copy)]
pub struct PixelNorm {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

/// Center-crop to a square on the shortest edge, then resize to `size` x `size`.
pub fn resize_and_crop(image: &RgbImage, size: u32) -> RgbImage {
    let (w, h) = image.dimensions();
    let side = w.min(h);
    if side == 0 {
        return RgbImage::new(size, size);
    }

    let square = imageops::crop_imm(image, (w - side) / 2, (h - side) / 2, side, side).to_image();
    if side == size {
        return square;
    }

    imageops::resize(&square, size, size, FilterType::CatmullRom)
}

/// Flattened NCHW tensor data for a batch of images.
pub fn pixel_values(images: &[RgbImage], size: u32, norm: &PixelNorm) -> Vec<f32> {
    let plane = (size * size) as usize;
    let mut data = vec![0.0f32; images.len() * 3 * plane];

    for (n, image) in images.iter().enumerate() {
        let rgb = resize_and_crop(image, size);
        let base = n * 3 * plane;

        for (x, y, pixel) in rgb.enumerate_pixels() {
            let idx = y as usize * size as usize + x as usize;
            for c in 0..3 {
                data[base + c * plane + idx] =
                    (pixel[c] as f32 / 255.0 - norm.mean[c]) / norm.std[c];
            }
        }
    }

    data
}
