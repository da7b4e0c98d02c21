use image::imageops::FilterType;
use image::{GrayImage, RgbImage};
use imageproc::contrast::{ThresholdType, otsu_level, threshold};
use imageproc::filter::gaussian_blur_f32;

/// Sigma equivalent to a 5x5 Gaussian kernel with automatic sigma
pub const PLATE_BLUR_SIGMA: f32 = 1.1;

/// Brightness/contrast adjustment: `saturate(|alpha * v + beta|)` per channel
pub fn adjust_brightness(img: &RgbImage, alpha: f32, beta: f32) -> RgbImage {
    let mut adjusted = img.clone();
    for pixel in adjusted.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            let value = (alpha * *channel as f32 + beta).abs().round();
            *channel = value.min(255.0) as u8;
        }
    }
    adjusted
}

/// Convert image to grayscale
pub fn to_grayscale(img: &RgbImage) -> GrayImage {
    image::imageops::grayscale(img)
}

/// Apply Gaussian blur to reduce noise
pub fn apply_blur(img: &GrayImage, sigma: f32) -> GrayImage {
    gaussian_blur_f32(img, sigma)
}

/// Two-level image using Otsu's global threshold
pub fn binarize(img: &GrayImage) -> GrayImage {
    let level = otsu_level(img);
    threshold(img, level, ThresholdType::Binary)
}

/// Integer magnification for a plate region: small glyphs get magnified
/// more, already legible regions less
pub fn upscale_factor(width: u32, height: u32) -> u32 {
    if width < 100 || height < 50 {
        8
    } else if width > 400 || height > 200 {
        2
    } else {
        4
    }
}

/// Resize by an integer factor with cubic interpolation
pub fn upscale(img: &GrayImage, factor: u32) -> GrayImage {
    let (width, height) = img.dimensions();
    image::imageops::resize(img, width * factor, height * factor, FilterType::CatmullRom)
}
