//! Reduces an image to a bounded set of opaque sample colors

use crate::SampledColor;
use image::RgbaImage;
use palette::Srgba;

/// Pixels with an alpha below this value are not sampled
pub const OPACITY_THRESHOLD: u8 = 128;

/// The default number of pixels to advance between samples
pub const DEFAULT_SAMPLE_STRIDE: usize = 10;

/// Sample every `stride`-th pixel, skipping pixels that are mostly transparent.
///
/// A `stride` of `0` is treated as `1`.
#[must_use]
pub fn sample_pixels(pixels: &[Srgba<u8>], stride: usize) -> Vec<SampledColor> {
	pixels
		.iter()
		.step_by(usize::max(stride, 1))
		.filter(|pixel| pixel.alpha >= OPACITY_THRESHOLD)
		.map(|pixel| pixel.color)
		.collect()
}

/// Sample every `stride`-th pixel of an image in row-major order, skipping pixels that are mostly transparent.
///
/// A `stride` of `0` is treated as `1`.
#[must_use]
pub fn sample_image(image: &RgbaImage, stride: usize) -> Vec<SampledColor> {
	let pixels = palette::cast::from_component_slice::<Srgba<u8>>(image.as_raw().as_slice());
	sample_pixels(pixels, stride)
}
