//! Extract the dominant colors of an image using deterministic k-means clustering.
//!
//! # Examples
//!
//! ## Read an image file and get 6 dominant colors.
//!
//! ```no_run
//! let pixels = image::open("some image").unwrap().into_rgba8();
//! let samples = swatches::sample_image(&pixels, swatches::DEFAULT_SAMPLE_STRIDE);
//! let palette = swatches::quantize(&samples, 6, swatches::DEFAULT_MAX_ITERATIONS);
//!
//! for cluster in &palette {
//!     println!("{} {}", cluster.hex, cluster.count);
//! }
//! ```
//!
//! ## Cluster already sampled colors and inspect the number of iterations.
//!
//! ```
//! use palette::Srgb;
//!
//! let mut samples = vec![Srgb::new(255, 0, 0); 100];
//! samples.extend([Srgb::new(0, 0, 255); 10]);
//!
//! let result = swatches::run(&samples, 2, 10);
//! assert_eq!(result.clusters[0].hex, "#FF0000");
//! assert_eq!(result.clusters[1].count, 10);
//! assert!(result.iterations <= 10);
//! ```
//!
//! # Arguments
//!
//! ## Sample Stride
//!
//! Only every `stride`-th pixel of the image is read, which bounds the amount of work k-means has to do.
//! Pixels with an alpha below [`OPACITY_THRESHOLD`] are skipped entirely.
//!
//! A stride of `10` keeps clustering fast for photos while still covering the whole image.
//! A stride of `1` reads every pixel.
//!
//! ## K
//!
//! This is the (maximum) number of dominant colors to find.
//!
//! 2 to 20 is the sensible range. Clusters that end up with no samples are left out of the result,
//! so fewer than `k` colors are returned when the samples contain fewer distinct colors than `k`.
//! `k` = 0 or an empty slice of samples gives an empty result.
//!
//! ## Max Iterations
//!
//! This is the maximum number of refinement iterations.
//!
//! k-means stops earlier once no centroid moves by more than a distance of `1.0` in RGB space,
//! which is usually reached well within the default of [`DEFAULT_MAX_ITERATIONS`].
//!
//! # Determinism
//!
//! The initial centroids are picked at evenly spaced indices of the samples instead of randomly,
//! so the same samples and arguments always give the same palette.
//! This also holds with the `threads` feature enabled.

#![deny(unsafe_code)]
#![warn(clippy::pedantic, clippy::cargo)]
#![warn(clippy::use_debug, clippy::dbg_macro, clippy::todo, clippy::unimplemented)]
#![warn(clippy::unwrap_used, clippy::unwrap_in_result)]
#![warn(clippy::unneeded_field_pattern, clippy::rest_pat_in_fully_bound_structs)]
#![warn(clippy::unnecessary_self_imports)]
#![warn(clippy::str_to_string, clippy::string_to_string, clippy::string_slice)]
#![warn(missing_docs, clippy::missing_docs_in_private_items, rustdoc::all)]
#![warn(clippy::float_cmp_const, clippy::lossy_float_literal)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::unreadable_literal)]

use palette::Srgb;

mod kmeans;
mod sampler;

pub use kmeans::{run, KmeansResult, DEFAULT_MAX_ITERATIONS};
pub use sampler::{sample_image, sample_pixels, DEFAULT_SAMPLE_STRIDE, OPACITY_THRESHOLD};

/// A single sampled pixel color with 8-bit channels
pub type SampledColor = Srgb<u8>;

/// A dominant color found by k-means along with the number of samples it represents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterResult {
	/// The centroid color rounded to the nearest integer per channel
	pub color: Srgb<u8>,
	/// The centroid color formatted as `#RRGGBB` with uppercase hex digits
	pub hex: String,
	/// The number of samples closest to this centroid
	pub count: usize,
}

impl ClusterResult {
	/// Create a [`ClusterResult`], computing its hex string
	#[must_use]
	pub fn new(color: Srgb<u8>, count: usize) -> Self {
		Self { color, hex: format!("#{color:X}"), count }
	}

	/// The share of `total` samples in this cluster, in the range `0.0..=100.0`.
	///
	/// Returns `0.0` if `total` is `0`.
	// Sample counts far below 2^52
	#[allow(clippy::cast_precision_loss)]
	#[must_use]
	pub fn percentage(&self, total: usize) -> f64 {
		if total == 0 {
			0.0
		} else {
			100.0 * self.count as f64 / total as f64
		}
	}
}

/// The total number of samples across all clusters
#[must_use]
pub fn total_count(clusters: &[ClusterResult]) -> usize {
	clusters.iter().map(|cluster| cluster.count).sum()
}

/// Runs k-means on the provided samples, returning the clusters sorted by descending count.
///
/// This is [`run`] without the iteration count.
/// See the crate documentation for information on each argument.
#[must_use]
pub fn quantize(samples: &[SampledColor], k: u8, max_iterations: u32) -> Vec<ClusterResult> {
	run(samples, k, max_iterations).clusters
}
