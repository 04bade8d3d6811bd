//! Provides the implementation for k-means over sampled sRGB colors

use crate::{ClusterResult, SampledColor};
use palette::Srgb;
use std::cmp::Reverse;

/// The default maximum number of k-means iterations
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// k-means stops once no centroid moves farther than this during an update
const CONVERGENCE_THRESHOLD: f64 = 1.0;

/// A running mean color with channels on the `0.0..=255.0` scale
#[derive(Debug, Clone, Copy, PartialEq)]
struct Centroid {
	/// Red channel
	r: f64,
	/// Green channel
	g: f64,
	/// Blue channel
	b: f64,
}

impl Centroid {
	/// The zero vector, used as the starting value of a sum
	const ZERO: Self = Self { r: 0.0, g: 0.0, b: 0.0 };

	/// Create a [`Centroid`] with the same channel values as a sample
	fn from_sample(color: SampledColor) -> Self {
		Self {
			r: f64::from(color.red),
			g: f64::from(color.green),
			b: f64::from(color.blue),
		}
	}

	/// Euclidean distance in RGB space
	fn distance(self, other: Self) -> f64 {
		let dr = self.r - other.r;
		let dg = self.g - other.g;
		let db = self.b - other.b;
		(dr * dr + dg * dg + db * db).sqrt()
	}

	/// Round each channel to the nearest integer
	// channels are means of u8 values, so they already lie within 0.0..=255.0
	#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
	fn round(self) -> Srgb<u8> {
		Srgb::new(
			self.r.round().clamp(0.0, 255.0) as u8,
			self.g.round().clamp(0.0, 255.0) as u8,
			self.b.round().clamp(0.0, 255.0) as u8,
		)
	}
}

/// Data for each center/centroid
struct CenterData {
	/// The centroid point
	centroid: Vec<Centroid>,
	/// Vector sum for all samples in this center
	sum: Vec<Centroid>,
	/// Number of samples in this center
	count: Vec<usize>,
}

impl CenterData {
	/// Create a [`CenterData`] for the given starting centroids
	fn new(centroid: Vec<Centroid>) -> Self {
		let k = centroid.len();
		Self {
			centroid,
			sum: vec![Centroid::ZERO; k],
			count: vec![0; k],
		}
	}

	/// Clear the sums and counts before the next accumulation
	fn reset(&mut self) {
		self.sum.fill(Centroid::ZERO);
		self.count.fill(0);
	}
}

/// Result from running k-means
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KmeansResult {
	/// The non-empty clusters sorted by descending count
	pub clusters: Vec<ClusterResult>,
	/// Number of elapsed iterations
	pub iterations: u32,
}

impl KmeansResult {
	/// Create an empty result, representing that k-means could not be run
	const fn empty() -> Self {
		Self { clusters: Vec::new(), iterations: 0 }
	}
}

/// Pick `k` starting centroids at evenly spaced indices of `samples`.
///
/// `samples` must not be empty and `k` must be positive.
fn seed_centroids(samples: &[SampledColor], k: u8) -> Vec<Centroid> {
	let n = samples.len();
	let step = n / usize::from(k);
	(0..usize::from(k))
		.map(|i| Centroid::from_sample(samples[usize::min(i * step, n - 1)]))
		.collect()
}

/// Find the index of the closest centroid, preferring the lowest index on ties
// k <= u8::MAX
#[allow(clippy::cast_possible_truncation)]
fn nearest_centroid(color: SampledColor, centroids: &[Centroid]) -> u8 {
	let color = Centroid::from_sample(color);

	let mut min_dist = f64::INFINITY;
	let mut min_center = 0;
	for (i, &centroid) in centroids.iter().enumerate() {
		let dist = color.distance(centroid);
		if dist < min_dist {
			min_dist = dist;
			min_center = i as u8;
		}
	}

	min_center
}

/// For each sample, assign its closest center
#[cfg(not(feature = "threads"))]
fn update_assignments(samples: &[SampledColor], centroids: &[Centroid], assignment: &mut [u8]) {
	for (center, &color) in assignment.iter_mut().zip(samples) {
		*center = nearest_centroid(color, centroids);
	}
}

/// For each sample, assign its closest center
#[cfg(feature = "threads")]
fn update_assignments(samples: &[SampledColor], centroids: &[Centroid], assignment: &mut [u8]) {
	use rayon::prelude::*;

	let min_len = usize::max(1, samples.len() / rayon::current_num_threads());
	assignment
		.par_iter_mut()
		.with_min_len(min_len)
		.zip(samples)
		.for_each(|(center, &color)| *center = nearest_centroid(color, centroids));
}

/// Recompute each non-empty center's centroid as the mean of its samples.
///
/// Returns the largest distance any centroid moved.
fn update_centroids(samples: &[SampledColor], assignment: &[u8], centers: &mut CenterData) -> f64 {
	centers.reset();

	for (&color, &center) in samples.iter().zip(assignment) {
		let i = usize::from(center);
		let sum = &mut centers.sum[i];
		sum.r += f64::from(color.red);
		sum.g += f64::from(color.green);
		sum.b += f64::from(color.blue);
		centers.count[i] += 1;
	}

	let mut max_delta = 0.0;
	for ((centroid, &n), sum) in centers.centroid.iter_mut().zip(&centers.count).zip(&centers.sum) {
		// Empty centers keep their previous centroid
		if n == 0 {
			continue;
		}

		// Sample counts far below 2^52
		#[allow(clippy::cast_precision_loss)]
		let n = n as f64;
		let new_centroid = Centroid { r: sum.r / n, g: sum.g / n, b: sum.b / n };

		max_delta = f64::max(max_delta, centroid.distance(new_centroid));
		*centroid = new_centroid;
	}

	max_delta
}

/// Run k-means on `samples`, returning the non-empty clusters sorted by descending count.
///
/// An empty result is returned if `samples` is empty or `k` = 0.
/// If `k` is greater than the number of samples, the surplus clusters stay empty and are left out.
///
/// See the crate documentation for information on each argument.
#[must_use]
pub fn run(samples: &[SampledColor], k: u8, max_iterations: u32) -> KmeansResult {
	if k == 0 || samples.is_empty() {
		return KmeansResult::empty();
	}

	let mut centers = CenterData::new(seed_centroids(samples, k));
	let mut assignment = vec![0; samples.len()];

	let mut iterations = 0;
	while iterations < max_iterations {
		update_assignments(samples, &centers.centroid, &mut assignment);
		let max_delta = update_centroids(samples, &assignment, &mut centers);
		iterations += 1;

		if max_delta <= CONVERGENCE_THRESHOLD {
			break;
		}
	}

	// Counts come from a fresh assignment so that they always match the final centroids
	update_assignments(samples, &centers.centroid, &mut assignment);
	let mut counts = vec![0; centers.centroid.len()];
	for &center in &assignment {
		counts[usize::from(center)] += 1;
	}

	let mut clusters = centers
		.centroid
		.iter()
		.zip(counts)
		.filter(|&(_, count)| count > 0)
		.map(|(centroid, count)| ClusterResult::new(centroid.round(), count))
		.collect::<Vec<_>>();

	clusters.sort_by_key(|cluster| Reverse(cluster.count));

	KmeansResult { clusters, iterations }
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{quantize, total_count};
	use approx::assert_relative_eq;
	use rand::{Rng, SeedableRng};
	use rand_xoshiro::Xoshiro256PlusPlus;

	fn random_samples(n: usize, seed: u64) -> Vec<SampledColor> {
		let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
		(0..n).map(|_| Srgb::new(rng.gen(), rng.gen(), rng.gen())).collect()
	}

	fn red_blue_samples() -> Vec<SampledColor> {
		let mut samples = vec![Srgb::new(255, 0, 0); 100];
		samples.extend([Srgb::new(0, 0, 255); 10]);
		samples
	}

	fn is_hex_code(hex: &str) -> bool {
		hex.len() == 7
			&& hex.starts_with('#')
			&& hex.chars().skip(1).all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
	}

	#[test]
	fn seed_centroids_are_evenly_spaced() {
		let samples = (0..10).map(|i| Srgb::new(i, 0, 0)).collect::<Vec<_>>();
		let seeds = seed_centroids(&samples, 3);
		let reds = seeds.iter().map(|c| c.r).collect::<Vec<_>>();
		assert_eq!(reds, vec![0.0, 3.0, 6.0]);
	}

	#[test]
	fn seed_centroids_k_greater_than_n() {
		let samples = vec![Srgb::new(1, 2, 3), Srgb::new(4, 5, 6)];
		let seeds = seed_centroids(&samples, 5);

		// step is 0, so every seed is the first sample
		assert_eq!(seeds.len(), 5);
		assert!(seeds.iter().all(|&c| c == Centroid::from_sample(samples[0])));
	}

	#[test]
	fn nearest_centroid_prefers_lowest_index_on_ties() {
		let centroids = vec![
			Centroid { r: 0.0, g: 0.0, b: 0.0 },
			Centroid { r: 20.0, g: 0.0, b: 0.0 },
			Centroid { r: 20.0, g: 0.0, b: 0.0 },
		];

		assert_eq!(nearest_centroid(Srgb::new(10, 0, 0), &centroids), 0);
		assert_eq!(nearest_centroid(Srgb::new(15, 0, 0), &centroids), 1);
	}

	#[test]
	fn update_centroids_keeps_empty_centers() {
		let samples = vec![Srgb::new(10, 10, 10), Srgb::new(20, 20, 20)];
		let untouched = Centroid { r: 200.0, g: 100.0, b: 50.0 };
		let mut centers = CenterData::new(vec![Centroid { r: 0.0, g: 0.0, b: 0.0 }, untouched]);

		let max_delta = update_centroids(&samples, &[0, 0], &mut centers);

		assert_eq!(centers.centroid[0], Centroid { r: 15.0, g: 15.0, b: 15.0 });
		assert_eq!(centers.centroid[1], untouched);
		assert_eq!(centers.count, vec![2, 0]);
		assert_relative_eq!(max_delta, (3.0 * 15.0 * 15.0_f64).sqrt());
	}

	#[test]
	fn empty_samples_give_empty_result() {
		for k in [0, 1, 5, u8::MAX] {
			assert_eq!(run(&[], k, DEFAULT_MAX_ITERATIONS), KmeansResult::empty());
		}
	}

	#[test]
	fn zero_k_gives_empty_result() {
		assert!(run(&random_samples(10, 0), 0, DEFAULT_MAX_ITERATIONS).clusters.is_empty());
	}

	#[test]
	fn red_and_blue_are_separated() {
		let result = run(&red_blue_samples(), 2, DEFAULT_MAX_ITERATIONS);

		assert_eq!(result.clusters.len(), 2);
		assert_eq!(result.clusters[0], ClusterResult::new(Srgb::new(255, 0, 0), 100));
		assert_eq!(result.clusters[1], ClusterResult::new(Srgb::new(0, 0, 255), 10));
		assert!(result.iterations < DEFAULT_MAX_ITERATIONS);
	}

	#[test]
	fn identical_samples_give_that_color() {
		let color = Srgb::new(10, 20, 30);
		let samples = vec![color; 50];

		for k in [1, 2, 7, 20] {
			let clusters = quantize(&samples, k, DEFAULT_MAX_ITERATIONS);
			assert!(clusters.iter().all(|cluster| cluster.color == color));
			assert_eq!(total_count(&clusters), samples.len());
		}
	}

	#[test]
	fn k_greater_than_n_omits_empty_clusters() {
		let samples = vec![Srgb::new(0, 0, 0), Srgb::new(255, 255, 255), Srgb::new(0, 255, 0)];
		let clusters = quantize(&samples, 20, DEFAULT_MAX_ITERATIONS);

		assert!(clusters.len() <= samples.len());
		assert!(clusters.iter().all(|cluster| cluster.count > 0));
		assert_eq!(total_count(&clusters), samples.len());
	}

	#[test]
	fn counts_sum_to_number_of_samples() {
		for (seed, n) in [(0, 1), (1, 17), (2, 500), (3, 2000)] {
			let samples = random_samples(n, seed);
			for k in [1, 2, 5, 16, 20] {
				assert_eq!(total_count(&quantize(&samples, k, DEFAULT_MAX_ITERATIONS)), n);
			}
		}
	}

	#[test]
	fn clusters_are_sorted_by_descending_count() {
		let samples = random_samples(1000, 42);
		for k in [2, 8, 20] {
			let clusters = quantize(&samples, k, DEFAULT_MAX_ITERATIONS);
			for pair in clusters.windows(2) {
				assert!(pair[0].count >= pair[1].count);
			}
		}
	}

	#[test]
	fn hex_codes_are_well_formed() {
		let clusters = quantize(&random_samples(300, 7), 12, DEFAULT_MAX_ITERATIONS);
		assert!(!clusters.is_empty());
		for cluster in &clusters {
			assert!(is_hex_code(&cluster.hex), "{}", cluster.hex);
		}
	}

	#[test]
	fn same_input_gives_same_output() {
		let samples = random_samples(800, 9);
		assert_eq!(run(&samples, 10, 32), run(&samples, 10, 32));
	}

	#[test]
	fn reclustering_output_is_stable() {
		let groups = [(240, 30, 30), (30, 200, 40), (20, 40, 220), (245, 245, 245)];
		let samples = groups
			.iter()
			.flat_map(|&(r, g, b)| (0..25).map(move |i: u8| Srgb::new(r, g + i % 5, b)))
			.collect::<Vec<_>>();

		let first = quantize(&samples, 4, DEFAULT_MAX_ITERATIONS);
		assert_eq!(first.len(), 4);
		let colors = first.iter().map(|cluster| cluster.color).collect::<Vec<_>>();

		let second = run(&colors, 4, DEFAULT_MAX_ITERATIONS);

		assert_eq!(second.iterations, 1);
		let mut expected = first.iter().map(|cluster| cluster.hex.clone()).collect::<Vec<_>>();
		let mut actual = second.clusters.iter().map(|cluster| cluster.hex.clone()).collect::<Vec<_>>();
		expected.sort();
		actual.sort();
		assert_eq!(expected, actual);
	}

	#[test]
	fn max_iterations_reached() {
		let samples = random_samples(2000, 3);

		let converged = run(&samples, 8, 256);
		assert!(converged.iterations < 256);
		assert!(converged.iterations > 1);

		let max_iterations = converged.iterations - 1;
		let result = run(&samples, 8, max_iterations);
		assert_eq!(result.iterations, max_iterations);
		assert_eq!(total_count(&result.clusters), samples.len());
	}

	#[test]
	fn move_of_exactly_one_is_converged() {
		// The single centroid moves from (0, 0, 0) to (1, 0, 0)
		let result = run(&[Srgb::new(0, 0, 0), Srgb::new(2, 0, 0)], 1, DEFAULT_MAX_ITERATIONS);
		assert_eq!(result.iterations, 1);
		assert_eq!(result.clusters, vec![ClusterResult::new(Srgb::new(1, 0, 0), 2)]);
	}

	#[test]
	fn move_above_one_needs_another_iteration() {
		// The single centroid moves from (0, 0, 0) to (2, 0, 0), then stays put
		let result = run(&[Srgb::new(0, 0, 0), Srgb::new(4, 0, 0)], 1, DEFAULT_MAX_ITERATIONS);
		assert_eq!(result.iterations, 2);
		assert_eq!(result.clusters, vec![ClusterResult::new(Srgb::new(2, 0, 0), 2)]);
	}

	#[test]
	fn zero_iterations_counts_seed_clusters() {
		let result = run(&red_blue_samples(), 2, 0);

		assert_eq!(result.iterations, 0);
		// Both seeds are red, so every sample goes to the first one
		assert_eq!(result.clusters, vec![ClusterResult::new(Srgb::new(255, 0, 0), 110)]);
	}
}
