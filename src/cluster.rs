//! Dominant color extraction with k-means clustering.
//!
//! Provides [`ColorExtractor`], which clusters the pixels of a [`RasterImage`]
//! in RGB space and reports the centroid of the most populated cluster as the
//! image's [`DominantColor`].
//!
//! # Algorithm
//!
//! Identical pixels are merged into weighted colors first, so each iteration
//! costs `O(distinct colors * k)` rather than `O(pixels * k)`. Every attempt:
//!
//! 1. Seeds `k` centroids from `k` distinct pixel positions drawn uniformly
//!    without replacement (pixels, not colors, so frequent colors are more
//!    likely to seed a centroid).
//! 2. Alternates assignment (nearest centroid, lower index wins ties) and
//!    update (weighted channel means) until the summed centroid movement drops
//!    below `epsilon` or `max_iterations` is reached.
//! 3. Re-seeds a cluster that lost all members with the color farthest from
//!    its own centroid, if any color is not already sitting on its centroid.
//!
//! Of all attempts, the one with the lowest compactness (sum of squared
//! distances of pixels to their centroid) is retained; earlier attempts win
//! ties.
//!
//! # Seeding
//!
//! Attempt `i` uses a `StdRng` seeded with `base_seed + i`. With a configured
//! seed the whole extraction is reproducible. Without one, a random base seed
//! is drawn and logged at debug level so a run can be replayed.

use std::collections::HashMap;
use std::fmt;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::raster::{RasterError, RasterImage};

/// Default number of clusters.
pub const DEFAULT_K: usize = 4;
/// Default iteration cap per attempt.
pub const DEFAULT_MAX_ITERATIONS: u32 = 100;
/// Default convergence threshold, in raw 0-255 channel units.
pub const DEFAULT_EPSILON: f64 = 0.2;
/// Default number of independent attempts.
pub const DEFAULT_ATTEMPTS: u32 = 10;

/// Errors raised while extracting a dominant color.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractError {
    /// The image is empty or its buffer does not match its dimensions.
    #[error("invalid image: {0}")]
    ImageInvalid(#[from] RasterError),

    /// More clusters were requested than there are pixels to seed them.
    #[error("cannot form {k} clusters from {pixels} pixels")]
    ClusteringFailed { k: usize, pixels: usize },

    /// Clustering parameters are outside their valid range.
    #[error("invalid clustering settings: {0}")]
    InvalidSettings(&'static str),
}

/// Tunable k-means parameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClusterSettings {
    /// Number of clusters, at least 1.
    pub k: usize,
    /// Absolute iteration cap per attempt.
    pub max_iterations: u32,
    /// Summed centroid movement below which an attempt has converged.
    pub epsilon: f64,
    /// Number of independently seeded attempts.
    pub attempts: u32,
    /// Base seed; `None` draws a fresh one per extraction.
    pub seed: Option<u64>,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            epsilon: DEFAULT_EPSILON,
            attempts: DEFAULT_ATTEMPTS,
            seed: None,
        }
    }
}

impl ClusterSettings {
    /// Checks that every parameter is usable.
    pub fn validate(&self) -> Result<(), ExtractError> {
        if self.k == 0 {
            return Err(ExtractError::InvalidSettings("k must be at least 1"));
        }
        if self.max_iterations == 0 {
            return Err(ExtractError::InvalidSettings(
                "max_iterations must be at least 1",
            ));
        }
        if self.attempts == 0 {
            return Err(ExtractError::InvalidSettings("attempts must be at least 1"));
        }
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(ExtractError::InvalidSettings(
                "epsilon must be a finite, non-negative number",
            ));
        }
        Ok(())
    }
}

/// A cluster of pixels sharing a centroid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorCluster {
    /// Channel means `[red, green, blue]` in 0-255 units.
    pub centroid: [f64; 3],
    /// Number of pixels assigned to this cluster.
    pub member_count: usize,
}

/// The representative color of an image.
///
/// Produced by [`ColorExtractor`] with every channel rounded into `0..=255`.
/// Channels are stored wide so that values arriving from elsewhere can be
/// range-checked by the mapper instead of silently wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DominantColor {
    pub red: i32,
    pub green: i32,
    pub blue: i32,
}

impl DominantColor {
    pub const fn new(red: i32, green: i32, blue: i32) -> Self {
        Self { red, green, blue }
    }

    /// Rounds a centroid to the nearest in-range integer color.
    pub fn from_centroid(centroid: [f64; 3]) -> Self {
        let channel = |value: f64| value.round().clamp(0.0, 255.0) as i32;
        Self::new(
            channel(centroid[0]),
            channel(centroid[1]),
            channel(centroid[2]),
        )
    }

    pub fn channels(&self) -> [i32; 3] {
        [self.red, self.green, self.blue]
    }
}

impl fmt::Display for DominantColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.red, self.green, self.blue)
    }
}

/// Outcome of the retained k-means attempt.
#[derive(Debug, Clone)]
pub struct Clustering {
    clusters: Vec<ColorCluster>,
    labels: Vec<usize>,
    compactness: f64,
    iterations: u32,
    seed: u64,
}

impl Clustering {
    /// Clusters in centroid index order.
    pub fn clusters(&self) -> &[ColorCluster] {
        &self.clusters
    }

    /// Cluster index for every pixel, in the image's pixel order.
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Sum of squared pixel-to-centroid distances.
    pub fn compactness(&self) -> f64 {
        self.compactness
    }

    /// Iterations the retained attempt ran for.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Seed of the retained attempt.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Index of the cluster with the most members; the lower index wins ties.
    pub fn dominant_index(&self) -> usize {
        let mut best = 0;
        for (index, cluster) in self.clusters.iter().enumerate().skip(1) {
            if cluster.member_count > self.clusters[best].member_count {
                best = index;
            }
        }
        best
    }

    /// Rounded centroid of the most populated cluster.
    pub fn dominant(&self) -> DominantColor {
        DominantColor::from_centroid(self.clusters[self.dominant_index()].centroid)
    }
}

/// Runs k-means over image pixels and picks the dominant cluster.
#[derive(Debug, Clone, Default)]
pub struct ColorExtractor {
    settings: ClusterSettings,
}

impl ColorExtractor {
    pub fn new(settings: ClusterSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ClusterSettings {
        &self.settings
    }

    /// Returns the dominant color of `image`.
    ///
    /// # Errors
    /// * `ClusteringFailed` - `k` exceeds the number of pixels
    /// * `InvalidSettings` - a clustering parameter is out of range
    pub fn extract(&self, image: &RasterImage) -> Result<DominantColor, ExtractError> {
        Ok(self.cluster(image)?.dominant())
    }

    /// Validates a packed RGB buffer and returns its dominant color.
    ///
    /// # Errors
    /// Additionally returns `ImageInvalid` when the buffer is empty or does
    /// not match `width * height`.
    pub fn extract_bytes(
        &self,
        width: u32,
        height: u32,
        bytes: &[u8],
    ) -> Result<DominantColor, ExtractError> {
        let image = RasterImage::from_rgb_bytes(width, height, bytes)?;
        self.extract(&image)
    }

    /// Runs every attempt and returns the most compact clustering.
    pub fn cluster(&self, image: &RasterImage) -> Result<Clustering, ExtractError> {
        self.settings.validate()?;

        let k = self.settings.k;
        let pixels = image.pixel_count();
        if k > pixels {
            return Err(ExtractError::ClusteringFailed { k, pixels });
        }

        let data = WeightedColors::from_image(image);
        let base_seed = self.settings.seed.unwrap_or_else(rand::random);
        debug!(
            k,
            pixels,
            distinct = data.colors.len(),
            base_seed,
            "clustering image"
        );

        let mut best: Option<Attempt> = None;
        for attempt in 0..self.settings.attempts {
            let seed = base_seed.wrapping_add(u64::from(attempt));
            let result = run_attempt(&data, &self.settings, seed);
            debug!(
                attempt,
                seed,
                iterations = result.iterations,
                compactness = result.compactness,
                "k-means attempt finished"
            );

            let improves = best
                .as_ref()
                .is_none_or(|current| result.compactness < current.compactness);
            if improves {
                best = Some(result);
            }
        }

        let best = best.ok_or(ExtractError::InvalidSettings("attempts must be at least 1"))?;
        Ok(best.into_clustering(&data))
    }
}

/// Convenience wrapper running [`ColorExtractor`] with default settings.
pub fn extract_dominant(
    image: &RasterImage,
    k: usize,
    seed: Option<u64>,
) -> Result<DominantColor, ExtractError> {
    ColorExtractor::new(ClusterSettings {
        k,
        seed,
        ..ClusterSettings::default()
    })
    .extract(image)
}

/// Deduplicated pixel colors with their multiplicities.
struct WeightedColors {
    colors: Vec<[f64; 3]>,
    counts: Vec<usize>,
    /// Index into `colors` for every pixel.
    pixel_colors: Vec<usize>,
}

impl WeightedColors {
    fn from_image(image: &RasterImage) -> Self {
        let mut index: HashMap<(u8, u8, u8), usize> = HashMap::new();
        let mut colors = Vec::new();
        let mut counts = Vec::new();
        let mut pixel_colors = Vec::with_capacity(image.pixel_count());

        for pixel in image.pixels() {
            let key = pixel.into_components();
            let slot = *index.entry(key).or_insert_with(|| {
                colors.push([f64::from(key.0), f64::from(key.1), f64::from(key.2)]);
                counts.push(0);
                colors.len() - 1
            });
            counts[slot] += 1;
            pixel_colors.push(slot);
        }

        Self {
            colors,
            counts,
            pixel_colors,
        }
    }
}

struct Attempt {
    centroids: Vec<[f64; 3]>,
    assignment: Vec<usize>,
    compactness: f64,
    iterations: u32,
    seed: u64,
}

impl Attempt {
    fn into_clustering(self, data: &WeightedColors) -> Clustering {
        let mut member_counts = vec![0usize; self.centroids.len()];
        for (slot, &cluster) in self.assignment.iter().enumerate() {
            member_counts[cluster] += data.counts[slot];
        }

        let clusters = self
            .centroids
            .iter()
            .zip(member_counts)
            .map(|(&centroid, member_count)| ColorCluster {
                centroid,
                member_count,
            })
            .collect();

        let labels = data
            .pixel_colors
            .iter()
            .map(|&slot| self.assignment[slot])
            .collect();

        Clustering {
            clusters,
            labels,
            compactness: self.compactness,
            iterations: self.iterations,
            seed: self.seed,
        }
    }
}

fn run_attempt(data: &WeightedColors, settings: &ClusterSettings, seed: u64) -> Attempt {
    let k = settings.k;
    let mut rng = StdRng::seed_from_u64(seed);

    let mut centroids: Vec<[f64; 3]> =
        rand::seq::index::sample(&mut rng, data.pixel_colors.len(), k)
            .iter()
            .map(|pixel| data.colors[data.pixel_colors[pixel]])
            .collect();

    let mut assignment = vec![0usize; data.colors.len()];
    let mut iterations = 0;

    loop {
        iterations += 1;

        for (slot, color) in data.colors.iter().enumerate() {
            assignment[slot] = nearest(&centroids, color);
        }

        let mut updated = weighted_means(data, &assignment, &centroids);
        reseed_empty(data, &assignment, &mut updated);

        let shift: f64 = centroids
            .iter()
            .zip(&updated)
            .map(|(old, (new, _))| distance_squared(old, new).sqrt())
            .sum();
        centroids = updated.into_iter().map(|(centroid, _)| centroid).collect();

        if shift < settings.epsilon || iterations >= settings.max_iterations {
            break;
        }
    }

    let compactness = data
        .colors
        .iter()
        .zip(&data.counts)
        .zip(&assignment)
        .map(|((color, &count), &cluster)| {
            count as f64 * distance_squared(color, &centroids[cluster])
        })
        .sum();

    Attempt {
        centroids,
        assignment,
        compactness,
        iterations,
        seed,
    }
}

/// Index of the closest centroid; the first one wins on equal distance.
fn nearest(centroids: &[[f64; 3]], color: &[f64; 3]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (index, centroid) in centroids.iter().enumerate() {
        let distance = distance_squared(color, centroid);
        if distance < best_distance {
            best = index;
            best_distance = distance;
        }
    }
    best
}

/// New centroid and total weight per cluster. Empty clusters keep their centroid.
fn weighted_means(
    data: &WeightedColors,
    assignment: &[usize],
    previous: &[[f64; 3]],
) -> Vec<([f64; 3], usize)> {
    let mut sums = vec![[0.0f64; 3]; previous.len()];
    let mut weights = vec![0usize; previous.len()];

    for ((color, &count), &cluster) in data.colors.iter().zip(&data.counts).zip(assignment) {
        let weight = count as f64;
        for channel in 0..3 {
            sums[cluster][channel] += color[channel] * weight;
        }
        weights[cluster] += count;
    }

    sums.into_iter()
        .zip(weights)
        .zip(previous)
        .map(|((sum, weight), &old)| {
            if weight == 0 {
                (old, 0)
            } else {
                let w = weight as f64;
                ([sum[0] / w, sum[1] / w, sum[2] / w], weight)
            }
        })
        .collect()
}

fn reseed_empty(data: &WeightedColors, assignment: &[usize], clusters: &mut [([f64; 3], usize)]) {
    if clusters.iter().all(|(_, weight)| *weight > 0) {
        return;
    }

    let mut spread: Vec<f64> = data
        .colors
        .iter()
        .zip(assignment)
        .map(|(color, &cluster)| distance_squared(color, &clusters[cluster].0))
        .collect();

    for cluster in 0..clusters.len() {
        if clusters[cluster].1 > 0 {
            continue;
        }

        let mut farthest: Option<usize> = None;
        for (slot, &distance) in spread.iter().enumerate() {
            if distance > 0.0 && farthest.is_none_or(|best| distance > spread[best]) {
                farthest = Some(slot);
            }
        }

        match farthest {
            Some(slot) => {
                clusters[cluster].0 = data.colors[slot];
                spread[slot] = 0.0;
            }
            None => break,
        }
    }
}

fn distance_squared(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    dr * dr + dg * dg + db * db
}
