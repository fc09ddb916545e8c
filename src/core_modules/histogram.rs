// THEORY:
// The histogram module turns a frame's worth of weighted hue observations
// into a smooth density over the hue circle. Raw bucket counts are too spiky
// to cluster directly: a single vivid logo can dominate a frame, and two
// nearly identical hues can land in neighboring buckets and look like
// separate colors. Three transformations fix that:
//
// 1.  **Log compression with a weak-color boost**: bucket weights are scaled
//     so the peak maps to a fixed compressed height, boosted by a constant
//     before the log so rare hues stay visible, and clamped at zero so noise
//     below the boost threshold vanishes entirely.
// 2.  **Circular convolution**: every bucket receives contributions from its
//     neighbors, weighted by a quadratic falloff kernel that is precomputed
//     once. This welds near-identical hues into a single hill.
// 3.  **Square root + normalization**: a variance-stabilizing root, then
//     division by the maximum so downstream thresholds can be expressed in
//     [0, 1] regardless of scene brightness.
//
// A frame with no usable color signal (all-black, all-gray) has a zero
// maximum; the builder reports that as `None` instead of dividing by it.
// That outcome is an expected steady state, not an error.

use crate::core_modules::hue_point::HuePoint;

/// Default number of buckets partitioning the hue circle.
pub const DEFAULT_BUCKET_COUNT: usize = 512;

/// Builds smoothed, normalized hue histograms from per-frame sample lists.
pub struct HueHistogram {
    bucket_count: usize,
    /// Samples below this weight do not vote.
    min_weight: f64,
    /// Multiplier applied before log compression to keep weak hues visible.
    weak_color_boost: f64,
    /// Quadratic falloff kernel, indexed by bucket distance. Ends where the
    /// normalized distance reaches 1.
    falloff: Vec<f64>,
}

impl HueHistogram {
    /// `distance_multiplier` controls the kernel reach: 2.0 lets the whole
    /// circle influence a bucket, larger values narrow the kernel.
    pub fn new(
        bucket_count: usize,
        distance_multiplier: f64,
        weak_color_boost: f64,
        min_weight: f64,
    ) -> Self {
        let distance_divisor = bucket_count as f64 / distance_multiplier;
        let mut falloff = Vec::with_capacity(bucket_count / 2);
        for bucket_distance in 0..=bucket_count / 2 {
            let hue_distance = bucket_distance as f64 / distance_divisor;
            if hue_distance >= 1.0 {
                break;
            }
            let inverse = 1.0 - hue_distance;
            falloff.push(inverse * inverse);
        }
        Self {
            bucket_count,
            min_weight,
            weak_color_boost,
            falloff,
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    /// Accumulates raw bucket weights. The sum of the output equals the sum
    /// of the weights of all samples at or above the voting floor.
    pub fn raw_weights(&self, points: &[HuePoint]) -> Vec<f64> {
        let mut weights = vec![0.0; self.bucket_count];
        for point in points {
            if point.weight < self.min_weight {
                continue;
            }
            let bucket =
                ((point.hue as f64 * self.bucket_count as f64) as usize) % self.bucket_count;
            weights[bucket] += point.weight;
        }
        weights
    }

    fn compressed(&self, mut weights: Vec<f64>) -> Vec<f64> {
        let max = weights.iter().cloned().fold(0.0, f64::max);
        if max <= 0.0 {
            return weights;
        }
        let norm_factor = 2.0 / max * self.weak_color_boost;
        for weight in weights.iter_mut() {
            *weight = (*weight * norm_factor).log2().max(0.0);
        }
        weights
    }

    /// The smoothed bucket weights in [0, 1], with the peak bucket at exactly
    /// 1.0. `None` means the frame carried no usable color signal.
    pub fn smoothed_weights(&self, points: &[HuePoint]) -> Option<Vec<f64>> {
        let compressed = self.compressed(self.raw_weights(points));
        let n = self.bucket_count;
        let mut extended = vec![0.0; n];
        for (i, slot) in extended.iter_mut().enumerate() {
            let mut sum = compressed[i];
            for (bucket_distance, factor) in self.falloff.iter().enumerate().skip(1) {
                let left = (i + n - bucket_distance) % n;
                let right = (i + bucket_distance) % n;
                sum += (compressed[left] + compressed[right]) * factor;
            }
            *slot = sum.sqrt();
        }
        let max = extended.iter().cloned().fold(0.0, f64::max);
        if !(max > 0.0) {
            return None;
        }
        for weight in extended.iter_mut() {
            *weight /= max;
        }
        Some(extended)
    }
}

/// Rolling element-wise average over the last N smoothed histograms.
///
/// Per-bucket sums are maintained incrementally on push, so the average is a
/// single division per bucket rather than a pass over the whole ring.
pub struct BucketBuffer {
    frames: Vec<Vec<f64>>,
    sums: Vec<f64>,
    fill: usize,
    index: usize,
}

impl BucketBuffer {
    pub fn new(capacity: usize, bucket_count: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: vec![vec![0.0; bucket_count]; capacity],
            sums: vec![0.0; bucket_count],
            fill: 0,
            index: 0,
        }
    }

    pub fn push(&mut self, weights: Vec<f64>) {
        debug_assert_eq!(weights.len(), self.sums.len());
        let evicted = std::mem::replace(&mut self.frames[self.index], weights);
        let inserted = &self.frames[self.index];
        for ((sum, new), old) in self.sums.iter_mut().zip(inserted).zip(&evicted) {
            *sum += new - old;
        }
        self.index = (self.index + 1) % self.frames.len();
        self.fill = (self.fill + 1).min(self.frames.len());
    }

    pub fn average(&self) -> Vec<f64> {
        let divisor = self.fill.max(1) as f64;
        self.sums.iter().map(|sum| sum / divisor).collect()
    }
}
