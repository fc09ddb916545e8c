// THEORY:
// The cluster module carves a small number of dominant hue arcs out of a
// smoothed histogram. It is deliberately not a general clustering algorithm:
// the histogram is one-dimensional and circular, the cluster count is tiny
// and fixed, and temporal stability matters more than partition purity. A
// greedy slope walk fits those constraints:
//
// 1.  **Seeding**: the highest unblocked bucket starts a cluster (strict
//     maximum, ties to the lowest index, so extraction is deterministic).
// 2.  **Expansion**: both directions walk outward while the weights keep
//     descending. A bounded lookahead ("explore") absorbs small bumps on the
//     slope: a rise that falls back before reaching the local peak again is
//     part of the same hill, a rise that keeps going marks the start of an
//     independent cluster. Buckets owned by earlier clusters stop the walk,
//     which is what keeps clusters disjoint.
// 3.  **Inner borders**: the reported arc is tighter than the expansion
//     limits. Borders grow from the seed toward the heavier side until a
//     configured share of the cluster's weight is enclosed, which drops the
//     long thin tails of the hill and leaves a border pair that brackets the
//     perceptually relevant range.

use crate::core_modules::color::{Hue, norm_hue};

/// A contiguous circular arc of buckets carved out around one dominant peak.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketCluster {
    /// Total smoothed weight absorbed by the expansion walk.
    pub weight: f64,
    /// Left inner border as a hue in [0, 1).
    pub left_border: Hue,
    /// Right inner border as a hue in [0, 1). The arc may wrap through 0.
    pub right_border: Hue,
    /// Midpoint of the arc, measured along the arc from left to right.
    pub center: Hue,
}

impl BucketCluster {
    fn new(weight: f64, left_border: Hue, right_border: Hue) -> Self {
        let span = (right_border - left_border).rem_euclid(1.0);
        Self {
            weight,
            left_border,
            right_border,
            center: norm_hue(left_border + span / 2.0),
        }
    }
}

/// A dominant hue with its share of the total histogram mass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HueCluster {
    pub hue: Hue,
    pub weight: f64,
}

/// Result of one extraction pass over a smoothed histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterExtraction {
    /// Dominant hues, heaviest first. Empty means "no change"; the caller
    /// keeps whatever it was doing.
    pub clusters: Vec<HueCluster>,
    /// Share of the histogram mass collected into clusters.
    pub confidence: f64,
}

impl ClusterExtraction {
    fn empty() -> Self {
        Self {
            clusters: Vec::new(),
            confidence: 0.0,
        }
    }
}

/// Extracts up to one dominant hue cluster per output channel.
pub struct ClusterExtractor {
    channel_count: usize,
    /// Stop once this share of the histogram mass has been collected.
    target_weight_fraction: f64,
    /// Maximum tolerated rise while walking down a slope, as a fraction of
    /// the local peak.
    border_threshold: f64,
    /// Share of the cluster weight the inner borders must enclose.
    min_inner_weight: f64,
}

impl ClusterExtractor {
    pub fn new(
        channel_count: usize,
        target_weight_fraction: f64,
        border_threshold: f64,
        min_inner_weight: f64,
    ) -> Self {
        Self {
            channel_count,
            target_weight_fraction,
            border_threshold,
            min_inner_weight,
        }
    }

    /// Extracts dominant clusters from smoothed bucket weights.
    ///
    /// Stops at one cluster per channel, or once the target weight share is
    /// collected, or when no unblocked bucket remains. When fewer clusters
    /// than channels emerge, the dominant cluster's two borders become the
    /// output hues, so even a single-color scene yields two distinguishable
    /// channel targets.
    pub fn extract(&self, weights: &[f64]) -> ClusterExtraction {
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return ClusterExtraction::empty();
        }
        let target = total * self.target_weight_fraction;
        let mut blocked = vec![false; weights.len()];
        let mut arcs: Vec<BucketCluster> = Vec::new();
        let mut collected = 0.0;
        while collected < target && arcs.len() < self.channel_count {
            match self.carve(weights, &mut blocked) {
                Some(arc) => {
                    collected += arc.weight;
                    arcs.push(arc);
                }
                None => break,
            }
        }

        let clusters = if arcs.is_empty() {
            Vec::new()
        } else if arcs.len() < self.channel_count {
            let dominant = &arcs[0];
            let share = dominant.weight / total;
            vec![
                HueCluster {
                    hue: dominant.left_border,
                    weight: share,
                },
                HueCluster {
                    hue: dominant.right_border,
                    weight: share,
                },
            ]
        } else {
            arcs.iter()
                .map(|arc| HueCluster {
                    hue: arc.center,
                    weight: arc.weight / total,
                })
                .collect()
        };
        ClusterExtraction {
            clusters,
            confidence: collected / total,
        }
    }

    fn carve(&self, weights: &[f64], blocked: &mut [bool]) -> Option<BucketCluster> {
        let n = weights.len();
        let mut seed = None;
        let mut seed_weight = f64::NEG_INFINITY;
        for (i, &weight) in weights.iter().enumerate() {
            if !blocked[i] && weight > seed_weight {
                seed = Some(i);
                seed_weight = weight;
            }
        }
        let seed = seed?;
        blocked[seed] = true;

        let mut cluster_weight = seed_weight;
        let limit_left = self.expand(weights, blocked, seed, seed_weight, -1, &mut cluster_weight);
        let limit_right = self.expand(weights, blocked, seed, seed_weight, 1, &mut cluster_weight);

        // Grow the inner borders from the seed toward the heavier side until
        // enough of the cluster weight is enclosed.
        let min_weight = cluster_weight * self.min_inner_weight;
        let mut left = step(seed, -1, n);
        let mut right = step(seed, 1, n);
        let mut inner_weight = seed_weight;
        while inner_weight < min_weight {
            let left_open = left != limit_left;
            let right_open = right != limit_right;
            if left_open && (weights[left] >= weights[right] || !right_open) {
                inner_weight += weights[left];
                left = step(left, -1, n);
            } else if right_open && (weights[right] > weights[left] || !left_open) {
                inner_weight += weights[right];
                right = step(right, 1, n);
            } else {
                break;
            }
        }

        Some(BucketCluster::new(
            cluster_weight,
            left as f32 / n as f32,
            right as f32 / n as f32,
        ))
    }

    /// Walks outward from the seed in one direction, absorbing buckets into
    /// the cluster. Returns the limit: the index one past the last absorbed
    /// bucket.
    fn expand(
        &self,
        weights: &[f64],
        blocked: &mut [bool],
        seed: usize,
        seed_weight: f64,
        direction: isize,
        cluster_weight: &mut f64,
    ) -> usize {
        let n = weights.len();
        let mut last = seed;
        let mut previous = seed_weight;
        let mut pos = step(seed, direction, n);
        while weights[pos] < previous || self.explore(weights, pos, direction) {
            if blocked[pos] {
                break;
            }
            last = pos;
            *cluster_weight += weights[pos];
            blocked[pos] = true;
            previous = weights[pos];
            pos = step(pos, direction, n);
        }
        step(last, direction, n)
    }

    /// Looks ahead along a rise in the slope. Returns true when the rise
    /// falls back before reaching the local peak again (absorb it into the
    /// current cluster), false when it keeps climbing (it starts an
    /// independent cluster). The scan gives up after one full lap, which can
    /// only happen on a perfectly flat circle.
    fn explore(&self, weights: &[f64], start: usize, direction: isize) -> bool {
        let n = weights.len();
        let mut previous = weights[step(start, -direction, n)];
        let peak = previous / self.border_threshold;
        let mut pos = start;
        for _ in 0..n {
            let weight = weights[pos];
            if weight >= peak {
                return false;
            }
            if weight < previous {
                return true;
            }
            previous = weight;
            pos = step(pos, direction, n);
        }
        false
    }
}

fn step(index: usize, direction: isize, n: usize) -> usize {
    (index as isize + direction).rem_euclid(n as isize) as usize
}
