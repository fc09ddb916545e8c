// THEORY:
// The delta module measures how much the scene is actually changing and
// condenses that into a single scalar, the adaptation pace. The pace is the
// one knob the ramp controller obeys: a static movie scene should drift the
// lights slowly, a cut-heavy music video should let them chase. Measuring
// change point-wise (same grid position, both frames) instead of comparing
// whole histograms makes the signal insensitive to camera noise that merely
// reshuffles weight between neighboring buckets.
//
// The window is prewarmed with one large sentinel delta so the very first
// cycles ramp at a sane speed instead of crawling out of an all-zero window.

use std::collections::VecDeque;

use crate::core_modules::color::hue_distance;
use crate::core_modules::hue_point::HuePoint;

/// Sentinel delta the window starts with.
const PREWARM_DELTA: f64 = 1e6;

/// Sliding window of frame deltas producing the adaptation pace.
pub struct DeltaTracker {
    window: VecDeque<f64>,
    capacity: usize,
    sum: f64,
    /// Scales the pace; higher means faster output adaptation.
    step_multiplier: f64,
    /// Sample pairs below this combined salience are ignored.
    min_weight: f64,
}

impl DeltaTracker {
    pub fn new(capacity: usize, step_multiplier: f64, min_weight: f64) -> Self {
        let mut window = VecDeque::with_capacity(capacity + 1);
        window.push_back(PREWARM_DELTA);
        Self {
            window,
            capacity: capacity.max(1),
            sum: PREWARM_DELTA,
            step_multiplier,
            min_weight,
        }
    }

    /// Mean circular hue distance across sample positions that are salient in
    /// both frames. Zero when there is no previous frame yet.
    pub fn frame_delta(&self, current: &[HuePoint], previous: &[HuePoint]) -> f64 {
        if previous.is_empty() {
            return 0.0;
        }
        debug_assert_eq!(current.len(), previous.len());
        let mut delta = 0.0;
        let mut valid_samples = 0usize;
        for (now, before) in current.iter().zip(previous) {
            let combined_weight = (now.weight * before.weight).sqrt();
            if combined_weight > self.min_weight {
                valid_samples += 1;
                delta += hue_distance(now.hue, before.hue) as f64;
            }
        }
        delta / valid_samples.max(1) as f64
    }

    /// Records a frame delta and returns the updated adaptation pace.
    pub fn record(&mut self, delta: f64) -> f64 {
        self.window.push_back(delta);
        self.sum += delta;
        if self.window.len() > self.capacity {
            if let Some(evicted) = self.window.pop_front() {
                self.sum -= evicted;
            }
        }
        self.pace()
    }

    /// The adaptation pace: windowed mean delta, scaled, and square-rooted to
    /// compress its dynamic range.
    pub fn pace(&self) -> f64 {
        (self.sum / self.capacity as f64 * self.step_multiplier).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn prewarm_keeps_early_ramps_moving() {
        let tracker = DeltaTracker::new(100, 100.0, 0.1);
        assert_abs_diff_eq!(tracker.pace(), (1e6_f64 / 100.0 * 100.0).sqrt(), epsilon = 1e-6);
    }

    #[test]
    fn sentinel_is_evicted_once_the_window_fills() {
        let mut tracker = DeltaTracker::new(4, 100.0, 0.1);
        for _ in 0..4 {
            tracker.record(0.0);
        }
        // Four real deltas push the prewarm value out.
        assert_abs_diff_eq!(tracker.pace(), 0.0, epsilon = 1e-9);

        tracker.record(0.04);
        assert_abs_diff_eq!(tracker.pace(), (0.04_f64 / 4.0 * 100.0).sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn delta_ignores_positions_dark_in_either_frame() {
        let tracker = DeltaTracker::new(4, 100.0, 0.1);
        let previous = vec![
            HuePoint { hue: 0.0, weight: 1.0 },
            HuePoint { hue: 0.0, weight: 0.0 },
        ];
        let current = vec![
            HuePoint { hue: 0.25, weight: 1.0 },
            HuePoint { hue: 0.5, weight: 1.0 },
        ];
        // Only the first position counts; the second is dark in the previous
        // frame, so its wild hue swing is noise.
        assert_abs_diff_eq!(tracker.frame_delta(&current, &previous), 0.25, epsilon = 1e-6);
    }

    #[test]
    fn no_previous_frame_means_no_delta() {
        let tracker = DeltaTracker::new(4, 100.0, 0.1);
        let current = vec![HuePoint { hue: 0.3, weight: 1.0 }];
        assert_eq!(tracker.frame_delta(&current, &[]), 0.0);
    }
}
