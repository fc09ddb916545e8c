// THEORY:
// The `pipeline` module is the per-frame brain of the engine. It owns every
// analysis-side component and runs them in sequence over one frame: sample a
// sparse grid of pixels, turn them into weighted hue observations, measure
// how much the scene moved, build and smooth the hue histogram, carve out the
// dominant clusters, and match them onto the output channels. The runtime
// layer only ever calls `analyze` and publishes the outcome; everything
// stateful about the analysis (reference frame, delta window, histogram ring,
// assignment continuity) lives in here.
//
// The outcome is deliberately a three-way enum rather than a list that may be
// empty. "This frame has no usable color" and "this frame is identical to
// the last one" are distinct steady states with different downstream
// behavior, and collapsing them into an empty target list is how output
// flicker sneaks in.

use std::path::PathBuf;
use std::time::Duration;

use image::RgbaImage;

use crate::core_modules::assignment::{AssignedTarget, ChannelAssigner};
use crate::core_modules::cluster::ClusterExtractor;
use crate::core_modules::color::{Hue, Rgb};
use crate::core_modules::delta::DeltaTracker;
use crate::core_modules::histogram::{BucketBuffer, DEFAULT_BUCKET_COUNT, HueHistogram};
use crate::core_modules::hue_point::HuePoint;
use crate::error::StartupError;

/// Configuration for the whole engine. Every constant the analysis and ramp
/// loops consume is a field here; nothing downstream hard-codes a tunable.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of output color channels driven on the fixture.
    pub channel_count: usize,
    /// Number of buckets partitioning the hue circle.
    pub bucket_count: usize,
    /// Horizontal sample grid resolution.
    pub grid_columns: u32,
    /// Vertical sample grid resolution.
    pub grid_rows: u32,
    /// Analysis round period.
    pub analysis_period: Duration,
    /// Ramp/actuation round period.
    pub ramp_period: Duration,
    /// Minimum perceptual weight for a sample to vote.
    pub min_weight: f64,
    /// Share of histogram mass the cluster extractor must collect.
    pub target_weight_fraction: f64,
    /// Maximum tolerated rise while walking down a cluster slope.
    pub border_threshold: f64,
    /// Share of cluster weight the inner borders must enclose.
    pub min_inner_weight: f64,
    /// Boost applied to weakly represented hues before log compression.
    pub weak_color_boost: f64,
    /// Kernel reach around the hue circle; larger narrows the kernel.
    pub distance_multiplier: f64,
    /// Scales the adaptation pace; higher tracks scene changes faster.
    pub step_multiplier: f64,
    /// Minimum per-tick ramp step.
    pub min_step: f64,
    /// How many smoothed histograms the temporal average spans.
    pub histogram_average_frames: usize,
    /// Time span of the frame-delta window.
    pub delta_window: Duration,
    /// Weight of the assigner's last-assigned-hue tie-breaker.
    pub continuity_bias: f64,
    /// Constant added to every assignment cost before weight attenuation.
    pub base_cost: f64,
    /// Substring identifying the MIDI output port.
    pub midi_device: String,
    /// Advisory lock file guarding against a second running instance.
    pub lock_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            channel_count: 2,
            bucket_count: DEFAULT_BUCKET_COUNT,
            grid_columns: 64,
            grid_rows: 36,
            analysis_period: Duration::from_millis(10),
            ramp_period: Duration::from_millis(10),
            min_weight: 0.1,
            target_weight_fraction: 0.8,
            border_threshold: 0.95,
            min_inner_weight: 0.7,
            weak_color_boost: 8.0,
            distance_multiplier: 16.0,
            step_multiplier: 100.0,
            min_step: 0.1,
            histogram_average_frames: 50,
            delta_window: Duration::from_secs(3),
            continuity_bias: 0.01,
            base_cost: 0.1,
            midi_device: "Komplete Audio 6".to_string(),
            lock_path: PathBuf::from("hueflow.lock"),
        }
    }
}

impl EngineConfig {
    /// Number of frame deltas the sliding window holds.
    pub fn delta_window_len(&self) -> usize {
        let period = self.analysis_period.as_millis().max(1);
        (self.delta_window.as_millis() / period).max(1) as usize
    }

    pub fn validate(&self) -> Result<(), StartupError> {
        if self.channel_count == 0 {
            return Err(StartupError::Config("channel_count must be at least 1".into()));
        }
        if self.bucket_count < 8 {
            return Err(StartupError::Config("bucket_count must be at least 8".into()));
        }
        if self.grid_columns < 2 || self.grid_rows < 2 {
            return Err(StartupError::Config(
                "sample grid must be at least 2x2".into(),
            ));
        }
        if self.analysis_period.is_zero() || self.ramp_period.is_zero() {
            return Err(StartupError::Config("round periods must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.target_weight_fraction)
            || !(0.0..=1.0).contains(&self.min_inner_weight)
        {
            return Err(StartupError::Config(
                "weight fractions must lie in [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

/// Outcome of analyzing one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Analysis {
    /// The frame carried no usable color signal. Keep everything as is.
    NoSignal,
    /// The frame is unchanged from the reference frame; previous targets
    /// stay valid, only the pace moves on.
    Unchanged { pace: f64 },
    /// Fresh assignment. `None` entries keep that channel's previous target.
    Retarget {
        pace: f64,
        targets: Vec<Option<AssignedTarget>>,
        /// Share of histogram mass the extracted clusters cover.
        confidence: f64,
    },
}

/// Owns the analysis-side state and processes one frame per round.
pub struct AnalysisPipeline {
    min_weight: f64,
    grid_columns: u32,
    grid_rows: u32,
    histogram: HueHistogram,
    bucket_buffer: BucketBuffer,
    extractor: ClusterExtractor,
    delta: DeltaTracker,
    assigner: ChannelAssigner,
    reference_points: Vec<HuePoint>,
}

impl AnalysisPipeline {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            min_weight: config.min_weight,
            grid_columns: config.grid_columns,
            grid_rows: config.grid_rows,
            histogram: HueHistogram::new(
                config.bucket_count,
                config.distance_multiplier,
                config.weak_color_boost,
                config.min_weight,
            ),
            bucket_buffer: BucketBuffer::new(config.histogram_average_frames, config.bucket_count),
            extractor: ClusterExtractor::new(
                config.channel_count,
                config.target_weight_fraction,
                config.border_threshold,
                config.min_inner_weight,
            ),
            delta: DeltaTracker::new(
                config.delta_window_len(),
                config.step_multiplier,
                config.min_weight,
            ),
            assigner: ChannelAssigner::new(
                config.channel_count,
                config.continuity_bias,
                config.base_cost,
            ),
            reference_points: Vec::new(),
        }
    }

    /// Runs the full analysis pass over one frame.
    ///
    /// `emitted_hues` are the hues the ramp side currently shows, one per
    /// channel; a slightly stale snapshot is expected and fine.
    pub fn analyze(&mut self, frame: &RgbaImage, emitted_hues: &[Hue]) -> Analysis {
        let points = self.sample_grid(frame);
        if !points.iter().any(|p| p.weight >= self.min_weight) {
            return Analysis::NoSignal;
        }

        let frame_delta = self.delta.frame_delta(&points, &self.reference_points);
        let pace = self.delta.record(frame_delta);
        let first_frame = self.reference_points.is_empty();
        if frame_delta == 0.0 && !first_frame {
            // Identical frame: replay the previous targets, skip the rest.
            return Analysis::Unchanged { pace };
        }
        self.reference_points = points.clone();

        let Some(smoothed) = self.histogram.smoothed_weights(&points) else {
            return Analysis::NoSignal;
        };
        self.bucket_buffer.push(smoothed);

        let extraction = self.extractor.extract(&self.bucket_buffer.average());
        if extraction.clusters.is_empty() {
            return Analysis::Unchanged { pace };
        }
        let targets = self.assigner.assign(&extraction.clusters, emitted_hues);
        Analysis::Retarget {
            pace,
            targets,
            confidence: extraction.confidence,
        }
    }

    /// Samples a sparse grid of pixels from the frame. Grid positions are
    /// stable across frames, which the point-wise delta relies on.
    fn sample_grid(&self, frame: &RgbaImage) -> Vec<HuePoint> {
        let (width, height) = frame.dimensions();
        let step_x = ((width - 1) / (self.grid_columns - 1).max(1)).max(1);
        let step_y = ((height - 1) / (self.grid_rows - 1).max(1)).max(1);
        let mut points = Vec::with_capacity((self.grid_columns * self.grid_rows) as usize);
        for column in 0..self.grid_columns {
            for row in 0..self.grid_rows {
                let x = (column * step_x).min(width - 1);
                let y = (row * step_y).min(height - 1);
                let pixel = frame.get_pixel(x, y);
                points.push(HuePoint::from_rgb(Rgb::new(pixel[0], pixel[1], pixel[2])));
            }
        }
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let mut config = EngineConfig::default();
        config.channel_count = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.target_weight_fraction = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn delta_window_len_covers_the_configured_span() {
        let config = EngineConfig {
            analysis_period: Duration::from_millis(10),
            delta_window: Duration::from_secs(3),
            ..EngineConfig::default()
        };
        assert_eq!(config.delta_window_len(), 300);
    }
}
