// THEORY:
// The ramp module is the output half of the engine: a bank of persistent
// channels, each holding the color it currently emits and the color it is
// heading toward. Targets jump whenever analysis reassigns them; emitted
// colors never jump. Every tick each channel moves every RGB component
// toward its target by at most one bounded step, clamped to the remaining
// distance, so convergence is monotone and the fixture never overshoots or
// oscillates around a target.
//
// The step bound is `max(pace, min_step) * weight`: the adaptation pace makes
// calm scenes drift and busy scenes chase, the floor keeps a channel from
// stalling entirely, and the cluster weight lets the dominant color of the
// scene move faster than a minor accent color.

use crate::core_modules::assignment::AssignedTarget;
use crate::core_modules::color::{FloatRgb, Hue, Rgb};
use crate::midi::MidiNote;

/// Target published by the analysis side for one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelTarget {
    /// Fully saturated target color derived from the assigned hue.
    pub color: Rgb,
    /// Assignment weight scaling this channel's ramp speed.
    pub weight: f64,
}

impl ChannelTarget {
    /// The stationary target channels start from: black with zero weight.
    pub fn idle() -> Self {
        Self {
            color: Rgb::BLACK,
            weight: 0.0,
        }
    }

    pub fn from_assignment(target: AssignedTarget) -> Self {
        Self {
            color: Rgb::from_hue(target.hue),
            weight: target.weight,
        }
    }
}

/// One persistent output slot.
#[derive(Debug, Clone)]
struct OutputChannel {
    current: FloatRgb,
    target: ChannelTarget,
}

/// The fixed bank of output channels, advanced once per ramp tick.
pub struct RampBank {
    channels: Vec<OutputChannel>,
    /// Minimum per-tick step, keeping channels alive when the pace collapses.
    min_step: f64,
}

impl RampBank {
    pub fn new(channel_count: usize, min_step: f64) -> Self {
        Self {
            channels: vec![
                OutputChannel {
                    current: FloatRgb::BLACK,
                    target: ChannelTarget::idle(),
                };
                channel_count
            ],
            min_step,
        }
    }

    /// Replaces every channel's target. Targets are absolute: the analysis
    /// side already resolved "keep the previous target" before publishing.
    pub fn retarget(&mut self, targets: &[ChannelTarget]) {
        debug_assert_eq!(targets.len(), self.channels.len());
        for (channel, target) in self.channels.iter_mut().zip(targets) {
            channel.target = *target;
        }
    }

    /// Moves every channel one bounded step toward its target.
    pub fn advance(&mut self, pace: f64) {
        for channel in &mut self.channels {
            let max_step = (pace.max(self.min_step) * channel.target.weight) as f32;
            let target = &channel.target.color;
            channel.current = FloatRgb {
                red: step_toward(channel.current.red, target.red as f32, max_step),
                green: step_toward(channel.current.green, target.green as f32, max_step),
                blue: step_toward(channel.current.blue, target.blue as f32, max_step),
            };
        }
    }

    /// The hues currently being emitted, fed back into channel assignment.
    pub fn emitted_hues(&self) -> Vec<Hue> {
        self.channels.iter().map(|c| c.current.hue()).collect()
    }

    pub fn emitted_colors(&self) -> Vec<FloatRgb> {
        self.channels.iter().map(|c| c.current).collect()
    }

    /// Encodes the bank for the fixture: three notes per channel (red, green,
    /// blue on notes 3i+1..3i+3), values halved from 0-255 into the 0-127
    /// note value range.
    pub fn midi_notes(&self) -> Vec<MidiNote> {
        let mut notes = Vec::with_capacity(self.channels.len() * 3);
        for (index, channel) in self.channels.iter().enumerate() {
            let base = (3 * index) as u8;
            notes.push(MidiNote::new(base + 1, (channel.current.red / 2.0) as u8));
            notes.push(MidiNote::new(base + 2, (channel.current.green / 2.0) as u8));
            notes.push(MidiNote::new(base + 3, (channel.current.blue / 2.0) as u8));
        }
        notes
    }
}

/// One clamped ramp step for a single component: moves toward the target by
/// at most `max_step` and never past it.
fn step_toward(current: f32, target: f32, max_step: f32) -> f32 {
    let diff = current - target;
    if diff > 0.0 {
        current - diff.min(max_step)
    } else {
        current - diff.max(-max_step)
    }
}
