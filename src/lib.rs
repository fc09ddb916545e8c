// THEORY:
// This file is the main entry point for the `hueflow` library crate. The
// public API is the pipeline (per-frame analysis), the runtime (the loops
// that pace it), and the two collaborator boundaries (frame capture and MIDI
// output). The `core_modules` hold the analytical machinery: hue extraction,
// histogram smoothing, cluster extraction, change tracking, channel
// assignment and output ramping. The binary in `main.rs` is a thin wiring
// layer over these pieces.

pub mod capture;
pub mod core_modules;
pub mod error;
pub mod midi;
pub mod pipeline;
pub mod runtime;
