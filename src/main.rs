use std::fs::File;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use fs2::FileExt;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use hueflow::capture::{FrameSource, TestPatternSource, spawn_capture};
use hueflow::error::StartupError;
use hueflow::midi::MidiSink;
use hueflow::pipeline::EngineConfig;
use hueflow::runtime;

#[derive(Parser)]
#[command(name = "hueflow")]
#[command(about = "Tracks the dominant hues of a video source and drives MIDI RGB fixtures")]
struct Cli {
    /// Number of output color channels
    #[arg(long, default_value_t = 2)]
    colors: usize,

    /// MIDI output port name (substring match)
    #[arg(long, default_value = "Komplete Audio 6")]
    midi_device: String,

    /// Analysis round period in milliseconds
    #[arg(long, default_value_t = 10)]
    analysis_period_ms: u64,

    /// Ramp/actuation round period in milliseconds
    #[arg(long, default_value_t = 10)]
    ramp_period_ms: u64,

    /// Minimum perceptual weight for a sample to vote
    #[arg(long, default_value_t = 0.1)]
    min_weight: f64,

    /// Share of histogram mass the cluster extraction must cover
    #[arg(long, default_value_t = 0.8)]
    target_weight: f64,

    /// Boost for weakly represented hues
    #[arg(long, default_value_t = 8.0)]
    weak_color_boost: f64,

    /// Horizontal sample grid resolution
    #[arg(long, default_value_t = 64)]
    grid_columns: u32,

    /// Vertical sample grid resolution
    #[arg(long, default_value_t = 36)]
    grid_rows: u32,

    /// Frame source width in pixels
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Frame source height in pixels
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Lock file preventing a second instance
    #[arg(long, default_value = "hueflow.lock")]
    lock_file: PathBuf,
}

impl Cli {
    fn into_config(self) -> EngineConfig {
        EngineConfig {
            channel_count: self.colors,
            grid_columns: self.grid_columns,
            grid_rows: self.grid_rows,
            analysis_period: Duration::from_millis(self.analysis_period_ms),
            ramp_period: Duration::from_millis(self.ramp_period_ms),
            min_weight: self.min_weight,
            target_weight_fraction: self.target_weight,
            weak_color_boost: self.weak_color_boost,
            midi_device: self.midi_device,
            lock_path: self.lock_file,
            ..EngineConfig::default()
        }
    }
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(err) = run(Cli::parse()).await {
        error!("{err:#}");
        let code = err
            .downcast_ref::<StartupError>()
            .map_or(1, StartupError::exit_code);
        process::exit(code);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let (width, height) = (cli.width, cli.height);
    let config = cli.into_config();
    config.validate()?;

    // Held for the whole process lifetime; dropping it would release the lock.
    let _lock = acquire_instance_lock(&config.lock_path)?;

    if width == 0 || height == 0 {
        return Err(StartupError::FrameSource(format!(
            "frame dimensions {width}x{height} are unusable"
        ))
        .into());
    }
    let source = TestPatternSource::new(width, height);
    let (source_width, source_height) = source.dimensions();
    info!(source_width, source_height, "frame source ready");

    let frame_rx = spawn_capture(source, config.analysis_period);
    let midi = MidiSink::connect(&config.midi_device);
    let handles = runtime::spawn(config, frame_rx, midi);

    // The loops run for the process lifetime; shutdown is plain termination.
    let _ = handles.analysis.await;
    let _ = handles.ramp.await;
    Ok(())
}

fn acquire_instance_lock(path: &Path) -> anyhow::Result<File> {
    let file = File::create(path)
        .with_context(|| format!("cannot create lock file {}", path.display()))?;
    file.try_lock_exclusive()
        .map_err(|_| StartupError::AlreadyRunning(path.to_path_buf()))?;
    Ok(file)
}
