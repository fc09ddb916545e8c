use std::path::PathBuf;

use thiserror::Error;

/// Fatal startup conditions, each with its own process exit code.
///
/// Steady-state degradations (dark frames, fewer clusters than channels, an
/// absent MIDI device, a failed send) are ordinary values elsewhere in the
/// engine; only the conditions below abort the process, and none of them is
/// retried.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("another instance already holds the lock at {0}")]
    AlreadyRunning(PathBuf),

    #[error("frame source unavailable: {0}")]
    FrameSource(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl StartupError {
    pub fn exit_code(&self) -> i32 {
        match self {
            StartupError::AlreadyRunning(_) => 1,
            StartupError::FrameSource(_) => 2,
            StartupError::Config(_) => 3,
        }
    }
}
