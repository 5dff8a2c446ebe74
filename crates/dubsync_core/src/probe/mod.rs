//! Media probing.
//!
//! Provides the `MediaProber` seam used to obtain `MediaInfo` for a file,
//! plus an implementation backed by `ffprobe -of json`.

mod ffprobe;

use std::path::{Path, PathBuf};

use crate::models::MediaInfo;

pub use ffprobe::{parse_ffprobe_json, FfprobeProber};

/// Errors that can occur while probing a file.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// Input file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// The probe tool could not be run or exited with an error.
    #[error("{tool} failed (exit code {exit_code}): {message}")]
    CommandFailed {
        tool: String,
        exit_code: i32,
        message: String,
    },

    /// The probe tool's output could not be parsed.
    #[error("Failed to parse probe output: {0}")]
    ParseFailed(#[from] serde_json::Error),

    /// The container reports no usable duration.
    #[error("No duration reported for '{0}'")]
    MissingDuration(PathBuf),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for probe results.
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Source of stream-level metadata for media files.
pub trait MediaProber: Send + Sync {
    /// Probe a file for its duration and audio streams.
    fn probe(&self, path: &Path) -> ProbeResult<MediaInfo>;
}
