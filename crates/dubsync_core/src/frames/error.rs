//! Frame error types.

use std::path::PathBuf;

/// Errors that can occur while obtaining or hashing a single frame.
///
/// These never abort a detection run on their own: a failed sample is
/// skipped and a failed anchor abandons only its probe.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FrameError {
    /// The frame could not be obtained (bad seek, decode error, tool failure).
    #[error("Failed to extract frame at {time_ms}ms from '{path}': {message}")]
    ExtractionFailed {
        path: PathBuf,
        time_ms: i64,
        message: String,
    },

    /// Extraction did not finish within the configured timeout.
    #[error("Frame extraction at {time_ms}ms from '{path}' timed out after {timeout_ms}ms")]
    Timeout {
        path: PathBuf,
        time_ms: i64,
        timeout_ms: u64,
    },

    /// Image data could not be hashed.
    #[error("Invalid frame data: {0}")]
    InvalidFrame(String),
}

impl FrameError {
    /// Create an extraction failure.
    pub fn extraction(path: impl Into<PathBuf>, time_ms: i64, message: impl Into<String>) -> Self {
        Self::ExtractionFailed {
            path: path.into(),
            time_ms,
            message: message.into(),
        }
    }
}

/// Type alias for frame results.
pub type FrameResult<T> = Result<T, FrameError>;
