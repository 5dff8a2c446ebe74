//! Core enums used throughout the crate.

use serde::{Deserialize, Serialize};

/// Which of the two input files a stream or track belongs to.
///
/// The reference file defines the timeline (offset 0). The additional file
/// carries the audio that gets shifted by the detected offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRole {
    Reference,
    Additional,
}

impl FileRole {
    /// Input slot of this file in the muxer command (`0` or `1`).
    pub fn input_slot(&self) -> usize {
        match self {
            FileRole::Reference => 0,
            FileRole::Additional => 1,
        }
    }
}

impl std::fmt::Display for FileRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileRole::Reference => write!(f, "reference"),
            FileRole::Additional => write!(f, "additional"),
        }
    }
}

/// Kind of stream addressed by a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Video,
    Audio,
}

impl StreamKind {
    /// FFmpeg stream specifier letter (`v` or `a`).
    pub fn specifier(&self) -> &'static str {
        match self {
            StreamKind::Video => "v",
            StreamKind::Audio => "a",
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamKind::Video => write!(f, "video"),
            StreamKind::Audio => write!(f, "audio"),
        }
    }
}

/// Perceptual hash algorithm used to fingerprint frames.
///
/// All variants produce a 64-bit hash at the default 8x8 hash size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// Average hash: each bit is a downsampled pixel compared against the mean.
    #[default]
    Mean,
    /// Difference hash: each bit compares neighbouring pixels.
    Gradient,
    /// Block hash: each bit compares a block median.
    Blockhash,
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashAlgorithm::Mean => write!(f, "mean"),
            HashAlgorithm::Gradient => write!(f, "gradient"),
            HashAlgorithm::Blockhash => write!(f, "blockhash"),
        }
    }
}

/// Direction of a scan through the additional file, relative to an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchDirection {
    /// Offsets decrease from 0.
    Backward,
    /// Offsets increase from 0.
    Forward,
}

impl SearchDirection {
    /// Sign applied to the step size (`-1` or `1`).
    pub fn sign(&self) -> i64 {
        match self {
            SearchDirection::Backward => -1,
            SearchDirection::Forward => 1,
        }
    }
}

impl std::fmt::Display for SearchDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchDirection::Backward => write!(f, "backward"),
            SearchDirection::Forward => write!(f, "forward"),
        }
    }
}

/// How the top-K candidates are reduced to one offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetSelectionMode {
    /// Rounded mean of the top-K offsets.
    #[default]
    TopKMean,
    /// Median of the top-K offsets (even counts average the middle pair).
    TopKMedian,
}

impl OffsetSelectionMode {
    /// Get the display name for this mode.
    pub fn name(&self) -> &'static str {
        match self {
            Self::TopKMean => "Top-K Mean",
            Self::TopKMedian => "Top-K Median",
        }
    }
}
