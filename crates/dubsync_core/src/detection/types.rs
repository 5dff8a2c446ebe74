//! Core types for offset detection.

use serde::{Deserialize, Serialize};

use crate::frames::{FrameError, PerceptualHash};

/// One `(similarity, offset)` measurement taken around a probe anchor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Similarity of the sampled frame to the anchor frame, in [0, 100].
    pub similarity: f64,
    /// Signed offset from the anchor in milliseconds.
    pub offset_ms: i64,
}

impl Candidate {
    /// Create a new candidate.
    pub fn new(similarity: f64, offset_ms: i64) -> Self {
        Self {
            similarity,
            offset_ms,
        }
    }
}

/// Result of one sample within a directional scan.
#[derive(Debug, Clone)]
pub enum SampleOutcome {
    /// The frame was extracted and hashed.
    Hashed(Candidate),
    /// The frame could not be obtained or hashed; the sample is dropped.
    Skipped { offset_ms: i64, error: FrameError },
}

impl SampleOutcome {
    /// The candidate, if the sample succeeded.
    pub fn candidate(&self) -> Option<Candidate> {
        match self {
            SampleOutcome::Hashed(c) => Some(*c),
            SampleOutcome::Skipped { .. } => None,
        }
    }
}

/// Statistics for a probe that ran both directional scans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeSummary {
    /// Probe index (0-based, in anchor draw order).
    pub index: usize,
    /// Anchor timestamp in the reference file.
    pub anchor_ms: i64,
    /// Hash of the reference frame at the anchor.
    pub anchor_hash: PerceptualHash,
    /// Grouped candidates contributed to the pool.
    pub candidates: usize,
    /// Samples that were hashed successfully.
    pub samples_hashed: usize,
    /// Samples that were skipped after a frame error.
    pub samples_skipped: usize,
    /// Highest-similarity candidate of this probe.
    pub best: Option<Candidate>,
}

/// Outcome of one probe.
#[derive(Debug, Clone)]
pub enum ProbeOutcome {
    /// Both directions were scanned and the candidates were pooled.
    Completed(ProbeSummary),
    /// The anchor frame could not be obtained or hashed.
    Abandoned {
        index: usize,
        anchor_ms: i64,
        error: FrameError,
    },
    /// The run was cancelled before or during this probe; nothing was pooled.
    Cancelled { index: usize, anchor_ms: i64 },
}

impl ProbeOutcome {
    /// Probe index.
    pub fn index(&self) -> usize {
        match self {
            ProbeOutcome::Completed(s) => s.index,
            ProbeOutcome::Abandoned { index, .. } | ProbeOutcome::Cancelled { index, .. } => *index,
        }
    }

    /// Whether the probe contributed candidates.
    pub fn is_completed(&self) -> bool {
        matches!(self, ProbeOutcome::Completed(_))
    }
}

/// Final signed offset for the additional file, with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedOffset {
    /// Offset in whole milliseconds (rounded once, at the end).
    pub offset_ms: i64,
    /// Unrounded offset.
    pub raw_offset_ms: f64,
    /// Name of the selection method that produced the value.
    pub method: String,
    /// Candidates the value was computed from, best first.
    pub top_candidates: Vec<Candidate>,
}

impl ResolvedOffset {
    /// Create a resolved offset from a raw value.
    pub fn new(
        raw_offset_ms: f64,
        method: impl Into<String>,
        top_candidates: Vec<Candidate>,
    ) -> Self {
        Self {
            offset_ms: raw_offset_ms.round() as i64,
            raw_offset_ms,
            method: method.into(),
            top_candidates,
        }
    }

    /// A user-supplied offset that bypasses detection.
    pub fn from_millis(offset_ms: i64) -> Self {
        Self {
            offset_ms,
            raw_offset_ms: offset_ms as f64,
            method: "manual".to_string(),
            top_candidates: Vec::new(),
        }
    }
}

/// Everything a caller needs to display the outcome of a detection run.
#[derive(Debug, Clone)]
pub struct DetectionReport {
    /// The resolved offset.
    pub offset: ResolvedOffset,
    /// Per-probe outcomes in probe index order.
    pub probes: Vec<ProbeOutcome>,
    /// Total candidates in the pool before top-K selection.
    pub total_candidates: usize,
}

impl DetectionReport {
    /// Number of probes that contributed candidates.
    pub fn completed_probes(&self) -> usize {
        self.probes.iter().filter(|p| p.is_completed()).count()
    }

    /// Number of probes abandoned because the anchor frame failed.
    pub fn abandoned_probes(&self) -> usize {
        self.probes
            .iter()
            .filter(|p| matches!(p, ProbeOutcome::Abandoned { .. }))
            .count()
    }

    /// Total samples skipped across all completed probes.
    pub fn skipped_samples(&self) -> usize {
        self.probes
            .iter()
            .filter_map(|p| match p {
                ProbeOutcome::Completed(s) => Some(s.samples_skipped),
                _ => None,
            })
            .sum()
    }

    /// One-line human-readable summary.
    pub fn summary(&self) -> String {
        let offsets: Vec<String> = self
            .offset
            .top_candidates
            .iter()
            .map(|c| c.offset_ms.to_string())
            .collect();
        format!(
            "Out of {} probes ({} completed), {} offsets were recorded; {} gives {:+}ms ({})",
            self.probes.len(),
            self.completed_probes(),
            self.total_candidates,
            self.offset.method,
            self.offset.offset_ms,
            offsets.join(", ")
        )
    }
}

/// Error types for detection runs.
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    /// No usable candidates; the caller must not fall back to a default offset.
    #[error("Insufficient data to resolve an offset: {0}")]
    InsufficientData(String),

    /// The run was cancelled.
    #[error("Detection cancelled after {completed} completed probe(s)")]
    Cancelled { completed: usize },

    /// The reference file is too short to keep both scan windows in bounds.
    #[error("Reference duration {duration_ms}ms is too short; at least {required_ms}ms is needed")]
    DurationTooShort { duration_ms: u64, required_ms: u64 },

    /// Invalid detection configuration.
    #[error("Invalid detection config: {0}")]
    InvalidConfig(String),

    /// The worker pool could not be created.
    #[error("Failed to build worker pool: {0}")]
    WorkerPool(String),
}

/// Type alias for detection results.
pub type DetectionResult<T> = Result<T, DetectionError>;
