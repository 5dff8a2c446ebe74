//! Offset detection between two encodes of the same visual content.
//!
//! Random probes into the reference file are matched against windows of
//! the additional file by perceptual hash similarity. The best matches
//! across all probes are reduced to one signed millisecond offset.

mod cancel;
mod detector;
mod pool;
pub mod search;
pub mod selection;
mod types;

pub use cancel::CancelHandle;
pub use detector::{DetectionConfig, OffsetDetector};
pub use pool::CandidatePool;
pub use search::{group_candidates, search_direction, ScanTarget, SearchParams};
pub use selection::{aggregate, get_selector, AggregationConfig, OffsetSelector};
pub use types::{
    Candidate, DetectionError, DetectionReport, DetectionResult, ProbeOutcome, ProbeSummary,
    ResolvedOffset, SampleOutcome,
};
