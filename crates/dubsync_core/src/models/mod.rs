//! Data models for dubsync.
//!
//! This module contains the data structures shared by detection and muxing:
//! - Enums for file roles, stream kinds, hash algorithms and search options
//! - Media structures (probed files, audio streams, selected tracks)
//! - Merge plan structures (stream mappings, filters, metadata)

mod enums;
mod media;
mod plan;

// Re-export all public types
pub use enums::{FileRole, HashAlgorithm, OffsetSelectionMode, SearchDirection, StreamKind};
pub use media::{AudioStreamInfo, AudioTrack, MediaInfo, TrackSelection};
pub use plan::{FilterChain, MergePlan, MetadataAssignment, StreamMapping};
