//! Frame access and comparison.
//!
//! # Components
//!
//! - **hash**: 64-bit perceptual hashes and the similarity score between them
//! - **extractor**: the `FrameExtractor` seam and an FFmpeg subprocess backend
//! - **error**: frame-level failures, which callers absorb per sample

mod error;
mod extractor;
mod hash;

pub use error::{FrameError, FrameResult};
pub use extractor::{format_timestamp, FfmpegExtractor, FrameExtractor};
pub use hash::{similarity, FrameHasher, PerceptualHash, HASH_BITS};
