//! dubsync core - backend logic for aligning a dub with a reference video.
//!
//! The crate finds the constant offset between two encodes of the same
//! visual content by comparing perceptual hashes of sampled frames, then
//! turns that offset and a set of selected audio tracks into a merge plan
//! for an external muxer. It has zero UI dependencies.

pub mod config;
pub mod detection;
pub mod frames;
pub mod logging;
pub mod models;
pub mod mux;
pub mod pipeline;
pub mod probe;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
