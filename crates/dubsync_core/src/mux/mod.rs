//! Muxing module.
//!
//! - **plan_builder**: builds a `MergePlan` from a track selection and offset
//! - **ffmpeg_args**: converts a `MergePlan` into ffmpeg command tokens
//! - **muxer**: runs the command

mod ffmpeg_args;
mod muxer;
mod plan_builder;

pub use ffmpeg_args::{format_tokens_pretty, FfmpegArgsBuilder};
pub use muxer::{FfmpegMuxer, Muxer};
pub use plan_builder::{build_merge_plan, MergeConfig, MergePlanInput, MuxError, MuxResult};
