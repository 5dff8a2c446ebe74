//! FFmpeg command options builder.
//!
//! Renders a `MergePlan` into ffmpeg command-line tokens. Video is copied
//! from the reference, shifted audio is taken from the filter graph pads,
//! and metadata is written per audio output slot.

use std::path::Path;

use super::plan_builder::MergeConfig;
use crate::models::{MergePlan, StreamKind};

/// Builder for ffmpeg command-line options.
///
/// Generates the argument list only; the program name is not included.
pub struct FfmpegArgsBuilder<'a> {
    plan: &'a MergePlan,
    config: &'a MergeConfig,
    output_path: &'a Path,
    overwrite: bool,
}

impl<'a> FfmpegArgsBuilder<'a> {
    /// Create a new options builder.
    pub fn new(plan: &'a MergePlan, config: &'a MergeConfig, output_path: &'a Path) -> Self {
        Self {
            plan,
            config,
            output_path,
            overwrite: true,
        }
    }

    /// Whether to pass `-y` (default true).
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Build the complete ffmpeg argument tokens.
    pub fn build(&self) -> Vec<String> {
        let mut tokens = Vec::new();

        if self.overwrite {
            tokens.push("-y".to_string());
        }
        tokens.push("-hide_banner".to_string());

        for input in &self.plan.inputs {
            tokens.push("-i".to_string());
            tokens.push(input.to_string_lossy().to_string());
        }

        if let Some(ref graph) = self.plan.filter_graph {
            tokens.push("-filter_complex".to_string());
            tokens.push(graph.clone());
        }

        for mapping in &self.plan.mappings {
            tokens.push("-map".to_string());
            tokens.push(mapping.map_target());
        }

        if self.plan.mappings_of(StreamKind::Video).next().is_some() {
            tokens.push("-c:v".to_string());
            tokens.push(self.config.video_codec.clone());
        }
        if self.plan.mappings_of(StreamKind::Audio).next().is_some() {
            tokens.push("-c:a".to_string());
            tokens.push(self.config.audio_codec.clone());
        }

        for meta in &self.plan.metadata {
            tokens.push(format!("-metadata:s:a:{}", meta.output_slot));
            tokens.push(format!("{}={}", meta.key, meta.value));
        }

        if self.plan.bounded_by_shortest {
            tokens.push("-shortest".to_string());
        }

        tokens.push(self.output_path.to_string_lossy().to_string());
        tokens
    }
}

/// Format tokens for readable log output, one option per line.
pub fn format_tokens_pretty(tokens: &[String]) -> String {
    let mut result = String::new();
    let mut i = 0;

    while i < tokens.len() {
        let token = &tokens[i];

        if token.starts_with('-') && i + 1 < tokens.len() && !tokens[i + 1].starts_with('-') {
            result.push_str(&format!("{} {} \\\n", token, quote_if_needed(&tokens[i + 1])));
            i += 2;
        } else {
            result.push_str(&format!("{} \\\n", quote_if_needed(token)));
            i += 1;
        }
    }

    result
}

fn quote_if_needed(token: &str) -> String {
    if token.contains([' ', ';', '|', '[']) {
        format!("'{}'", token)
    } else {
        token.to_string()
    }
}
