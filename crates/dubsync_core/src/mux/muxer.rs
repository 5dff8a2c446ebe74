//! Muxer seam and the ffmpeg implementation.

use std::path::{Path, PathBuf};
use std::process::Command;

use super::ffmpeg_args::{format_tokens_pretty, FfmpegArgsBuilder};
use super::plan_builder::{MergeConfig, MuxError, MuxResult};
use crate::config::Settings;
use crate::models::MergePlan;

/// Lines of stderr kept in a `MuxFailed` error.
const STDERR_TAIL_LINES: usize = 20;

/// Executes a merge plan.
pub trait Muxer: Send + Sync {
    /// Write `output_path` according to `plan`.
    fn mux(&self, plan: &MergePlan, output_path: &Path) -> MuxResult<()>;
}

/// Muxes by running ffmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegMuxer {
    ffmpeg_path: PathBuf,
    config: MergeConfig,
    show_command_pretty: bool,
}

impl FfmpegMuxer {
    pub fn new(config: MergeConfig) -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            config,
            show_command_pretty: false,
        }
    }

    /// Build a muxer from application settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(MergeConfig::from(&settings.merge))
            .with_ffmpeg_path(&settings.tools.ffmpeg_path)
            .with_pretty_command(settings.logging.show_command_pretty)
    }

    /// Set a custom ffmpeg binary.
    pub fn with_ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = path.into();
        self
    }

    /// Log the command one option per line.
    pub fn with_pretty_command(mut self, pretty: bool) -> Self {
        self.show_command_pretty = pretty;
        self
    }

    /// Arguments that `mux` would pass to ffmpeg.
    pub fn command_args(&self, plan: &MergePlan, output_path: &Path) -> Vec<String> {
        FfmpegArgsBuilder::new(plan, &self.config, output_path).build()
    }
}

impl Muxer for FfmpegMuxer {
    fn mux(&self, plan: &MergePlan, output_path: &Path) -> MuxResult<()> {
        let args = self.command_args(plan, output_path);

        if self.show_command_pretty {
            tracing::info!(
                "Running {}:\n{}",
                self.ffmpeg_path.display(),
                format_tokens_pretty(&args)
            );
        } else {
            tracing::info!("Running {} {}", self.ffmpeg_path.display(), args.join(" "));
        }

        let output = Command::new(&self.ffmpeg_path).args(&args).output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lines: Vec<&str> = stderr.lines().collect();
            let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
            tracing::error!("ffmpeg exited with {:?}", output.status.code());
            return Err(MuxError::MuxFailed {
                exit_code: output.status.code(),
                message: tail,
            });
        }

        tracing::info!("Wrote '{}'", output_path.display());
        Ok(())
    }
}
