//! Frame extraction seam and FFmpeg subprocess backend.

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use image::DynamicImage;

use super::error::{FrameError, FrameResult};
use crate::config::Settings;

/// Interval between child-process status polls while waiting for a frame.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Source of decoded frames at arbitrary timestamps.
///
/// Implementations must be safe to call from several worker threads at once.
pub trait FrameExtractor: Send + Sync {
    /// Decode the frame shown at `time_ms` in the file at `path`.
    fn extract_frame(&self, path: &Path, time_ms: i64) -> FrameResult<DynamicImage>;

    /// Get the backend name.
    fn backend_name(&self) -> &str;
}

/// FFmpeg subprocess-based frame extractor.
///
/// Seeks to the timestamp, pipes a single PNG frame to stdout and decodes
/// it with `image`. Each call spawns its own process, so calls can run
/// concurrently.
pub struct FfmpegExtractor {
    ffmpeg_path: PathBuf,
    timeout: Duration,
}

impl FfmpegExtractor {
    /// Create an extractor using `ffmpeg` from PATH.
    pub fn new(timeout: Duration) -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            timeout,
        }
    }

    /// Build an extractor from application settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(Duration::from_millis(settings.detection.extraction_timeout_ms))
            .with_ffmpeg_path(&settings.tools.ffmpeg_path)
    }

    /// Set a custom path to the ffmpeg executable.
    pub fn with_ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = path.into();
        self
    }

    /// Get the per-extraction timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Check if ffmpeg is available.
    pub fn is_available(&self) -> bool {
        Command::new(&self.ffmpeg_path)
            .arg("-version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn build_command(&self, path: &Path, time_ms: i64) -> Command {
        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.arg("-v")
            .arg("error")
            .arg("-ss")
            .arg(format_timestamp(time_ms))
            .arg("-i")
            .arg(path)
            .arg("-frames:v")
            .arg("1")
            .arg("-f")
            .arg("image2pipe")
            .arg("-vcodec")
            .arg("png")
            .arg("pipe:1");
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        cmd
    }
}

impl FrameExtractor for FfmpegExtractor {
    fn extract_frame(&self, path: &Path, time_ms: i64) -> FrameResult<DynamicImage> {
        if time_ms < 0 {
            return Err(FrameError::extraction(
                path,
                time_ms,
                "timestamp is before the start of the file",
            ));
        }

        let mut cmd = self.build_command(path, time_ms);
        tracing::trace!("Running FFmpeg: {:?}", cmd);

        let mut child = cmd.spawn().map_err(|e| {
            FrameError::extraction(path, time_ms, format!("Failed to spawn FFmpeg: {}", e))
        })?;

        let mut stdout = child.stdout.take().ok_or_else(|| {
            FrameError::extraction(path, time_ms, "Failed to capture FFmpeg stdout")
        })?;

        // Drain stdout on a separate thread so a large frame cannot block the child.
        let reader = thread::spawn(move || {
            let mut buffer = Vec::new();
            stdout.read_to_end(&mut buffer).map(|_| buffer)
        });

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = reader.join();
                    return Err(FrameError::Timeout {
                        path: path.to_path_buf(),
                        time_ms,
                        timeout_ms: self.timeout.as_millis() as u64,
                    });
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    let _ = child.kill();
                    let _ = reader.join();
                    return Err(FrameError::extraction(
                        path,
                        time_ms,
                        format!("Failed to wait for FFmpeg: {}", e),
                    ));
                }
            }
        };

        let data = reader
            .join()
            .map_err(|_| FrameError::extraction(path, time_ms, "FFmpeg reader thread panicked"))?
            .map_err(|e| {
                let message = format!("Failed to read FFmpeg output: {}", e);
                FrameError::extraction(path, time_ms, message)
            })?;

        if !status.success() {
            return Err(FrameError::extraction(
                path,
                time_ms,
                format!("FFmpeg exited with {}", status),
            ));
        }

        // Seeking past the end succeeds but writes nothing.
        if data.is_empty() {
            return Err(FrameError::extraction(
                path,
                time_ms,
                "FFmpeg produced no output",
            ));
        }

        image::load(Cursor::new(data), image::ImageFormat::Png).map_err(|e| {
            FrameError::extraction(path, time_ms, format!("Failed to decode PNG: {}", e))
        })
    }

    fn backend_name(&self) -> &str {
        "ffmpeg"
    }
}

/// Format a millisecond timestamp as `HH:MM:SS.mmm` for FFmpeg's `-ss`.
pub fn format_timestamp(time_ms: i64) -> String {
    let total = time_ms.max(0);
    let hours = total / 3_600_000;
    let minutes = (total % 3_600_000) / 60_000;
    let seconds = (total % 60_000) / 1000;
    let millis = total % 1000;
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
}
