//! File probing using `ffprobe -show_format -show_streams -of json`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;

use super::{MediaProber, ProbeError, ProbeResult};
use crate::config::Settings;
use crate::models::{AudioStreamInfo, MediaInfo};

/// Top-level ffprobe JSON document.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    index: u32,
    codec_type: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default)]
    disposition: HashMap<String, i64>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Media prober backed by the `ffprobe` executable.
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
}

impl FfprobeProber {
    /// Create a prober using `ffprobe` from PATH.
    pub fn new() -> Self {
        Self {
            ffprobe_path: PathBuf::from("ffprobe"),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new().with_ffprobe_path(&settings.tools.ffprobe_path)
    }

    /// Set a custom path to the ffprobe executable.
    pub fn with_ffprobe_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffprobe_path = path.into();
        self
    }
}

impl Default for FfprobeProber {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaProber for FfprobeProber {
    fn probe(&self, path: &Path) -> ProbeResult<MediaInfo> {
        if !path.exists() {
            return Err(ProbeError::FileNotFound(path.to_path_buf()));
        }

        tracing::debug!("Probing file: {}", path.display());

        let output = Command::new(&self.ffprobe_path)
            .args(["-v", "error", "-show_format", "-show_streams", "-of", "json"])
            .arg(path)
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProbeError::CommandFailed {
                tool: "ffprobe".to_string(),
                exit_code: output.status.code().unwrap_or(-1),
                message: stderr.trim().to_string(),
            });
        }

        let json = String::from_utf8_lossy(&output.stdout);
        parse_ffprobe_json(&json, path)
    }
}

/// Parse ffprobe JSON output into `MediaInfo`.
///
/// The duration comes from the container, falling back to the longest
/// stream. Attached pictures (cover art) are not treated as video.
pub fn parse_ffprobe_json(json: &str, path: &Path) -> ProbeResult<MediaInfo> {
    let parsed: FfprobeOutput = serde_json::from_str(json)?;

    let container_secs = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(parse_seconds);

    let stream_secs = parsed
        .streams
        .iter()
        .filter_map(|s| s.duration.as_deref().and_then(parse_seconds))
        .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.max(d))));

    let duration_secs = container_secs
        .or(stream_secs)
        .ok_or_else(|| ProbeError::MissingDuration(path.to_path_buf()))?;

    let video_stream = parsed
        .streams
        .iter()
        .find(|s| {
            s.codec_type.as_deref() == Some("video")
                && s.disposition.get("attached_pic").copied().unwrap_or(0) == 0
        })
        .map(|s| s.index);

    let audio_streams: Vec<AudioStreamInfo> = parsed
        .streams
        .iter()
        .filter(|s| s.codec_type.as_deref() == Some("audio"))
        .map(|s| AudioStreamInfo {
            index: s.index,
            language_tag: s
                .tags
                .get("language")
                .filter(|l| !l.trim().is_empty())
                .map(|l| l.trim().to_lowercase()),
        })
        .collect();

    tracing::debug!(
        "Probed {}: {:.3}s, video={:?}, {} audio stream(s)",
        path.display(),
        duration_secs,
        video_stream,
        audio_streams.len()
    );

    Ok(MediaInfo {
        duration_ms: (duration_secs * 1000.0).round() as u64,
        video_stream,
        audio_streams,
    })
}

fn parse_seconds(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}
