//! Settings struct with TOML-based sections.
//!
//! Each section maps to a TOML table and can be updated on its own.

use serde::{Deserialize, Serialize};

use crate::logging::LogLevel;
use crate::models::{HashAlgorithm, OffsetSelectionMode};

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Offset detection.
    #[serde(default)]
    pub detection: DetectionSettings,

    /// Merge plan and output encoding.
    #[serde(default)]
    pub merge: MergeSettings,

    /// External tool locations.
    #[serde(default)]
    pub tools: ToolSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Offset detection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSettings {
    /// Number of random probes per run.
    #[serde(default = "default_number_of_probes")]
    pub number_of_probes: u32,

    /// Frames sampled per second of scanned media.
    #[serde(default = "default_samples_per_second")]
    pub samples_per_second: u32,

    /// Window scanned on each side of an anchor, in seconds.
    #[serde(default = "default_search_area_seconds")]
    pub search_area_seconds: u32,

    /// Similarity (percent) at which a sample counts as a match.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Drop candidates below the threshold before top-K selection.
    #[serde(default)]
    pub enforce_similarity_threshold: bool,

    /// Number of best candidates the offset is computed from.
    #[serde(default = "default_top_k")]
    pub top_k: u32,

    /// Reduction applied to the top-K offsets.
    #[serde(default)]
    pub selection_mode: OffsetSelectionMode,

    /// Perceptual hash algorithm.
    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,

    /// Probe worker threads (0 = available parallelism).
    #[serde(default)]
    pub max_workers: u32,

    /// Per-frame extraction timeout in milliseconds.
    #[serde(default = "default_extraction_timeout_ms")]
    pub extraction_timeout_ms: u64,

    /// Fixed seed for reproducible probe placement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_number_of_probes() -> u32 {
    5
}

fn default_samples_per_second() -> u32 {
    10
}

fn default_search_area_seconds() -> u32 {
    10
}

fn default_similarity_threshold() -> f64 {
    95.0
}

fn default_top_k() -> u32 {
    10
}

fn default_extraction_timeout_ms() -> u64 {
    30_000
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            number_of_probes: default_number_of_probes(),
            samples_per_second: default_samples_per_second(),
            search_area_seconds: default_search_area_seconds(),
            similarity_threshold: default_similarity_threshold(),
            enforce_similarity_threshold: false,
            top_k: default_top_k(),
            selection_mode: OffsetSelectionMode::default(),
            hash_algorithm: HashAlgorithm::default(),
            max_workers: 0,
            extraction_timeout_ms: default_extraction_timeout_ms(),
            seed: None,
        }
    }
}

/// Merge output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSettings {
    /// Video codec ("copy" keeps the reference video untouched).
    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    /// Audio codec for every output audio stream.
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Stop at the end of the shortest stream.
    #[serde(default = "default_true")]
    pub shortest: bool,

    /// Language tag used when a track has none.
    #[serde(default = "default_language")]
    pub default_language: String,
}

fn default_video_codec() -> String {
    "copy".to_string()
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

fn default_language() -> String {
    "und".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            video_codec: default_video_codec(),
            audio_codec: default_audio_codec(),
            shortest: true,
            default_language: default_language(),
        }
    }
}

/// External tool paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSettings {
    /// ffmpeg binary, resolved through PATH when not absolute.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    /// ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe_path() -> String {
    "ffprobe".to_string()
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default level when RUST_LOG is unset.
    #[serde(default)]
    pub level: LogLevel,

    /// Log the ffmpeg mux command one option per line.
    #[serde(default)]
    pub show_command_pretty: bool,
}

/// Config sections for section-level updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSection {
    Detection,
    Merge,
    Tools,
    Logging,
}

impl ConfigSection {
    /// All sections, in file order.
    pub const ALL: [ConfigSection; 4] = [
        ConfigSection::Detection,
        ConfigSection::Merge,
        ConfigSection::Tools,
        ConfigSection::Logging,
    ];

    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Detection => "detection",
            ConfigSection::Merge => "merge",
            ConfigSection::Tools => "tools",
            ConfigSection::Logging => "logging",
        }
    }

    /// Comment written above the section.
    pub fn description(&self) -> &'static str {
        match self {
            ConfigSection::Detection => "Offset detection (probes, sampling, top-K selection)",
            ConfigSection::Merge => "Merge output encoding and metadata",
            ConfigSection::Tools => "External tool paths",
            ConfigSection::Logging => "Logging configuration",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_serializes() {
        let settings = Settings::default();
        let toml = toml::to_string_pretty(&settings).unwrap();
        assert!(toml.contains("[detection]"));
        assert!(toml.contains("[merge]"));
        assert!(toml.contains("number_of_probes = 5"));
        assert!(toml.contains("selection_mode = \"top_k_mean\""));
        assert!(!toml.contains("seed"));
    }

    #[test]
    fn settings_round_trip() {
        let mut settings = Settings::default();
        settings.detection.seed = Some(42);
        settings.logging.level = LogLevel::Debug;
        let toml = toml::to_string_pretty(&settings).unwrap();
        let parsed: Settings = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let minimal = "[detection]\nnumber_of_probes = 20\n\n[logging]\nlevel = \"warn\"";
        let parsed: Settings = toml::from_str(minimal).unwrap();
        assert_eq!(parsed.detection.number_of_probes, 20);
        assert_eq!(parsed.detection.top_k, 10);
        assert_eq!(parsed.detection.similarity_threshold, 95.0);
        assert_eq!(parsed.logging.level, LogLevel::Warn);
        assert_eq!(parsed.merge.audio_codec, "aac");
        assert_eq!(parsed.tools.ffprobe_path, "ffprobe");
    }

    #[test]
    fn table_names_match_fields() {
        let toml = toml::to_string_pretty(&Settings::default()).unwrap();
        for section in ConfigSection::ALL {
            assert!(toml.contains(&format!("[{}]", section.table_name())));
        }
    }
}
