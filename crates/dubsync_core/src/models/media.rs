//! Media-related data structures (probed files, audio streams, selected tracks).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::enums::FileRole;

/// An audio stream as reported by the prober.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioStreamInfo {
    /// Absolute stream index within the container.
    pub index: u32,
    /// Language tag (e.g., "eng", "jpn"), if the container carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_tag: Option<String>,
}

impl AudioStreamInfo {
    /// Create a new audio stream entry.
    pub fn new(index: u32) -> Self {
        Self {
            index,
            language_tag: None,
        }
    }

    /// Set the language tag.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language_tag = Some(language.into());
        self
    }
}

/// Immutable snapshot of a probed media file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Container duration in milliseconds.
    pub duration_ms: u64,
    /// Absolute index of the first video stream, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_stream: Option<u32>,
    /// Audio streams in container order.
    #[serde(default)]
    pub audio_streams: Vec<AudioStreamInfo>,
}

impl MediaInfo {
    /// Create media info for a file with a video stream at index 0.
    pub fn new(duration_ms: u64, audio_streams: Vec<AudioStreamInfo>) -> Self {
        Self {
            duration_ms,
            video_stream: Some(0),
            audio_streams,
        }
    }

    /// Set the video stream index (`None` for audio-only files).
    pub fn with_video_stream(mut self, index: Option<u32>) -> Self {
        self.video_stream = index;
        self
    }

    /// Position of a stream among the audio streams (the `N` in `0:a:N`).
    ///
    /// Returns `None` if no audio stream has the given absolute index.
    pub fn audio_position(&self, stream_index: u32) -> Option<usize> {
        self.audio_streams
            .iter()
            .position(|s| s.index == stream_index)
    }

    /// Look up an audio stream by absolute index.
    pub fn audio_stream(&self, stream_index: u32) -> Option<&AudioStreamInfo> {
        self.audio_streams.iter().find(|s| s.index == stream_index)
    }
}

/// An audio track chosen by the user for the output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioTrack {
    /// File the track comes from.
    pub file_path: PathBuf,
    /// Absolute stream index within that file.
    pub stream_index: u32,
    /// Language code to write to the output (ISO 639-2).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_tag: Option<String>,
    /// Free-text title to write to the output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl AudioTrack {
    /// Create a track without language or title annotations.
    pub fn new(file_path: impl Into<PathBuf>, stream_index: u32) -> Self {
        Self {
            file_path: file_path.into(),
            stream_index,
            language_tag: None,
            title: None,
        }
    }

    /// Set the language code.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language_tag = Some(language.into());
        self
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Get a display string for this track.
    pub fn display_name(&self) -> String {
        let file_name = self
            .file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let lang = self.language_tag.as_deref().unwrap_or("und");
        let title_part = match self.title.as_deref() {
            Some(t) if !t.is_empty() => format!(" - {}", t),
            _ => String::new(),
        };
        format!("#{} ({}){} @ {}", self.stream_index, lang, title_part, file_name)
    }
}

/// Ordered set of audio tracks drawn from the reference and additional files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSelection {
    /// File that defines the timeline and supplies the video.
    pub reference: PathBuf,
    /// File whose audio is shifted by the detected offset.
    pub additional: PathBuf,
    /// Selected tracks in output order.
    pub tracks: Vec<AudioTrack>,
}

impl TrackSelection {
    /// Create an empty selection for a file pair.
    pub fn new(reference: impl Into<PathBuf>, additional: impl Into<PathBuf>) -> Self {
        Self {
            reference: reference.into(),
            additional: additional.into(),
            tracks: Vec::new(),
        }
    }

    /// Append a track (builder pattern).
    pub fn with_track(mut self, track: AudioTrack) -> Self {
        self.tracks.push(track);
        self
    }

    /// Which file a track belongs to, if either.
    ///
    /// When both paths are equal the track counts as a reference track.
    pub fn role_of(&self, track: &AudioTrack) -> Option<FileRole> {
        self.role_of_path(&track.file_path)
    }

    /// Which file a path refers to, if either.
    pub fn role_of_path(&self, path: &Path) -> Option<FileRole> {
        if path == self.reference {
            Some(FileRole::Reference)
        } else if path == self.additional {
            Some(FileRole::Additional)
        } else {
            None
        }
    }

    /// Selected tracks belonging to the given file, in selection order.
    pub fn tracks_for(&self, role: FileRole) -> impl Iterator<Item = &AudioTrack> {
        self.tracks
            .iter()
            .filter(move |t| self.role_of(t) == Some(role))
    }
}
