//! Merge plan builder.
//!
//! Turns a track selection, the resolved offset and both probe results into
//! a `MergePlan`. Pure: identical inputs always give identical plans.
//!
//! Output audio slots are numbered sequentially in mapping order: reference
//! tracks first, then additional tracks, each group in selection order.
//! Metadata is keyed by the same slot numbers.

use std::path::PathBuf;

use crate::config::MergeSettings;
use crate::models::{
    AudioTrack, FileRole, FilterChain, MediaInfo, MergePlan, MetadataAssignment, StreamKind,
    StreamMapping, TrackSelection,
};

/// Error types for merge plan building and muxing.
#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    /// A selected track cannot be resolved against the probed files.
    #[error("Cannot map track {track}: {reason}")]
    UnmappableTrack { track: String, reason: String },

    /// The reference file has no video stream to copy.
    #[error("Reference file '{0}' has no video stream")]
    MissingVideo(PathBuf),

    /// The muxer exited unsuccessfully.
    #[error("Muxer failed (exit code {exit_code:?}): {message}")]
    MuxFailed {
        exit_code: Option<i32>,
        message: String,
    },

    /// The muxer could not be started.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for mux results.
pub type MuxResult<T> = Result<T, MuxError>;

/// Runtime options for building and rendering a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConfig {
    /// Codec for the reference video ("copy" keeps it bit-exact).
    pub video_codec: String,
    /// Codec for audio outputs.
    pub audio_codec: String,
    /// Bound the output by the shortest input stream.
    pub shortest: bool,
    /// Language written when neither the track nor the probe has one.
    pub default_language: String,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            video_codec: "copy".to_string(),
            audio_codec: "aac".to_string(),
            shortest: true,
            default_language: "und".to_string(),
        }
    }
}

impl From<&MergeSettings> for MergeConfig {
    fn from(settings: &MergeSettings) -> Self {
        Self {
            video_codec: settings.video_codec.clone(),
            audio_codec: settings.audio_codec.clone(),
            shortest: settings.shortest,
            default_language: settings.default_language.clone(),
        }
    }
}

/// Input data for building a merge plan.
pub struct MergePlanInput<'a> {
    /// Tracks to include, with the reference/additional file pair.
    pub selection: &'a TrackSelection,
    /// Probe result of the reference file.
    pub reference_info: &'a MediaInfo,
    /// Probe result of the additional file.
    pub additional_info: &'a MediaInfo,
    /// Resolved offset of the additional file in milliseconds.
    pub offset_ms: i64,
    /// Plan options.
    pub config: &'a MergeConfig,
}

/// Build a MergePlan from the selection and offset.
pub fn build_merge_plan(input: MergePlanInput) -> MuxResult<MergePlan> {
    let selection = input.selection;
    let mut plan = MergePlan::new(&selection.reference, &selection.additional);
    plan.offset_ms = input.offset_ms;
    plan.bounded_by_shortest = input.config.shortest;

    // Reject tracks from neither file before mapping anything.
    if let Some(foreign) = selection.tracks.iter().find(|t| selection.role_of(t).is_none()) {
        return Err(MuxError::UnmappableTrack {
            track: foreign.display_name(),
            reason: "file is neither the reference nor the additional input".to_string(),
        });
    }

    let video_index = input
        .reference_info
        .video_stream
        .ok_or_else(|| MuxError::MissingVideo(selection.reference.clone()))?;
    plan.mappings.push(StreamMapping::direct(
        StreamKind::Video,
        FileRole::Reference,
        video_index,
        0,
        0,
    ));

    let mut filters = Vec::new();
    let mut slot = 0usize;

    for role in [FileRole::Reference, FileRole::Additional] {
        let info = match role {
            FileRole::Reference => input.reference_info,
            FileRole::Additional => input.additional_info,
        };

        for track in selection.tracks_for(role) {
            let position = info.audio_position(track.stream_index).ok_or_else(|| {
                MuxError::UnmappableTrack {
                    track: track.display_name(),
                    reason: format!(
                        "stream {} is not an audio stream of {}",
                        track.stream_index, role
                    ),
                }
            })?;

            let mut mapping =
                StreamMapping::direct(StreamKind::Audio, role, track.stream_index, position, slot);
            if role == FileRole::Additional {
                if let Some(filter) = shift_filter(&mapping, input.offset_ms) {
                    filters.push(filter.expression.clone());
                    mapping = mapping.with_filter(filter);
                }
            }

            plan.metadata
                .extend(track_metadata(track, info, slot, &input.config.default_language));
            plan.mappings.push(mapping);
            slot += 1;
        }
    }

    if !filters.is_empty() {
        plan.filter_graph = Some(filters.join(";"));
    }

    tracing::debug!(
        "Built merge plan: {} audio output(s), {} shifted, offset {:+}ms",
        slot,
        plan.filtered_count(),
        input.offset_ms
    );
    Ok(plan)
}

/// Filter chain that shifts one additional-file stream by `offset_ms`.
///
/// Positive offsets delay every channel, negative offsets trim the start
/// and reset timestamps. Zero needs no filter.
fn shift_filter(mapping: &StreamMapping, offset_ms: i64) -> Option<FilterChain> {
    let label = format!("a{}", mapping.output_slot);
    let input = mapping.input_specifier();

    let body = match offset_ms {
        0 => return None,
        o if o > 0 => format!("adelay={o}|{o}"),
        o => {
            let trim = o.unsigned_abs();
            format!(
                "atrim=start={}.{:03},asetpts=PTS-STARTPTS",
                trim / 1000,
                trim % 1000
            )
        }
    };

    Some(FilterChain {
        expression: format!("[{}]{}[{}]", input, body, label),
        label,
    })
}

/// Language (always) and title (when set) for one output slot.
fn track_metadata(
    track: &AudioTrack,
    info: &MediaInfo,
    slot: usize,
    default_language: &str,
) -> Vec<MetadataAssignment> {
    let language = track
        .language_tag
        .as_deref()
        .filter(|l| !l.is_empty())
        .or_else(|| {
            info.audio_stream(track.stream_index)
                .and_then(|s| s.language_tag.as_deref())
        })
        .unwrap_or(default_language);

    let mut metadata = vec![MetadataAssignment::new(slot, "language", language)];
    if let Some(title) = track.title.as_deref().filter(|t| !t.is_empty()) {
        metadata.push(MetadataAssignment::new(slot, "title", title));
    }
    metadata
}
