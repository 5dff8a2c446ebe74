//! Merge plan structures handed to the muxer.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::enums::{FileRole, StreamKind};

/// A filter-graph chain that produces one time-shifted audio stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterChain {
    /// Output pad label without brackets (e.g., "a0").
    pub label: String,
    /// Full chain expression including input and output pads
    /// (e.g., `[1:a:0]adelay=500|500[a0]`).
    pub expression: String,
}

/// One input stream routed to one output slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamMapping {
    /// Kind of stream.
    pub kind: StreamKind,
    /// File the stream is read from.
    pub source: FileRole,
    /// Absolute stream index within the source file.
    pub stream_index: u32,
    /// Position among streams of the same kind in the source (the `N` in `0:a:N`).
    pub input_position: usize,
    /// Output slot among streams of the same kind, sequential in mapping order.
    pub output_slot: usize,
    /// Filter chain feeding this output, if the stream is time-shifted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterChain>,
}

impl StreamMapping {
    /// Create a direct (unfiltered, stream-copied or re-encoded) mapping.
    pub fn direct(
        kind: StreamKind,
        source: FileRole,
        stream_index: u32,
        input_position: usize,
        output_slot: usize,
    ) -> Self {
        Self {
            kind,
            source,
            stream_index,
            input_position,
            output_slot,
            filter: None,
        }
    }

    /// Attach a filter chain.
    pub fn with_filter(mut self, filter: FilterChain) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Input stream specifier (e.g., "1:a:0").
    pub fn input_specifier(&self) -> String {
        format!(
            "{}:{}:{}",
            self.source.input_slot(),
            self.kind.specifier(),
            self.input_position
        )
    }

    /// Argument for the muxer's `-map` option.
    ///
    /// Filtered streams map their output pad, others map the input stream.
    pub fn map_target(&self) -> String {
        match &self.filter {
            Some(filter) => format!("[{}]", filter.label),
            None => self.input_specifier(),
        }
    }
}

/// A metadata key/value pair for one audio output slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataAssignment {
    /// Audio output slot the value applies to.
    pub output_slot: usize,
    /// Metadata key (e.g., "language", "title").
    pub key: String,
    /// Metadata value.
    pub value: String,
}

impl MetadataAssignment {
    /// Create a new metadata assignment.
    pub fn new(output_slot: usize, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            output_slot,
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Complete, muxer-agnostic description of the output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergePlan {
    /// Input files in slot order (reference first, additional second).
    pub inputs: Vec<PathBuf>,
    /// Stream mappings in output order.
    pub mappings: Vec<StreamMapping>,
    /// Semicolon-joined filter graph, present only if any stream is filtered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_graph: Option<String>,
    /// Per-output-slot metadata.
    #[serde(default)]
    pub metadata: Vec<MetadataAssignment>,
    /// End the output with the shortest input stream.
    #[serde(default)]
    pub bounded_by_shortest: bool,
    /// Offset the additional audio was shifted by, in milliseconds.
    #[serde(default)]
    pub offset_ms: i64,
}

impl MergePlan {
    /// Create an empty plan for a file pair.
    pub fn new(reference: impl Into<PathBuf>, additional: impl Into<PathBuf>) -> Self {
        Self {
            inputs: vec![reference.into(), additional.into()],
            mappings: Vec::new(),
            filter_graph: None,
            metadata: Vec::new(),
            bounded_by_shortest: false,
            offset_ms: 0,
        }
    }

    /// Mappings of the given kind, in output order.
    pub fn mappings_of(&self, kind: StreamKind) -> impl Iterator<Item = &StreamMapping> {
        self.mappings.iter().filter(move |m| m.kind == kind)
    }

    /// Number of filtered (time-shifted) mappings.
    pub fn filtered_count(&self) -> usize {
        self.mappings.iter().filter(|m| m.filter.is_some()).count()
    }
}
