//! End-to-end merge job: probe both files, resolve the offset, build the
//! merge plan and hand it to the muxer.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::Settings;
use crate::detection::{
    CancelHandle, DetectionConfig, DetectionError, DetectionReport, OffsetDetector, ResolvedOffset,
};
use crate::frames::{FfmpegExtractor, FrameExtractor};
use crate::models::{MergePlan, TrackSelection};
use crate::mux::{build_merge_plan, FfmpegMuxer, MergeConfig, MergePlanInput, MuxError, Muxer};
use crate::probe::{FfprobeProber, MediaProber, ProbeError};

/// Error from one stage of a merge job.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Probe failed: {0}")]
    Probe(#[from] ProbeError),

    #[error("Offset detection failed: {0}")]
    Detection(#[from] DetectionError),

    #[error("Mux failed: {0}")]
    Mux(#[from] MuxError),
}

/// Result type for merge jobs.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// One merge request.
#[derive(Debug, Clone)]
pub struct MergeJob {
    /// Files and tracks to merge.
    pub selection: TrackSelection,
    /// File to write.
    pub output: PathBuf,
    /// Skip detection and use this offset.
    pub manual_offset_ms: Option<i64>,
}

impl MergeJob {
    pub fn new(selection: TrackSelection, output: impl Into<PathBuf>) -> Self {
        Self {
            selection,
            output: output.into(),
            manual_offset_ms: None,
        }
    }

    /// Use a fixed offset instead of detecting one.
    pub fn with_manual_offset(mut self, offset_ms: i64) -> Self {
        self.manual_offset_ms = Some(offset_ms);
        self
    }
}

/// What a merge job produced.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Offset applied to the additional file.
    pub offset: ResolvedOffset,
    /// Detection details, absent for manual offsets.
    pub report: Option<DetectionReport>,
    /// The plan handed to the muxer.
    pub plan: MergePlan,
}

/// Runs merge jobs against a prober, a frame extractor and a muxer.
pub struct MergePipeline<P: MediaProber, E: FrameExtractor, M: Muxer> {
    prober: P,
    detector: OffsetDetector<E>,
    muxer: M,
    merge_config: MergeConfig,
}

impl MergePipeline<FfprobeProber, FfmpegExtractor, FfmpegMuxer> {
    /// Build the ffmpeg-backed pipeline from application settings.
    pub fn from_settings(settings: &Settings) -> PipelineResult<Self> {
        Self::new(
            FfprobeProber::from_settings(settings),
            FfmpegExtractor::from_settings(settings),
            FfmpegMuxer::from_settings(settings),
            DetectionConfig::from(&settings.detection),
            MergeConfig::from(&settings.merge),
        )
    }
}

impl<P: MediaProber, E: FrameExtractor, M: Muxer> MergePipeline<P, E, M> {
    pub fn new(
        prober: P,
        extractor: E,
        muxer: M,
        detection: DetectionConfig,
        merge_config: MergeConfig,
    ) -> PipelineResult<Self> {
        Ok(Self {
            prober,
            detector: OffsetDetector::new(extractor, detection)?,
            muxer,
            merge_config,
        })
    }

    /// Handle that cancels a running detection.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.detector.cancel_handle()
    }

    /// Probe, resolve the offset and build the plan without muxing.
    pub fn plan(&self, job: &MergeJob) -> PipelineResult<MergeOutcome> {
        let selection = &job.selection;
        let reference_info = self.prober.probe(&selection.reference)?;
        let additional_info = self.prober.probe(&selection.additional)?;

        let (offset, report) = match job.manual_offset_ms {
            Some(offset_ms) => {
                tracing::info!("Using manual offset {:+}ms", offset_ms);
                (ResolvedOffset::from_millis(offset_ms), None)
            }
            None => {
                let report = self.detector.detect(
                    &selection.reference,
                    &reference_info,
                    &selection.additional,
                )?;
                (report.offset.clone(), Some(report))
            }
        };

        let plan = build_merge_plan(MergePlanInput {
            selection,
            reference_info: &reference_info,
            additional_info: &additional_info,
            offset_ms: offset.offset_ms,
            config: &self.merge_config,
        })?;

        Ok(MergeOutcome {
            offset,
            report,
            plan,
        })
    }

    /// Run the whole job, writing `job.output`.
    pub fn run(&self, job: &MergeJob) -> PipelineResult<MergeOutcome> {
        let outcome = self.plan(job)?;
        self.muxer.mux(&outcome.plan, &job.output)?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::{FrameError, FrameResult};
    use crate::models::{AudioStreamInfo, AudioTrack, MediaInfo};
    use crate::probe::ProbeResult;
    use image::{DynamicImage, GrayImage, Luma};
    use parking_lot::Mutex;
    use std::path::Path;

    struct FixedProber;

    impl MediaProber for FixedProber {
        fn probe(&self, path: &Path) -> ProbeResult<MediaInfo> {
            if path.ends_with("missing.mkv") {
                return Err(ProbeError::FileNotFound(path.to_path_buf()));
            }
            Ok(MediaInfo::new(
                60_000,
                vec![AudioStreamInfo::new(1).with_language("eng")],
            ))
        }
    }

    /// Every frame differs, keyed by its 100 ms slot; the dub runs 800 ms late.
    struct ShiftedExtractor;

    impl FrameExtractor for ShiftedExtractor {
        fn extract_frame(&self, path: &Path, time_ms: i64) -> FrameResult<DynamicImage> {
            let t = if path.ends_with("dub.mkv") {
                time_ms - 800
            } else {
                time_ms
            };
            if t < 0 || t >= 60_000 {
                return Err(FrameError::extraction(path, time_ms, "out of range"));
            }
            let slot = (t / 100) as u64;
            let bits = slot.wrapping_mul(0x9e37_79b9_7f4a_7c15).rotate_left(17);
            let img = GrayImage::from_fn(32, 32, |x, y| {
                let bit = (y / 4) * 8 + (x / 4);
                Luma([if bits >> bit & 1 == 1 { 255 } else { 0 }])
            });
            Ok(DynamicImage::ImageLuma8(img))
        }

        fn backend_name(&self) -> &str {
            "shifted"
        }
    }

    #[derive(Default)]
    struct RecordingMuxer {
        outputs: Mutex<Vec<PathBuf>>,
    }

    impl Muxer for RecordingMuxer {
        fn mux(&self, _plan: &MergePlan, output_path: &Path) -> crate::mux::MuxResult<()> {
            self.outputs.lock().push(output_path.to_path_buf());
            Ok(())
        }
    }

    fn pipeline() -> MergePipeline<FixedProber, ShiftedExtractor, RecordingMuxer> {
        let detection = DetectionConfig {
            number_of_probes: 10,
            seed: Some(5),
            max_workers: 2,
            ..Default::default()
        };
        MergePipeline::new(
            FixedProber,
            ShiftedExtractor,
            RecordingMuxer::default(),
            detection,
            MergeConfig::default(),
        )
        .unwrap()
    }

    fn job() -> MergeJob {
        let selection = TrackSelection::new("ref.mkv", "dub.mkv")
            .with_track(AudioTrack::new("ref.mkv", 1))
            .with_track(AudioTrack::new("dub.mkv", 1));
        MergeJob::new(selection, "out.mkv")
    }

    #[test]
    fn detects_and_muxes() {
        let pipeline = pipeline();
        let outcome = pipeline.run(&job()).unwrap();

        assert_eq!(outcome.offset.offset_ms, 800);
        assert!(outcome.report.is_some());
        assert_eq!(
            outcome.plan.filter_graph.as_deref(),
            Some("[1:a:0]adelay=800|800[a1]")
        );
        assert_eq!(*pipeline.muxer.outputs.lock(), vec![PathBuf::from("out.mkv")]);
    }

    #[test]
    fn manual_offset_skips_detection() {
        let outcome = pipeline().plan(&job().with_manual_offset(-250)).unwrap();

        assert!(outcome.report.is_none());
        assert_eq!(outcome.offset.method, "manual");
        assert!(outcome
            .plan
            .filter_graph
            .unwrap()
            .contains("atrim=start=0.250"));
    }

    #[test]
    fn probe_errors_pass_through() {
        let selection = TrackSelection::new("missing.mkv", "dub.mkv");
        let result = pipeline().plan(&MergeJob::new(selection, "out.mkv"));
        assert!(matches!(result, Err(PipelineError::Probe(_))));
    }

    #[test]
    fn invalid_detection_config_is_rejected() {
        let result = MergePipeline::new(
            FixedProber,
            ShiftedExtractor,
            RecordingMuxer::default(),
            DetectionConfig {
                number_of_probes: 0,
                ..Default::default()
            },
            MergeConfig::default(),
        );
        assert!(matches!(result, Err(PipelineError::Detection(_))));
    }

    #[test]
    fn ffmpeg_pipeline_builds_from_settings() {
        assert!(MergePipeline::from_settings(&Settings::default()).is_ok());
    }
}
