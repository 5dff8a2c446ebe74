//! Probe orchestration.
//!
//! A run draws every anchor up front from the injected RNG, then executes
//! the probes on a bounded rayon pool. Each probe hashes the reference
//! frame at its anchor and scans the additional file backward and forward
//! concurrently. Grouped candidates go into a shared pool which is
//! aggregated once every probe has finished.

use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use super::cancel::CancelHandle;
use super::pool::CandidatePool;
use super::search::{search_direction, DirectionalScan, ScanTarget, SearchParams};
use super::selection::{aggregate, AggregationConfig};
use super::types::{
    DetectionError, DetectionReport, DetectionResult, ProbeOutcome, ProbeSummary,
};
use crate::config::DetectionSettings;
use crate::frames::{FrameExtractor, FrameHasher};
use crate::models::{HashAlgorithm, MediaInfo, SearchDirection};

/// Configuration for a detection run.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionConfig {
    /// Probes to run.
    pub number_of_probes: usize,
    /// Directional scan parameters.
    pub search: SearchParams,
    /// Top-K selection.
    pub aggregation: AggregationConfig,
    /// Hash used for every frame.
    pub hash_algorithm: HashAlgorithm,
    /// Worker threads (0 = one per available core).
    pub max_workers: usize,
    /// Seed for anchor selection; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            number_of_probes: 5,
            search: SearchParams::default(),
            aggregation: AggregationConfig::default(),
            hash_algorithm: HashAlgorithm::default(),
            max_workers: 0,
            seed: None,
        }
    }
}

impl From<&DetectionSettings> for DetectionConfig {
    fn from(settings: &DetectionSettings) -> Self {
        Self {
            number_of_probes: settings.number_of_probes as usize,
            search: SearchParams {
                samples_per_second: settings.samples_per_second,
                search_area_seconds: settings.search_area_seconds,
                similarity_threshold: settings.similarity_threshold,
            },
            aggregation: AggregationConfig::from(settings),
            hash_algorithm: settings.hash_algorithm,
            max_workers: settings.max_workers as usize,
            seed: settings.seed,
        }
    }
}

impl DetectionConfig {
    /// Check that every parameter is usable.
    pub fn validate(&self) -> DetectionResult<()> {
        if self.number_of_probes == 0 {
            return Err(DetectionError::InvalidConfig(
                "number_of_probes must be at least 1".to_string(),
            ));
        }
        if self.search.samples_per_second == 0 || self.search.samples_per_second > 1000 {
            return Err(DetectionError::InvalidConfig(format!(
                "samples_per_second must be in 1..=1000, got {}",
                self.search.samples_per_second
            )));
        }
        if self.search.search_area_seconds == 0 {
            return Err(DetectionError::InvalidConfig(
                "search_area_seconds must be at least 1".to_string(),
            ));
        }
        if self.aggregation.top_k == 0 {
            return Err(DetectionError::InvalidConfig(
                "top_k must be at least 1".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.search.similarity_threshold) {
            return Err(DetectionError::InvalidConfig(format!(
                "similarity_threshold must be in 0..=100, got {}",
                self.search.similarity_threshold
            )));
        }
        Ok(())
    }

    /// Worker count after resolving 0 to the available parallelism.
    pub fn worker_count(&self) -> usize {
        let workers = if self.max_workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.max_workers
        };
        workers.clamp(1, self.number_of_probes.max(1))
    }
}

/// Finds the constant offset of an additional file relative to a reference.
pub struct OffsetDetector<E: FrameExtractor> {
    extractor: E,
    hasher: FrameHasher,
    config: DetectionConfig,
    cancel: CancelHandle,
}

impl<E: FrameExtractor> OffsetDetector<E> {
    /// Create a detector. Fails if the configuration is invalid.
    pub fn new(extractor: E, config: DetectionConfig) -> DetectionResult<Self> {
        config.validate()?;
        Ok(Self {
            extractor,
            hasher: FrameHasher::new(config.hash_algorithm),
            config,
            cancel: CancelHandle::new(),
        })
    }

    /// Use an externally owned cancel handle.
    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    /// Handle that cancels runs of this detector.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Run detection, seeding anchor selection from the config.
    pub fn detect(
        &self,
        reference: &Path,
        reference_info: &MediaInfo,
        additional: &Path,
    ) -> DetectionResult<DetectionReport> {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.detect_with_rng(reference, reference_info, additional, &mut rng)
    }

    /// Run detection with a caller-supplied random source.
    pub fn detect_with_rng<R: Rng + ?Sized>(
        &self,
        reference: &Path,
        reference_info: &MediaInfo,
        additional: &Path,
        rng: &mut R,
    ) -> DetectionResult<DetectionReport> {
        let anchors = self.choose_anchors(reference_info.duration_ms, rng)?;
        let workers = self.config.worker_count();

        tracing::info!(
            "Detecting offset of '{}' against '{}': {} probes, {} worker(s), {} backend, {}",
            additional.display(),
            reference.display(),
            anchors.len(),
            workers,
            self.extractor.backend_name(),
            self.config.aggregation.mode.name()
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("dubsync-probe-{}", i))
            .build()
            .map_err(|e| DetectionError::WorkerPool(e.to_string()))?;

        let candidates = CandidatePool::new();
        let probes: Vec<ProbeOutcome> = pool.install(|| {
            anchors
                .par_iter()
                .enumerate()
                .map(|(index, &anchor_ms)| {
                    self.run_probe(index, anchor_ms, reference, additional, &candidates)
                })
                .collect()
        });

        let completed = probes.iter().filter(|p| p.is_completed()).count();
        if self.cancel.is_cancelled() {
            tracing::warn!("Detection cancelled after {} completed probe(s)", completed);
            return Err(DetectionError::Cancelled { completed });
        }
        if completed == 0 {
            return Err(DetectionError::InsufficientData(format!(
                "none of {} probes produced candidates",
                probes.len()
            )));
        }

        let candidates = candidates.into_candidates();
        let total_candidates = candidates.len();
        let offset = aggregate(&candidates, &self.config.aggregation)?;

        let report = DetectionReport {
            offset,
            probes,
            total_candidates,
        };
        tracing::info!("{}", report.summary());
        Ok(report)
    }

    /// Draw one anchor per probe, uniformly inside the in-bounds window.
    pub fn choose_anchors<R: Rng + ?Sized>(
        &self,
        duration_ms: u64,
        rng: &mut R,
    ) -> DetectionResult<Vec<i64>> {
        let area_ms = self.config.search.search_area_ms();
        let required_ms = area_ms * 2;
        if duration_ms < required_ms {
            return Err(DetectionError::DurationTooShort {
                duration_ms,
                required_ms,
            });
        }

        let low = area_ms as i64;
        let high = (duration_ms - area_ms) as i64;
        Ok((0..self.config.number_of_probes)
            .map(|_| rng.gen_range(low..=high))
            .collect())
    }

    fn run_probe(
        &self,
        index: usize,
        anchor_ms: i64,
        reference: &Path,
        additional: &Path,
        candidates: &CandidatePool,
    ) -> ProbeOutcome {
        if self.cancel.is_cancelled() {
            return ProbeOutcome::Cancelled { index, anchor_ms };
        }

        let anchor_hash = match self
            .extractor
            .extract_frame(reference, anchor_ms)
            .and_then(|frame| self.hasher.hash(&frame))
        {
            Ok(hash) => hash,
            Err(error) => {
                tracing::warn!("Probe {} abandoned at {}ms: {}", index + 1, anchor_ms, error);
                return ProbeOutcome::Abandoned {
                    index,
                    anchor_ms,
                    error,
                };
            }
        };

        let target = ScanTarget {
            path: additional,
            anchor_ms,
            hash: anchor_hash,
        };
        let scan = |direction: SearchDirection| {
            search_direction(
                &self.extractor,
                &self.hasher,
                &target,
                direction,
                &self.config.search,
                &self.cancel,
            )
        };
        let (backward, forward) = rayon::join(
            || scan(SearchDirection::Backward),
            || scan(SearchDirection::Forward),
        );

        let (backward, forward): (DirectionalScan, DirectionalScan) = match (backward, forward) {
            (Ok(b), Ok(f)) => (b, f),
            _ => return ProbeOutcome::Cancelled { index, anchor_ms },
        };

        let mut probe_candidates = backward.candidates;
        probe_candidates.extend(forward.candidates);

        let best = probe_candidates
            .iter()
            .copied()
            .reduce(|best, c| if c.similarity > best.similarity { c } else { best });

        let summary = ProbeSummary {
            index,
            anchor_ms,
            anchor_hash,
            candidates: probe_candidates.len(),
            samples_hashed: backward.samples_hashed + forward.samples_hashed,
            samples_skipped: backward.samples_skipped + forward.samples_skipped,
            best,
        };

        if let Some(best) = best {
            tracing::debug!(
                "Probe {} at {}ms: best {:.2}% at {:+}ms ({} candidates)",
                index + 1,
                anchor_ms,
                best.similarity,
                best.offset_ms,
                summary.candidates
            );
        }

        candidates.append(index, probe_candidates);
        ProbeOutcome::Completed(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::{FrameError, FrameResult};
    use crate::models::AudioStreamInfo;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const FRAME_MS: i64 = 40;
    const CLIP_MS: i64 = 60_000;
    const LEAD_IN_MS: i64 = 1_200;

    fn splitmix64(mut x: u64) -> u64 {
        x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = x;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    /// 64x64 frame made of 8x8 black/white blocks keyed by frame number.
    fn pattern_frame(frame: i64) -> DynamicImage {
        let bits = splitmix64(frame as u64);
        let img = RgbImage::from_fn(64, 64, |x, y| {
            let bit = (y / 8) * 8 + (x / 8);
            if bits >> bit & 1 == 1 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        });
        DynamicImage::ImageRgb8(img)
    }

    /// Serves "ref.mkv" as the synthetic clip and "dub.mkv" as the same clip
    /// after a black lead-in.
    struct SyntheticExtractor {
        fail_reference: bool,
    }

    impl FrameExtractor for SyntheticExtractor {
        fn extract_frame(&self, path: &Path, time_ms: i64) -> FrameResult<DynamicImage> {
            let is_reference = path.ends_with("ref.mkv");
            if is_reference && self.fail_reference {
                return Err(FrameError::extraction(path, time_ms, "decoder error"));
            }
            let (start, end) = if is_reference {
                (0, CLIP_MS)
            } else {
                (LEAD_IN_MS, CLIP_MS + LEAD_IN_MS)
            };
            if time_ms < 0 || time_ms >= end {
                return Err(FrameError::extraction(path, time_ms, "seek past end"));
            }
            if time_ms < start {
                return Ok(DynamicImage::ImageRgb8(RgbImage::new(64, 64)));
            }
            Ok(pattern_frame((time_ms - start) / FRAME_MS))
        }

        fn backend_name(&self) -> &str {
            "synthetic"
        }
    }

    fn synthetic() -> SyntheticExtractor {
        SyntheticExtractor {
            fail_reference: false,
        }
    }

    /// Cancels the shared handle once a set number of frames were served.
    struct CancellingExtractor {
        inner: SyntheticExtractor,
        cancel: CancelHandle,
        cancel_after: usize,
        calls: AtomicUsize,
    }

    impl CancellingExtractor {
        fn new(cancel: CancelHandle, cancel_after: usize) -> Self {
            Self {
                inner: synthetic(),
                cancel,
                cancel_after,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl FrameExtractor for CancellingExtractor {
        fn extract_frame(&self, path: &Path, time_ms: i64) -> FrameResult<DynamicImage> {
            let served = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if served >= self.cancel_after {
                self.cancel.cancel();
            }
            self.inner.extract_frame(path, time_ms)
        }

        fn backend_name(&self) -> &str {
            "cancelling"
        }
    }

    fn reference_info() -> MediaInfo {
        MediaInfo::new(CLIP_MS as u64, vec![AudioStreamInfo::new(1)])
    }

    fn config(probes: usize) -> DetectionConfig {
        DetectionConfig {
            number_of_probes: probes,
            max_workers: 4,
            ..Default::default()
        }
    }

    #[test]
    fn finds_lead_in_offset() {
        crate::logging::init_test_tracing();
        let detector = OffsetDetector::new(synthetic(), config(12)).unwrap();
        let mut rng = StdRng::seed_from_u64(42);

        let report = detector
            .detect_with_rng(
                Path::new("ref.mkv"),
                &reference_info(),
                Path::new("dub.mkv"),
                &mut rng,
            )
            .unwrap();

        assert!((report.offset.offset_ms - LEAD_IN_MS).abs() <= 100);
        assert_eq!(report.completed_probes(), 12);
        assert_eq!(report.offset.top_candidates.len(), 10);
        assert!(report.total_candidates >= 10);

        let indices: Vec<usize> = report.probes.iter().map(|p| p.index()).collect();
        assert_eq!(indices, (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn anchors_stay_in_bounds() {
        let detector = OffsetDetector::new(synthetic(), config(200)).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let anchors = detector.choose_anchors(60_000, &mut rng).unwrap();

        assert_eq!(anchors.len(), 200);
        assert!(anchors.iter().all(|&a| (10_000..=50_000).contains(&a)));
    }

    #[test]
    fn seeded_anchors_repeat() {
        let detector = OffsetDetector::new(synthetic(), config(5)).unwrap();
        let a = detector
            .choose_anchors(90_000, &mut StdRng::seed_from_u64(9))
            .unwrap();
        let b = detector
            .choose_anchors(90_000, &mut StdRng::seed_from_u64(9))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn short_reference_is_rejected() {
        let detector = OffsetDetector::new(synthetic(), config(5)).unwrap();
        let result = detector.choose_anchors(19_999, &mut StdRng::seed_from_u64(0));
        assert!(matches!(
            result,
            Err(DetectionError::DurationTooShort {
                duration_ms: 19_999,
                required_ms: 20_000
            })
        ));
    }

    #[test]
    fn minimum_duration_pins_anchor_to_midpoint() {
        let detector = OffsetDetector::new(synthetic(), config(5)).unwrap();
        let anchors = detector
            .choose_anchors(20_000, &mut StdRng::seed_from_u64(0))
            .unwrap();
        assert_eq!(anchors, vec![10_000; 5]);
    }

    #[test]
    fn all_probes_abandoned_is_insufficient() {
        let extractor = SyntheticExtractor {
            fail_reference: true,
        };
        let detector = OffsetDetector::new(extractor, config(3)).unwrap();
        let result = detector.detect_with_rng(
            Path::new("ref.mkv"),
            &reference_info(),
            Path::new("dub.mkv"),
            &mut StdRng::seed_from_u64(3),
        );
        assert!(matches!(result, Err(DetectionError::InsufficientData(_))));
    }

    #[test]
    fn cancelled_run_pools_nothing() {
        let detector = OffsetDetector::new(synthetic(), config(3)).unwrap();
        detector.cancel_handle().cancel();

        let result = detector.detect_with_rng(
            Path::new("ref.mkv"),
            &reference_info(),
            Path::new("dub.mkv"),
            &mut StdRng::seed_from_u64(3),
        );
        assert!(matches!(result, Err(DetectionError::Cancelled { completed: 0 })));
    }

    #[test]
    fn cancel_during_run_keeps_finished_count() {
        // Each anchor costs 201 frames: itself plus 100 samples per direction
        let cancel = CancelHandle::new();
        let extractor = CancellingExtractor::new(cancel.clone(), 300);
        let config = DetectionConfig {
            number_of_probes: 6,
            max_workers: 1,
            ..Default::default()
        };
        let detector = OffsetDetector::new(extractor, config)
            .unwrap()
            .with_cancel_handle(cancel);

        let result = detector.detect_with_rng(
            Path::new("ref.mkv"),
            &reference_info(),
            Path::new("dub.mkv"),
            &mut StdRng::seed_from_u64(5),
        );

        assert!(matches!(result, Err(DetectionError::Cancelled { completed: 1 })));
        assert!(detector.extractor.calls.load(Ordering::SeqCst) < 2 * 201);
    }

    #[test]
    fn interrupted_scan_pools_nothing() {
        let cancel = CancelHandle::new();
        let extractor = CancellingExtractor::new(cancel.clone(), 50);
        let detector = OffsetDetector::new(extractor, config(1))
            .unwrap()
            .with_cancel_handle(cancel);
        let pool = CandidatePool::new();

        let outcome = detector.run_probe(
            0,
            20_000,
            Path::new("ref.mkv"),
            Path::new("dub.mkv"),
            &pool,
        );

        assert!(matches!(
            outcome,
            ProbeOutcome::Cancelled {
                index: 0,
                anchor_ms: 20_000
            }
        ));
        assert!(pool.is_empty());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let bad = DetectionConfig {
            number_of_probes: 0,
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(DetectionError::InvalidConfig(_))));

        let mut bad = DetectionConfig::default();
        bad.aggregation.top_k = 0;
        assert!(bad.validate().is_err());

        let mut bad = DetectionConfig::default();
        bad.search.samples_per_second = 0;
        assert!(bad.validate().is_err());

        assert!(DetectionConfig::default().validate().is_ok());
    }

    #[test]
    fn config_from_settings() {
        let settings = DetectionSettings {
            number_of_probes: 8,
            top_k: 4,
            seed: Some(11),
            ..Default::default()
        };
        let config = DetectionConfig::from(&settings);
        assert_eq!(config.number_of_probes, 8);
        assert_eq!(config.aggregation.top_k, 4);
        assert_eq!(config.seed, Some(11));
        assert_eq!(config.search.step_ms(), 100);
    }

    #[test]
    fn worker_count_is_bounded_by_probes() {
        let config = DetectionConfig {
            number_of_probes: 2,
            max_workers: 16,
            ..Default::default()
        };
        assert_eq!(config.worker_count(), 2);
    }
}
