//! Directional search around a probe anchor.
//!
//! From the anchor timestamp, the additional file is sampled at a fixed
//! rate either strictly backward or strictly forward. Every sample is
//! hashed and scored against the anchor hash. Failed samples are skipped.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::cancel::CancelHandle;
use super::types::{Candidate, DetectionError, DetectionResult, SampleOutcome};
use crate::frames::{FrameError, FrameExtractor, FrameHasher, PerceptualHash};
use crate::models::SearchDirection;

/// Sampling parameters shared by every directional scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Samples taken per second of media.
    pub samples_per_second: u32,
    /// Length of each directional window in seconds.
    pub search_area_seconds: u32,
    /// Candidates at or above this similarity are logged as matches.
    pub similarity_threshold: f64,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            samples_per_second: 10,
            search_area_seconds: 10,
            similarity_threshold: 95.0,
        }
    }
}

impl SearchParams {
    /// Distance between samples in milliseconds.
    pub fn step_ms(&self) -> i64 {
        1000 / i64::from(self.samples_per_second.max(1))
    }

    /// Samples taken per direction.
    pub fn sample_count(&self) -> usize {
        (self.samples_per_second as usize) * (self.search_area_seconds as usize)
    }

    /// Window length in milliseconds.
    pub fn search_area_ms(&self) -> u64 {
        u64::from(self.search_area_seconds) * 1000
    }

    /// Signed offset of the `i`-th sample in `direction`.
    pub fn offset_at(&self, direction: SearchDirection, i: usize) -> i64 {
        direction.sign() * (i as i64) * self.step_ms()
    }
}

/// What to scan: the additional file around an anchor, against a target hash.
#[derive(Debug, Clone, Copy)]
pub struct ScanTarget<'a> {
    pub path: &'a Path,
    pub anchor_ms: i64,
    pub hash: PerceptualHash,
}

/// Result of one directional scan.
#[derive(Debug, Clone)]
pub struct DirectionalScan {
    pub direction: SearchDirection,
    /// Grouped candidates.
    pub candidates: Vec<Candidate>,
    pub samples_hashed: usize,
    pub samples_skipped: usize,
}

/// Scan one direction from the anchor.
///
/// Returns `Err(Cancelled)` if the handle is cancelled between samples; the
/// partial scan is discarded.
pub fn search_direction(
    extractor: &dyn FrameExtractor,
    hasher: &FrameHasher,
    target: &ScanTarget<'_>,
    direction: SearchDirection,
    params: &SearchParams,
    cancel: &CancelHandle,
) -> DetectionResult<DirectionalScan> {
    let mut hashed = Vec::with_capacity(params.sample_count());
    let mut skipped = 0usize;

    for i in 0..params.sample_count() {
        if cancel.is_cancelled() {
            return Err(DetectionError::Cancelled { completed: 0 });
        }

        let offset_ms = params.offset_at(direction, i);
        match sample_at(extractor, hasher, target, offset_ms) {
            SampleOutcome::Hashed(candidate) => {
                if candidate.similarity >= params.similarity_threshold {
                    tracing::debug!(
                        "[{}] match at {:+}ms: {:.2}%",
                        direction,
                        candidate.offset_ms,
                        candidate.similarity
                    );
                }
                hashed.push(candidate);
            }
            SampleOutcome::Skipped { offset_ms, error } => {
                tracing::debug!("[{}] skipped sample at {:+}ms: {}", direction, offset_ms, error);
                skipped += 1;
            }
        }
    }

    if hashed.is_empty() && skipped > 0 {
        tracing::warn!(
            "[{}] every sample around {}ms failed ({} skipped)",
            direction,
            target.anchor_ms,
            skipped
        );
    }

    Ok(DirectionalScan {
        direction,
        samples_hashed: hashed.len(),
        candidates: group_candidates(&hashed),
        samples_skipped: skipped,
    })
}

/// Take a single sample at `offset_ms` from the anchor.
pub fn sample_at(
    extractor: &dyn FrameExtractor,
    hasher: &FrameHasher,
    target: &ScanTarget<'_>,
    offset_ms: i64,
) -> SampleOutcome {
    let time_ms = target.anchor_ms + offset_ms;
    if time_ms < 0 {
        return SampleOutcome::Skipped {
            offset_ms,
            error: FrameError::extraction(target.path, time_ms, "timestamp before start of file"),
        };
    }

    match extractor
        .extract_frame(target.path, time_ms)
        .and_then(|frame| hasher.hash(&frame))
    {
        Ok(hash) => SampleOutcome::Hashed(Candidate::new(target.hash.similarity(&hash), offset_ms)),
        Err(error) => SampleOutcome::Skipped { offset_ms, error },
    }
}

/// Collapse candidates with identical similarity into one entry each.
///
/// The grouped entry keeps the shared similarity and takes the rounded mean
/// of the group's offsets. Groups keep first-appearance order. The result is
/// never longer than the input.
pub fn group_candidates(candidates: &[Candidate]) -> Vec<Candidate> {
    let mut order: Vec<u64> = Vec::new();
    let mut groups: HashMap<u64, (f64, i64, i64)> = HashMap::new();

    for c in candidates {
        let key = c.similarity.to_bits();
        let entry = groups.entry(key).or_insert_with(|| {
            order.push(key);
            (c.similarity, 0, 0)
        });
        entry.1 += c.offset_ms;
        entry.2 += 1;
    }

    order
        .into_iter()
        .filter_map(|key| groups.get(&key))
        .map(|&(similarity, sum, count)| {
            let mean = sum as f64 / count as f64;
            Candidate::new(similarity, mean.round() as i64)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::FrameResult;
    use image::{DynamicImage, GrayImage, Luma};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a flat gray frame whose shade depends on the timestamp, and
    /// fails outside `[0, limit_ms)`.
    struct StripeExtractor {
        limit_ms: i64,
        calls: AtomicUsize,
    }

    impl StripeExtractor {
        fn new(limit_ms: i64) -> Self {
            Self {
                limit_ms,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl FrameExtractor for StripeExtractor {
        fn extract_frame(&self, path: &Path, time_ms: i64) -> FrameResult<DynamicImage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if time_ms >= self.limit_ms {
                return Err(FrameError::extraction(path, time_ms, "past end"));
            }
            let split = ((time_ms / 100) % 16) as u32;
            let img = GrayImage::from_fn(16, 16, |x, _| {
                if x < split {
                    Luma([255u8])
                } else {
                    Luma([0u8])
                }
            });
            Ok(DynamicImage::ImageLuma8(img))
        }

        fn backend_name(&self) -> &str {
            "stripe"
        }
    }

    fn params() -> SearchParams {
        SearchParams {
            samples_per_second: 10,
            search_area_seconds: 2,
            similarity_threshold: 95.0,
        }
    }

    #[test]
    fn step_and_count() {
        let p = params();
        assert_eq!(p.step_ms(), 100);
        assert_eq!(p.sample_count(), 20);
        assert_eq!(p.search_area_ms(), 2000);
        assert_eq!(p.offset_at(SearchDirection::Backward, 3), -300);
        assert_eq!(p.offset_at(SearchDirection::Forward, 3), 300);
        assert_eq!(p.offset_at(SearchDirection::Backward, 0), 0);
    }

    #[test]
    fn grouping_averages_identical_similarity() {
        let grouped = group_candidates(&[
            Candidate::new(50.0, -100),
            Candidate::new(100.0, 0),
            Candidate::new(50.0, -200),
            Candidate::new(50.0, -400),
        ]);
        assert_eq!(
            grouped,
            vec![Candidate::new(50.0, -233), Candidate::new(100.0, 0)]
        );
    }

    #[test]
    fn grouping_empty() {
        assert!(group_candidates(&[]).is_empty());
    }

    #[test]
    fn forward_scan_finds_anchor_frame() {
        let extractor = StripeExtractor::new(60_000);
        let hasher = FrameHasher::default();
        let anchor_frame = extractor.extract_frame(Path::new("ref"), 5_300).unwrap();
        let target = ScanTarget {
            path: Path::new("add"),
            anchor_ms: 5_000,
            hash: hasher.hash(&anchor_frame).unwrap(),
        };

        let scan = search_direction(
            &extractor,
            &hasher,
            &target,
            SearchDirection::Forward,
            &params(),
            &CancelHandle::new(),
        )
        .unwrap();

        assert_eq!(scan.samples_hashed, 20);
        assert_eq!(scan.samples_skipped, 0);
        assert!(scan.candidates.len() <= params().sample_count());
        assert!(scan
            .candidates
            .iter()
            .any(|c| c.similarity == 100.0 && c.offset_ms >= 0));
    }

    #[test]
    fn out_of_bounds_samples_are_skipped() {
        let extractor = StripeExtractor::new(1_050);
        let hasher = FrameHasher::default();
        let target = ScanTarget {
            path: Path::new("add"),
            anchor_ms: 1_000,
            hash: PerceptualHash::from_bits(0),
        };

        let scan = search_direction(
            &extractor,
            &hasher,
            &target,
            SearchDirection::Forward,
            &params(),
            &CancelHandle::new(),
        )
        .unwrap();

        assert_eq!(scan.samples_hashed, 1);
        assert_eq!(scan.samples_skipped, 19);
    }

    #[test]
    fn negative_timestamps_never_reach_extractor() {
        let extractor = StripeExtractor::new(60_000);
        let target = ScanTarget {
            path: Path::new("add"),
            anchor_ms: 500,
            hash: PerceptualHash::from_bits(0),
        };

        let scan = search_direction(
            &extractor,
            &FrameHasher::default(),
            &target,
            SearchDirection::Backward,
            &params(),
            &CancelHandle::new(),
        )
        .unwrap();

        assert_eq!(scan.samples_hashed, 6);
        assert_eq!(scan.samples_skipped, 14);
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 6);
        assert!(scan.candidates.iter().all(|c| c.offset_ms <= 0));
    }

    #[test]
    fn cancelled_scan_returns_error() {
        let cancel = CancelHandle::new();
        cancel.cancel();
        let target = ScanTarget {
            path: Path::new("add"),
            anchor_ms: 5_000,
            hash: PerceptualHash::from_bits(0),
        };

        let result = search_direction(
            &StripeExtractor::new(60_000),
            &FrameHasher::default(),
            &target,
            SearchDirection::Forward,
            &params(),
            &cancel,
        );
        assert!(matches!(result, Err(DetectionError::Cancelled { .. })));
    }
}
