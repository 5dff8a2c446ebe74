//! Median offset selector.

use super::OffsetSelector;
use crate::detection::types::{Candidate, ResolvedOffset};

/// Median of the top-K offsets. An even count averages the middle pair.
pub struct TopKMedianSelector;

impl OffsetSelector for TopKMedianSelector {
    fn name(&self) -> &'static str {
        "top_k_median"
    }

    fn select(&self, top: &[Candidate]) -> Option<ResolvedOffset> {
        if top.is_empty() {
            return None;
        }

        let mut offsets: Vec<i64> = top.iter().map(|c| c.offset_ms).collect();
        offsets.sort_unstable();

        let mid = offsets.len() / 2;
        let median = if offsets.len() % 2 == 0 {
            (offsets[mid - 1] as f64 + offsets[mid] as f64) / 2.0
        } else {
            offsets[mid] as f64
        };

        Some(ResolvedOffset::new(median, self.name(), top.to_vec()))
    }
}
