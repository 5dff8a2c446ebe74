//! Mean offset selector.
//!
//! Averages the offsets of the top-K candidates. Sensitive to outliers
//! that rank among the best matches.

use super::OffsetSelector;
use crate::detection::types::{Candidate, ResolvedOffset};

/// Mean of the top-K offsets.
pub struct TopKMeanSelector;

impl OffsetSelector for TopKMeanSelector {
    fn name(&self) -> &'static str {
        "top_k_mean"
    }

    fn select(&self, top: &[Candidate]) -> Option<ResolvedOffset> {
        if top.is_empty() {
            return None;
        }

        let sum: f64 = top.iter().map(|c| c.offset_ms as f64).sum();
        let mean = sum / top.len() as f64;

        Some(ResolvedOffset::new(mean, self.name(), top.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_offsets() {
        let top = vec![
            Candidate::new(100.0, -1000),
            Candidate::new(99.0, -1001),
            Candidate::new(98.0, -1003),
        ];
        let result = TopKMeanSelector.select(&top).unwrap();
        assert!((result.raw_offset_ms - (-1001.333)).abs() < 0.01);
        assert_eq!(result.offset_ms, -1001);
    }

    #[test]
    fn empty_selects_nothing() {
        assert!(TopKMeanSelector.select(&[]).is_none());
    }
}
