//! Offset selection from the pooled candidates.
//!
//! The pool is ranked by similarity, cut to the top K, and handed to a
//! selector that reduces the survivors to one offset. Rounding happens
//! once, on the selector's raw value.

mod mean;
mod median;

pub use mean::TopKMeanSelector;
pub use median::TopKMedianSelector;

use crate::config::DetectionSettings;
use crate::detection::types::{Candidate, DetectionError, DetectionResult, ResolvedOffset};
use crate::models::OffsetSelectionMode;

/// Configuration for offset aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationConfig {
    /// Number of best candidates kept.
    pub top_k: usize,
    /// How the kept candidates are reduced.
    pub mode: OffsetSelectionMode,
    /// Drop candidates below this similarity before ranking.
    pub min_similarity: Option<f64>,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            mode: OffsetSelectionMode::TopKMean,
            min_similarity: None,
        }
    }
}

impl From<&DetectionSettings> for AggregationConfig {
    fn from(settings: &DetectionSettings) -> Self {
        Self {
            top_k: settings.top_k as usize,
            mode: settings.selection_mode,
            min_similarity: settings
                .enforce_similarity_threshold
                .then_some(settings.similarity_threshold),
        }
    }
}

/// Trait for offset selection strategies.
///
/// Implementations receive the ranked top-K candidates, best first.
pub trait OffsetSelector: Send + Sync {
    /// Get the name of this selection method.
    fn name(&self) -> &'static str;

    /// Reduce the candidates to one offset.
    ///
    /// Returns `None` if `top` is empty.
    fn select(&self, top: &[Candidate]) -> Option<ResolvedOffset>;
}

/// Create an offset selector for the given mode.
pub fn get_selector(mode: OffsetSelectionMode) -> Box<dyn OffsetSelector> {
    match mode {
        OffsetSelectionMode::TopKMean => Box::new(TopKMeanSelector),
        OffsetSelectionMode::TopKMedian => Box::new(TopKMedianSelector),
    }
}

/// Rank `pool` by similarity and keep the best `top_k`.
///
/// The sort is stable, so ties keep pool order.
pub fn rank_top_k(pool: &[Candidate], config: &AggregationConfig) -> Vec<Candidate> {
    let mut ranked: Vec<Candidate> = match config.min_similarity {
        Some(min) => pool.iter().copied().filter(|c| c.similarity >= min).collect(),
        None => pool.to_vec(),
    };
    ranked.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    ranked.truncate(config.top_k);
    ranked
}

/// Resolve the final offset from the candidate pool.
pub fn aggregate(
    pool: &[Candidate],
    config: &AggregationConfig,
) -> DetectionResult<ResolvedOffset> {
    if pool.is_empty() {
        return Err(DetectionError::InsufficientData(
            "candidate pool is empty".to_string(),
        ));
    }

    let top = rank_top_k(pool, config);
    if top.is_empty() {
        return Err(DetectionError::InsufficientData(format!(
            "no candidate reached {:.2}% similarity",
            config.min_similarity.unwrap_or_default()
        )));
    }

    let selector = get_selector(config.mode);
    let resolved = selector.select(&top).ok_or_else(|| {
        DetectionError::InsufficientData(format!("{} selector returned no offset", selector.name()))
    })?;

    tracing::info!(
        "Resolved offset {:+}ms via {} over {} candidate(s)",
        resolved.offset_ms,
        resolved.method,
        top.len()
    );
    Ok(resolved)
}
