//! The recency/frequency ranking formula.
//!
//! Each candidate gets `S = w_r * R + w_f * F` where `R` falls linearly
//! from 1 (used just now) to 0 (used at or beyond the recency window) and
//! `F` is the min-max normalized use count across the candidate set. Ties
//! break alphabetically on the description so equal scores render in a
//! stable order.

#![allow(
    clippy::cast_precision_loss,
    clippy::missing_const_for_fn,
    clippy::suboptimal_flops,
)]

use chrono::{DateTime, Utc};
use kniferoll_core::model::{Suggestion, SuggestionRanker, SuggestionRow};
use serde::{Deserialize, Serialize};

const RECENCY_WINDOW_DAYS: f64 = 14.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Configurable weights for the ranking formula:
///
/// `S(v) = recency*R + frequency*F`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankWeights {
    pub recency: f64,
    pub frequency: f64,
}

impl Default for RankWeights {
    fn default() -> Self {
        Self {
            recency: 0.6,
            frequency: 0.4,
        }
    }
}

/// Blend normalized recency and frequency components into one score.
#[must_use]
pub fn blend(recency: f64, frequency: f64, weights: &RankWeights) -> f64 {
    (weights.recency * normalize_unit(recency)) + (weights.frequency * normalize_unit(frequency))
}

/// Linear recency over the window: used right now maps to `1.0`, used at
/// or beyond the window edge maps to `0.0`. Timestamps in the future count
/// as now.
#[must_use]
pub fn recency_component(last_used_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let seconds = (now - last_used_at).num_seconds();
    if seconds <= 0 {
        return 1.0;
    }
    let days = seconds as f64 / SECONDS_PER_DAY;
    normalize_unit(1.0 - days / RECENCY_WINDOW_DAYS)
}

/// Min-max normalization of use counts to `[0, 1]`.
///
/// If all counts are equal (including a single-element slice), all outputs
/// are `0.0`.
#[must_use]
pub fn normalize_counts(counts: &[u32]) -> Vec<f64> {
    let Some(&min) = counts.iter().min() else {
        return Vec::new();
    };
    let max = counts.iter().max().copied().unwrap_or(min);
    let range = max - min;

    if range == 0 {
        return vec![0.0; counts.len()];
    }

    counts
        .iter()
        .map(|&count| f64::from(count - min) / f64::from(range))
        .collect()
}

fn normalize_unit(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }

    value.clamp(0.0, 1.0)
}

/// [`SuggestionRanker`] implementation over the weighted blend.
#[derive(Debug, Clone, Default)]
pub struct CompositeRanker {
    weights: RankWeights,
}

impl CompositeRanker {
    #[must_use]
    pub const fn new(weights: RankWeights) -> Self {
        Self { weights }
    }

    /// Rank against an explicit clock. [`SuggestionRanker::rank`] delegates
    /// here with the wall clock; tests and the simulator pin `now`.
    #[must_use]
    pub fn rank_at(&self, rows: &[SuggestionRow], now: DateTime<Utc>) -> Vec<Suggestion> {
        let counts: Vec<u32> = rows.iter().map(|row| row.use_count).collect();
        let frequencies = normalize_counts(&counts);

        let mut scored: Vec<(f64, &SuggestionRow)> = rows
            .iter()
            .zip(frequencies)
            .map(|(row, frequency)| {
                let recency = recency_component(row.last_used_at, now);
                (blend(recency, frequency, &self.weights), row)
            })
            .collect();
        scored.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then_with(|| a.1.description.cmp(&b.1.description))
        });

        scored
            .into_iter()
            .map(|(_, row)| Suggestion {
                id: row.kitchen_item_id.clone(),
                description: row.description.clone(),
                last_unit_id: row.last_unit_id.clone(),
                last_quantity: row.last_quantity,
            })
            .collect()
    }
}

impl SuggestionRanker for CompositeRanker {
    fn rank(&self, rows: &[SuggestionRow]) -> Vec<Suggestion> {
        self.rank_at(rows, Utc::now())
    }
}
