#![forbid(unsafe_code)]
//! kniferoll-rank library.
//!
//! Suggestion ranking for the add-item entry form: a deterministic
//! recency/frequency blend behind kniferoll-core's
//! [`SuggestionRanker`](kniferoll_core::model::SuggestionRanker) seam.
//!
//! # Conventions
//!
//! - **Errors**: ranking is total; no fallible paths.
//! - **Determinism**: identical rows and clock produce identical order.

pub mod score;

pub use score::{CompositeRanker, RankWeights};
