#![allow(clippy::module_name_repetitions)]

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A ranked candidate for fast re-entry: an item the user likely wants to
/// add next, with the unit and quantity they last used for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// The kitchen item this suggestion resolves to.
    pub id: String,
    pub description: String,
    pub last_unit_id: Option<String>,
    pub last_quantity: Option<f64>,
}

/// One kitchen item's usage record within a scope, as returned by the
/// gateway's suggestion query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionRow {
    pub kitchen_item_id: String,
    pub description: String,
    pub last_unit_id: Option<String>,
    pub last_quantity: Option<f64>,
    pub use_count: u32,
    pub last_used_at: DateTime<Utc>,
}

/// Orders usage rows into display suggestions.
///
/// Implementations supply the ranking formula; the entry store only
/// consumes the ordered output.
pub trait SuggestionRanker: Send + Sync {
    fn rank(&self, rows: &[SuggestionRow]) -> Vec<Suggestion>;
}

/// A kitchen-scoped unit of measure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,
    pub name: String,
}

impl Unit {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A named catalog item. The compound add searches this catalog
/// case-insensitively before creating a new entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KitchenItem {
    pub id: String,
    pub kitchen_id: String,
    pub name: String,
}

/// A persisted suggestion dismissal, scoped to station, date, shift, and
/// user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDismissal {
    pub kitchen_item_id: String,
    pub station_id: String,
    pub shift_date: NaiveDate,
    pub shift_id: String,
    pub user_id: String,
}
