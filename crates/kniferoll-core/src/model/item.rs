// Double-Option patch fields are the tri-state column update encoding.
#![allow(clippy::module_name_repetitions, clippy::option_option)]

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The three checklist states of a prep item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    InProgress,
    Complete,
}

impl Status {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
        }
    }

    /// The next status along the fixed cycle
    /// `pending -> in_progress -> complete -> pending`.
    ///
    /// The cycle is total: no other transitions exist, and cycling three
    /// times from any starting point returns to it.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Pending => Self::InProgress,
            Self::InProgress => Self::Complete,
            Self::Complete => Self::Pending,
        }
    }
}

/// The `(station, date, shift)` tuple scoping which prep items are loaded.
///
/// Changing any one field is a context change; only one context is active
/// in the item cache at a time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Context {
    pub station_id: String,
    pub shift_date: NaiveDate,
    pub shift_id: String,
}

impl Context {
    #[must_use]
    pub fn new(
        station_id: impl Into<String>,
        shift_date: NaiveDate,
        shift_id: impl Into<String>,
    ) -> Self {
        Self {
            station_id: station_id.into(),
            shift_date,
            shift_id: shift_id.into(),
        }
    }
}

/// The persisted `prep_items` row, exactly as the backing store holds it.
///
/// Field names are a fixed external contract shared with realtime triggers
/// and the suggestion ranking queries; they must not be renamed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrepItemRow {
    pub id: String,
    pub station_id: String,
    pub shift_id: String,
    pub shift_date: NaiveDate,
    pub kitchen_item_id: String,
    pub unit_id: Option<String>,
    pub quantity: Option<f64>,
    pub quantity_raw: Option<String>,
    pub status: Status,
    pub status_changed_at: DateTime<Utc>,
    pub status_changed_by_user: Option<String>,
    pub created_by_user: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row plus the joined display names, when the read-back included them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrepItemRecord {
    #[serde(flatten)]
    pub row: PrepItemRow,
    pub item_name: Option<String>,
    pub unit_name: Option<String>,
}

/// A prep item as the UI sees it: persisted fields plus resolved display
/// names.
///
/// `id` is either a server-assigned UUID or a local `temp-` identifier
/// awaiting server confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrepItem {
    pub id: String,
    pub station_id: String,
    pub shift_id: String,
    pub shift_date: NaiveDate,
    pub kitchen_item_id: String,
    pub unit_id: Option<String>,
    pub quantity: Option<f64>,
    pub quantity_raw: Option<String>,
    pub status: Status,
    pub status_changed_at: DateTime<Utc>,
    pub status_changed_by_user: Option<String>,
    pub created_by_user: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Resolved item name; the configured placeholder when unresolved.
    pub description: String,
    /// Resolved unit name, when the item has a unit.
    pub unit_name: Option<String>,
}

impl PrepItem {
    /// Resolve a gateway record into a display item.
    ///
    /// Joined names win; the hint fills gaps; `placeholder` covers a
    /// description nobody could resolve.
    #[must_use]
    pub fn from_record(
        record: PrepItemRecord,
        hint: Option<&DisplayHint>,
        placeholder: &str,
    ) -> Self {
        let PrepItemRecord {
            row,
            item_name,
            unit_name,
        } = record;

        let description = item_name
            .or_else(|| hint.and_then(|h| h.description.clone()))
            .unwrap_or_else(|| placeholder.to_string());
        let unit_name = unit_name.or_else(|| hint.and_then(|h| h.unit_name.clone()));

        Self {
            id: row.id,
            station_id: row.station_id,
            shift_id: row.shift_id,
            shift_date: row.shift_date,
            kitchen_item_id: row.kitchen_item_id,
            unit_id: row.unit_id,
            quantity: row.quantity,
            quantity_raw: row.quantity_raw,
            status: row.status,
            status_changed_at: row.status_changed_at,
            status_changed_by_user: row.status_changed_by_user,
            created_by_user: row.created_by_user,
            created_at: row.created_at,
            updated_at: row.updated_at,
            description,
            unit_name,
        }
    }
}

/// Caller-supplied fields for a new prep item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDraft {
    pub station_id: String,
    pub shift_id: String,
    pub shift_date: NaiveDate,
    pub kitchen_item_id: String,
    pub unit_id: Option<String>,
    pub quantity: Option<f64>,
    pub quantity_raw: Option<String>,
}

impl ItemDraft {
    /// A draft with no unit or quantity.
    #[must_use]
    pub fn new(
        station_id: impl Into<String>,
        shift_id: impl Into<String>,
        shift_date: NaiveDate,
        kitchen_item_id: impl Into<String>,
    ) -> Self {
        Self {
            station_id: station_id.into(),
            shift_id: shift_id.into(),
            shift_date,
            kitchen_item_id: kitchen_item_id.into(),
            unit_id: None,
            quantity: None,
            quantity_raw: None,
        }
    }
}

/// The insert payload for a `prep_items` row.
///
/// The server assigns `id`, `created_at`, `updated_at`, and
/// `status_changed_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPrepItem {
    pub station_id: String,
    pub shift_id: String,
    pub shift_date: NaiveDate,
    pub kitchen_item_id: String,
    pub unit_id: Option<String>,
    pub quantity: Option<f64>,
    pub quantity_raw: Option<String>,
    pub status: Status,
    pub created_by_user: Option<String>,
}

impl NewPrepItem {
    /// Pair a draft with its creator. New items always start `pending`.
    #[must_use]
    pub fn from_draft(draft: ItemDraft, created_by_user: Option<String>) -> Self {
        Self {
            station_id: draft.station_id,
            shift_id: draft.shift_id,
            shift_date: draft.shift_date,
            kitchen_item_id: draft.kitchen_item_id,
            unit_id: draft.unit_id,
            quantity: draft.quantity,
            quantity_raw: draft.quantity_raw,
            status: Status::Pending,
            created_by_user,
        }
    }
}

/// Display names supplied by the caller so an optimistic item renders
/// before the server's joined read-back arrives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayHint {
    pub description: Option<String>,
    pub unit_name: Option<String>,
}

impl DisplayHint {
    #[must_use]
    pub fn description(text: impl Into<String>) -> Self {
        Self {
            description: Some(text.into()),
            unit_name: None,
        }
    }
}

/// A partial update to a prep item row.
///
/// Outer `None` leaves a column untouched; `Some(None)` clears a nullable
/// column. Unset columns are omitted from the serialized payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrepItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_changed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_changed_by_user: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity_raw: Option<Option<String>>,
}

impl PrepItemPatch {
    /// Apply the set fields to a display item.
    ///
    /// Clearing `unit_id` also clears the resolved `unit_name`; the stale
    /// name has no referent once the unit is gone.
    pub fn apply_to_item(&self, item: &mut PrepItem) {
        if let Some(status) = self.status {
            item.status = status;
        }
        if let Some(changed_at) = self.status_changed_at {
            item.status_changed_at = changed_at;
        }
        if let Some(changed_by) = &self.status_changed_by_user {
            item.status_changed_by_user = changed_by.clone();
        }
        if let Some(unit_id) = &self.unit_id {
            item.unit_id = unit_id.clone();
            if unit_id.is_none() {
                item.unit_name = None;
            }
        }
        if let Some(quantity) = self.quantity {
            item.quantity = quantity;
        }
        if let Some(quantity_raw) = &self.quantity_raw {
            item.quantity_raw = quantity_raw.clone();
        }
    }

    /// Apply the set fields to a persisted row.
    pub fn apply_to_row(&self, row: &mut PrepItemRow) {
        if let Some(status) = self.status {
            row.status = status;
        }
        if let Some(changed_at) = self.status_changed_at {
            row.status_changed_at = changed_at;
        }
        if let Some(changed_by) = &self.status_changed_by_user {
            row.status_changed_by_user = changed_by.clone();
        }
        if let Some(unit_id) = &self.unit_id {
            row.unit_id = unit_id.clone();
        }
        if let Some(quantity) = self.quantity {
            row.quantity = quantity;
        }
        if let Some(quantity_raw) = &self.quantity_raw {
            row.quantity_raw = quantity_raw.clone();
        }
    }
}

/// Derive the free-text quantity display, e.g. `2 lbs`, `0.5 qt`, or `3`.
///
/// Integral quantities render without a decimal point. No quantity means no
/// display text, even when a unit is known.
#[must_use]
pub fn format_quantity_raw(quantity: Option<f64>, unit_name: Option<&str>) -> Option<String> {
    let quantity = quantity?;
    let rendered = if quantity.fract() == 0.0 {
        format!("{quantity:.0}")
    } else {
        format!("{quantity}")
    };
    Some(match unit_name {
        Some(unit) => format!("{rendered} {unit}"),
        None => rendered,
    })
}

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "complete" => Ok(Self::Complete),
            _ => Err(ParseEnumError {
                expected: "status",
                got: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Context, DisplayHint, PrepItem, PrepItemPatch, PrepItemRecord, PrepItemRow, Status,
        format_quantity_raw,
    };
    use chrono::{NaiveDate, TimeZone, Utc};
    use proptest::prelude::*;
    use std::str::FromStr;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::from_str(s).expect("valid date")
    }

    fn sample_row(id: &str) -> PrepItemRow {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).single().expect("valid ts");
        PrepItemRow {
            id: id.to_string(),
            station_id: "s1".to_string(),
            shift_id: "sh1".to_string(),
            shift_date: date("2024-03-01"),
            kitchen_item_id: "i1".to_string(),
            unit_id: Some("u1".to_string()),
            quantity: Some(2.0),
            quantity_raw: Some("2 lbs".to_string()),
            status: Status::Pending,
            status_changed_at: ts,
            status_changed_by_user: None,
            created_by_user: Some("cook-1".to_string()),
            created_at: ts,
            updated_at: ts,
        }
    }

    // === Status ===

    #[test]
    fn status_cycle_is_total() {
        assert_eq!(Status::Pending.next(), Status::InProgress);
        assert_eq!(Status::InProgress.next(), Status::Complete);
        assert_eq!(Status::Complete.next(), Status::Pending);
    }

    #[test]
    fn status_wire_forms_are_snake_case() {
        assert_eq!(serde_json::to_string(&Status::Pending).expect("serialize"), "\"pending\"");
        assert_eq!(
            serde_json::to_string(&Status::InProgress).expect("serialize"),
            "\"in_progress\""
        );
        assert_eq!(
            serde_json::to_string(&Status::Complete).expect("serialize"),
            "\"complete\""
        );
        assert_eq!(
            serde_json::from_str::<Status>("\"in_progress\"").expect("deserialize"),
            Status::InProgress
        );
    }

    #[test]
    fn status_display_parse_roundtrips() {
        for status in [Status::Pending, Status::InProgress, Status::Complete] {
            let rendered = status.to_string();
            assert_eq!(Status::from_str(&rendered).expect("reparse"), status);
        }
        assert!(Status::from_str("done").is_err());
    }

    proptest! {
        #[test]
        fn three_cycles_return_to_start(start in prop_oneof![
            Just(Status::Pending),
            Just(Status::InProgress),
            Just(Status::Complete),
        ]) {
            prop_assert_eq!(start.next().next().next(), start);
            prop_assert_ne!(start.next(), start);
            prop_assert_ne!(start.next().next(), start);
        }
    }

    // === Context ===

    #[test]
    fn context_equality_is_field_wise() {
        let a = Context::new("s1", date("2024-03-01"), "sh1");
        assert_eq!(a, Context::new("s1", date("2024-03-01"), "sh1"));
        assert_ne!(a, Context::new("s2", date("2024-03-01"), "sh1"));
        assert_ne!(a, Context::new("s1", date("2024-03-02"), "sh1"));
        assert_ne!(a, Context::new("s1", date("2024-03-01"), "sh2"));
    }

    // === Row serialization ===

    #[test]
    fn row_field_names_match_the_persisted_schema() {
        let value = serde_json::to_value(sample_row("r1")).expect("serialize");
        let object = value.as_object().expect("object");
        for field in [
            "id",
            "station_id",
            "shift_id",
            "shift_date",
            "kitchen_item_id",
            "unit_id",
            "quantity",
            "quantity_raw",
            "status",
            "status_changed_at",
            "status_changed_by_user",
            "created_by_user",
            "created_at",
            "updated_at",
        ] {
            assert!(object.contains_key(field), "missing field {field}");
        }
        assert_eq!(object["status"], "pending");
        assert_eq!(object["shift_date"], "2024-03-01");
    }

    #[test]
    fn record_flattens_row_fields() {
        let record = PrepItemRecord {
            row: sample_row("r1"),
            item_name: Some("Dice onions".to_string()),
            unit_name: None,
        };
        let value = serde_json::to_value(record).expect("serialize");
        assert_eq!(value["id"], "r1");
        assert_eq!(value["item_name"], "Dice onions");
    }

    // === Display resolution ===

    #[test]
    fn from_record_prefers_joined_names() {
        let record = PrepItemRecord {
            row: sample_row("r1"),
            item_name: Some("Dice onions".to_string()),
            unit_name: Some("lbs".to_string()),
        };
        let hint = DisplayHint {
            description: Some("stale hint".to_string()),
            unit_name: Some("qt".to_string()),
        };
        let item = PrepItem::from_record(record, Some(&hint), "(unnamed item)");
        assert_eq!(item.description, "Dice onions");
        assert_eq!(item.unit_name.as_deref(), Some("lbs"));
    }

    #[test]
    fn from_record_falls_back_to_hint_then_placeholder() {
        let record = PrepItemRecord {
            row: sample_row("r1"),
            item_name: None,
            unit_name: None,
        };
        let hint = DisplayHint::description("Dice onions");
        let item = PrepItem::from_record(record.clone(), Some(&hint), "(unnamed item)");
        assert_eq!(item.description, "Dice onions");

        let bare = PrepItem::from_record(record, None, "(unnamed item)");
        assert_eq!(bare.description, "(unnamed item)");
        assert_eq!(bare.unit_name, None);
    }

    // === Patch ===

    #[test]
    fn patch_applies_only_set_fields() {
        let mut item = PrepItem::from_record(
            PrepItemRecord {
                row: sample_row("r1"),
                item_name: Some("Dice onions".to_string()),
                unit_name: Some("lbs".to_string()),
            },
            None,
            "(unnamed item)",
        );
        let patch = PrepItemPatch {
            quantity: Some(Some(10.0)),
            ..PrepItemPatch::default()
        };
        patch.apply_to_item(&mut item);
        assert_eq!(item.quantity, Some(10.0));
        assert_eq!(item.status, Status::Pending);
        assert_eq!(item.description, "Dice onions");
    }

    #[test]
    fn clearing_unit_id_clears_the_resolved_name() {
        let mut item = PrepItem::from_record(
            PrepItemRecord {
                row: sample_row("r1"),
                item_name: None,
                unit_name: Some("lbs".to_string()),
            },
            None,
            "(unnamed item)",
        );
        let patch = PrepItemPatch {
            unit_id: Some(None),
            ..PrepItemPatch::default()
        };
        patch.apply_to_item(&mut item);
        assert_eq!(item.unit_id, None);
        assert_eq!(item.unit_name, None);
    }

    #[test]
    fn patch_serializes_only_set_columns() {
        let patch = PrepItemPatch {
            status: Some(Status::Complete),
            quantity: Some(None),
            ..PrepItemPatch::default()
        };
        let value = serde_json::to_value(patch).expect("serialize");
        let object = value.as_object().expect("object");
        assert_eq!(object.len(), 2);
        assert_eq!(object["status"], "complete");
        assert!(object["quantity"].is_null());
    }

    // === Quantity display ===

    #[test]
    fn quantity_raw_formats_integers_and_fractions() {
        assert_eq!(format_quantity_raw(Some(2.0), Some("lbs")), Some("2 lbs".to_string()));
        assert_eq!(format_quantity_raw(Some(0.5), Some("qt")), Some("0.5 qt".to_string()));
        assert_eq!(format_quantity_raw(Some(3.0), None), Some("3".to_string()));
        assert_eq!(format_quantity_raw(None, Some("lbs")), None);
    }
}
