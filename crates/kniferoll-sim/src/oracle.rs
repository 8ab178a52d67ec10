//! Invariant checks for a settled scenario.
//!
//! After a run heals the gateway and reconciles once, the store snapshot
//! must agree with the gateway's table. [`SyncOracle`] verifies that
//! agreement and reports every violation it finds rather than stopping at
//! the first.

#![allow(clippy::missing_const_for_fn)]

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use kniferoll_core::model::{PrepItem, PrepItemRow};
use kniferoll_core::store::PrepState;
use kniferoll_core::temp_id;

// ── Results ─────────────────────────────────────────────────────────────

/// Outcome of one check, or of [`SyncOracle::check_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleResult {
    pub passed: bool,
    pub violations: Vec<InvariantViolation>,
}

impl OracleResult {
    #[must_use]
    fn pass() -> Self {
        Self {
            passed: true,
            violations: Vec::new(),
        }
    }

    #[must_use]
    fn from_violations(violations: Vec<InvariantViolation>) -> Self {
        Self {
            passed: violations.is_empty(),
            violations,
        }
    }

    #[must_use]
    fn merge(mut self, other: Self) -> Self {
        self.passed = self.passed && other.passed;
        self.violations.extend(other.violations);
        self
    }
}

/// A single way the snapshot and the gateway table disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// The two sides hold different id sets.
    Divergence {
        only_in_store: Vec<String>,
        only_in_gateway: Vec<String>,
    },
    /// A shared row carries different field values on each side.
    FieldDrift {
        id: String,
        field: &'static str,
        store_value: String,
        gateway_value: String,
    },
    /// The snapshot lists items in a different order than the gateway.
    OrderDrift {
        position: usize,
        store_id: String,
        gateway_id: String,
    },
    /// A `temp-` id survived the reconciling load.
    ProvisionalId { id: String },
    /// An id appears more than once in the snapshot.
    DuplicateId { id: String, count: usize },
    /// A loading flag or error banner outlived the run.
    UnsettledState { detail: String },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Divergence {
                only_in_store,
                only_in_gateway,
            } => write!(
                f,
                "divergence: only_in_store={only_in_store:?}, only_in_gateway={only_in_gateway:?}"
            ),
            Self::FieldDrift {
                id,
                field,
                store_value,
                gateway_value,
            } => write!(
                f,
                "field drift on {id}: {field} is {store_value} locally but {gateway_value} at the gateway"
            ),
            Self::OrderDrift {
                position,
                store_id,
                gateway_id,
            } => write!(
                f,
                "order drift at position {position}: store shows {store_id}, gateway order has {gateway_id}"
            ),
            Self::ProvisionalId { id } => {
                write!(f, "provisional id {id} survived quiescence")
            }
            Self::DuplicateId { id, count } => {
                write!(f, "id {id} appears {count} times")
            }
            Self::UnsettledState { detail } => {
                write!(f, "unsettled state after reconciliation: {detail}")
            }
        }
    }
}

// ── Checks ──────────────────────────────────────────────────────────────

/// Invariant checks for the reconciled store.
///
/// 1. Membership: store and gateway hold the same item ids.
/// 2. Field agreement: shared rows carry the same persisted fields.
/// 3. Order: items appear in the gateway's `created_at` order.
/// 4. No provisional ids: every `temp-` id was reconciled away.
/// 5. Unique ids: no id appears twice in the snapshot.
/// 6. Settled state: no loading flag or error banner remains.
pub struct SyncOracle;

impl SyncOracle {
    /// Both sides hold exactly the same item ids.
    #[must_use]
    pub fn check_membership(items: &[PrepItem], rows: &[PrepItemRow]) -> OracleResult {
        let store_ids: BTreeSet<&str> = items.iter().map(|item| item.id.as_str()).collect();
        let gateway_ids: BTreeSet<&str> = rows.iter().map(|row| row.id.as_str()).collect();

        let only_in_store: Vec<String> = store_ids
            .difference(&gateway_ids)
            .map(|id| (*id).to_string())
            .collect();
        let only_in_gateway: Vec<String> = gateway_ids
            .difference(&store_ids)
            .map(|id| (*id).to_string())
            .collect();

        if only_in_store.is_empty() && only_in_gateway.is_empty() {
            OracleResult::pass()
        } else {
            OracleResult::from_violations(vec![InvariantViolation::Divergence {
                only_in_store,
                only_in_gateway,
            }])
        }
    }

    /// Shared rows agree on every persisted field the stores mutate.
    #[must_use]
    pub fn check_fields(items: &[PrepItem], rows: &[PrepItemRow]) -> OracleResult {
        let by_id: BTreeMap<&str, &PrepItemRow> =
            rows.iter().map(|row| (row.id.as_str(), row)).collect();

        let mut violations = Vec::new();
        for item in items {
            // The membership check owns missing rows.
            let Some(row) = by_id.get(item.id.as_str()) else {
                continue;
            };

            if item.status != row.status {
                violations.push(Self::drift(
                    &item.id,
                    "status",
                    format!("{:?}", item.status),
                    format!("{:?}", row.status),
                ));
            }
            // Quantities are copied verbatim, never recomputed, so bit
            // equality is the right test.
            if item.quantity.map(f64::to_bits) != row.quantity.map(f64::to_bits) {
                violations.push(Self::drift(
                    &item.id,
                    "quantity",
                    format!("{:?}", item.quantity),
                    format!("{:?}", row.quantity),
                ));
            }
            if item.unit_id != row.unit_id {
                violations.push(Self::drift(
                    &item.id,
                    "unit_id",
                    format!("{:?}", item.unit_id),
                    format!("{:?}", row.unit_id),
                ));
            }
            if item.quantity_raw != row.quantity_raw {
                violations.push(Self::drift(
                    &item.id,
                    "quantity_raw",
                    format!("{:?}", item.quantity_raw),
                    format!("{:?}", row.quantity_raw),
                ));
            }
            if item.status_changed_by_user != row.status_changed_by_user {
                violations.push(Self::drift(
                    &item.id,
                    "status_changed_by_user",
                    format!("{:?}", item.status_changed_by_user),
                    format!("{:?}", row.status_changed_by_user),
                ));
            }
        }

        OracleResult::from_violations(violations)
    }

    /// The snapshot lists items in the gateway's `created_at` order.
    ///
    /// Skipped while membership differs: comparing positions of two
    /// different id sets would only repeat the divergence.
    #[must_use]
    pub fn check_order(items: &[PrepItem], rows: &[PrepItemRow]) -> OracleResult {
        if !Self::check_membership(items, rows).passed {
            return OracleResult::pass();
        }

        let mut violations = Vec::new();
        for (position, (item, row)) in items.iter().zip(rows).enumerate() {
            if item.id != row.id {
                violations.push(InvariantViolation::OrderDrift {
                    position,
                    store_id: item.id.clone(),
                    gateway_id: row.id.clone(),
                });
            }
        }

        OracleResult::from_violations(violations)
    }

    /// Every provisional id was replaced by a server id.
    #[must_use]
    pub fn check_provisional_ids(items: &[PrepItem]) -> OracleResult {
        let violations = items
            .iter()
            .filter(|item| temp_id::is_temp_id(&item.id))
            .map(|item| InvariantViolation::ProvisionalId {
                id: item.id.clone(),
            })
            .collect();
        OracleResult::from_violations(violations)
    }

    /// No id appears twice in the snapshot.
    #[must_use]
    pub fn check_unique_ids(items: &[PrepItem]) -> OracleResult {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for item in items {
            *counts.entry(item.id.as_str()).or_insert(0) += 1;
        }

        let violations = counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(id, count)| InvariantViolation::DuplicateId {
                id: id.to_string(),
                count,
            })
            .collect();
        OracleResult::from_violations(violations)
    }

    /// No loading flag or error banner survived the run.
    #[must_use]
    pub fn check_settled(state: &PrepState) -> OracleResult {
        let mut violations = Vec::new();
        if state.is_initial_loading {
            violations.push(InvariantViolation::UnsettledState {
                detail: "is_initial_loading still set".to_string(),
            });
        }
        if state.is_refetching {
            violations.push(InvariantViolation::UnsettledState {
                detail: "is_refetching still set".to_string(),
            });
        }
        if let Some(error) = &state.error {
            violations.push(InvariantViolation::UnsettledState {
                detail: format!("error banner still set: {error}"),
            });
        }
        OracleResult::from_violations(violations)
    }

    /// Run every check and collect all violations.
    #[must_use]
    pub fn check_all(state: &PrepState, rows: &[PrepItemRow]) -> OracleResult {
        Self::check_membership(&state.items, rows)
            .merge(Self::check_fields(&state.items, rows))
            .merge(Self::check_order(&state.items, rows))
            .merge(Self::check_provisional_ids(&state.items))
            .merge(Self::check_unique_ids(&state.items))
            .merge(Self::check_settled(state))
    }

    fn drift(
        id: &str,
        field: &'static str,
        store_value: String,
        gateway_value: String,
    ) -> InvariantViolation {
        InvariantViolation::FieldDrift {
            id: id.to_string(),
            field,
            store_value,
            gateway_value,
        }
    }
}
