//! In-memory gateway for tests and simulation.
//!
//! Implements the full [`PrepGateway`] contract over in-process tables with
//! server-side UUID assignment and joined read-backs, plus the
//! instrumentation the test suite leans on: scripted per-operation
//! failures, a pause gate that holds every call until released, and
//! per-operation call counters.

use crate::error::GatewayError;
use crate::gateway::{ChangeNotice, ChangeOp, PrepGateway};
use crate::model::{
    Context, KitchenItem, NewDismissal, NewPrepItem, PrepItemPatch, PrepItemRecord, PrepItemRow,
    SuggestionRow, Unit,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

/// The operations the gateway instruments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOp {
    ListPrepItems,
    InsertPrepItem,
    UpdatePrepItem,
    DeletePrepItem,
    ListSuggestions,
    ListUnits,
    FindKitchenItem,
    CreateKitchenItem,
    InsertDismissal,
}

/// Started/completed tallies for one operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpCount {
    /// Calls that entered the gateway, including ones still held at the
    /// pause gate.
    pub started: u64,
    /// Calls that resolved, successfully or not.
    pub completed: u64,
}

#[derive(Default)]
struct Tables {
    prep_items: Vec<PrepItemRow>,
    units: HashMap<String, Vec<Unit>>,
    kitchen_items: Vec<KitchenItem>,
    suggestions: HashMap<Context, Vec<SuggestionRow>>,
    dismissals: Vec<NewDismissal>,
}

impl Tables {
    fn item_name(&self, kitchen_item_id: &str) -> Option<String> {
        self.kitchen_items
            .iter()
            .find(|item| item.id == kitchen_item_id)
            .map(|item| item.name.clone())
    }

    fn unit_name(&self, unit_id: Option<&str>) -> Option<String> {
        let unit_id = unit_id?;
        self.units
            .values()
            .flatten()
            .find(|unit| unit.id == unit_id)
            .map(|unit| unit.name.clone())
    }

    fn record(&self, row: PrepItemRow) -> PrepItemRecord {
        let item_name = self.item_name(&row.kitchen_item_id);
        let unit_name = self.unit_name(row.unit_id.as_deref());
        PrepItemRecord {
            row,
            item_name,
            unit_name,
        }
    }
}

/// Instrumented in-memory [`PrepGateway`].
pub struct InMemoryGateway {
    tables: Mutex<Tables>,
    failures: Mutex<HashMap<GatewayOp, VecDeque<GatewayError>>>,
    counters: Mutex<HashMap<GatewayOp, OpCount>>,
    paused: watch::Sender<bool>,
    changes: broadcast::Sender<ChangeNotice>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGateway {
    #[must_use]
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        let (changes, _) = broadcast::channel(64);
        Self {
            tables: Mutex::new(Tables::default()),
            failures: Mutex::new(HashMap::new()),
            counters: Mutex::new(HashMap::new()),
            paused,
            changes,
        }
    }

    // ── Test instrumentation ────────────────────────────────────────────

    /// Script the next call to `op` to fail with `error`. Repeated calls
    /// queue up: one scripted failure per call, consumed in order.
    pub fn fail_next(&self, op: GatewayOp, error: GatewayError) {
        lock(&self.failures).entry(op).or_default().push_back(error);
    }

    /// Hold every subsequent call at the gate until [`resume`](Self::resume).
    /// Calls already past the gate run to completion.
    pub fn pause(&self) {
        // send_replace stores even with no receiver subscribed yet; plain
        // send would drop the value while nothing waits at the gate.
        self.paused.send_replace(true);
    }

    /// Release calls held at the gate.
    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    #[must_use]
    pub fn op_count(&self, op: GatewayOp) -> OpCount {
        lock(&self.counters).get(&op).copied().unwrap_or_default()
    }

    /// Calls that entered the gateway across all operations.
    #[must_use]
    pub fn total_started(&self) -> u64 {
        lock(&self.counters).values().map(|count| count.started).sum()
    }

    // ── Seeding and direct table access ─────────────────────────────────

    pub fn seed_unit(&self, kitchen_id: &str, unit: Unit) {
        lock(&self.tables)
            .units
            .entry(kitchen_id.to_string())
            .or_default()
            .push(unit);
    }

    pub fn seed_kitchen_item(&self, item: KitchenItem) {
        lock(&self.tables).kitchen_items.push(item);
    }

    pub fn seed_suggestions(&self, scope: Context, rows: Vec<SuggestionRow>) {
        lock(&self.tables).suggestions.insert(scope, rows);
    }

    /// Insert a row directly, bypassing instrumentation. For fixtures.
    pub fn seed_prep_item(&self, row: PrepItemRow) {
        lock(&self.tables).prep_items.push(row);
    }

    /// Rows currently persisted for `context`, in creation order.
    #[must_use]
    pub fn prep_item_rows(&self, context: &Context) -> Vec<PrepItemRow> {
        let mut rows: Vec<PrepItemRow> = {
            let tables = lock(&self.tables);
            tables
                .prep_items
                .iter()
                .filter(|row| Self::matches(row, context))
                .cloned()
                .collect()
        };
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        rows
    }

    #[must_use]
    pub fn dismissals(&self) -> Vec<NewDismissal> {
        lock(&self.tables).dismissals.clone()
    }

    #[must_use]
    pub fn kitchen_items(&self) -> Vec<KitchenItem> {
        lock(&self.tables).kitchen_items.clone()
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn matches(row: &PrepItemRow, context: &Context) -> bool {
        row.station_id == context.station_id
            && row.shift_id == context.shift_id
            && row.shift_date == context.shift_date
    }

    /// Count the call, wait out the pause gate, then consume a scripted
    /// failure if one is queued.
    async fn admit(&self, op: GatewayOp) -> Result<(), GatewayError> {
        lock(&self.counters).entry(op).or_default().started += 1;

        let mut gate = self.paused.subscribe();
        // The sender lives in self, so the gate cannot close underneath us.
        let _ = gate.wait_for(|paused| !*paused).await;

        let scripted = lock(&self.failures).get_mut(&op).and_then(VecDeque::pop_front);
        if let Some(error) = scripted {
            self.finish(op);
            return Err(error);
        }
        Ok(())
    }

    fn finish(&self, op: GatewayOp) {
        lock(&self.counters).entry(op).or_default().completed += 1;
    }

    fn notify(&self, op: ChangeOp, row_id: String) {
        let _ = self.changes.send(ChangeNotice { op, row_id });
    }
}

#[async_trait]
impl PrepGateway for InMemoryGateway {
    async fn list_prep_items(
        &self,
        context: &Context,
    ) -> Result<Vec<PrepItemRecord>, GatewayError> {
        self.admit(GatewayOp::ListPrepItems).await?;
        let records = {
            let tables = lock(&self.tables);
            let mut rows: Vec<PrepItemRow> = tables
                .prep_items
                .iter()
                .filter(|row| Self::matches(row, context))
                .cloned()
                .collect();
            // Stable sort: rows created in the same instant keep insertion
            // order.
            rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            rows.into_iter().map(|row| tables.record(row)).collect()
        };
        self.finish(GatewayOp::ListPrepItems);
        Ok(records)
    }

    async fn insert_prep_item(&self, new: NewPrepItem) -> Result<PrepItemRecord, GatewayError> {
        self.admit(GatewayOp::InsertPrepItem).await?;
        let record = {
            let mut tables = lock(&self.tables);
            let now = Utc::now();
            let row = PrepItemRow {
                id: Uuid::new_v4().to_string(),
                station_id: new.station_id,
                shift_id: new.shift_id,
                shift_date: new.shift_date,
                kitchen_item_id: new.kitchen_item_id,
                unit_id: new.unit_id,
                quantity: new.quantity,
                quantity_raw: new.quantity_raw,
                status: new.status,
                status_changed_at: now,
                status_changed_by_user: None,
                created_by_user: new.created_by_user,
                created_at: now,
                updated_at: now,
            };
            tables.prep_items.push(row.clone());
            tables.record(row)
        };
        self.finish(GatewayOp::InsertPrepItem);
        self.notify(ChangeOp::Insert, record.row.id.clone());
        Ok(record)
    }

    async fn update_prep_item(&self, id: &str, patch: &PrepItemPatch) -> Result<(), GatewayError> {
        self.admit(GatewayOp::UpdatePrepItem).await?;
        // Zero affected rows is a success, not an error.
        let mut updated = false;
        {
            let mut tables = lock(&self.tables);
            if let Some(row) = tables.prep_items.iter_mut().find(|row| row.id == id) {
                patch.apply_to_row(row);
                row.updated_at = Utc::now();
                updated = true;
            }
        }
        self.finish(GatewayOp::UpdatePrepItem);
        if updated {
            self.notify(ChangeOp::Update, id.to_string());
        }
        Ok(())
    }

    async fn delete_prep_item(&self, id: &str) -> Result<(), GatewayError> {
        self.admit(GatewayOp::DeletePrepItem).await?;
        let removed = {
            let mut tables = lock(&self.tables);
            let before = tables.prep_items.len();
            tables.prep_items.retain(|row| row.id != id);
            tables.prep_items.len() < before
        };
        self.finish(GatewayOp::DeletePrepItem);
        if removed {
            self.notify(ChangeOp::Delete, id.to_string());
        }
        Ok(())
    }

    async fn list_suggestions(
        &self,
        scope: Option<&Context>,
        limit: usize,
    ) -> Result<Vec<SuggestionRow>, GatewayError> {
        self.admit(GatewayOp::ListSuggestions).await?;
        let rows = match scope {
            Some(scope) if limit > 0 => {
                let mut rows = lock(&self.tables)
                    .suggestions
                    .get(scope)
                    .cloned()
                    .unwrap_or_default();
                rows.truncate(limit);
                rows
            }
            _ => Vec::new(),
        };
        self.finish(GatewayOp::ListSuggestions);
        Ok(rows)
    }

    async fn list_units(&self, kitchen_id: &str) -> Result<Vec<Unit>, GatewayError> {
        self.admit(GatewayOp::ListUnits).await?;
        let units = lock(&self.tables)
            .units
            .get(kitchen_id)
            .cloned()
            .unwrap_or_default();
        self.finish(GatewayOp::ListUnits);
        Ok(units)
    }

    async fn find_kitchen_item(
        &self,
        kitchen_id: &str,
        name: &str,
    ) -> Result<Option<KitchenItem>, GatewayError> {
        self.admit(GatewayOp::FindKitchenItem).await?;
        let found = lock(&self.tables)
            .kitchen_items
            .iter()
            .find(|item| item.kitchen_id == kitchen_id && item.name.eq_ignore_ascii_case(name))
            .cloned();
        self.finish(GatewayOp::FindKitchenItem);
        Ok(found)
    }

    async fn create_kitchen_item(
        &self,
        kitchen_id: &str,
        name: &str,
    ) -> Result<KitchenItem, GatewayError> {
        self.admit(GatewayOp::CreateKitchenItem).await?;
        let item = KitchenItem {
            id: Uuid::new_v4().to_string(),
            kitchen_id: kitchen_id.to_string(),
            name: name.to_string(),
        };
        lock(&self.tables).kitchen_items.push(item.clone());
        self.finish(GatewayOp::CreateKitchenItem);
        Ok(item)
    }

    async fn insert_dismissal(&self, dismissal: &NewDismissal) -> Result<(), GatewayError> {
        self.admit(GatewayOp::InsertDismissal).await?;
        lock(&self.tables).dismissals.push(dismissal.clone());
        self.finish(GatewayOp::InsertDismissal);
        Ok(())
    }

    fn subscribe_prep_items(&self) -> broadcast::Receiver<ChangeNotice> {
        self.changes.subscribe()
    }
}
