//! The per-shift item cache.
//!
//! Holds the prep list for one `(station, date, shift)` context and applies
//! every mutation optimistically: local state changes first, the gateway
//! call follows, and a rejection puts the saved copy back. Loads are
//! guarded by a generation counter so a slow response for an abandoned
//! context can never overwrite a newer one.

#![allow(clippy::module_name_repetitions)]

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::gateway::PrepGateway;
use crate::identity::Identity;
use crate::model::{Context, DisplayHint, ItemDraft, NewPrepItem, PrepItem, PrepItemPatch, Status};
use crate::temp_id::TempIdSource;
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Snapshot of the item cache, published after every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrepState {
    /// Items for the current context, in load order; optimistic inserts
    /// append.
    pub items: Vec<PrepItem>,
    /// True while the first load for a context is in flight and the list
    /// is empty.
    pub is_initial_loading: bool,
    /// True while a refresh for the already-displayed context is in flight.
    pub is_refetching: bool,
    /// Message of the most recent failure, until the next successful load.
    pub error: Option<String>,
    /// The context the cached items belong to.
    pub current_context: Option<Context>,
}

/// Optimistic store for the active shift's prep checklist.
pub struct PrepStore {
    gateway: Arc<dyn PrepGateway>,
    identity: Arc<dyn Identity>,
    config: StoreConfig,
    state: watch::Sender<PrepState>,
    temp_ids: TempIdSource,
    load_generation: AtomicU64,
}

impl PrepStore {
    #[must_use]
    pub fn new(
        gateway: Arc<dyn PrepGateway>,
        identity: Arc<dyn Identity>,
        config: StoreConfig,
    ) -> Self {
        let (state, _) = watch::channel(PrepState::default());
        Self {
            gateway,
            identity,
            config,
            state,
            temp_ids: TempIdSource::default(),
            load_generation: AtomicU64::new(0),
        }
    }

    /// Watch the state. Receivers see every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PrepState> {
        self.state.subscribe()
    }

    /// The current state, by value.
    #[must_use]
    pub fn snapshot(&self) -> PrepState {
        self.state.borrow().clone()
    }

    /// Load the items for `context`.
    ///
    /// Switching contexts clears the list synchronously and raises the
    /// initial-loading flag; reloading the current context keeps the list
    /// on screen and raises the refetching flag instead. A failure leaves
    /// whatever is displayed and records the message; a success replaces
    /// the list and clears any recorded error.
    ///
    /// Only the newest load may publish: responses for superseded loads
    /// are discarded.
    pub async fn load(&self, context: Context) {
        let generation = self.load_generation.fetch_add(1, Ordering::SeqCst) + 1;

        self.publish_if_current(generation, |state| {
            if state.current_context.as_ref() == Some(&context) {
                state.is_refetching = true;
            } else {
                state.items.clear();
                state.is_initial_loading = true;
                state.is_refetching = false;
                state.current_context = Some(context.clone());
            }
        });

        let result = self.gateway.list_prep_items(&context).await;

        // Fast path only; the publish closure re-checks under the sender's
        // lock, where no competitor can slip in between check and write.
        if self.load_generation.load(Ordering::SeqCst) != generation {
            debug!("discarding prep item load superseded by a newer one");
            return;
        }

        match result {
            Ok(records) => {
                let placeholder = self.config.placeholder_description.clone();
                let items: Vec<PrepItem> = records
                    .into_iter()
                    .map(|record| PrepItem::from_record(record, None, &placeholder))
                    .collect();
                let published = self.publish_if_current(generation, |state| {
                    state.items = items;
                    state.is_initial_loading = false;
                    state.is_refetching = false;
                    state.error = None;
                });
                if !published {
                    debug!("discarding prep item load superseded by a newer one");
                }
            }
            Err(error) => {
                warn!("prep item load failed: {error}");
                let message = error.to_string();
                self.publish_if_current(generation, |state| {
                    state.is_initial_loading = false;
                    state.is_refetching = false;
                    state.error = Some(message);
                });
            }
        }
    }

    /// Add an item optimistically.
    ///
    /// The item appears at the end of the list immediately under a `temp-`
    /// ID and is swapped for the server row in place on confirmation. The
    /// returned ID is the server's.
    ///
    /// # Errors
    ///
    /// [`StoreError::Gateway`] when the insert is rejected; the optimistic
    /// item is removed again.
    pub async fn add(&self, draft: ItemDraft, hint: DisplayHint) -> Result<String, StoreError> {
        let temp_id = self.temp_ids.mint();
        let created_by_user = self.identity.current_user_id();
        let now = Utc::now();
        let placeholder = self.config.placeholder_description.clone();

        let optimistic = PrepItem {
            id: temp_id.clone(),
            station_id: draft.station_id.clone(),
            shift_id: draft.shift_id.clone(),
            shift_date: draft.shift_date,
            kitchen_item_id: draft.kitchen_item_id.clone(),
            unit_id: draft.unit_id.clone(),
            quantity: draft.quantity,
            quantity_raw: draft.quantity_raw.clone(),
            status: Status::Pending,
            status_changed_at: now,
            status_changed_by_user: None,
            created_by_user: created_by_user.clone(),
            created_at: now,
            updated_at: now,
            description: hint
                .description
                .clone()
                .unwrap_or_else(|| placeholder.clone()),
            unit_name: hint.unit_name.clone(),
        };
        self.state.send_modify(|state| state.items.push(optimistic));

        let result = self
            .gateway
            .insert_prep_item(NewPrepItem::from_draft(draft, created_by_user))
            .await;

        match result {
            Ok(record) => {
                let server_id = record.row.id.clone();
                let confirmed = PrepItem::from_record(record, Some(&hint), &placeholder);
                self.state.send_modify(|state| {
                    // A context switch while the insert was in flight has
                    // already dropped the temp item; do not resurrect it.
                    if let Some(slot) = state.items.iter_mut().find(|item| item.id == temp_id) {
                        *slot = confirmed;
                    }
                });
                Ok(server_id)
            }
            Err(error) => {
                warn!("prep item insert rejected, rolling back: {error}");
                let message = error.to_string();
                self.state.send_modify(|state| {
                    state.items.retain(|item| item.id != temp_id);
                    state.error = Some(message.clone());
                });
                Err(StoreError::Gateway(message))
            }
        }
    }

    /// Advance an item's status along the fixed cycle.
    ///
    /// # Errors
    ///
    /// [`StoreError::ItemNotFound`] when the ID is not in local state; no
    /// gateway call is made. [`StoreError::Gateway`] when the update is
    /// rejected; the item's saved copy is restored.
    pub async fn cycle_status(&self, item_id: &str) -> Result<(), StoreError> {
        let Some(snapshot) = self.find_item(item_id) else {
            return Err(StoreError::ItemNotFound);
        };

        let next = snapshot.status.next();
        let changed_at = Utc::now();
        let changed_by = self.identity.current_user_id();

        self.state.send_modify(|state| {
            if let Some(item) = state.items.iter_mut().find(|item| item.id == item_id) {
                item.status = next;
                item.status_changed_at = changed_at;
                if changed_by.is_some() {
                    item.status_changed_by_user = changed_by.clone();
                }
            }
        });

        let patch = PrepItemPatch {
            status: Some(next),
            status_changed_at: Some(changed_at),
            // Anonymous sessions leave the previous attribution in place.
            status_changed_by_user: changed_by.map(Some),
            ..PrepItemPatch::default()
        };

        match self.gateway.update_prep_item(item_id, &patch).await {
            Ok(()) => Ok(()),
            Err(error) => {
                warn!("status cycle rejected, restoring item {item_id}: {error}");
                self.restore_item(item_id, snapshot, error.to_string());
                Err(error.into())
            }
        }
    }

    /// Apply a partial update to an item.
    ///
    /// The hint supplies display names for fields the patch changes, so the
    /// optimistic item renders correctly before any reload.
    ///
    /// # Errors
    ///
    /// [`StoreError::ItemNotFound`] when the ID is not in local state; no
    /// gateway call is made. [`StoreError::Gateway`] when the update is
    /// rejected; the item's saved copy is restored.
    pub async fn update(
        &self,
        item_id: &str,
        patch: PrepItemPatch,
        hint: DisplayHint,
    ) -> Result<(), StoreError> {
        let Some(snapshot) = self.find_item(item_id) else {
            return Err(StoreError::ItemNotFound);
        };

        self.state.send_modify(|state| {
            if let Some(item) = state.items.iter_mut().find(|item| item.id == item_id) {
                patch.apply_to_item(item);
                if let Some(description) = &hint.description {
                    item.description = description.clone();
                }
                if let Some(unit_name) = &hint.unit_name {
                    item.unit_name = Some(unit_name.clone());
                }
            }
        });

        match self.gateway.update_prep_item(item_id, &patch).await {
            Ok(()) => Ok(()),
            Err(error) => {
                warn!("update rejected, restoring item {item_id}: {error}");
                self.restore_item(item_id, snapshot, error.to_string());
                Err(error.into())
            }
        }
    }

    /// Remove an item optimistically.
    ///
    /// # Errors
    ///
    /// [`StoreError::ItemNotFound`] when the ID is not in local state; no
    /// gateway call is made. [`StoreError::Gateway`] when the delete is
    /// rejected; the removed item is re-appended at the end of the list.
    pub async fn delete(&self, item_id: &str) -> Result<(), StoreError> {
        let Some(snapshot) = self.find_item(item_id) else {
            return Err(StoreError::ItemNotFound);
        };

        self.state
            .send_modify(|state| state.items.retain(|item| item.id != item_id));

        match self.gateway.delete_prep_item(item_id).await {
            Ok(()) => Ok(()),
            Err(error) => {
                warn!("delete rejected, restoring item {item_id}: {error}");
                let message = error.to_string();
                self.state.send_modify(|state| {
                    state.items.push(snapshot);
                    state.error = Some(message);
                });
                Err(error.into())
            }
        }
    }

    /// Reset to the empty state, as on sign-out or kitchen switch.
    ///
    /// Synchronous, and invalidates any in-flight load so its response
    /// cannot repopulate the cache afterwards.
    pub fn clear(&self) {
        self.load_generation.fetch_add(1, Ordering::SeqCst);
        self.state.send_modify(|state| *state = PrepState::default());
    }

    /// Publish only while `generation` is still the newest load. Competitors
    /// bump the counter before they publish and the sender runs closures one
    /// at a time, so a stale write checked here can never land on top of a
    /// newer load's state, even under preemption.
    fn publish_if_current(&self, generation: u64, modify: impl FnOnce(&mut PrepState)) -> bool {
        self.state.send_if_modified(|state| {
            if self.load_generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            modify(state);
            true
        })
    }

    fn find_item(&self, item_id: &str) -> Option<PrepItem> {
        self.state
            .borrow()
            .items
            .iter()
            .find(|item| item.id == item_id)
            .cloned()
    }

    /// Put a saved copy back after a rejected mutation. The item may have
    /// been dropped by a context switch in the meantime; the error is
    /// recorded either way.
    fn restore_item(&self, item_id: &str, snapshot: PrepItem, message: String) {
        self.state.send_modify(|state| {
            if let Some(slot) = state.items.iter_mut().find(|item| item.id == item_id) {
                *slot = snapshot;
            }
            state.error = Some(message);
        });
    }
}
