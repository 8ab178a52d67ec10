//! The remote data gateway contract.
//!
//! The stores treat the hosted backend as a black box behind [`PrepGateway`]:
//! typed reads and writes plus a change-notification feed. The in-memory
//! adapter in [`memory`] backs tests and the simulation harness; a real
//! deployment puts its backend client behind the same trait.

#![allow(clippy::module_name_repetitions)]

pub mod memory;

pub use memory::{GatewayOp, InMemoryGateway};

use crate::error::GatewayError;
use crate::model::{
    Context, KitchenItem, NewDismissal, NewPrepItem, PrepItemPatch, PrepItemRecord, SuggestionRow,
    Unit,
};
use async_trait::async_trait;
use tokio::sync::broadcast;

/// A committed change to the `prep_items` table, published on the realtime
/// feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotice {
    pub op: ChangeOp,
    pub row_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// Typed access to the hosted relational store.
///
/// Every call resolves to a value or a [`GatewayError`]; implementations
/// never panic across this boundary. Updates and deletes of absent rows
/// succeed, matching a backend that reports zero affected rows as success.
#[async_trait]
pub trait PrepGateway: Send + Sync {
    /// All rows matching the context, ordered by `created_at` ascending,
    /// with joined display names where resolvable.
    ///
    /// # Errors
    /// Any gateway failure.
    async fn list_prep_items(&self, context: &Context)
    -> Result<Vec<PrepItemRecord>, GatewayError>;

    /// Insert a row. The response carries the server-assigned fields and a
    /// joined read-back of the display names.
    ///
    /// # Errors
    /// Any gateway failure.
    async fn insert_prep_item(&self, new: NewPrepItem) -> Result<PrepItemRecord, GatewayError>;

    /// Apply a partial update to one row.
    ///
    /// # Errors
    /// Any gateway failure.
    async fn update_prep_item(&self, id: &str, patch: &PrepItemPatch) -> Result<(), GatewayError>;

    /// Delete one row.
    ///
    /// # Errors
    /// Any gateway failure.
    async fn delete_prep_item(&self, id: &str) -> Result<(), GatewayError>;

    /// Usage rows for suggestion ranking. An absent scope or a zero limit
    /// yields no rows; the query is still issued.
    ///
    /// # Errors
    /// Any gateway failure.
    async fn list_suggestions(
        &self,
        scope: Option<&Context>,
        limit: usize,
    ) -> Result<Vec<SuggestionRow>, GatewayError>;

    /// The kitchen's full unit catalog.
    ///
    /// # Errors
    /// Any gateway failure.
    async fn list_units(&self, kitchen_id: &str) -> Result<Vec<Unit>, GatewayError>;

    /// Case-insensitive exact match on a catalog item name.
    ///
    /// # Errors
    /// Any gateway failure.
    async fn find_kitchen_item(
        &self,
        kitchen_id: &str,
        name: &str,
    ) -> Result<Option<KitchenItem>, GatewayError>;

    /// Create a catalog item.
    ///
    /// # Errors
    /// Any gateway failure.
    async fn create_kitchen_item(
        &self,
        kitchen_id: &str,
        name: &str,
    ) -> Result<KitchenItem, GatewayError>;

    /// Persist a suggestion dismissal.
    ///
    /// # Errors
    /// Any gateway failure.
    async fn insert_dismissal(&self, dismissal: &NewDismissal) -> Result<(), GatewayError>;

    /// Subscribe to the `prep_items` change feed. Dropping the receiver
    /// unsubscribes. The stores do not consume this themselves; callers
    /// react to notices by invoking `load` again.
    fn subscribe_prep_items(&self) -> broadcast::Receiver<ChangeNotice>;
}
