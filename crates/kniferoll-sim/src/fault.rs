//! Fault injection around the gateway.
//!
//! [`FlakyGateway`] wraps any [`PrepGateway`] and fails a configured share
//! of calls before they reach the inner adapter, so the stores' rollback
//! paths run under load. Every decision comes from a seeded
//! [`DeterministicRng`]: one seed, one fault pattern for a given call
//! sequence.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use kniferoll_core::error::GatewayError;
use kniferoll_core::gateway::{ChangeNotice, PrepGateway};
use kniferoll_core::model::{
    Context, KitchenItem, NewDismissal, NewPrepItem, PrepItemPatch, PrepItemRecord, SuggestionRow,
    Unit,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::rng::DeterministicRng;

/// Failure rate per operation class, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultConfig {
    /// Share of `insert_prep_item` calls that fail.
    pub insert_fail_percent: u8,
    /// Share of `update_prep_item` calls that fail.
    pub update_fail_percent: u8,
    /// Share of `delete_prep_item` calls that fail.
    pub delete_fail_percent: u8,
    /// Share of `list_prep_items` calls that fail.
    pub load_fail_percent: u8,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            insert_fail_percent: 10,
            update_fail_percent: 10,
            delete_fail_percent: 10,
            load_fail_percent: 5,
        }
    }
}

impl FaultConfig {
    /// No faults at all.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            insert_fail_percent: 0,
            update_fail_percent: 0,
            delete_fail_percent: 0,
            load_fail_percent: 0,
        }
    }
}

/// A [`PrepGateway`] decorator that injects failures at configured rates.
///
/// Prep-item mutations and the prep-item list roll the dice before the
/// inner gateway is consulted; a hit returns an error and the inner call
/// never happens. Catalog reads, suggestion queries, and dismissals pass
/// through untouched. Rates can be swapped mid-run to stage calm and
/// stormy phases.
pub struct FlakyGateway<G> {
    inner: G,
    fault: Mutex<FaultConfig>,
    rng: Mutex<DeterministicRng>,
    injected: AtomicU64,
}

impl<G> FlakyGateway<G> {
    #[must_use]
    pub fn new(inner: G, fault: FaultConfig, seed: u64) -> Self {
        Self {
            inner,
            fault: Mutex::new(fault),
            rng: Mutex::new(DeterministicRng::new(seed)),
            injected: AtomicU64::new(0),
        }
    }

    /// The wrapped gateway.
    #[must_use]
    pub const fn inner(&self) -> &G {
        &self.inner
    }

    /// Replace the failure rates. Takes effect on the next call.
    pub fn set_fault_config(&self, fault: FaultConfig) {
        *lock(&self.fault) = fault;
    }

    /// Faults injected so far.
    #[must_use]
    pub fn faults_injected(&self) -> u64 {
        self.injected.load(Ordering::SeqCst)
    }

    /// Roll the dice for one call. Injected failures alternate between a
    /// transport outage and a server rejection so both store error paths
    /// see traffic.
    fn roll(&self, pick: fn(&FaultConfig) -> u8) -> Result<(), GatewayError> {
        let percent = pick(&lock(&self.fault));
        if !lock(&self.rng).hit_rate_percent(percent) {
            return Ok(());
        }

        let ordinal = self.injected.fetch_add(1, Ordering::SeqCst) + 1;
        if ordinal % 2 == 0 {
            Err(GatewayError::Rejected(format!(
                "injected rejection #{ordinal}"
            )))
        } else {
            Err(GatewayError::Network(format!("injected outage #{ordinal}")))
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl<G: PrepGateway> PrepGateway for FlakyGateway<G> {
    async fn list_prep_items(
        &self,
        context: &Context,
    ) -> Result<Vec<PrepItemRecord>, GatewayError> {
        self.roll(|fault| fault.load_fail_percent)?;
        self.inner.list_prep_items(context).await
    }

    async fn insert_prep_item(&self, new: NewPrepItem) -> Result<PrepItemRecord, GatewayError> {
        self.roll(|fault| fault.insert_fail_percent)?;
        self.inner.insert_prep_item(new).await
    }

    async fn update_prep_item(&self, id: &str, patch: &PrepItemPatch) -> Result<(), GatewayError> {
        self.roll(|fault| fault.update_fail_percent)?;
        self.inner.update_prep_item(id, patch).await
    }

    async fn delete_prep_item(&self, id: &str) -> Result<(), GatewayError> {
        self.roll(|fault| fault.delete_fail_percent)?;
        self.inner.delete_prep_item(id).await
    }

    async fn list_suggestions(
        &self,
        scope: Option<&Context>,
        limit: usize,
    ) -> Result<Vec<SuggestionRow>, GatewayError> {
        self.inner.list_suggestions(scope, limit).await
    }

    async fn list_units(&self, kitchen_id: &str) -> Result<Vec<Unit>, GatewayError> {
        self.inner.list_units(kitchen_id).await
    }

    async fn find_kitchen_item(
        &self,
        kitchen_id: &str,
        name: &str,
    ) -> Result<Option<KitchenItem>, GatewayError> {
        self.inner.find_kitchen_item(kitchen_id, name).await
    }

    async fn create_kitchen_item(
        &self,
        kitchen_id: &str,
        name: &str,
    ) -> Result<KitchenItem, GatewayError> {
        self.inner.create_kitchen_item(kitchen_id, name).await
    }

    async fn insert_dismissal(&self, dismissal: &NewDismissal) -> Result<(), GatewayError> {
        self.inner.insert_dismissal(dismissal).await
    }

    fn subscribe_prep_items(&self) -> broadcast::Receiver<ChangeNotice> {
        self.inner.subscribe_prep_items()
    }
}
