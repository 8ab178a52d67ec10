//! Scenario driver: concurrent cooks against one flaky gateway.
//!
//! A scenario seeds a small kitchen, loads the prep list once over a calm
//! gateway, then lets N cook tasks mutate it through [`FlakyGateway`] at
//! the configured fault rates. After the cooks finish, the gateway heals,
//! the store reconciles with one more load, and [`SyncOracle`] compares
//! the snapshot against the gateway's table.

use std::sync::Arc;

use anyhow::{Result, bail};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use kniferoll_core::StoreError;
use kniferoll_core::config::StoreConfig;
use kniferoll_core::gateway::InMemoryGateway;
use kniferoll_core::identity::StaticIdentity;
use kniferoll_core::model::{
    Context, DisplayHint, ItemDraft, KitchenItem, PrepItemPatch, PrepItemRow, Status, Unit,
    format_quantity_raw,
};
use kniferoll_core::store::{AddItemRequest, PrepEntryStore, PrepStore};
use kniferoll_rank::CompositeRanker;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::fault::{FaultConfig, FlakyGateway};
use crate::oracle::SyncOracle;
use crate::rng::DeterministicRng;

const KITCHEN_ID: &str = "kitchen-1";
const COOK_USER: &str = "sim-cook";

const UNITS: [(&str, &str); 3] = [("u-lbs", "lbs"), ("u-qt", "quarts"), ("u-each", "each")];

const CATALOG: [(&str, &str); 5] = [
    ("k-onions", "Diced onions"),
    ("k-stock", "Chicken stock"),
    ("k-mise", "Station mise"),
    ("k-basil", "Chiffonade basil"),
    ("k-aioli", "Garlic aioli"),
];

const QUANTITIES: [f64; 4] = [1.0, 2.0, 4.0, 6.5];

/// Rows present before any cook acts.
const SEEDED_PREP_ROWS: usize = 4;

/// One scenario's shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Pins every cook's decision stream and the fault dice.
    pub seed: u64,
    /// Concurrent cook tasks.
    pub cooks: usize,
    /// Operations each cook attempts.
    pub rounds: u32,
    /// Failure rates during the storm phase.
    pub fault: FaultConfig,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            cooks: 4,
            rounds: 32,
            fault: FaultConfig::default(),
        }
    }
}

impl ScenarioConfig {
    /// # Errors
    ///
    /// Returns an error when the scenario would do no work.
    pub fn validate(&self) -> Result<()> {
        if self.cooks == 0 {
            bail!("cooks must be > 0");
        }
        if self.rounds == 0 {
            bail!("rounds must be > 0");
        }
        Ok(())
    }
}

/// What one run did, and whether the store converged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub config: ScenarioConfig,
    pub ops_attempted: u64,
    pub ops_rejected: u64,
    pub faults_injected: u64,
    pub final_item_count: usize,
    pub passed: bool,
    /// Rendered oracle violations, empty when `passed`.
    pub violations: Vec<String>,
}

#[derive(Debug, Default, Clone, Copy)]
struct CookTally {
    attempted: u64,
    rejected: u64,
}

/// Run one scenario to completion.
///
/// A seed pins every cook's decision stream and the fault dice. Task
/// interleaving stays with the runtime, so a seed fixes the workload
/// but not the schedule; the oracle's invariants hold for any schedule.
///
/// # Errors
///
/// Returns an error for an invalid config or a panicked cook task. An
/// oracle violation is not an error: it comes back in the report.
pub async fn run_scenario(config: &ScenarioConfig) -> Result<ScenarioReport> {
    config.validate()?;

    let gateway = Arc::new(FlakyGateway::new(
        InMemoryGateway::new(),
        FaultConfig::none(),
        config.seed.wrapping_add(0xFA07),
    ));
    let context = service_context();
    seed_kitchen(gateway.inner(), &context);

    // Method-form clone: the owned Arc coerces to Arc<dyn PrepGateway> at
    // the argument, which Arc::clone pinned to the trait object would not.
    let store = Arc::new(PrepStore::new(
        gateway.clone(),
        Arc::new(StaticIdentity::user(COOK_USER)),
        StoreConfig::default(),
    ));
    let entry = Arc::new(PrepEntryStore::new(
        gateway.clone(),
        Arc::new(CompositeRanker::default()),
        StoreConfig::default(),
    ));

    store.load(context.clone()).await;

    gateway.set_fault_config(config.fault);
    info!(
        cooks = config.cooks,
        rounds = config.rounds,
        "storm phase starting"
    );

    let mut handles = Vec::with_capacity(config.cooks);
    for cook in 0..config.cooks {
        handles.push(tokio::spawn(run_cook(
            cook,
            config.seed,
            config.rounds,
            Arc::clone(&store),
            Arc::clone(&entry),
            context.clone(),
        )));
    }

    let mut ops_attempted = 0;
    let mut ops_rejected = 0;
    for handle in handles {
        let tally = handle.await?;
        ops_attempted += tally.attempted;
        ops_rejected += tally.rejected;
    }

    // Heal the gateway, then reconcile once against the settled table.
    gateway.set_fault_config(FaultConfig::none());
    store.load(context.clone()).await;

    let state = store.snapshot();
    let rows = gateway.inner().prep_item_rows(&context);
    let outcome = SyncOracle::check_all(&state, &rows);
    let faults_injected = gateway.faults_injected();

    if outcome.passed {
        info!(
            ops = ops_attempted,
            rejected = ops_rejected,
            faults = faults_injected,
            items = state.items.len(),
            "scenario converged"
        );
    } else {
        warn!(
            violations = outcome.violations.len(),
            "scenario left the store diverged"
        );
    }

    Ok(ScenarioReport {
        config: config.clone(),
        ops_attempted,
        ops_rejected,
        faults_injected,
        final_item_count: state.items.len(),
        passed: outcome.passed,
        violations: outcome
            .violations
            .iter()
            .map(ToString::to_string)
            .collect(),
    })
}

async fn run_cook(
    cook: usize,
    seed: u64,
    rounds: u32,
    store: Arc<PrepStore>,
    entry: Arc<PrepEntryStore>,
    context: Context,
) -> CookTally {
    let cook_seed = seed
        .wrapping_add(u64::try_from(cook).unwrap_or(u64::MAX))
        .wrapping_add(1);
    let mut rng = DeterministicRng::new(cook_seed);
    let mut tally = CookTally::default();

    for _ in 0..rounds {
        tally.attempted += 1;
        let outcome = match rng.next_bounded(100) {
            0..=29 => add_random(&mut rng, &store, &context).await,
            30..=54 => match pick_victim(&mut rng, &store) {
                Some(id) => store.cycle_status(&id).await,
                None => add_random(&mut rng, &store, &context).await,
            },
            55..=69 => match pick_victim(&mut rng, &store) {
                Some(id) => requantify(&mut rng, &store, &id).await,
                None => add_random(&mut rng, &store, &context).await,
            },
            70..=79 => match pick_victim(&mut rng, &store) {
                Some(id) => store.delete(&id).await,
                None => add_random(&mut rng, &store, &context).await,
            },
            80..=89 => {
                store.load(context.clone()).await;
                Ok(())
            }
            _ => compound_add(&mut rng, &entry, &context).await,
        };

        if let Err(error) = outcome {
            tally.rejected += 1;
            debug!("cook {cook} had an operation rejected: {error}");
        }

        // Yield between rounds so cook tasks interleave on a
        // single-threaded runtime.
        tokio::task::yield_now().await;
    }

    tally
}

async fn add_random(
    rng: &mut DeterministicRng,
    store: &PrepStore,
    context: &Context,
) -> Result<(), StoreError> {
    let (kitchen_item_id, name) = *choose(rng, &CATALOG);
    let quantity = *choose(rng, &QUANTITIES);
    let (unit_id, unit_name) = if rng.hit_rate_percent(70) {
        let (id, unit) = *choose(rng, &UNITS);
        (Some(id.to_string()), Some(unit.to_string()))
    } else {
        (None, None)
    };

    let mut draft = ItemDraft::new(
        context.station_id.clone(),
        context.shift_id.clone(),
        context.shift_date,
        kitchen_item_id,
    );
    draft.quantity = Some(quantity);
    draft.quantity_raw = format_quantity_raw(Some(quantity), unit_name.as_deref());
    draft.unit_id = unit_id;

    let hint = DisplayHint {
        description: Some(name.to_string()),
        unit_name,
    };
    store.add(draft, hint).await.map(|_| ())
}

async fn requantify(
    rng: &mut DeterministicRng,
    store: &PrepStore,
    item_id: &str,
) -> Result<(), StoreError> {
    let quantity = *choose(rng, &QUANTITIES);
    let patch = PrepItemPatch {
        quantity: Some(Some(quantity)),
        quantity_raw: Some(format_quantity_raw(Some(quantity), None)),
        ..PrepItemPatch::default()
    };
    store.update(item_id, patch, DisplayHint::default()).await
}

async fn compound_add(
    rng: &mut DeterministicRng,
    entry: &PrepEntryStore,
    context: &Context,
) -> Result<(), StoreError> {
    // One in four compound adds invents a new name, exercising the
    // catalog's create path alongside the find path.
    let description = if rng.hit_rate_percent(25) {
        format!("Family meal tray {}", rng.next_bounded(40))
    } else {
        let (_, name) = *choose(rng, &CATALOG);
        name.to_string()
    };
    let quantity = *choose(rng, &QUANTITIES);

    let request = AddItemRequest {
        kitchen_id: KITCHEN_ID.to_string(),
        station_id: context.station_id.clone(),
        shift_date: context.shift_date,
        shift_id: context.shift_id.clone(),
        description,
        unit_id: None,
        quantity: Some(quantity),
        user_id: COOK_USER.to_string(),
    };
    entry.add_item_with_updates(request).await
}

fn pick_victim(rng: &mut DeterministicRng, store: &PrepStore) -> Option<String> {
    let items = store.snapshot().items;
    let index = rng.pick_index(items.len())?;
    items.get(index).map(|item| item.id.clone())
}

/// Callers pass non-empty tables.
fn choose<'a, T>(rng: &mut DeterministicRng, table: &'a [T]) -> &'a T {
    let index = rng.pick_index(table.len()).unwrap_or(0);
    &table[index]
}

fn service_context() -> Context {
    let shift_date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap_or_default();
    Context::new("station-grill", shift_date, "shift-pm")
}

fn seed_kitchen(gateway: &InMemoryGateway, context: &Context) {
    for (id, name) in UNITS {
        gateway.seed_unit(KITCHEN_ID, Unit::new(id, name));
    }
    for (id, name) in CATALOG {
        gateway.seed_kitchen_item(KitchenItem {
            id: id.to_string(),
            kitchen_id: KITCHEN_ID.to_string(),
            name: name.to_string(),
        });
    }
    for (ordinal, (kitchen_item_id, _)) in CATALOG.iter().take(SEEDED_PREP_ROWS).enumerate() {
        let minute = i64::try_from(ordinal).unwrap_or(0);
        gateway.seed_prep_item(PrepItemRow {
            id: format!("seed-{}", ordinal + 1),
            station_id: context.station_id.clone(),
            shift_id: context.shift_id.clone(),
            shift_date: context.shift_date,
            kitchen_item_id: (*kitchen_item_id).to_string(),
            unit_id: None,
            quantity: None,
            quantity_raw: None,
            status: Status::Pending,
            status_changed_at: seeded_at(minute),
            status_changed_by_user: None,
            created_by_user: Some(COOK_USER.to_string()),
            created_at: seeded_at(minute),
            updated_at: seeded_at(minute),
        });
    }
}

/// Shift morning, one row per minute. Far enough in the past that rows
/// added during a run always sort after the seeds.
fn seeded_at(offset_minutes: i64) -> DateTime<Utc> {
    DateTime::UNIX_EPOCH + Duration::seconds(1_709_272_800 + offset_minutes * 60)
}
