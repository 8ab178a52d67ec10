//! Integration tests for the optimistic item cache.
//!
//! These drive [`PrepStore`] against the instrumented in-memory gateway and
//! cover the paths a shift actually hits:
//! - the add -> cycle -> complete -> delete happy path
//! - optimistic visibility while calls are in flight
//! - rollback on rejected inserts, updates, and deletes
//! - context switches, refetches, and stale-load discarding

use chrono::{NaiveDate, TimeZone, Utc};
use kniferoll_core::config::StoreConfig;
use kniferoll_core::gateway::{GatewayOp, InMemoryGateway};
use kniferoll_core::identity::StaticIdentity;
use kniferoll_core::model::{
    Context, DisplayHint, ItemDraft, KitchenItem, PrepItemPatch, PrepItemRow, Status,
};
use kniferoll_core::store::{PrepState, PrepStore};
use kniferoll_core::temp_id::is_temp_id;
use kniferoll_core::{GatewayError, StoreError};
use std::sync::Arc;

fn shift_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).expect("valid date")
}

fn station_one() -> Context {
    Context::new("station-1", shift_date(), "shift-1")
}

fn station_two() -> Context {
    Context::new("station-2", shift_date(), "shift-1")
}

fn seeded_row(id: &str, quantity: Option<f64>) -> PrepItemRow {
    let ts = Utc
        .with_ymd_and_hms(2024, 3, 1, 8, 0, 0)
        .single()
        .expect("valid timestamp");
    PrepItemRow {
        id: id.to_string(),
        station_id: "station-1".to_string(),
        shift_id: "shift-1".to_string(),
        shift_date: shift_date(),
        kitchen_item_id: "itm-onions".to_string(),
        unit_id: None,
        quantity,
        quantity_raw: None,
        status: Status::Pending,
        status_changed_at: ts,
        status_changed_by_user: Some("cook-2".to_string()),
        created_by_user: Some("cook-2".to_string()),
        created_at: ts,
        updated_at: ts,
    }
}

fn store_as(gateway: &Arc<InMemoryGateway>, identity: StaticIdentity) -> Arc<PrepStore> {
    Arc::new(PrepStore::new(
        gateway.clone(),
        Arc::new(identity),
        StoreConfig::default(),
    ))
}

fn store(gateway: &Arc<InMemoryGateway>) -> Arc<PrepStore> {
    store_as(gateway, StaticIdentity::user("cook-7"))
}

fn onion_draft() -> ItemDraft {
    ItemDraft::new("station-1", "shift-1", shift_date(), "itm-onions")
}

#[tokio::test]
async fn add_cycle_complete_delete_round_trip() {
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.seed_kitchen_item(KitchenItem {
        id: "itm-onions".to_string(),
        kitchen_id: "kitchen-1".to_string(),
        name: "Dice onions".to_string(),
    });
    let store = store(&gateway);
    store.load(station_one()).await;

    let server_id = store
        .add(onion_draft(), DisplayHint::description("Dice onions"))
        .await
        .expect("add");
    assert!(!is_temp_id(&server_id));

    let state = store.snapshot();
    assert_eq!(state.items.len(), 1);
    assert_eq!(state.items[0].id, server_id);
    assert_eq!(state.items[0].description, "Dice onions");
    assert_eq!(state.items[0].status, Status::Pending);

    store.cycle_status(&server_id).await.expect("first cycle");
    assert_eq!(store.snapshot().items[0].status, Status::InProgress);

    store.cycle_status(&server_id).await.expect("second cycle");
    assert_eq!(store.snapshot().items[0].status, Status::Complete);
    assert_eq!(
        gateway.prep_item_rows(&station_one())[0].status,
        Status::Complete
    );

    store.delete(&server_id).await.expect("delete");
    assert!(store.snapshot().items.is_empty());
    assert!(gateway.prep_item_rows(&station_one()).is_empty());
}

#[tokio::test]
async fn added_item_is_visible_under_a_temp_id_before_confirmation() {
    let gateway = Arc::new(InMemoryGateway::new());
    let store = store(&gateway);
    store.load(station_one()).await;

    gateway.pause();
    let pending_add = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            store
                .add(onion_draft(), DisplayHint::description("Dice onions"))
                .await
        })
    };

    let mut watcher = store.subscribe();
    {
        let state = watcher
            .wait_for(|state| state.items.len() == 1)
            .await
            .expect("optimistic item");
        assert!(is_temp_id(&state.items[0].id));
        assert_eq!(state.items[0].description, "Dice onions");
        assert_eq!(state.items[0].status, Status::Pending);
        assert_eq!(state.items[0].created_by_user.as_deref(), Some("cook-7"));
    }

    gateway.resume();
    let server_id = pending_add.await.expect("join").expect("add");

    let state = store.snapshot();
    assert_eq!(state.items.len(), 1);
    assert_eq!(state.items[0].id, server_id);
    // The hint still names the item; the seeded catalog had no entry.
    assert_eq!(state.items[0].description, "Dice onions");
}

#[tokio::test]
async fn rejected_add_removes_the_optimistic_item() {
    let gateway = Arc::new(InMemoryGateway::new());
    let store = store(&gateway);
    store.load(station_one()).await;

    gateway.fail_next(
        GatewayOp::InsertPrepItem,
        GatewayError::Network("connection reset".to_string()),
    );
    let err = store
        .add(onion_draft(), DisplayHint::description("Dice onions"))
        .await
        .expect_err("rejected add");

    assert_eq!(
        err,
        StoreError::Gateway("network error: connection reset".to_string())
    );
    let state = store.snapshot();
    assert!(state.items.is_empty());
    assert_eq!(
        state.error.as_deref(),
        Some("network error: connection reset")
    );
}

#[tokio::test]
async fn rejected_update_restores_the_saved_quantity() {
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.seed_prep_item(seeded_row("row-1", Some(5.0)));
    let store = store(&gateway);
    store.load(station_one()).await;

    gateway.fail_next(
        GatewayOp::UpdatePrepItem,
        GatewayError::Rejected("Update failed".to_string()),
    );
    gateway.pause();

    let pending_update = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            let patch = PrepItemPatch {
                quantity: Some(Some(10.0)),
                ..PrepItemPatch::default()
            };
            store.update("row-1", patch, DisplayHint::default()).await
        })
    };

    // The optimistic value is on display while the call is held.
    let mut watcher = store.subscribe();
    watcher
        .wait_for(|state| state.items[0].quantity == Some(10.0))
        .await
        .expect("optimistic quantity");

    gateway.resume();
    let err = pending_update.await.expect("join").expect_err("rejected");
    assert_eq!(err, StoreError::Gateway("Update failed".to_string()));

    let state = store.snapshot();
    assert_eq!(state.items[0].quantity, Some(5.0));
    assert_eq!(state.error.as_deref(), Some("Update failed"));
}

#[tokio::test]
async fn rejected_cycle_restores_the_full_saved_copy() {
    let gateway = Arc::new(InMemoryGateway::new());
    let mut row = seeded_row("row-1", None);
    row.status = Status::InProgress;
    gateway.seed_prep_item(row);
    let store = store(&gateway);
    store.load(station_one()).await;
    let before = store.snapshot().items[0].clone();

    gateway.fail_next(
        GatewayOp::UpdatePrepItem,
        GatewayError::Rejected("Update failed".to_string()),
    );
    let err = store.cycle_status("row-1").await.expect_err("rejected");
    assert_eq!(err, StoreError::Gateway("Update failed".to_string()));

    let after = store.snapshot().items[0].clone();
    assert_eq!(after.status, Status::InProgress);
    assert_eq!(after.status_changed_at, before.status_changed_at);
    assert_eq!(after.status_changed_by_user.as_deref(), Some("cook-2"));
}

#[tokio::test]
async fn rejected_delete_reappends_the_item_at_the_end() {
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.seed_prep_item(seeded_row("row-a", None));
    gateway.seed_prep_item(seeded_row("row-b", None));
    let store = store(&gateway);
    store.load(station_one()).await;

    gateway.fail_next(
        GatewayOp::DeletePrepItem,
        GatewayError::Rejected("Delete failed".to_string()),
    );
    let err = store.delete("row-a").await.expect_err("rejected");
    assert_eq!(err, StoreError::Gateway("Delete failed".to_string()));

    let ids: Vec<String> = store
        .snapshot()
        .items
        .iter()
        .map(|item| item.id.clone())
        .collect();
    assert_eq!(ids, vec!["row-b".to_string(), "row-a".to_string()]);
    assert_eq!(gateway.prep_item_rows(&station_one()).len(), 2);
}

#[tokio::test]
async fn unknown_ids_fail_fast_without_gateway_calls() {
    let gateway = Arc::new(InMemoryGateway::new());
    let store = store(&gateway);

    assert_eq!(
        store.cycle_status("missing").await.expect_err("not found"),
        StoreError::ItemNotFound
    );
    assert_eq!(
        store
            .update("missing", PrepItemPatch::default(), DisplayHint::default())
            .await
            .expect_err("not found"),
        StoreError::ItemNotFound
    );
    assert_eq!(
        store.delete("missing").await.expect_err("not found"),
        StoreError::ItemNotFound
    );
    assert_eq!(gateway.total_started(), 0);
}

#[tokio::test]
async fn switching_contexts_clears_the_list_before_the_fetch_lands() {
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.seed_prep_item(seeded_row("row-1", None));
    let mut elsewhere = seeded_row("row-2", None);
    elsewhere.station_id = "station-2".to_string();
    gateway.seed_prep_item(elsewhere);
    let store = store(&gateway);
    store.load(station_one()).await;
    assert_eq!(store.snapshot().items.len(), 1);

    gateway.pause();
    let pending_load = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.load(station_two()).await })
    };

    let mut watcher = store.subscribe();
    {
        let state = watcher
            .wait_for(|state| state.current_context.as_ref() == Some(&station_two()))
            .await
            .expect("context switch");
        assert!(state.items.is_empty());
        assert!(state.is_initial_loading);
        assert!(!state.is_refetching);
    }

    gateway.resume();
    pending_load.await.expect("join");

    let state = store.snapshot();
    assert_eq!(state.items.len(), 1);
    assert_eq!(state.items[0].id, "row-2");
    assert!(!state.is_initial_loading);
}

#[tokio::test]
async fn reloading_the_same_context_keeps_items_on_screen() {
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.seed_prep_item(seeded_row("row-1", None));
    let store = store(&gateway);
    store.load(station_one()).await;

    gateway.pause();
    let pending_load = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.load(station_one()).await })
    };

    let mut watcher = store.subscribe();
    {
        let state = watcher
            .wait_for(|state| state.is_refetching)
            .await
            .expect("refetch flag");
        assert_eq!(state.items.len(), 1);
        assert!(!state.is_initial_loading);
    }

    gateway.resume();
    pending_load.await.expect("join");
    let state = store.snapshot();
    assert!(!state.is_refetching);
    assert_eq!(state.items.len(), 1);
}

#[tokio::test]
async fn failed_refetch_keeps_items_and_records_the_error() {
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.seed_prep_item(seeded_row("row-1", None));
    let store = store(&gateway);
    store.load(station_one()).await;

    gateway.fail_next(
        GatewayOp::ListPrepItems,
        GatewayError::Network("connection reset".to_string()),
    );
    store.load(station_one()).await;

    let state = store.snapshot();
    assert_eq!(state.items.len(), 1);
    assert_eq!(
        state.error.as_deref(),
        Some("network error: connection reset")
    );
    assert!(!state.is_refetching);

    // The next successful load clears the recorded error.
    store.load(station_one()).await;
    assert_eq!(store.snapshot().error, None);
}

#[tokio::test]
async fn failed_context_switch_leaves_an_empty_list_for_the_new_context() {
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.seed_prep_item(seeded_row("row-1", None));
    let store = store(&gateway);
    store.load(station_one()).await;

    gateway.fail_next(
        GatewayOp::ListPrepItems,
        GatewayError::Network("connection reset".to_string()),
    );
    store.load(station_two()).await;

    let state = store.snapshot();
    assert!(state.items.is_empty());
    assert_eq!(state.current_context, Some(station_two()));
    assert!(!state.is_initial_loading);
    assert_eq!(
        state.error.as_deref(),
        Some("network error: connection reset")
    );
}

#[tokio::test]
async fn superseded_load_responses_are_discarded() {
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.seed_prep_item(seeded_row("row-1", None));
    let mut elsewhere = seeded_row("row-2", None);
    elsewhere.station_id = "station-2".to_string();
    gateway.seed_prep_item(elsewhere);
    let store = store(&gateway);

    gateway.pause();
    let first_load = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.load(station_one()).await })
    };
    let mut watcher = store.subscribe();
    watcher
        .wait_for(|state| state.current_context.as_ref() == Some(&station_one()))
        .await
        .expect("first load started");

    let second_load = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.load(station_two()).await })
    };
    watcher
        .wait_for(|state| state.current_context.as_ref() == Some(&station_two()))
        .await
        .expect("second load started");

    gateway.resume();
    first_load.await.expect("join first");
    second_load.await.expect("join second");

    // Only the newer load may publish, regardless of completion order.
    let state = store.snapshot();
    assert_eq!(state.current_context, Some(station_two()));
    assert_eq!(state.items.len(), 1);
    assert_eq!(state.items[0].id, "row-2");
}

/// Loads racing on a multi-thread runtime publish atomically: whichever
/// load wins the generation, the settled snapshot never shows one
/// context's items under the other's label, and no loading flag survives.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_loads_publish_one_consistent_context() {
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.seed_prep_item(seeded_row("row-1", None));
    let mut elsewhere = seeded_row("row-2", None);
    elsewhere.station_id = "station-2".to_string();
    gateway.seed_prep_item(elsewhere);

    for round in 0..64 {
        let store = store(&gateway);
        let first = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.load(station_one()).await })
        };
        let second = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.load(station_two()).await })
        };
        first.await.expect("join first");
        second.await.expect("join second");

        let state = store.snapshot();
        let context = state.current_context.clone().expect("a context is current");
        assert!(
            !state.is_initial_loading && !state.is_refetching,
            "round {round}: a loading flag survived both loads"
        );
        assert_eq!(state.error, None, "round {round}: unexpected error");
        assert!(
            state
                .items
                .iter()
                .all(|item| item.station_id == context.station_id),
            "round {round}: items from another context shown under {}",
            context.station_id
        );
        assert_eq!(
            state.items.len(),
            gateway.prep_item_rows(&context).len(),
            "round {round}: wrong item count for {}",
            context.station_id
        );
    }
}

#[tokio::test]
async fn clear_resets_state_and_invalidates_in_flight_loads() {
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.seed_prep_item(seeded_row("row-1", None));
    let store = store(&gateway);

    gateway.pause();
    let pending_load = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.load(station_one()).await })
    };
    let mut watcher = store.subscribe();
    watcher
        .wait_for(|state| state.is_initial_loading)
        .await
        .expect("load started");

    store.clear();
    gateway.resume();
    pending_load.await.expect("join");

    assert_eq!(store.snapshot(), PrepState::default());
}

#[tokio::test]
async fn anonymous_cycles_keep_the_previous_attribution() {
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.seed_prep_item(seeded_row("row-1", None));
    let store = store_as(&gateway, StaticIdentity::anonymous());
    store.load(station_one()).await;

    store.cycle_status("row-1").await.expect("cycle");

    let state = store.snapshot();
    assert_eq!(state.items[0].status, Status::InProgress);
    assert_eq!(state.items[0].status_changed_by_user.as_deref(), Some("cook-2"));
    assert_eq!(
        gateway.prep_item_rows(&station_one())[0]
            .status_changed_by_user
            .as_deref(),
        Some("cook-2")
    );
}

#[tokio::test]
async fn signed_in_cycles_take_over_the_attribution() {
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.seed_prep_item(seeded_row("row-1", None));
    let store = store(&gateway);
    store.load(station_one()).await;

    store.cycle_status("row-1").await.expect("cycle");

    let state = store.snapshot();
    assert_eq!(state.items[0].status_changed_by_user.as_deref(), Some("cook-7"));
    assert_eq!(
        gateway.prep_item_rows(&station_one())[0]
            .status_changed_by_user
            .as_deref(),
        Some("cook-7")
    );
}
