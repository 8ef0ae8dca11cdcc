//! Tree resolution and PV ledger integration tests
//!
//! Exercises order posting through a deeper tree: upline resolution, leg
//! assignment, propagation policy (depth and decay), and the at-most-once
//! ledger guarantee.

use commission_engine_rs::core::period::PeriodKey;
use commission_engine_rs::ledger::{post_order, LedgerError};
use commission_engine_rs::models::{Leg, Order, OrderStatus, Position, User};
use commission_engine_rs::store::{LedgerStore, StoreError};
use commission_engine_rs::tree::{leg_of, upline_chain, PropagationPolicy};

fn week() -> PeriodKey {
    PeriodKey::parse("2026-W07").unwrap()
}

/// ROOT -> L (left) -> LL (left) -> LLR (right)
fn deep_store() -> LedgerStore {
    let mut store = LedgerStore::new();
    store.add_user(User::root("ROOT".to_string())).unwrap();
    store
        .add_user(User::placed(
            "L".to_string(),
            "ROOT".to_string(),
            Leg::Left,
            None,
        ))
        .unwrap();
    store
        .add_user(User::placed(
            "LL".to_string(),
            "L".to_string(),
            Leg::Left,
            None,
        ))
        .unwrap();
    store
        .add_user(User::placed(
            "LLR".to_string(),
            "LL".to_string(),
            Leg::Right,
            Some("L".to_string()),
        ))
        .unwrap();
    store
}

fn shipped(order_id: &str, buyer: &str, bv: i64) -> Order {
    Order::new(
        order_id.to_string(),
        buyer.to_string(),
        bv,
        bv,
        OrderStatus::Shipped,
        week(),
    )
}

#[test]
fn test_upline_chain_is_nearest_first() {
    let store = deep_store();
    let chain = upline_chain(&store, "LLR").unwrap();
    let ids: Vec<&str> = chain.iter().map(|l| l.ancestor_id.as_str()).collect();
    assert_eq!(ids, vec!["LL", "L", "ROOT"]);
    assert_eq!(chain[0].leg, Leg::Right);
    assert_eq!(chain[1].leg, Leg::Left);
    assert_eq!(chain[2].leg, Leg::Left);
}

#[test]
fn test_leg_of() {
    let store = deep_store();
    assert_eq!(leg_of(&store, "ROOT").unwrap(), Position::Root);
    assert_eq!(leg_of(&store, "L").unwrap(), Position::Left);
    assert_eq!(leg_of(&store, "LLR").unwrap(), Position::Right);
}

#[test]
fn test_order_credits_each_ancestor_on_the_right_leg() {
    let mut store = deep_store();
    post_order(
        &mut store,
        shipped("ORD-1", "LLR", 5000),
        &PropagationPolicy::default(),
    )
    .unwrap();

    assert_eq!(store.totals_for("LL", &week()).right_pv, 5000);
    assert_eq!(store.totals_for("L", &week()).left_pv, 5000);
    assert_eq!(store.totals_for("ROOT", &week()).left_pv, 5000);
    // The buyer's own ledger is untouched
    assert!(store.totals_for("LLR", &week()).is_zero());
}

#[test]
fn test_decay_halves_volume_per_level() {
    let mut store = deep_store();
    let policy = PropagationPolicy {
        max_depth: None,
        decay: 0.5,
    };
    post_order(&mut store, shipped("ORD-1", "LLR", 4000), &policy).unwrap();

    // Full amount at depth 1, halved per further level
    assert_eq!(store.totals_for("LL", &week()).right_pv, 4000);
    assert_eq!(store.totals_for("L", &week()).left_pv, 2000);
    assert_eq!(store.totals_for("ROOT", &week()).left_pv, 1000);
}

#[test]
fn test_depth_limit_stops_propagation() {
    let mut store = deep_store();
    let policy = PropagationPolicy {
        max_depth: Some(2),
        decay: 1.0,
    };
    post_order(&mut store, shipped("ORD-1", "LLR", 4000), &policy).unwrap();

    assert_eq!(store.totals_for("LL", &week()).right_pv, 4000);
    assert_eq!(store.totals_for("L", &week()).left_pv, 4000);
    assert!(store.totals_for("ROOT", &week()).is_zero());
}

#[test]
fn test_replayed_order_event_changes_nothing() {
    let mut store = deep_store();
    let policy = PropagationPolicy::default();
    post_order(&mut store, shipped("ORD-1", "LLR", 4000), &policy).unwrap();
    let entries_before = store.num_pv_entries();

    let err = post_order(&mut store, shipped("ORD-1", "LLR", 4000), &policy).unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Store(StoreError::DuplicateEntry { .. })
    ));
    assert_eq!(store.num_pv_entries(), entries_before);
    assert_eq!(store.totals_for("ROOT", &week()).left_pv, 4000);
}

#[test]
fn test_placement_constraints_hold_under_registration() {
    let mut store = deep_store();
    // L's left slot is taken by LL
    let err = store
        .add_user(User::placed(
            "X".to_string(),
            "L".to_string(),
            Leg::Left,
            None,
        ))
        .unwrap_err();
    assert!(matches!(err, StoreError::PlacementOccupied { .. }));

    let err = store
        .add_user(User::placed(
            "Y".to_string(),
            "GHOST".to_string(),
            Leg::Left,
            None,
        ))
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownParent { .. }));
}

#[test]
fn test_root_order_ledgers_nothing_but_persists() {
    let mut store = deep_store();
    let ids = post_order(
        &mut store,
        shipped("ORD-R", "ROOT", 4000),
        &PropagationPolicy::default(),
    )
    .unwrap();
    // No upline to credit, but the order row is recorded
    assert!(ids.is_empty());
    assert!(store.order("ORD-R").is_some());
}
