//! Post-finalize refund integration tests
//!
//! Once a period has settled, its history is immutable: a refund produces a
//! reversal batch whose entries land in the next open period and claw back
//! the released bonus, leaving the finalized settlement untouched.

use commission_engine_rs::adjustment::{finalize_adjustment_batch, AdjustmentError};
use commission_engine_rs::audit::AuditLog;
use commission_engine_rs::auth::AllowAll;
use commission_engine_rs::core::period::PeriodKey;
use commission_engine_rs::engine::{Engine, EngineConfig};
use commission_engine_rs::models::{
    AdjustmentBatch, AdjustmentEntry, AssetType, BatchReference, BatchSnapshot, Leg, Order,
    OrderStatus, ReasonType, ReleaseMode, ReversalRef, SettlementStatus, TrxType,
};
use commission_engine_rs::settlement::SettlementConfig;

const WEEK: &str = "2026-W07";

fn week() -> PeriodKey {
    PeriodKey::parse(WEEK).unwrap()
}

/// Engine whose weekly bonus equals the matched volume, auto-released
fn settled_engine() -> Engine {
    let config = EngineConfig {
        weekly: SettlementConfig {
            pairing_rate: 1.0,
            per_period_cap: None,
            release_mode: ReleaseMode::Auto,
        },
        ..Default::default()
    };
    let mut engine = Engine::new(config);
    engine.register_root("ROOT").unwrap();
    engine.register_user("A", "ROOT", Leg::Left, None).unwrap();
    engine.register_user("B", "ROOT", Leg::Right, None).unwrap();
    for (order_id, buyer) in [("ORD-LEFT", "A"), ("ORD-RIGHT", "B")] {
        engine
            .post_order(Order::new(
                order_id.to_string(),
                buyer.to_string(),
                3000,
                3000,
                OrderStatus::Shipped,
                week(),
            ))
            .unwrap();
    }
    engine
        .execute_weekly_settlement(WEEK, false, false)
        .unwrap();
    engine
}

#[test]
fn test_refund_after_finalize_claws_back_exactly_the_refunded_amount() {
    let mut engine = settled_engine();
    assert_eq!(engine.balance_of("ROOT"), 3000);

    let batch_id = engine
        .create_refund_adjustment("ORD-RIGHT", "ADJ-1")
        .unwrap();
    let batch = engine.store().batch(&batch_id).unwrap();
    assert_eq!(batch.reason(), ReasonType::RefundAfterFinalize);

    // One transaction reversal of -3000 against the settlement-derived payout
    let reversal = engine
        .store()
        .entries_for_batch(&batch_id)
        .into_iter()
        .find(|e| e.asset() == AssetType::Transaction)
        .unwrap();
    assert_eq!(reversal.amount(), -3000);
    assert!(matches!(
        reversal.reversal_of(),
        Some(ReversalRef::Transaction { .. })
    ));

    // Nothing moves until finalization
    assert_eq!(engine.balance_of("ROOT"), 3000);

    engine.finalize_adjustment_batch(&batch_id).unwrap();
    assert_eq!(engine.balance_of("ROOT"), 0);
}

#[test]
fn test_settled_period_is_untouched_by_the_reversal() {
    let mut engine = settled_engine();
    let batch_id = engine
        .create_refund_adjustment("ORD-RIGHT", "ADJ-1")
        .unwrap();
    engine.finalize_adjustment_batch(&batch_id).unwrap();

    // Settlement record and its summaries are byte-for-byte what the run wrote
    let settlement = engine.store().settlement(&week()).unwrap();
    assert_eq!(settlement.status(), SettlementStatus::Finalized);
    let summary = engine.store().summary_for_user(&week(), "ROOT").unwrap();
    assert_eq!(summary.matched_volume(), 3000);
    assert_eq!(summary.right_pv(), 3000);
    assert_eq!(engine.store().totals_for("ROOT", &week()).right_pv, 3000);

    // The PV reversal lives in the next period instead
    assert_eq!(
        engine.store().totals_for("ROOT", &week().next()).right_pv,
        -3000
    );
}

#[test]
fn test_clawback_never_exceeds_the_released_bonus() {
    // Bonus rate 10%: the payout is 300, so the clawback is 300 even though
    // the refunded volume is 3000
    let config = EngineConfig {
        weekly: SettlementConfig {
            pairing_rate: 0.10,
            per_period_cap: None,
            release_mode: ReleaseMode::Auto,
        },
        ..Default::default()
    };
    let mut engine = Engine::new(config);
    engine.register_root("ROOT").unwrap();
    engine.register_user("A", "ROOT", Leg::Left, None).unwrap();
    engine.register_user("B", "ROOT", Leg::Right, None).unwrap();
    for (order_id, buyer) in [("ORD-LEFT", "A"), ("ORD-RIGHT", "B")] {
        engine
            .post_order(Order::new(
                order_id.to_string(),
                buyer.to_string(),
                3000,
                3000,
                OrderStatus::Shipped,
                week(),
            ))
            .unwrap();
    }
    engine
        .execute_weekly_settlement(WEEK, false, false)
        .unwrap();
    assert_eq!(engine.balance_of("ROOT"), 300);

    let batch_id = engine
        .create_refund_adjustment("ORD-RIGHT", "ADJ-1")
        .unwrap();
    engine.finalize_adjustment_batch(&batch_id).unwrap();
    assert_eq!(engine.balance_of("ROOT"), 0);
}

#[test]
fn test_pending_bonus_is_not_clawed_back() {
    // Manual release mode: the bonus never paid out, so the refund reverses
    // PV only and the transaction ledger stays empty
    let config = EngineConfig {
        weekly: SettlementConfig {
            pairing_rate: 1.0,
            per_period_cap: None,
            release_mode: ReleaseMode::Manual,
        },
        ..Default::default()
    };
    let mut engine = Engine::new(config);
    engine.register_root("ROOT").unwrap();
    engine.register_user("A", "ROOT", Leg::Left, None).unwrap();
    engine.register_user("B", "ROOT", Leg::Right, None).unwrap();
    for (order_id, buyer) in [("ORD-LEFT", "A"), ("ORD-RIGHT", "B")] {
        engine
            .post_order(Order::new(
                order_id.to_string(),
                buyer.to_string(),
                3000,
                3000,
                OrderStatus::Shipped,
                week(),
            ))
            .unwrap();
    }
    engine
        .execute_weekly_settlement(WEEK, false, false)
        .unwrap();

    let batch_id = engine
        .create_refund_adjustment("ORD-RIGHT", "ADJ-1")
        .unwrap();
    let outcome = engine.finalize_adjustment_batch(&batch_id).unwrap();
    assert_eq!(outcome.transactions_applied, 0);
    assert_eq!(outcome.pv_reversals, 1);
    assert_eq!(engine.store().num_transactions(), 0);
}

#[test]
fn test_over_reversal_is_rejected_at_finalize() {
    let mut engine = settled_engine();
    let payout_trx = engine
        .store()
        .transactions_for("ROOT")
        .into_iter()
        .find(|t| t.trx_type() == TrxType::BonusPayout)
        .unwrap()
        .id()
        .to_string();

    // A hand-built batch attempting to reverse more than the payout
    let mut store = engine.store().clone();
    let batch = AdjustmentBatch::new(
        "ADJ-OVER".to_string(),
        ReasonType::RefundAfterFinalize,
        BatchReference::Manual {
            note: "bad reversal".to_string(),
        },
        BatchSnapshot::default(),
        "hash".to_string(),
    );
    let batch_id = batch.id().to_string();
    store.insert_batch(batch).unwrap();
    store.add_adjustment_entry(AdjustmentEntry::new(
        batch_id.clone(),
        AssetType::Transaction,
        "ROOT".to_string(),
        -6000,
        Some(ReversalRef::Transaction {
            trx_id: payout_trx.clone(),
        }),
        week().next(),
        None,
    ));

    let mut audit = AuditLog::new();
    let err =
        finalize_adjustment_batch(&mut store, &mut audit, &AllowAll, &batch_id).unwrap_err();
    assert_eq!(
        err,
        AdjustmentError::OverReversal {
            target: ReversalRef::Transaction { trx_id: payout_trx }.key(),
            attempted: 6000,
            available: 3000,
        }
    );
    // Nothing was applied and the batch is still draft
    assert_eq!(store.balance_of("ROOT"), 3000);
    assert!(!store.batch(&batch_id).unwrap().is_finalized());
}

#[test]
fn test_finalize_twice_fails() {
    let mut engine = settled_engine();
    let batch_id = engine
        .create_refund_adjustment("ORD-RIGHT", "ADJ-1")
        .unwrap();
    engine.finalize_adjustment_batch(&batch_id).unwrap();

    let err = engine.finalize_adjustment_batch(&batch_id).unwrap_err();
    assert!(matches!(err, AdjustmentError::AlreadyFinalized { .. }));
    assert_eq!(engine.balance_of("ROOT"), 0);
}
