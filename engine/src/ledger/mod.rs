//! PV ledger operations
//!
//! The write path of the point-value ledger: recording signed entries with
//! at-most-once semantics per source event, and posting a qualifying order
//! up the tree according to the propagation policy.
//!
//! # Critical Invariants
//!
//! 1. **Append-only**: corrections are new opposite-sign entries, never
//!    updates
//! 2. **At-most-once**: replaying a source event fails with `DuplicateEntry`
//!    instead of double-crediting
//! 3. **All-or-nothing**: posting an order either records the full ancestor
//!    chain or nothing (duplicates are detected before any write)

use crate::core::period::PeriodKey;
use crate::models::order::{Order, OrderStatus};
use crate::models::pv::{LegTotals, PvSource};
use crate::models::user::Leg;
use crate::store::{LedgerStore, StoreError};
use crate::tree::{upline_chain, PropagationPolicy, TreeError};
use thiserror::Error;

/// Errors from PV ledger operations
#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("Order not found: {order_id}")]
    OrderNotFound { order_id: String },

    #[error("Order {order_id} is not in a PV-qualifying status")]
    NotQualifying { order_id: String },

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Append one signed PV entry
///
/// Thin write wrapper over the store that keeps the ledger contract in one
/// place: valid input never fails except on a duplicate source event.
pub fn record(
    store: &mut LedgerStore,
    user_id: &str,
    leg: Leg,
    amount: i64,
    source: PvSource,
    period_key: PeriodKey,
) -> Result<String, LedgerError> {
    Ok(store.record_pv(user_id, leg, amount, source, period_key)?)
}

/// Pure aggregation of one user's leg totals for a period
pub fn sum_by_user_and_period(
    store: &LedgerStore,
    user_id: &str,
    period_key: &PeriodKey,
) -> LegTotals {
    store.totals_for(user_id, period_key)
}

/// Post a shipped order's volume up the tree
///
/// Resolves the purchaser's upline chain and credits `bv` to each ancestor's
/// corresponding leg, subject to the propagation policy's depth limit and
/// decay. Duplicate detection runs for the whole chain before the first
/// write, so a replayed order event leaves the ledger untouched.
///
/// # Returns
/// The ids of the recorded entries, nearest ancestor first.
pub fn post_order(
    store: &mut LedgerStore,
    order: Order,
    policy: &PropagationPolicy,
) -> Result<Vec<String>, LedgerError> {
    if order.status() != OrderStatus::Shipped {
        return Err(LedgerError::NotQualifying {
            order_id: order.id().to_string(),
        });
    }

    let chain = upline_chain(store, order.user_id())?;
    let source = PvSource::Order {
        order_id: order.id().to_string(),
    };

    // Plan the full chain first: amounts and duplicate checks
    let mut planned: Vec<(String, Leg, i64)> = Vec::new();
    for (i, link) in chain.iter().enumerate() {
        let depth = i + 1;
        if !policy.reaches(depth) {
            break;
        }
        let amount = policy.volume_at(depth, order.bv());
        if amount == 0 {
            continue;
        }
        if store.has_pv_source(&source, &link.ancestor_id, link.leg) {
            return Err(StoreError::DuplicateEntry {
                source_key: source.dedup_key(),
                user_id: link.ancestor_id.clone(),
                leg: link.leg,
            }
            .into());
        }
        planned.push((link.ancestor_id.clone(), link.leg, amount));
    }

    let period_key = order.period_key().clone();
    store.add_order(order)?;

    let mut entry_ids = Vec::with_capacity(planned.len());
    for (ancestor_id, leg, amount) in planned {
        let id = store.record_pv(&ancestor_id, leg, amount, source.clone(), period_key.clone())?;
        entry_ids.push(id);
    }
    Ok(entry_ids)
}
