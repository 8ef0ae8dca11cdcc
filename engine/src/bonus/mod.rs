//! Pending bonus queue
//!
//! Disbursement of computed bonuses: a pending bonus either gets released,
//! which appends exactly one credit to the transaction ledger, or rejected,
//! which is terminal and moves no money.
//!
//! # Critical Invariants
//!
//! 1. **Exactly-once release**: releasing a bonus twice fails with
//!    `AlreadyFinalized`; the credit is appended at most once
//! 2. **Terminal states**: `Released` and `Rejected` never transition again
//! 3. **Traceability**: a released bonus stores the id of the transaction
//!    row that carries its credit

use crate::audit::{AuditEvent, AuditLog};
use crate::auth::{AuthorizationContext, Capability};
use crate::models::bonus::BonusStatus;
use crate::models::transaction::TrxType;
use crate::store::{LedgerStore, StoreError};
use thiserror::Error;

/// Errors from bonus queue operations
#[derive(Debug, Error, PartialEq)]
pub enum BonusError {
    #[error("Bonus not found: {bonus_id}")]
    BonusNotFound { bonus_id: String },

    /// The bonus already left the pending state
    #[error("Bonus {bonus_id} is already {state}")]
    AlreadyFinalized {
        bonus_id: String,
        state: &'static str,
    },

    /// The bonus row itself is unusable (e.g. non-positive amount)
    #[error("Bonus {bonus_id} is in an invalid state: {detail}")]
    InvalidState { bonus_id: String, detail: String },

    #[error("Not authorized for capability: {capability}")]
    Unauthorized { capability: &'static str },

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn terminal_state(status: &BonusStatus) -> Option<&'static str> {
    match status {
        BonusStatus::Pending => None,
        BonusStatus::Released { .. } => Some("released"),
        BonusStatus::Rejected { .. } => Some("rejected"),
    }
}

/// Release one pending bonus into the transaction ledger
///
/// Appends a single `BonusPayout` transaction for the bonus amount and
/// transitions the bonus to `Released`. Every failure leaves both the bonus
/// and the transaction ledger untouched.
///
/// # Returns
/// The id of the crediting transaction row.
pub fn release(
    store: &mut LedgerStore,
    audit: &mut AuditLog,
    auth: &dyn AuthorizationContext,
    bonus_id: &str,
) -> Result<String, BonusError> {
    if !auth.is_authorized(Capability::ReleaseBonuses) {
        return Err(BonusError::Unauthorized {
            capability: Capability::ReleaseBonuses.label(),
        });
    }

    let (recipient_id, amount, remark, details) = {
        let bonus = store.bonus(bonus_id).ok_or_else(|| BonusError::BonusNotFound {
            bonus_id: bonus_id.to_string(),
        })?;
        if let Some(state) = terminal_state(bonus.status()) {
            return Err(BonusError::AlreadyFinalized {
                bonus_id: bonus_id.to_string(),
                state,
            });
        }
        if bonus.amount() <= 0 {
            return Err(BonusError::InvalidState {
                bonus_id: bonus_id.to_string(),
                detail: format!("non-positive amount {}", bonus.amount()),
            });
        }
        let details = serde_json::json!({
            "bonus_id": bonus.id(),
            "bonus_type": bonus.bonus_type(),
            "source": bonus.source(),
            "period_key": bonus.accrued_period_key().as_str(),
        })
        .to_string();
        let remark = format!(
            "{:?} bonus {}",
            bonus.bonus_type(),
            bonus.accrued_period_key()
        );
        (
            bonus.recipient_id().to_string(),
            bonus.amount(),
            remark,
            details,
        )
    };

    let trx_id = store.append_transaction(
        &recipient_id,
        amount,
        0,
        TrxType::BonusPayout,
        remark,
        details,
    )?;
    store
        .bonus_mut(bonus_id)
        .expect("bonus row checked above")
        .mark_released(trx_id.clone());

    let seq = store.current_seq();
    audit.log(AuditEvent::BonusReleased {
        seq,
        bonus_id: bonus_id.to_string(),
        recipient_id,
        amount,
        trx_id: trx_id.clone(),
    });
    Ok(trx_id)
}

/// Terminally reject one pending bonus
///
/// Records the operator-supplied reason; no money moves. Rejecting a bonus
/// that already left the pending state fails with `AlreadyFinalized`.
pub fn reject(
    store: &mut LedgerStore,
    audit: &mut AuditLog,
    auth: &dyn AuthorizationContext,
    bonus_id: &str,
    reason: &str,
) -> Result<(), BonusError> {
    if !auth.is_authorized(Capability::ReleaseBonuses) {
        return Err(BonusError::Unauthorized {
            capability: Capability::ReleaseBonuses.label(),
        });
    }

    {
        let bonus = store.bonus(bonus_id).ok_or_else(|| BonusError::BonusNotFound {
            bonus_id: bonus_id.to_string(),
        })?;
        if let Some(state) = terminal_state(bonus.status()) {
            return Err(BonusError::AlreadyFinalized {
                bonus_id: bonus_id.to_string(),
                state,
            });
        }
    }

    store
        .bonus_mut(bonus_id)
        .expect("bonus row checked above")
        .mark_rejected(reason.to_string());

    let seq = store.next_seq();
    audit.log(AuditEvent::BonusRejected {
        seq,
        bonus_id: bonus_id.to_string(),
        reason: reason.to_string(),
    });
    Ok(())
}
