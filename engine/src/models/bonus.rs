//! Pending bonus model
//!
//! Computed bonuses are not paid out directly: settlement (and occasionally
//! an adjustment batch) enqueues a `PendingBonus`, and a separate release
//! step moves the money into the transaction ledger. This decouples
//! computation from disbursement and gives operators a review point.
//!
//! # Lifecycle
//!
//! ```text
//! Pending ──release──> Released   (credits the transaction ledger, once)
//!    │
//!    └────reject────> Rejected    (terminal, no credit, reason recorded)
//! ```
//!
//! Both transitions are exactly-once: re-invoking on a terminal bonus fails
//! with `AlreadyFinalized` rather than silently succeeding.

use crate::core::period::PeriodKey;
use serde::{Deserialize, Serialize};

/// What kind of bonus this is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BonusType {
    /// Weekly pairing (binary matching) bonus
    Pairing,

    /// Quarterly pairing bonus over aggregated weekly volume
    QuarterlyPairing,

    /// Compensation created by an adjustment batch
    Adjustment,
}

/// How a bonus leaves the pending queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseMode {
    /// Requires an operator release call
    Manual,

    /// Credited to the transaction ledger in the same settlement commit
    Auto,
}

/// Where a bonus came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BonusSource {
    Settlement { period_key: String },
    Adjustment { batch_key: String },
}

/// Current lifecycle state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BonusStatus {
    Pending,

    /// Credited to the transaction ledger
    Released {
        /// Transaction row that carries the credit
        trx_id: String,
    },

    /// Terminal, no credit
    Rejected { reason: String },
}

/// A computed bonus awaiting release or rejection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingBonus {
    /// Unique bonus identifier (UUID)
    id: String,

    /// User the bonus is payable to
    recipient_id: String,

    bonus_type: BonusType,

    /// Bonus amount (i64 minor units, positive)
    amount: i64,

    source: BonusSource,

    /// Period in which the bonus accrued
    accrued_period_key: PeriodKey,

    release_mode: ReleaseMode,

    status: BonusStatus,
}

impl PendingBonus {
    pub fn new(
        recipient_id: String,
        bonus_type: BonusType,
        amount: i64,
        source: BonusSource,
        accrued_period_key: PeriodKey,
        release_mode: ReleaseMode,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            recipient_id,
            bonus_type,
            amount,
            source,
            accrued_period_key,
            release_mode,
            status: BonusStatus::Pending,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn recipient_id(&self) -> &str {
        &self.recipient_id
    }

    pub fn bonus_type(&self) -> BonusType {
        self.bonus_type
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn source(&self) -> &BonusSource {
        &self.source
    }

    pub fn accrued_period_key(&self) -> &PeriodKey {
        &self.accrued_period_key
    }

    pub fn release_mode(&self) -> ReleaseMode {
        self.release_mode
    }

    pub fn status(&self) -> &BonusStatus {
        &self.status
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.status, BonusStatus::Pending)
    }

    /// Mark released with the crediting transaction row
    ///
    /// Caller must have verified the bonus is pending; this is the only
    /// transition into `Released`.
    pub(crate) fn mark_released(&mut self, trx_id: String) {
        debug_assert!(self.is_pending());
        self.status = BonusStatus::Released { trx_id };
    }

    /// Mark rejected with an operator-supplied reason
    pub(crate) fn mark_rejected(&mut self, reason: String) {
        debug_assert!(self.is_pending());
        self.status = BonusStatus::Rejected { reason };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::period::PeriodKey;

    fn bonus() -> PendingBonus {
        PendingBonus::new(
            "ROOT".to_string(),
            BonusType::Pairing,
            3000,
            BonusSource::Settlement {
                period_key: "2026-W07".to_string(),
            },
            PeriodKey::parse("2026-W07").unwrap(),
            ReleaseMode::Manual,
        )
    }

    #[test]
    fn test_new_bonus_is_pending() {
        let b = bonus();
        assert!(b.is_pending());
        assert_eq!(b.amount(), 3000);
    }

    #[test]
    fn test_release_transition() {
        let mut b = bonus();
        b.mark_released("trx-1".to_string());
        assert!(!b.is_pending());
        assert_eq!(
            b.status(),
            &BonusStatus::Released {
                trx_id: "trx-1".to_string()
            }
        );
    }

    #[test]
    fn test_reject_transition_records_reason() {
        let mut b = bonus();
        b.mark_rejected("duplicate order".to_string());
        assert_eq!(
            b.status(),
            &BonusStatus::Rejected {
                reason: "duplicate order".to_string()
            }
        );
    }
}
