//! PV ledger entry model
//!
//! The PV (point value) ledger is the append-only input to settlement.
//! Entries are never updated or deleted: corrections are new entries with
//! the opposite sign, referencing the original through the adjustment batch
//! that produced them.
//!
//! CRITICAL: All PV amounts are i64 minor units, signed. Negative entries
//! are reversals.

use crate::core::period::PeriodKey;
use crate::models::user::Leg;
use serde::{Deserialize, Serialize};

/// Origin of a PV ledger entry
///
/// A closed enum rather than a string pair, so settlement and adjustment
/// branching over sources is exhaustive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PvSource {
    /// Qualifying order credited PV up the tree
    Order { order_id: String },

    /// Adjustment batch wrote a signed correction
    Adjustment { batch_key: String },

    /// Carry-forward of unmatched volume from a settled period
    ///
    /// This is the "zero-source" entry: it has no external originator, only
    /// the period whose settlement produced it.
    Carry { origin_period: String },
}

impl PvSource {
    /// Stable key used for duplicate-source detection
    ///
    /// At-most-once semantics hold per `(source, user, leg)`; the store
    /// prefixes this key with the user id and leg.
    pub fn dedup_key(&self) -> String {
        match self {
            PvSource::Order { order_id } => format!("order:{}", order_id),
            PvSource::Adjustment { batch_key } => format!("adjustment:{}", batch_key),
            PvSource::Carry { origin_period } => format!("carry:{}", origin_period),
        }
    }
}

/// Aggregated leg totals for one user in one period
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LegTotals {
    pub left_pv: i64,
    pub right_pv: i64,
}

impl LegTotals {
    pub fn add(&mut self, leg: Leg, amount: i64) {
        match leg {
            Leg::Left => self.left_pv += amount,
            Leg::Right => self.right_pv += amount,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.left_pv == 0 && self.right_pv == 0
    }
}

/// Immutable PV ledger record
///
/// # Example
/// ```
/// use commission_engine_rs::core::period::PeriodKey;
/// use commission_engine_rs::models::{Leg, PvLedgerEntry, PvSource};
///
/// let entry = PvLedgerEntry::new(
///     "ROOT".to_string(),
///     Leg::Left,
///     3000,
///     PvSource::Order { order_id: "ORD-1".to_string() },
///     PeriodKey::parse("2026-W07").unwrap(),
///     1,
/// );
/// assert_eq!(entry.amount(), 3000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PvLedgerEntry {
    /// Unique entry identifier (UUID)
    id: String,

    /// User whose leg volume this entry affects
    user_id: String,

    /// Leg the volume lands on
    leg: Leg,

    /// Signed PV amount (negative = reversal)
    amount: i64,

    /// Where the entry came from
    source: PvSource,

    /// Settlement window the entry belongs to
    period_key: PeriodKey,

    /// Store sequence number at insertion (monotonic, replaces wall clock)
    seq: u64,
}

impl PvLedgerEntry {
    pub fn new(
        user_id: String,
        leg: Leg,
        amount: i64,
        source: PvSource,
        period_key: PeriodKey,
        seq: u64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            leg,
            amount,
            source,
            period_key,
            seq,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn leg(&self) -> Leg {
        self.leg
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn source(&self) -> &PvSource {
        &self.source
    }

    pub fn period_key(&self) -> &PeriodKey {
        &self.period_key
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}
