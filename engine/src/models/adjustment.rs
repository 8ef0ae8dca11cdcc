//! Adjustment batch and entry models
//!
//! An adjustment batch is the unit of non-destructive correction: it never
//! rewrites ledger history, it appends compensating rows. A batch is mutable
//! only while draft; once `finalized_at_seq` is set it is immutable, and
//! finalization is the only point at which a post-finalize batch moves money.
//!
//! # State machine
//!
//! ```text
//! draft ──finalize──> finalized   (terminal)
//! ```
//!
//! # Critical Invariants
//!
//! 1. Every entry with a `reversal_of` reference points at an existing row
//!    of the opposite sign, in the same or an earlier period
//! 2. A source row can never be over-reversed: the summed magnitude of all
//!    reversals against it stays within `abs(original amount)`
//! 3. The snapshot captured at batch creation is never touched afterwards

use crate::core::period::PeriodKey;
use crate::models::user::Leg;
use serde::{Deserialize, Serialize};

/// Why a batch exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonType {
    /// Order refunded while its period is still open: negate the order's PV
    /// directly so the upcoming run excludes it
    RefundBeforeFinalize,

    /// Order refunded after its period settled: append reversal entries
    /// against the specific rows the order produced
    RefundAfterFinalize,

    /// Operator-initiated correction; always moves money on finalize
    ManualAdjustment,
}

impl ReasonType {
    pub fn label(&self) -> &'static str {
        match self {
            ReasonType::RefundBeforeFinalize => "refund_before_finalize",
            ReasonType::RefundAfterFinalize => "refund_after_finalize",
            ReasonType::ManualAdjustment => "manual_adjustment",
        }
    }
}

/// Which ledger an entry touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    /// PV ledger effect
    Pv,

    /// Transaction ledger effect
    Transaction,
}

/// Weak back-reference to the row being reversed (lookup only, never an
/// ownership edge)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReversalRef {
    PvEntry { entry_id: String },
    Transaction { trx_id: String },
}

impl ReversalRef {
    /// Stable key for grouping reversals against one source row
    pub fn key(&self) -> String {
        match self {
            ReversalRef::PvEntry { entry_id } => format!("pv:{}", entry_id),
            ReversalRef::Transaction { trx_id } => format!("trx:{}", trx_id),
        }
    }
}

/// What an adjustment batch refers back to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchReference {
    Order { order_id: String },
    Manual { note: String },
}

/// One signed correction belonging to a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentEntry {
    /// Unique entry identifier (UUID)
    id: String,

    /// Owning batch
    batch_id: String,

    asset: AssetType,

    /// User whose ledger the effect lands on
    user_id: String,

    /// Signed amount; opposite in sign to the referenced original
    amount: i64,

    /// Original row being reversed, if any
    reversal_of: Option<ReversalRef>,

    /// Period the effect is tagged with when applied
    period_key: PeriodKey,

    /// Leg for PV-asset entries (None for transaction effects)
    leg: Option<Leg>,
}

impl AdjustmentEntry {
    pub fn new(
        batch_id: String,
        asset: AssetType,
        user_id: String,
        amount: i64,
        reversal_of: Option<ReversalRef>,
        period_key: PeriodKey,
        leg: Option<Leg>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            batch_id,
            asset,
            user_id,
            amount,
            reversal_of,
            period_key,
            leg,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub fn asset(&self) -> AssetType {
        self.asset
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn reversal_of(&self) -> Option<&ReversalRef> {
        self.reversal_of.as_ref()
    }

    pub fn period_key(&self) -> &PeriodKey {
        &self.period_key
    }

    pub fn leg(&self) -> Option<Leg> {
        self.leg
    }
}

/// Pre-adjustment state of one affected user, captured for audit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub user_id: String,
    pub balance: i64,
    pub left_pv: i64,
    pub right_pv: i64,
    pub period_key: String,
}

/// Immutable copy of pre-adjustment state, taken at batch creation
///
/// Captured independently of what happens before finalize; the SHA-256 hash
/// over its canonical JSON form is stored on the batch so later tampering
/// is detectable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSnapshot {
    pub captured_at_seq: u64,
    pub users: Vec<UserSnapshot>,
}

/// A reversal/compensation batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentBatch {
    /// Unique batch identifier (UUID)
    id: String,

    /// Unique human-facing batch key
    batch_key: String,

    reason: ReasonType,

    reference: BatchReference,

    snapshot: BatchSnapshot,

    /// SHA-256 over the canonical JSON form of `snapshot`
    snapshot_hash: String,

    /// Set exactly once by finalization; immutable afterwards
    finalized_at_seq: Option<u64>,
}

impl AdjustmentBatch {
    pub fn new(
        batch_key: String,
        reason: ReasonType,
        reference: BatchReference,
        snapshot: BatchSnapshot,
        snapshot_hash: String,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            batch_key,
            reason,
            reference,
            snapshot,
            snapshot_hash,
            finalized_at_seq: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn batch_key(&self) -> &str {
        &self.batch_key
    }

    pub fn reason(&self) -> ReasonType {
        self.reason
    }

    pub fn reference(&self) -> &BatchReference {
        &self.reference
    }

    pub fn snapshot(&self) -> &BatchSnapshot {
        &self.snapshot
    }

    pub fn snapshot_hash(&self) -> &str {
        &self.snapshot_hash
    }

    pub fn finalized_at_seq(&self) -> Option<u64> {
        self.finalized_at_seq
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized_at_seq.is_some()
    }

    pub(crate) fn mark_finalized(&mut self, seq: u64) {
        debug_assert!(!self.is_finalized());
        self.finalized_at_seq = Some(seq);
    }
}
