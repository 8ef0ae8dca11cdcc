//! Settlement and per-user summary models
//!
//! A `Settlement` row is the closing record for one period key; its
//! `SettlementUserSummary` rows are created and deleted together with it
//! (exclusive ownership). At most one non-dry-run settlement may ever exist
//! per period key - that uniqueness is the idempotency guard for re-runs.

use crate::core::period::{Granularity, PeriodKey};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a settlement row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    /// Created but not yet executing
    Open,

    /// Execution in progress; blocks concurrent runs for the same key
    Locked,

    /// Committed; immutable from here on
    Finalized,
}

/// Closing record for one settlement window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    period_key: PeriodKey,
    granularity: Granularity,
    status: SettlementStatus,

    /// Store sequence at which execution started
    started_at_seq: u64,

    /// Store sequence at which the commit landed
    finalized_at_seq: Option<u64>,

    /// Dry-run settlements are computed but never persisted; the flag exists
    /// so restored rows can always be told apart from live ones
    dry_run: bool,
}

impl Settlement {
    pub fn new(
        period_key: PeriodKey,
        granularity: Granularity,
        status: SettlementStatus,
        started_at_seq: u64,
        dry_run: bool,
    ) -> Self {
        Self {
            period_key,
            granularity,
            status,
            started_at_seq,
            finalized_at_seq: None,
            dry_run,
        }
    }

    pub fn period_key(&self) -> &PeriodKey {
        &self.period_key
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn status(&self) -> SettlementStatus {
        self.status
    }

    pub fn started_at_seq(&self) -> u64 {
        self.started_at_seq
    }

    pub fn finalized_at_seq(&self) -> Option<u64> {
        self.finalized_at_seq
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self.status, SettlementStatus::Finalized)
    }

    /// Transition to finalized at the given sequence
    pub(crate) fn finalize(&mut self, seq: u64) {
        debug_assert!(!self.is_finalized());
        self.status = SettlementStatus::Finalized;
        self.finalized_at_seq = Some(seq);
    }
}

/// Per-user aggregation result for one settled period
///
/// # Conservation
///
/// Across all summaries of a period, the sum of `matched_volume` never
/// exceeds the total positive PV ledgered for that period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementUserSummary {
    period_key: PeriodKey,
    user_id: String,

    /// Aggregated left-leg PV (signed; reversals subtract)
    left_pv: i64,

    /// Aggregated right-leg PV
    right_pv: i64,

    /// min(left, right) capped at the configured per-period ceiling
    matched_volume: i64,

    /// matched_volume x configured rate, rounded
    bonus_amount: i64,

    /// Unmatched left excess carried into the next period
    carried_left: i64,

    /// Unmatched right excess carried into the next period
    carried_right: i64,
}

impl SettlementUserSummary {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        period_key: PeriodKey,
        user_id: String,
        left_pv: i64,
        right_pv: i64,
        matched_volume: i64,
        bonus_amount: i64,
        carried_left: i64,
        carried_right: i64,
    ) -> Self {
        Self {
            period_key,
            user_id,
            left_pv,
            right_pv,
            matched_volume,
            bonus_amount,
            carried_left,
            carried_right,
        }
    }

    pub fn period_key(&self) -> &PeriodKey {
        &self.period_key
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn left_pv(&self) -> i64 {
        self.left_pv
    }

    pub fn right_pv(&self) -> i64 {
        self.right_pv
    }

    pub fn matched_volume(&self) -> i64 {
        self.matched_volume
    }

    pub fn bonus_amount(&self) -> i64 {
        self.bonus_amount
    }

    pub fn carried_left(&self) -> i64 {
        self.carried_left
    }

    pub fn carried_right(&self) -> i64 {
        self.carried_right
    }
}
