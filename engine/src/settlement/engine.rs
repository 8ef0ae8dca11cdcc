//! Settlement execution
//!
//! A run is split into two halves, which is how the whole engine gets its
//! transaction boundary without a database:
//!
//! 1. `compute_plan` - pure read of the ledger; produces every row the run
//!    would write plus the result counts
//! 2. `commit_plan` - applies the plan through store appends; all caller
//!    errors were raised before the first write
//!
//! A dry run executes step 1 only. Weekly and quarterly settlement share
//! the algorithm; they differ in their input set - weekly reads raw PV for
//! the week, quarterly reads the quarter's weekly summaries plus any PV
//! tagged directly with the quarter key - and in their configured rate/cap.

use crate::audit::{AuditEvent, AuditLog};
use crate::auth::{AuthorizationContext, Capability};
use crate::core::money::apply_rate;
use crate::core::period::{Granularity, PeriodKey};
use crate::models::bonus::{BonusSource, BonusType, PendingBonus, ReleaseMode};
use crate::models::pv::{LegTotals, PvSource};
use crate::models::settlement::{Settlement, SettlementStatus, SettlementUserSummary};
use crate::models::transaction::TrxType;
use crate::models::user::Leg;
use crate::store::lock::PeriodLockRegistry;
use crate::store::{LedgerStore, StoreError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from settlement execution
#[derive(Debug, Error, PartialEq)]
pub enum SettlementError {
    /// Malformed key, or a key of the wrong granularity for the operation
    #[error("Invalid period key: {key}")]
    InvalidPeriodKey { key: String },

    /// A concurrent run holds the period lock (retryable later)
    #[error("Settlement for {period_key} is locked by another run")]
    SettlementLocked { period_key: String },

    /// A finalized non-dry-run settlement already exists for the key
    #[error("Period {period_key} is already settled")]
    AlreadySettled { period_key: String },

    #[error("Not authorized for capability: {capability}")]
    Unauthorized { capability: &'static str },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Pairing parameters for one settlement granularity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// Bonus per unit of matched volume (e.g. 0.10)
    pub pairing_rate: f64,

    /// Ceiling on matched volume per user per period (None = uncapped)
    pub per_period_cap: Option<i64>,

    /// How enqueued bonuses are disbursed
    pub release_mode: ReleaseMode,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            pairing_rate: 0.10,
            per_period_cap: None,
            release_mode: ReleaseMode::Manual,
        }
    }
}

/// Observability counts returned by every run, dry or real
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementResult {
    pub period_key: String,
    pub dry_run: bool,
    pub users_processed: usize,
    pub bonuses_created: usize,
    pub total_matched_volume: i64,
    pub total_bonus_amount: i64,
    pub carried_entries: usize,
}

/// One planned carry-forward ledger entry
#[derive(Debug, Clone, PartialEq, Eq)]
struct PlannedCarry {
    user_id: String,
    leg: Leg,
    amount: i64,
    to_period: PeriodKey,
}

/// Everything a run would write, computed before the first write
#[derive(Debug, Clone)]
pub(crate) struct SettlementPlan {
    settlement: Settlement,
    summaries: Vec<SettlementUserSummary>,
    bonuses: Vec<PendingBonus>,
    carries: Vec<PlannedCarry>,
    result: SettlementResult,
}

/// Execute a settlement run for one period key
///
/// This is the single entry point behind both produced operations; the
/// capability and input set follow from `granularity`.
#[allow(clippy::too_many_arguments)]
pub fn execute(
    store: &mut LedgerStore,
    audit: &mut AuditLog,
    locks: &PeriodLockRegistry,
    config: &SettlementConfig,
    auth: &dyn AuthorizationContext,
    period_key: &str,
    granularity: Granularity,
    dry_run: bool,
    ignore_lock: bool,
) -> Result<SettlementResult, SettlementError> {
    let capability = match granularity {
        Granularity::Weekly => Capability::ExecuteWeeklySettlement,
        Granularity::Quarterly => Capability::ExecuteQuarterlySettlement,
    };
    if !auth.is_authorized(capability) {
        return Err(SettlementError::Unauthorized {
            capability: capability.label(),
        });
    }

    let key = PeriodKey::parse(period_key).map_err(|_| SettlementError::InvalidPeriodKey {
        key: period_key.to_string(),
    })?;
    if key.granularity() != granularity {
        return Err(SettlementError::InvalidPeriodKey {
            key: period_key.to_string(),
        });
    }

    // Idempotency guard: a persisted settlement row ends the run before any
    // lock is taken. A non-finalized row means a run is (or was) in flight.
    if let Some(existing) = store.settlement(&key) {
        return Err(match existing.status() {
            SettlementStatus::Finalized => SettlementError::AlreadySettled {
                period_key: key.as_str().to_string(),
            },
            SettlementStatus::Open | SettlementStatus::Locked => {
                SettlementError::SettlementLocked {
                    period_key: key.as_str().to_string(),
                }
            }
        });
    }

    // Advisory lock held for the rest of the run; the guard drops on every
    // exit path. The override is an administrative escape hatch and is
    // always audited.
    let _guard = if ignore_lock {
        let seq = store.next_seq();
        audit.log(AuditEvent::LockBypassed {
            seq,
            period_key: key.as_str().to_string(),
        });
        None
    } else {
        Some(
            locks
                .acquire(key.as_str())
                .map_err(|_| SettlementError::SettlementLocked {
                    period_key: key.as_str().to_string(),
                })?,
        )
    };

    let started_seq = store.next_seq();
    audit.log(AuditEvent::SettlementStarted {
        seq: started_seq,
        period_key: key.as_str().to_string(),
        dry_run,
    });

    let plan = compute_plan(store, config, &key, granularity, started_seq, dry_run);

    if dry_run {
        let seq = store.next_seq();
        audit.log(AuditEvent::SettlementDryRun {
            seq,
            period_key: key.as_str().to_string(),
            users_processed: plan.result.users_processed,
            total_matched_volume: plan.result.total_matched_volume,
        });
        return Ok(plan.result);
    }

    commit_plan(store, audit, plan)
}

/// Pure planning pass: aggregate, pair, and stage every row the run writes
fn compute_plan(
    store: &LedgerStore,
    config: &SettlementConfig,
    period: &PeriodKey,
    granularity: Granularity,
    started_seq: u64,
    dry_run: bool,
) -> SettlementPlan {
    let bonus_type = match granularity {
        Granularity::Weekly => BonusType::Pairing,
        Granularity::Quarterly => BonusType::QuarterlyPairing,
    };

    let mut summaries = Vec::new();
    let mut bonuses = Vec::new();
    let mut carries = Vec::new();
    let mut total_matched = 0i64;
    let mut total_bonus = 0i64;

    for user_id in input_users(store, period, granularity) {
        let totals = input_totals(store, &user_id, period, granularity);
        if totals.is_zero() {
            // Users with no net volume produce no summary row
            continue;
        }

        let left = totals.left_pv.max(0);
        let right = totals.right_pv.max(0);
        let mut matched = left.min(right);
        if let Some(cap) = config.per_period_cap {
            matched = matched.min(cap);
        }
        let bonus_amount = apply_rate(matched, config.pairing_rate);

        // Only positive excess carries; net-negative legs are absorbed here
        let carried_left = left - matched;
        let carried_right = right - matched;
        let to_period = period.next();
        for (leg, amount) in [(Leg::Left, carried_left), (Leg::Right, carried_right)] {
            if amount > 0 {
                carries.push(PlannedCarry {
                    user_id: user_id.clone(),
                    leg,
                    amount,
                    to_period: to_period.clone(),
                });
            }
        }

        summaries.push(SettlementUserSummary::new(
            period.clone(),
            user_id.clone(),
            totals.left_pv,
            totals.right_pv,
            matched,
            bonus_amount,
            carried_left,
            carried_right,
        ));

        if bonus_amount > 0 {
            bonuses.push(PendingBonus::new(
                user_id.clone(),
                bonus_type,
                bonus_amount,
                BonusSource::Settlement {
                    period_key: period.as_str().to_string(),
                },
                period.clone(),
                config.release_mode,
            ));
            total_bonus += bonus_amount;
        }
        total_matched += matched;
    }

    let result = SettlementResult {
        period_key: period.as_str().to_string(),
        dry_run,
        users_processed: summaries.len(),
        bonuses_created: bonuses.len(),
        total_matched_volume: total_matched,
        total_bonus_amount: total_bonus,
        carried_entries: carries.len(),
    };

    SettlementPlan {
        settlement: Settlement::new(
            period.clone(),
            granularity,
            SettlementStatus::Locked,
            started_seq,
            false,
        ),
        summaries,
        bonuses,
        carries,
        result,
    }
}

/// Users participating in a period, sorted for deterministic iteration
fn input_users(store: &LedgerStore, period: &PeriodKey, granularity: Granularity) -> Vec<String> {
    let mut users = store.users_with_pv_in(period);
    if granularity == Granularity::Quarterly {
        for week in period.weeks() {
            for summary in store.summaries_for(&week) {
                users.push(summary.user_id().to_string());
            }
        }
        users.sort();
        users.dedup();
    }
    users
}

/// Input totals for one user: raw PV for weekly runs; for quarterly runs,
/// the quarter's weekly summaries plus PV tagged directly with the quarter
fn input_totals(
    store: &LedgerStore,
    user_id: &str,
    period: &PeriodKey,
    granularity: Granularity,
) -> LegTotals {
    let mut totals = store.totals_for(user_id, period);
    if granularity == Granularity::Quarterly {
        for week in period.weeks() {
            if let Some(summary) = store.summary_for_user(&week, user_id) {
                totals.left_pv += summary.left_pv();
                totals.right_pv += summary.right_pv();
            }
        }
    }
    totals
}

/// Apply a staged plan through store appends
///
/// Caller errors were all raised during planning; the store's unique
/// constraints remain as backstops and are re-checked before the first
/// write so a violation aborts with nothing applied.
fn commit_plan(
    store: &mut LedgerStore,
    audit: &mut AuditLog,
    plan: SettlementPlan,
) -> Result<SettlementResult, SettlementError> {
    let period = plan.settlement.period_key().clone();

    // Pre-flight every constraint the appends below rely on
    for carry in &plan.carries {
        let source = PvSource::Carry {
            origin_period: period.as_str().to_string(),
        };
        if store.has_pv_source(&source, &carry.user_id, carry.leg) {
            return Err(StoreError::DuplicateEntry {
                source_key: source.dedup_key(),
                user_id: carry.user_id.clone(),
                leg: carry.leg,
            }
            .into());
        }
    }

    store.insert_settlement(plan.settlement)?;

    for summary in plan.summaries {
        store.push_summary(summary);
    }

    for mut bonus in plan.bonuses {
        if bonus.release_mode() == ReleaseMode::Auto {
            let details = serde_json::json!({
                "bonus_id": bonus.id(),
                "period_key": period.as_str(),
            })
            .to_string();
            let trx_id = store.append_transaction(
                &bonus.recipient_id().to_string(),
                bonus.amount(),
                0,
                TrxType::BonusPayout,
                format!("Pairing bonus {}", period),
                details,
            )?;
            let seq = store.current_seq();
            audit.log(AuditEvent::BonusReleased {
                seq,
                bonus_id: bonus.id().to_string(),
                recipient_id: bonus.recipient_id().to_string(),
                amount: bonus.amount(),
                trx_id: trx_id.clone(),
            });
            bonus.mark_released(trx_id);
        }
        store.insert_bonus(bonus);
    }

    for carry in &plan.carries {
        store.record_pv(
            &carry.user_id,
            carry.leg,
            carry.amount,
            PvSource::Carry {
                origin_period: period.as_str().to_string(),
            },
            carry.to_period.clone(),
        )?;
        let seq = store.current_seq();
        audit.log(AuditEvent::CarryForward {
            seq,
            from_period: period.as_str().to_string(),
            to_period: carry.to_period.as_str().to_string(),
            user_id: carry.user_id.clone(),
            amount: carry.amount,
        });
    }

    let seq = store.next_seq();
    store
        .settlement_mut(&period)
        .expect("settlement row inserted above")
        .finalize(seq);
    audit.log(AuditEvent::SettlementFinalized {
        seq,
        period_key: period.as_str().to_string(),
        users_processed: plan.result.users_processed,
        total_matched_volume: plan.result.total_matched_volume,
        total_bonus_amount: plan.result.total_bonus_amount,
    });

    Ok(plan.result)
}
