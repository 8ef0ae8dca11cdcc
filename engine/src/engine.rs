//! Engine facade
//!
//! Owns the ledger store, audit log, lock registry and configuration, and
//! exposes the engine's operations as methods. Embedding applications hold
//! one `Engine` and drive everything through it; the free functions in the
//! operation modules remain available for callers that manage state
//! themselves.
//!
//! # Determinism
//!
//! The engine has no wall clock and no I/O: given the same call sequence,
//! two engines produce identical ledgers and audit streams (modulo the
//! random row ids).

use crate::adjustment::{self, AdjustmentError, BatchOutcome, ManualLine};
use crate::audit::AuditLog;
use crate::auth::{AllowAll, AuthorizationContext};
use crate::bonus::{self, BonusError};
use crate::core::period::{Granularity, PeriodKey};
use crate::ledger::{self, LedgerError};
use crate::models::order::Order;
use crate::models::user::{Leg, User};
use crate::settlement::{self, SettlementConfig, SettlementError, SettlementResult};
use crate::store::lock::PeriodLockRegistry;
use crate::store::{LedgerStore, StoreError};
use crate::tree::PropagationPolicy;

/// Engine-wide configuration
///
/// Weekly and quarterly settlement carry independent pairing parameters;
/// the propagation policy governs how order volume climbs the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub weekly: SettlementConfig,
    pub quarterly: SettlementConfig,
    pub propagation: PropagationPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weekly: SettlementConfig::default(),
            quarterly: SettlementConfig::default(),
            propagation: PropagationPolicy::default(),
        }
    }
}

/// Settlement and ledger adjustment engine
///
/// # Example
/// ```
/// use commission_engine_rs::engine::{Engine, EngineConfig};
/// use commission_engine_rs::models::{Leg, Order, OrderStatus};
/// use commission_engine_rs::core::period::PeriodKey;
///
/// let mut engine = Engine::new(EngineConfig::default());
/// engine.register_root("ROOT").unwrap();
/// engine.register_user("A", "ROOT", Leg::Left, None).unwrap();
///
/// let week = PeriodKey::parse("2026-W07").unwrap();
/// let order = Order::new(
///     "ORD-1".to_string(),
///     "A".to_string(),
///     4999,
///     3000,
///     OrderStatus::Shipped,
///     week,
/// );
/// engine.post_order(order).unwrap();
///
/// let result = engine.execute_weekly_settlement("2026-W07", true, false).unwrap();
/// assert!(result.dry_run);
/// ```
pub struct Engine {
    store: LedgerStore,
    audit: AuditLog,
    locks: PeriodLockRegistry,
    config: EngineConfig,
    auth: Box<dyn AuthorizationContext>,
}

impl Engine {
    /// Create an engine that authorizes every operation
    pub fn new(config: EngineConfig) -> Self {
        Self::with_auth(config, Box::new(AllowAll))
    }

    /// Create an engine with a caller-supplied authorization context
    pub fn with_auth(config: EngineConfig, auth: Box<dyn AuthorizationContext>) -> Self {
        Self {
            store: LedgerStore::new(),
            audit: AuditLog::new(),
            locks: PeriodLockRegistry::new(),
            config,
            auth,
        }
    }

    // ------------------------------------------------------------------
    // Tree registration
    // ------------------------------------------------------------------

    /// Register the root user of the tree
    pub fn register_root(&mut self, user_id: &str) -> Result<(), StoreError> {
        self.store.add_user(User::root(user_id.to_string()))
    }

    /// Register a user placed under a parent's leg
    pub fn register_user(
        &mut self,
        user_id: &str,
        parent_id: &str,
        leg: Leg,
        referrer_id: Option<String>,
    ) -> Result<(), StoreError> {
        self.store.add_user(User::placed(
            user_id.to_string(),
            parent_id.to_string(),
            leg,
            referrer_id,
        ))
    }

    // ------------------------------------------------------------------
    // PV ledger
    // ------------------------------------------------------------------

    /// Post a shipped order's volume up the tree
    pub fn post_order(&mut self, order: Order) -> Result<Vec<String>, LedgerError> {
        ledger::post_order(&mut self.store, order, &self.config.propagation)
    }

    // ------------------------------------------------------------------
    // Settlement
    // ------------------------------------------------------------------

    /// Execute (or dry-run) the weekly settlement for one period key
    ///
    /// `ignore_lock` bypasses the period lock; the bypass is recorded in the
    /// audit log. Intended for operator recovery after a crashed run.
    pub fn execute_weekly_settlement(
        &mut self,
        period_key: &str,
        dry_run: bool,
        ignore_lock: bool,
    ) -> Result<SettlementResult, SettlementError> {
        settlement::execute(
            &mut self.store,
            &mut self.audit,
            &self.locks,
            &self.config.weekly,
            self.auth.as_ref(),
            period_key,
            Granularity::Weekly,
            dry_run,
            ignore_lock,
        )
    }

    /// Execute (or dry-run) the quarterly settlement for one period key
    pub fn execute_quarterly_settlement(
        &mut self,
        period_key: &str,
        dry_run: bool,
    ) -> Result<SettlementResult, SettlementError> {
        settlement::execute(
            &mut self.store,
            &mut self.audit,
            &self.locks,
            &self.config.quarterly,
            self.auth.as_ref(),
            period_key,
            Granularity::Quarterly,
            dry_run,
            false,
        )
    }

    // ------------------------------------------------------------------
    // Adjustments
    // ------------------------------------------------------------------

    /// Create a refund adjustment batch for one order
    pub fn create_refund_adjustment(
        &mut self,
        order_id: &str,
        batch_key: &str,
    ) -> Result<String, AdjustmentError> {
        adjustment::create_refund_adjustment(
            &mut self.store,
            &mut self.audit,
            self.auth.as_ref(),
            order_id,
            batch_key,
        )
    }

    /// Create a manual adjustment batch
    pub fn create_manual_adjustment(
        &mut self,
        batch_key: &str,
        note: &str,
        period_key: &str,
        lines: &[ManualLine],
    ) -> Result<String, AdjustmentError> {
        let period = PeriodKey::parse(period_key).map_err(|e| AdjustmentError::InvalidState {
            detail: format!("invalid period key {}: {}", period_key, e),
        })?;
        adjustment::create_manual_adjustment(
            &mut self.store,
            &mut self.audit,
            self.auth.as_ref(),
            batch_key,
            note,
            &period,
            lines,
        )
    }

    /// Finalize a draft adjustment batch
    pub fn finalize_adjustment_batch(
        &mut self,
        batch_id: &str,
    ) -> Result<BatchOutcome, AdjustmentError> {
        adjustment::finalize_adjustment_batch(
            &mut self.store,
            &mut self.audit,
            self.auth.as_ref(),
            batch_id,
        )
    }

    // ------------------------------------------------------------------
    // Bonus queue
    // ------------------------------------------------------------------

    /// Release a set of pending bonuses
    ///
    /// Each bonus is processed independently; one failure does not stop the
    /// rest. Returns the per-bonus outcome (the crediting transaction id on
    /// success) in input order.
    pub fn release_pending_bonuses(
        &mut self,
        bonus_ids: &[String],
    ) -> Vec<(String, Result<String, BonusError>)> {
        bonus_ids
            .iter()
            .map(|id| {
                let outcome =
                    bonus::release(&mut self.store, &mut self.audit, self.auth.as_ref(), id);
                (id.clone(), outcome)
            })
            .collect()
    }

    /// Terminally reject one pending bonus
    pub fn reject_pending_bonus(&mut self, bonus_id: &str, reason: &str) -> Result<(), BonusError> {
        bonus::reject(
            &mut self.store,
            &mut self.audit,
            self.auth.as_ref(),
            bonus_id,
            reason,
        )
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// A user's balance: running sum of their transaction rows
    pub fn balance_of(&self, user_id: &str) -> i64 {
        self.store.balance_of(user_id)
    }

    /// Read access to the underlying store
    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    /// Read access to the audit log
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// The engine's configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::bonus::BonusStatus;
    use crate::models::order::OrderStatus;

    fn engine_with_pair() -> Engine {
        let mut engine = Engine::new(EngineConfig::default());
        engine.register_root("ROOT").unwrap();
        engine.register_user("A", "ROOT", Leg::Left, None).unwrap();
        engine.register_user("B", "ROOT", Leg::Right, None).unwrap();
        let week = PeriodKey::parse("2026-W07").unwrap();
        for (order_id, buyer) in [("ORD-A", "A"), ("ORD-B", "B")] {
            engine
                .post_order(Order::new(
                    order_id.to_string(),
                    buyer.to_string(),
                    3000,
                    3000,
                    OrderStatus::Shipped,
                    week.clone(),
                ))
                .unwrap();
        }
        engine
    }

    #[test]
    fn test_end_to_end_weekly_cycle() {
        let mut engine = engine_with_pair();
        let result = engine
            .execute_weekly_settlement("2026-W07", false, false)
            .unwrap();
        assert_eq!(result.total_matched_volume, 3000);
        assert_eq!(result.bonuses_created, 1);

        // Default config releases manually
        let ids: Vec<String> = engine
            .store()
            .bonuses()
            .iter()
            .map(|b| b.id().to_string())
            .collect();
        let outcomes = engine.release_pending_bonuses(&ids);
        assert!(outcomes.iter().all(|(_, r)| r.is_ok()));
        assert_eq!(engine.balance_of("ROOT"), 300);
    }

    #[test]
    fn test_release_batch_reports_per_bonus_outcomes() {
        let mut engine = engine_with_pair();
        engine
            .execute_weekly_settlement("2026-W07", false, false)
            .unwrap();
        let mut ids: Vec<String> = engine
            .store()
            .bonuses()
            .iter()
            .map(|b| b.id().to_string())
            .collect();
        ids.push("missing".to_string());

        let outcomes = engine.release_pending_bonuses(&ids);
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].1.is_ok());
        assert!(matches!(
            outcomes[1].1,
            Err(BonusError::BonusNotFound { .. })
        ));
    }

    #[test]
    fn test_reject_through_facade() {
        let mut engine = engine_with_pair();
        engine
            .execute_weekly_settlement("2026-W07", false, false)
            .unwrap();
        let id = engine.store().bonuses()[0].id().to_string();
        engine.reject_pending_bonus(&id, "audit hold").unwrap();
        assert!(matches!(
            engine.store().bonus(&id).unwrap().status(),
            BonusStatus::Rejected { .. }
        ));
        assert_eq!(engine.balance_of("ROOT"), 0);
    }
}
