//! Ledger store
//!
//! In-memory arena for the seven logical tables of the engine: users,
//! pv_ledger, orders, settlements, settlement_user_summaries,
//! pending_bonuses, adjustment_batches/entries, and transactions. All
//! cross-row links are id-based lookups into these arenas - never embedded
//! references - which keeps the append-only ledgers free of ownership
//! cycles.
//!
//! # Critical Invariants
//!
//! 1. **Append-only ledgers**: PV entries and transactions are inserted,
//!    never updated or removed
//! 2. **At-most-once PV recording**: duplicate `(source, user, leg)` inserts
//!    are rejected, so replaying an order event cannot double-credit
//! 3. **Unique constraints**: one non-dry-run settlement per period key, one
//!    occupant per `(parent, leg)`, unique batch keys and trx references
//! 4. **Monotonic sequence**: every append is stamped with an increasing
//!    `seq`; the engine has no wall clock
//!
//! Write-side callers build a fully validated plan first and then apply it
//! through the insert methods here, so a failed operation leaves no partial
//! rows behind.

pub mod lock;

use crate::core::period::PeriodKey;
use crate::models::adjustment::{AdjustmentBatch, AdjustmentEntry, AssetType, ReasonType, ReversalRef};
use crate::models::bonus::PendingBonus;
use crate::models::order::Order;
use crate::models::pv::{LegTotals, PvLedgerEntry, PvSource};
use crate::models::settlement::{Settlement, SettlementUserSummary};
use crate::models::transaction::{Transaction, TrxType};
use crate::models::user::{Leg, User};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors from store constraint enforcement
#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("User already exists: {user_id}")]
    DuplicateUser { user_id: String },

    #[error("Unknown parent: {parent_id}")]
    UnknownParent { parent_id: String },

    #[error("Placement occupied: parent {parent_id} {leg:?} already holds {occupant}")]
    PlacementOccupied {
        parent_id: String,
        leg: Leg,
        occupant: String,
    },

    #[error("User not found: {user_id}")]
    UserNotFound { user_id: String },

    #[error("Duplicate PV entry for source {source_key} (user {user_id}, {leg:?})")]
    DuplicateEntry {
        source_key: String,
        user_id: String,
        leg: Leg,
    },

    #[error("Order already exists: {order_id}")]
    DuplicateOrder { order_id: String },

    #[error("Non-dry-run settlement already exists for period {period_key}")]
    SettlementExists { period_key: String },

    #[error("Adjustment batch key already exists: {batch_key}")]
    DuplicateBatchKey { batch_key: String },
}

/// In-memory transactional row store
///
/// # Example
/// ```
/// use commission_engine_rs::core::period::PeriodKey;
/// use commission_engine_rs::models::{Leg, PvSource, User};
/// use commission_engine_rs::store::LedgerStore;
///
/// let mut store = LedgerStore::new();
/// store.add_user(User::root("ROOT".to_string())).unwrap();
///
/// let week = PeriodKey::parse("2026-W07").unwrap();
/// store
///     .record_pv(
///         "ROOT",
///         Leg::Left,
///         3000,
///         PvSource::Order { order_id: "ORD-1".to_string() },
///         week.clone(),
///     )
///     .unwrap();
///
/// let totals = store.totals_for("ROOT", &week);
/// assert_eq!(totals.left_pv, 3000);
/// ```
#[derive(Debug, Clone, Default)]
pub struct LedgerStore {
    /// Monotonic append sequence
    seq: u64,

    users: HashMap<String, User>,

    /// (parent, leg) -> occupant, enforcing one child per slot
    placements: HashMap<(String, Leg), String>,

    pv_entries: HashMap<String, PvLedgerEntry>,

    /// period key string -> entry ids, in insertion order
    pv_by_period: HashMap<String, Vec<String>>,

    /// duplicate-source index: "source|user|leg"
    pv_dedup: HashSet<String>,

    orders: HashMap<String, Order>,

    /// period key string -> settlement (non-dry-run rows only)
    settlements: HashMap<String, Settlement>,

    /// period key string -> summaries, owned by the settlement of that period
    summaries: HashMap<String, Vec<SettlementUserSummary>>,

    bonuses: HashMap<String, PendingBonus>,

    batches: HashMap<String, AdjustmentBatch>,
    batch_keys: HashSet<String>,

    adjustment_entries: HashMap<String, AdjustmentEntry>,

    /// batch id -> entry ids, in insertion order
    entries_by_batch: HashMap<String, Vec<String>>,

    transactions: HashMap<String, Transaction>,

    /// user id -> transaction ids, in insertion order
    tx_by_user: HashMap<String, Vec<String>>,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance and return the append sequence
    pub fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    /// Latest sequence handed out
    pub fn current_seq(&self) -> u64 {
        self.seq
    }

    // ------------------------------------------------------------------
    // Users & placement
    // ------------------------------------------------------------------

    /// Register a user, enforcing the one-occupant-per-slot invariant
    pub fn add_user(&mut self, user: User) -> Result<(), StoreError> {
        if self.users.contains_key(user.id()) {
            return Err(StoreError::DuplicateUser {
                user_id: user.id().to_string(),
            });
        }
        if let (Some(parent_id), Some(leg)) = (user.parent_id(), user.leg()) {
            if !self.users.contains_key(parent_id) {
                return Err(StoreError::UnknownParent {
                    parent_id: parent_id.to_string(),
                });
            }
            let slot = (parent_id.to_string(), leg);
            if let Some(occupant) = self.placements.get(&slot) {
                return Err(StoreError::PlacementOccupied {
                    parent_id: parent_id.to_string(),
                    leg,
                    occupant: occupant.clone(),
                });
            }
            self.placements.insert(slot, user.id().to_string());
        }
        self.users.insert(user.id().to_string(), user);
        Ok(())
    }

    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.get(id)
    }

    pub fn num_users(&self) -> usize {
        self.users.len()
    }

    /// Occupant of a placement slot, if any
    pub fn child_at(&self, parent_id: &str, leg: Leg) -> Option<&str> {
        self.placements
            .get(&(parent_id.to_string(), leg))
            .map(String::as_str)
    }

    // ------------------------------------------------------------------
    // PV ledger
    // ------------------------------------------------------------------

    /// Append a PV ledger entry
    ///
    /// Rejects duplicate `(source, user, leg)` with `DuplicateEntry` to keep
    /// at-most-once semantics for a given source event.
    pub fn record_pv(
        &mut self,
        user_id: &str,
        leg: Leg,
        amount: i64,
        source: PvSource,
        period_key: PeriodKey,
    ) -> Result<String, StoreError> {
        if !self.users.contains_key(user_id) {
            return Err(StoreError::UserNotFound {
                user_id: user_id.to_string(),
            });
        }
        let dedup = format!("{}|{}|{:?}", source.dedup_key(), user_id, leg);
        if self.pv_dedup.contains(&dedup) {
            return Err(StoreError::DuplicateEntry {
                source_key: source.dedup_key(),
                user_id: user_id.to_string(),
                leg,
            });
        }

        let seq = self.next_seq();
        let entry = PvLedgerEntry::new(
            user_id.to_string(),
            leg,
            amount,
            source,
            period_key.clone(),
            seq,
        );
        let id = entry.id().to_string();

        self.pv_dedup.insert(dedup);
        self.pv_by_period
            .entry(period_key.as_str().to_string())
            .or_default()
            .push(id.clone());
        self.pv_entries.insert(id.clone(), entry);
        Ok(id)
    }

    /// Check whether a `(source, user, leg)` entry was already recorded
    pub fn has_pv_source(&self, source: &PvSource, user_id: &str, leg: Leg) -> bool {
        self.pv_dedup
            .contains(&format!("{}|{}|{:?}", source.dedup_key(), user_id, leg))
    }

    pub fn pv_entry(&self, id: &str) -> Option<&PvLedgerEntry> {
        self.pv_entries.get(id)
    }

    pub fn num_pv_entries(&self) -> usize {
        self.pv_entries.len()
    }

    /// All PV entries for a period, in insertion order
    pub fn pv_for_period(&self, period_key: &PeriodKey) -> Vec<&PvLedgerEntry> {
        self.pv_by_period
            .get(period_key.as_str())
            .map(|ids| ids.iter().filter_map(|id| self.pv_entries.get(id)).collect())
            .unwrap_or_default()
    }

    /// Pure aggregation: signed left/right totals for one user in one period
    pub fn totals_for(&self, user_id: &str, period_key: &PeriodKey) -> LegTotals {
        let mut totals = LegTotals::default();
        for entry in self.pv_for_period(period_key) {
            if entry.user_id() == user_id {
                totals.add(entry.leg(), entry.amount());
            }
        }
        totals
    }

    /// Users with at least one PV entry in a period, sorted for determinism
    pub fn users_with_pv_in(&self, period_key: &PeriodKey) -> Vec<String> {
        let mut ids: Vec<String> = self
            .pv_for_period(period_key)
            .iter()
            .map(|e| e.user_id().to_string())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Total positive PV ledgered in a period (conservation bound)
    pub fn total_positive_pv_in(&self, period_key: &PeriodKey) -> i64 {
        self.pv_for_period(period_key)
            .iter()
            .map(|e| e.amount())
            .filter(|a| *a > 0)
            .sum()
    }

    /// PV entries produced by one order, in insertion order
    pub fn pv_entries_for_order(&self, order_id: &str) -> Vec<&PvLedgerEntry> {
        let mut entries: Vec<&PvLedgerEntry> = self
            .pv_entries
            .values()
            .filter(|e| {
                matches!(e.source(), PvSource::Order { order_id: oid } if oid == order_id)
            })
            .collect();
        entries.sort_by_key(|e| e.seq());
        entries
    }

    // ------------------------------------------------------------------
    // Orders
    // ------------------------------------------------------------------

    pub fn add_order(&mut self, order: Order) -> Result<(), StoreError> {
        if self.orders.contains_key(order.id()) {
            return Err(StoreError::DuplicateOrder {
                order_id: order.id().to_string(),
            });
        }
        self.orders.insert(order.id().to_string(), order);
        Ok(())
    }

    pub fn order(&self, id: &str) -> Option<&Order> {
        self.orders.get(id)
    }

    pub fn order_mut(&mut self, id: &str) -> Option<&mut Order> {
        self.orders.get_mut(id)
    }

    // ------------------------------------------------------------------
    // Settlements & summaries
    // ------------------------------------------------------------------

    /// Insert a non-dry-run settlement row (unique per period key)
    pub fn insert_settlement(&mut self, settlement: Settlement) -> Result<(), StoreError> {
        assert!(
            !settlement.is_dry_run(),
            "dry-run settlements are never persisted"
        );
        let key = settlement.period_key().as_str().to_string();
        if self.settlements.contains_key(&key) {
            return Err(StoreError::SettlementExists { period_key: key });
        }
        self.settlements.insert(key, settlement);
        Ok(())
    }

    pub fn settlement(&self, period_key: &PeriodKey) -> Option<&Settlement> {
        self.settlements.get(period_key.as_str())
    }

    pub(crate) fn settlement_mut(&mut self, period_key: &PeriodKey) -> Option<&mut Settlement> {
        self.settlements.get_mut(period_key.as_str())
    }

    pub fn num_settlements(&self) -> usize {
        self.settlements.len()
    }

    /// Append a summary row owned by the settlement of its period
    pub fn push_summary(&mut self, summary: SettlementUserSummary) {
        assert!(
            self.settlements.contains_key(summary.period_key().as_str()),
            "summary without settlement row for period {}",
            summary.period_key()
        );
        self.summaries
            .entry(summary.period_key().as_str().to_string())
            .or_default()
            .push(summary);
    }

    pub fn summaries_for(&self, period_key: &PeriodKey) -> &[SettlementUserSummary] {
        self.summaries
            .get(period_key.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn summary_for_user(
        &self,
        period_key: &PeriodKey,
        user_id: &str,
    ) -> Option<&SettlementUserSummary> {
        self.summaries_for(period_key)
            .iter()
            .find(|s| s.user_id() == user_id)
    }

    // ------------------------------------------------------------------
    // Pending bonuses
    // ------------------------------------------------------------------

    pub fn insert_bonus(&mut self, bonus: PendingBonus) {
        let id = bonus.id().to_string();
        assert!(
            !self.bonuses.contains_key(&id),
            "Bonus ID {} already exists",
            id
        );
        self.bonuses.insert(id, bonus);
    }

    pub fn bonus(&self, id: &str) -> Option<&PendingBonus> {
        self.bonuses.get(id)
    }

    pub(crate) fn bonus_mut(&mut self, id: &str) -> Option<&mut PendingBonus> {
        self.bonuses.get_mut(id)
    }

    pub fn num_bonuses(&self) -> usize {
        self.bonuses.len()
    }

    /// All bonuses, sorted by id for deterministic iteration
    pub fn bonuses(&self) -> Vec<&PendingBonus> {
        let mut all: Vec<&PendingBonus> = self.bonuses.values().collect();
        all.sort_by_key(|b| b.id().to_string());
        all
    }

    /// Bonuses accrued to one recipient in one period, sorted by id
    pub fn bonuses_for(&self, recipient_id: &str, period_key: &PeriodKey) -> Vec<&PendingBonus> {
        let mut found: Vec<&PendingBonus> = self
            .bonuses
            .values()
            .filter(|b| b.recipient_id() == recipient_id && b.accrued_period_key() == period_key)
            .collect();
        found.sort_by_key(|b| b.id().to_string());
        found
    }

    // ------------------------------------------------------------------
    // Adjustment batches & entries
    // ------------------------------------------------------------------

    pub fn insert_batch(&mut self, batch: AdjustmentBatch) -> Result<(), StoreError> {
        if self.batch_keys.contains(batch.batch_key()) {
            return Err(StoreError::DuplicateBatchKey {
                batch_key: batch.batch_key().to_string(),
            });
        }
        self.batch_keys.insert(batch.batch_key().to_string());
        self.batches.insert(batch.id().to_string(), batch);
        Ok(())
    }

    pub fn batch(&self, id: &str) -> Option<&AdjustmentBatch> {
        self.batches.get(id)
    }

    pub(crate) fn batch_mut(&mut self, id: &str) -> Option<&mut AdjustmentBatch> {
        self.batches.get_mut(id)
    }

    /// All batches, sorted by batch key for deterministic iteration
    pub fn batches(&self) -> Vec<&AdjustmentBatch> {
        let mut all: Vec<&AdjustmentBatch> = self.batches.values().collect();
        all.sort_by_key(|b| b.batch_key().to_string());
        all
    }

    /// Batches referencing one order (any reason), sorted by batch key
    pub fn batches_for_order(&self, order_id: &str) -> Vec<&AdjustmentBatch> {
        use crate::models::adjustment::BatchReference;
        let mut found: Vec<&AdjustmentBatch> = self
            .batches
            .values()
            .filter(|b| {
                matches!(b.reference(), BatchReference::Order { order_id: oid } if oid == order_id)
            })
            .collect();
        found.sort_by_key(|b| b.batch_key().to_string());
        found
    }

    pub fn add_adjustment_entry(&mut self, entry: AdjustmentEntry) {
        assert!(
            self.batches.contains_key(entry.batch_id()),
            "entry for unknown batch {}",
            entry.batch_id()
        );
        self.entries_by_batch
            .entry(entry.batch_id().to_string())
            .or_default()
            .push(entry.id().to_string());
        self.adjustment_entries.insert(entry.id().to_string(), entry);
    }

    /// Entries of a batch, in insertion order
    pub fn entries_for_batch(&self, batch_id: &str) -> Vec<&AdjustmentEntry> {
        self.entries_by_batch
            .get(batch_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.adjustment_entries.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Summed magnitude of effective reversals against one source row
    ///
    /// An entry counts once its effect has hit a ledger:
    /// - entries of finalized batches always count
    /// - PV entries of `RefundBeforeFinalize` batches count from creation,
    ///   because their negation is applied to the PV ledger immediately
    ///
    /// `exclude_batch` leaves out the batch currently being validated, so the
    /// caller can add its own candidate amounts on top.
    pub fn reversed_magnitude(&self, target: &ReversalRef, exclude_batch: Option<&str>) -> i64 {
        let key = target.key();
        self.adjustment_entries
            .values()
            .filter(|e| e.reversal_of().map(|r| r.key()) == Some(key.clone()))
            .filter(|e| Some(e.batch_id()) != exclude_batch)
            .filter(|e| {
                let batch = self
                    .batches
                    .get(e.batch_id())
                    .expect("entry without batch row");
                batch.is_finalized()
                    || (batch.reason() == ReasonType::RefundBeforeFinalize
                        && e.asset() == AssetType::Pv)
            })
            .map(|e| e.amount().abs())
            .sum()
    }

    /// Resolve a reversal reference to the original row's signed amount
    pub fn resolve_reversal(&self, target: &ReversalRef) -> Option<i64> {
        match target {
            ReversalRef::PvEntry { entry_id } => self.pv_entries.get(entry_id).map(|e| e.amount()),
            ReversalRef::Transaction { trx_id } => {
                self.transactions.get(trx_id).map(|t| t.amount())
            }
        }
    }

    /// Period of the original row, where it has one (PV entries only)
    pub fn reversal_period(&self, target: &ReversalRef) -> Option<&PeriodKey> {
        match target {
            ReversalRef::PvEntry { entry_id } => {
                self.pv_entries.get(entry_id).map(|e| e.period_key())
            }
            ReversalRef::Transaction { .. } => None,
        }
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Append a transaction ledger row and return its id
    pub fn append_transaction(
        &mut self,
        user_id: &str,
        amount: i64,
        charge: i64,
        trx_type: TrxType,
        remark: String,
        details: String,
    ) -> Result<String, StoreError> {
        if !self.users.contains_key(user_id) {
            return Err(StoreError::UserNotFound {
                user_id: user_id.to_string(),
            });
        }
        let seq = self.next_seq();
        let row = Transaction::new(
            user_id.to_string(),
            amount,
            charge,
            trx_type,
            remark,
            details,
            seq,
        );
        let id = row.id().to_string();
        self.tx_by_user
            .entry(user_id.to_string())
            .or_default()
            .push(id.clone());
        self.transactions.insert(id.clone(), row);
        Ok(id)
    }

    pub fn transaction(&self, id: &str) -> Option<&Transaction> {
        self.transactions.get(id)
    }

    pub fn num_transactions(&self) -> usize {
        self.transactions.len()
    }

    /// A user's transaction rows, in insertion order
    pub fn transactions_for(&self, user_id: &str) -> Vec<&Transaction> {
        self.tx_by_user
            .get(user_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.transactions.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Balance = running sum of a user's transaction rows (net of charges)
    pub fn balance_of(&self, user_id: &str) -> i64 {
        self.transactions_for(user_id).iter().map(|t| t.net()).sum()
    }
}
