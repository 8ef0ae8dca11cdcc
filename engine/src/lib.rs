//! Commission Engine - Settlement & Ledger Adjustment
//!
//! Deterministic settlement engine for binary-tree compensation plans:
//! point-value (PV) ledgering, periodic pairing settlement, a pending bonus
//! queue, and non-destructive adjustment of already-ledgered history.
//!
//! # Architecture
//!
//! - **core**: Period key arithmetic and money/rate conversion
//! - **models**: Domain types (User, Order, PvLedgerEntry, Settlement, ...)
//! - **store**: In-memory row store with ledger constraints, plus the
//!   period lock registry
//! - **tree**: Binary placement tree resolution (upline chains)
//! - **ledger**: PV ledger write path (order posting, propagation)
//! - **settlement**: Weekly/quarterly pairing runs
//! - **bonus**: Pending bonus release/rejection
//! - **adjustment**: Refund and manual correction batches
//! - **audit**: Structured event log of every significant action
//! - **engine**: Facade owning all of the above
//!
//! # Critical Invariants
//!
//! 1. All money and volume values are i64 minor units
//! 2. Ledgers are append-only; corrections are compensating entries
//! 3. At most one finalized settlement per period key
//! 4. No source row is ever reversed beyond its original magnitude
//! 5. No wall clock: ordering comes from the store's monotonic sequence

// Module declarations
pub mod adjustment;
pub mod audit;
pub mod auth;
pub mod bonus;
pub mod core;
pub mod engine;
pub mod ledger;
pub mod models;
pub mod settlement;
pub mod store;
pub mod tree;

// Re-exports for convenience
pub use adjustment::{
    create_manual_adjustment, create_refund_adjustment, finalize_adjustment_batch,
    AdjustmentError, BatchOutcome, ManualLine,
};
pub use audit::{AuditEvent, AuditLog};
pub use auth::{AllowAll, AuthorizationContext, Capability, CapabilitySet};
pub use bonus::BonusError;
pub use core::period::{Granularity, PeriodKey, PeriodKeyError};
pub use engine::{Engine, EngineConfig};
pub use ledger::{post_order, LedgerError};
pub use models::{
    AdjustmentBatch, AdjustmentEntry, AssetType, BatchReference, BonusSource, BonusStatus,
    BonusType, Leg, LegTotals, Order, OrderStatus, PendingBonus, Position, PvLedgerEntry,
    PvSource, ReasonType, ReleaseMode, ReversalRef, Settlement, SettlementStatus,
    SettlementUserSummary, Transaction, TrxType, User,
};
pub use settlement::{SettlementConfig, SettlementError, SettlementResult};
pub use store::lock::{LockError, PeriodLockGuard, PeriodLockRegistry};
pub use store::{LedgerStore, StoreError};
pub use tree::{upline_chain, AncestorLink, PropagationPolicy, TreeError};
