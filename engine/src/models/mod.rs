//! Domain models for the settlement and adjustment engine

pub mod adjustment;
pub mod bonus;
pub mod order;
pub mod pv;
pub mod settlement;
pub mod transaction;
pub mod user;

// Re-exports
pub use adjustment::{
    AdjustmentBatch, AdjustmentEntry, AssetType, BatchReference, BatchSnapshot, ReasonType,
    ReversalRef, UserSnapshot,
};
pub use bonus::{BonusSource, BonusStatus, BonusType, PendingBonus, ReleaseMode};
pub use order::{Order, OrderStatus};
pub use pv::{LegTotals, PvLedgerEntry, PvSource};
pub use settlement::{Settlement, SettlementStatus, SettlementUserSummary};
pub use transaction::{Transaction, TrxType};
pub use user::{Leg, Position, User};
