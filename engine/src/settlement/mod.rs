//! Settlement Module
//!
//! The periodic closing process: aggregate the PV ledger for one period,
//! pair left/right volume per user, write the settlement record and
//! per-user summaries, and enqueue pending bonuses.
//!
//! # Critical Invariants
//!
//! 1. **Idempotency**: at most one non-dry-run settlement per period key;
//!    re-running fails with `AlreadySettled` instead of double-crediting
//! 2. **Mutual exclusion**: concurrent runs for the same key are serialized
//!    by a period-scoped advisory lock, released on every exit path
//! 3. **All-or-nothing**: either the settlement row, all summaries, all
//!    bonuses and all carry-forward entries land, or none do
//! 4. **Conservation**: summed matched volume never exceeds the total
//!    positive PV ledgered for the period
//! 5. **Dry-run purity**: a dry run returns the same result shape as a real
//!    run and leaves every table untouched

pub mod engine;

// Re-export public API
pub use engine::{execute, SettlementConfig, SettlementError, SettlementResult};
