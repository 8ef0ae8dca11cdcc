//! Adjustment Module
//!
//! Non-destructive correction of ledger history: refund batches (with the
//! pre/post-finalize strategy split), manual operator corrections, and the
//! snapshot-with-hash audit trail every batch carries.
//!
//! # Critical Invariants
//!
//! 1. **Append-only corrections**: adjustments never rewrite existing rows;
//!    they append compensating entries
//! 2. **No over-reversal**: summed reversal magnitude against any source row
//!    stays within the original amount, validated at creation and again at
//!    finalization
//! 3. **Settled history is immutable**: post-finalize reversals land in the
//!    next open period, never in the settled one
//! 4. **Exactly-once finalization**: a finalized batch cannot be finalized
//!    (or mutated) again

pub mod engine;
pub mod snapshot;

// Re-export public API
pub use engine::{
    create_manual_adjustment, create_refund_adjustment, finalize_adjustment_batch,
    AdjustmentError, BatchOutcome, ManualLine,
};
