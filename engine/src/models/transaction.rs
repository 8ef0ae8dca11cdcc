//! Transaction ledger model
//!
//! The user-facing balance log. Every balance change - bonus payouts,
//! adjustment reversals, manual credits and debits - is an appended row;
//! a user's balance is the running sum of their rows. There is no mutable
//! balance field anywhere in the engine.
//!
//! CRITICAL: All money values are i64 minor units.

use serde::{Deserialize, Serialize};

/// Category of a transaction ledger row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrxType {
    /// Settlement bonus credited to a recipient
    BonusPayout,

    /// Signed effect applied by a finalized adjustment batch
    Adjustment,

    /// Operator-initiated credit (manual adjustment batch)
    ManualCredit,

    /// Operator-initiated debit (manual adjustment batch)
    ManualDebit,
}

/// Append-only transaction ledger row
///
/// # Example
/// ```
/// use commission_engine_rs::models::{Transaction, TrxType};
///
/// let row = Transaction::new(
///     "ROOT".to_string(),
///     3000,
///     0,
///     TrxType::BonusPayout,
///     "Pairing bonus 2026-W07".to_string(),
///     String::new(),
///     1,
/// );
/// assert_eq!(row.amount(), 3000);
/// assert!(!row.trx().is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique row identifier (UUID)
    id: String,

    /// User whose balance this row affects
    user_id: String,

    /// Signed amount (positive = credit, negative = debit)
    amount: i64,

    /// Fee charged alongside the amount (non-negative)
    charge: i64,

    /// Unique external reference (UUID)
    trx: String,

    /// Row category
    trx_type: TrxType,

    /// Human-readable description
    remark: String,

    /// Free-form detail payload (JSON by convention, may be empty)
    details: String,

    /// Store sequence number at insertion
    seq: u64,
}

impl Transaction {
    pub fn new(
        user_id: String,
        amount: i64,
        charge: i64,
        trx_type: TrxType,
        remark: String,
        details: String,
        seq: u64,
    ) -> Self {
        assert!(charge >= 0, "charge must be non-negative");
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            amount,
            charge,
            trx: uuid::Uuid::new_v4().to_string(),
            trx_type,
            remark,
            details,
            seq,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn charge(&self) -> i64 {
        self.charge
    }

    /// Unique external reference
    pub fn trx(&self) -> &str {
        &self.trx
    }

    pub fn trx_type(&self) -> TrxType {
        self.trx_type
    }

    pub fn remark(&self) -> &str {
        &self.remark
    }

    pub fn details(&self) -> &str {
        &self.details
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Net balance effect of this row (amount minus charge)
    pub fn net(&self) -> i64 {
        self.amount - self.charge
    }
}
