//! Order interface model
//!
//! Orders live outside this engine; their lifecycle (payment, shipping,
//! refund approval) belongs to the commerce layer. The engine only consumes
//! the fields below: a shipped order feeds PV into the ledger, and a
//! refunded order triggers the adjustment engine.

use crate::core::period::PeriodKey;
use serde::{Deserialize, Serialize};

/// Order lifecycle states visible to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Qualifying: accrues PV when posted
    Shipped,

    /// Cancelled before shipping; never accrues PV
    Cancelled,

    /// Refunded after qualifying; handled by the adjustment engine
    Refunded,
}

/// Snapshot of an order as supplied by the order source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    id: String,
    user_id: String,

    /// Sale price (i64 minor units)
    total_price: i64,

    /// Business volume: the PV-bearing value of the order
    bv: i64,

    status: OrderStatus,

    /// Accrual period the order belongs to
    period_key: PeriodKey,
}

impl Order {
    pub fn new(
        id: String,
        user_id: String,
        total_price: i64,
        bv: i64,
        status: OrderStatus,
        period_key: PeriodKey,
    ) -> Self {
        assert!(bv >= 0, "bv must be non-negative");
        Self {
            id,
            user_id,
            total_price,
            bv,
            status,
            period_key,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn total_price(&self) -> i64 {
        self.total_price
    }

    pub fn bv(&self) -> i64 {
        self.bv
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn period_key(&self) -> &PeriodKey {
        &self.period_key
    }

    /// Record the refund transition (the order source owns the lifecycle;
    /// the engine mirrors the state it was told about)
    pub fn mark_refunded(&mut self) {
        self.status = OrderStatus::Refunded;
    }
}
