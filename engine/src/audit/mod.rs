//! Audit event log
//!
//! Every externally significant action in the engine - settlement runs,
//! lock bypasses, batch lifecycle, bonus disbursement - is recorded as a
//! structured event. The log enables:
//! - Auditing (who moved money, and why)
//! - Debugging (reconstruct what a run did)
//! - Verification (tests assert on the event stream)
//!
//! Events are ordered by the store sequence at which they were emitted.

/// A recorded engine action
#[derive(Debug, Clone, PartialEq)]
pub enum AuditEvent {
    /// A settlement run began (dry or real)
    SettlementStarted {
        seq: u64,
        period_key: String,
        dry_run: bool,
    },

    /// The period lock was bypassed via the administrative override
    LockBypassed { seq: u64, period_key: String },

    /// A non-dry-run settlement committed
    SettlementFinalized {
        seq: u64,
        period_key: String,
        users_processed: usize,
        total_matched_volume: i64,
        total_bonus_amount: i64,
    },

    /// A dry run completed without side effects
    SettlementDryRun {
        seq: u64,
        period_key: String,
        users_processed: usize,
        total_matched_volume: i64,
    },

    /// Unmatched volume rolled into the next period
    CarryForward {
        seq: u64,
        from_period: String,
        to_period: String,
        user_id: String,
        amount: i64,
    },

    /// An adjustment batch was created in draft
    BatchCreated {
        seq: u64,
        batch_key: String,
        reason: String,
    },

    /// An adjustment batch finalized and applied its effects
    BatchFinalized {
        seq: u64,
        batch_key: String,
        transactions_applied: usize,
        pv_reversals: usize,
    },

    /// A pending bonus was credited to the transaction ledger
    BonusReleased {
        seq: u64,
        bonus_id: String,
        recipient_id: String,
        amount: i64,
        trx_id: String,
    },

    /// A pending bonus was terminally rejected
    BonusRejected {
        seq: u64,
        bonus_id: String,
        reason: String,
    },
}

impl AuditEvent {
    /// Store sequence at which the event was emitted
    pub fn seq(&self) -> u64 {
        match self {
            AuditEvent::SettlementStarted { seq, .. } => *seq,
            AuditEvent::LockBypassed { seq, .. } => *seq,
            AuditEvent::SettlementFinalized { seq, .. } => *seq,
            AuditEvent::SettlementDryRun { seq, .. } => *seq,
            AuditEvent::CarryForward { seq, .. } => *seq,
            AuditEvent::BatchCreated { seq, .. } => *seq,
            AuditEvent::BatchFinalized { seq, .. } => *seq,
            AuditEvent::BonusReleased { seq, .. } => *seq,
            AuditEvent::BonusRejected { seq, .. } => *seq,
        }
    }

    /// Short event type label
    pub fn event_type(&self) -> &'static str {
        match self {
            AuditEvent::SettlementStarted { .. } => "SettlementStarted",
            AuditEvent::LockBypassed { .. } => "LockBypassed",
            AuditEvent::SettlementFinalized { .. } => "SettlementFinalized",
            AuditEvent::SettlementDryRun { .. } => "SettlementDryRun",
            AuditEvent::CarryForward { .. } => "CarryForward",
            AuditEvent::BatchCreated { .. } => "BatchCreated",
            AuditEvent::BatchFinalized { .. } => "BatchFinalized",
            AuditEvent::BonusReleased { .. } => "BonusReleased",
            AuditEvent::BonusRejected { .. } => "BonusRejected",
        }
    }

    /// Period key, for settlement-scoped events
    pub fn period_key(&self) -> Option<&str> {
        match self {
            AuditEvent::SettlementStarted { period_key, .. } => Some(period_key),
            AuditEvent::LockBypassed { period_key, .. } => Some(period_key),
            AuditEvent::SettlementFinalized { period_key, .. } => Some(period_key),
            AuditEvent::SettlementDryRun { period_key, .. } => Some(period_key),
            AuditEvent::CarryForward { from_period, .. } => Some(from_period),
            _ => None,
        }
    }
}

/// Append-only audit log with query helpers
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    events: Vec<AuditEvent>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn log(&mut self, event: AuditEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[AuditEvent] {
        &self.events
    }

    pub fn events_of_type(&self, event_type: &str) -> Vec<&AuditEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    pub fn events_for_period(&self, period_key: &str) -> Vec<&AuditEvent> {
        self.events
            .iter()
            .filter(|e| e.period_key() == Some(period_key))
            .collect()
    }
}
