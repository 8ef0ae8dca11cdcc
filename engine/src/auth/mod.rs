//! Authorization boundary
//!
//! The engine does not own authentication or role management; it trusts a
//! capability check supplied by the embedding application. Every mutating
//! operation names the capability it requires and fails with `Unauthorized`
//! when the check says no.

/// Capabilities gating the engine's mutating operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ExecuteWeeklySettlement,
    ExecuteQuarterlySettlement,
    CreateAdjustments,
    FinalizeAdjustments,
    ReleaseBonuses,
}

impl Capability {
    pub fn label(&self) -> &'static str {
        match self {
            Capability::ExecuteWeeklySettlement => "execute_weekly_settlement",
            Capability::ExecuteQuarterlySettlement => "execute_quarterly_settlement",
            Capability::CreateAdjustments => "create_adjustments",
            Capability::FinalizeAdjustments => "finalize_adjustments",
            Capability::ReleaseBonuses => "release_bonuses",
        }
    }
}

/// Capability check for the acting principal
pub trait AuthorizationContext {
    fn is_authorized(&self, capability: Capability) -> bool;
}

/// Grants everything; for tests and trusted embeddings
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AuthorizationContext for AllowAll {
    fn is_authorized(&self, _capability: Capability) -> bool {
        true
    }
}

/// Grants an explicit capability set
#[derive(Debug, Clone, Default)]
pub struct CapabilitySet {
    granted: Vec<Capability>,
}

impl CapabilitySet {
    pub fn new(granted: Vec<Capability>) -> Self {
        Self { granted }
    }
}

impl AuthorizationContext for CapabilitySet {
    fn is_authorized(&self, capability: Capability) -> bool {
        self.granted.contains(&capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_all() {
        assert!(AllowAll.is_authorized(Capability::ReleaseBonuses));
    }

    #[test]
    fn test_capability_set_is_exact() {
        let auth = CapabilitySet::new(vec![Capability::ExecuteWeeklySettlement]);
        assert!(auth.is_authorized(Capability::ExecuteWeeklySettlement));
        assert!(!auth.is_authorized(Capability::CreateAdjustments));
    }
}
