//! Binary tree resolver
//!
//! Walks placement links to answer the two questions settlement needs:
//! which ancestors does a user roll volume up to, and on which leg of each
//! ancestor does that volume land. Links are id lookups into the store, so
//! the resolver is a pure read path.
//!
//! # Critical Invariants
//!
//! 1. The chain is bounded by tree depth and terminates at the root
//! 2. A corrupted placement cycle is detected and reported, never looped
//! 3. Propagation amounts are decided by `PropagationPolicy`, not hard-coded

use crate::core::money::apply_rate;
use crate::models::user::{Leg, Position, User};
use crate::store::LedgerStore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from tree resolution
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("User not found: {user_id}")]
    UserNotFound { user_id: String },

    #[error("Placement cycle detected at user {user_id}")]
    CycleDetected { user_id: String },
}

/// One step of an upline chain
///
/// `leg` is the leg of `ancestor_id` whose subtree contains the subject -
/// i.e. the leg the subject's volume lands on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AncestorLink {
    pub ancestor_id: String,
    pub leg: Leg,
}

/// How order volume propagates up the tree
///
/// PV is credited to the immediate parent's corresponding leg and then
/// propagated further up, optionally limited in depth and decayed per
/// level. The default propagates the full amount to every ancestor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagationPolicy {
    /// Number of ancestor levels to credit (None = to the root)
    pub max_depth: Option<usize>,

    /// Multiplier applied per additional level above the parent
    /// (1.0 = no decay). Not money - applied through the money helper.
    pub decay: f64,
}

impl Default for PropagationPolicy {
    fn default() -> Self {
        Self {
            max_depth: None,
            decay: 1.0,
        }
    }
}

impl PropagationPolicy {
    /// Whether an ancestor at `depth` (1 = immediate parent) is credited
    pub fn reaches(&self, depth: usize) -> bool {
        match self.max_depth {
            Some(max) => depth <= max,
            None => true,
        }
    }

    /// Volume credited at `depth` for a base amount
    pub fn volume_at(&self, depth: usize, base: i64) -> i64 {
        debug_assert!(depth >= 1);
        if (self.decay - 1.0).abs() < f64::EPSILON {
            return base;
        }
        apply_rate(base, self.decay.powi(depth as i32 - 1))
    }
}

/// Ordered ancestor chain for a user, nearest parent first
///
/// # Example
/// ```
/// use commission_engine_rs::models::{Leg, User};
/// use commission_engine_rs::store::LedgerStore;
/// use commission_engine_rs::tree::upline_chain;
///
/// let mut store = LedgerStore::new();
/// store.add_user(User::root("ROOT".to_string())).unwrap();
/// store
///     .add_user(User::placed("A".to_string(), "ROOT".to_string(), Leg::Left, None))
///     .unwrap();
/// store
///     .add_user(User::placed("B".to_string(), "A".to_string(), Leg::Right, None))
///     .unwrap();
///
/// let chain = upline_chain(&store, "B").unwrap();
/// assert_eq!(chain.len(), 2);
/// assert_eq!(chain[0].ancestor_id, "A");
/// assert_eq!(chain[0].leg, Leg::Right);
/// assert_eq!(chain[1].ancestor_id, "ROOT");
/// assert_eq!(chain[1].leg, Leg::Left);
/// ```
pub fn upline_chain(store: &LedgerStore, user_id: &str) -> Result<Vec<AncestorLink>, TreeError> {
    let mut current = store.user(user_id).ok_or_else(|| TreeError::UserNotFound {
        user_id: user_id.to_string(),
    })?;

    let mut chain = Vec::new();
    let mut visited = std::collections::HashSet::new();
    visited.insert(current.id().to_string());

    while let (Some(parent_id), Some(leg)) = (current.parent_id(), current.leg()) {
        if !visited.insert(parent_id.to_string()) {
            return Err(TreeError::CycleDetected {
                user_id: parent_id.to_string(),
            });
        }
        chain.push(AncestorLink {
            ancestor_id: parent_id.to_string(),
            leg,
        });
        current = store.user(parent_id).ok_or_else(|| TreeError::UserNotFound {
            user_id: parent_id.to_string(),
        })?;
    }

    Ok(chain)
}

/// Leg of a user under its parent, or `Root` for the tree root
pub fn leg_of(store: &LedgerStore, user_id: &str) -> Result<Position, TreeError> {
    store
        .user(user_id)
        .map(User::position)
        .ok_or_else(|| TreeError::UserNotFound {
            user_id: user_id.to_string(),
        })
}
