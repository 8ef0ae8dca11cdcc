//! User model with binary-tree placement
//!
//! Participants are arranged in a balanced binary tree. Each user sits on
//! exactly one leg (LEFT or RIGHT) under exactly one parent; the root has no
//! parent. The sponsor (`referrer_id`) is tracked separately from placement,
//! since enrollment order and tree position diverge in binary plans.
//!
//! # Critical Invariants
//!
//! 1. At most one occupant per `(parent, leg)` pair (enforced by the store)
//! 2. A user has at most one parent; the root has none
//! 3. Placement links are id-based lookups, never embedded references

use serde::{Deserialize, Serialize};

/// Binary-tree leg under a parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Leg {
    Left,
    Right,
}

impl Leg {
    /// Short label used in remarks and audit output
    pub fn label(&self) -> &'static str {
        match self {
            Leg::Left => "LEFT",
            Leg::Right => "RIGHT",
        }
    }
}

/// Position of a user relative to its parent
///
/// `Root` is returned for the tree root, which has no parent and therefore
/// no leg assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Left,
    Right,
    Root,
}

/// A participant in the binary compensation tree
///
/// # Example
/// ```
/// use commission_engine_rs::models::{Leg, User};
///
/// let root = User::root("ROOT".to_string());
/// assert!(root.parent_id().is_none());
///
/// let left = User::placed("U1".to_string(), "ROOT".to_string(), Leg::Left, None);
/// assert_eq!(left.parent_id(), Some("ROOT"));
/// assert_eq!(left.leg(), Some(Leg::Left));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user identifier
    id: String,

    /// Upline (placement parent); None for the root
    parent_id: Option<String>,

    /// Leg occupied under the parent; None for the root
    leg: Option<Leg>,

    /// Enrollment sponsor; independent of tree placement
    referrer_id: Option<String>,
}

impl User {
    /// Create the tree root (no parent, no leg)
    pub fn root(id: String) -> Self {
        Self {
            id,
            parent_id: None,
            leg: None,
            referrer_id: None,
        }
    }

    /// Create a user placed on a leg under a parent
    pub fn placed(id: String, parent_id: String, leg: Leg, referrer_id: Option<String>) -> Self {
        Self {
            id,
            parent_id: Some(parent_id),
            leg: Some(leg),
            referrer_id,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    pub fn leg(&self) -> Option<Leg> {
        self.leg
    }

    pub fn referrer_id(&self) -> Option<&str> {
        self.referrer_id.as_deref()
    }

    /// Position relative to the parent
    pub fn position(&self) -> Position {
        match self.leg {
            Some(Leg::Left) => Position::Left,
            Some(Leg::Right) => Position::Right,
            None => Position::Root,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}
