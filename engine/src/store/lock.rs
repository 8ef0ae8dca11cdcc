//! Period-scoped advisory locks
//!
//! Settlement execution for one period key must be mutually exclusive, while
//! runs for different keys may proceed in parallel. The registry hands out
//! RAII guards: a held key is released when its guard drops, on every exit
//! path - success, error, or panic unwind - so a failed run can never leave
//! a period permanently locked.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors from lock acquisition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LockError {
    #[error("Period {period_key} is locked by a concurrent settlement run")]
    Held { period_key: String },
}

/// Registry of held period keys
///
/// Cloning the registry shares the underlying lock table.
///
/// # Example
/// ```
/// use commission_engine_rs::store::lock::PeriodLockRegistry;
///
/// let registry = PeriodLockRegistry::new();
/// let guard = registry.acquire("2026-W07").unwrap();
///
/// // Same key contends, a different key does not
/// assert!(registry.acquire("2026-W07").is_err());
/// assert!(registry.acquire("2026-W08").is_ok());
///
/// drop(guard);
/// assert!(registry.acquire("2026-W07").is_ok());
/// ```
#[derive(Debug, Clone, Default)]
pub struct PeriodLockRegistry {
    held: Arc<Mutex<HashSet<String>>>,
}

impl PeriodLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the advisory lock for a period key
    pub fn acquire(&self, period_key: &str) -> Result<PeriodLockGuard, LockError> {
        let mut held = self.held.lock().expect("lock registry poisoned");
        if !held.insert(period_key.to_string()) {
            return Err(LockError::Held {
                period_key: period_key.to_string(),
            });
        }
        Ok(PeriodLockGuard {
            held: Arc::clone(&self.held),
            period_key: period_key.to_string(),
        })
    }

    /// Whether a key is currently held
    pub fn is_held(&self, period_key: &str) -> bool {
        self.held
            .lock()
            .expect("lock registry poisoned")
            .contains(period_key)
    }
}

/// RAII guard for one held period key
#[derive(Debug)]
pub struct PeriodLockGuard {
    held: Arc<Mutex<HashSet<String>>>,
    period_key: String,
}

impl PeriodLockGuard {
    pub fn period_key(&self) -> &str {
        &self.period_key
    }
}

impl Drop for PeriodLockGuard {
    fn drop(&mut self) {
        // Release even when the registry mutex was poisoned by a panicking
        // holder; the set itself is always in a consistent state
        let mut held = match self.held.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        held.remove(&self.period_key);
    }
}
