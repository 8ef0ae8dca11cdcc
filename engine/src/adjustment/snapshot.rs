//! Batch snapshot capture and hashing
//!
//! Every adjustment batch records the pre-adjustment state of the users it
//! touches, plus a SHA-256 hash over the snapshot's canonical JSON form.
//! The snapshot is immutable once captured; re-hashing and comparing against
//! the stored hash detects tampering.

use crate::adjustment::AdjustmentError;
use crate::core::period::PeriodKey;
use crate::models::adjustment::{BatchSnapshot, UserSnapshot};
use crate::store::LedgerStore;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Capture the pre-adjustment state of the given users
///
/// PV totals are read for the given period; balances are ledger-wide. The
/// user list is sorted so the snapshot (and therefore its hash) does not
/// depend on caller ordering.
pub fn capture(store: &LedgerStore, user_ids: &[String], period_key: &PeriodKey) -> BatchSnapshot {
    let mut ids: Vec<&String> = user_ids.iter().collect();
    ids.sort();
    ids.dedup();

    let users = ids
        .into_iter()
        .map(|user_id| {
            let totals = store.totals_for(user_id, period_key);
            UserSnapshot {
                user_id: user_id.clone(),
                balance: store.balance_of(user_id),
                left_pv: totals.left_pv,
                right_pv: totals.right_pv,
                period_key: period_key.as_str().to_string(),
            }
        })
        .collect();

    BatchSnapshot {
        captured_at_seq: store.current_seq(),
        users,
    }
}

/// SHA-256 over the canonical JSON form of a snapshot
///
/// Uses canonical JSON serialization with sorted keys to ensure
/// deterministic hashing regardless of map iteration order.
pub fn snapshot_hash<T: Serialize>(snapshot: &T) -> Result<String, AdjustmentError> {
    use serde_json::Value;
    use std::collections::BTreeMap;

    let value = serde_json::to_value(snapshot)
        .map_err(|e| AdjustmentError::Snapshot(format!("snapshot serialization failed: {}", e)))?;

    // Recursively sort all object keys for canonical representation
    fn canonicalize(value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> =
                    map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
            other => other,
        }
    }

    let canonical_value = canonicalize(value);
    let json = serde_json::to_string(&canonical_value)
        .map_err(|e| AdjustmentError::Snapshot(format!("snapshot serialization failed: {}", e)))?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    let result = hasher.finalize();

    Ok(format!("{:x}", result))
}

/// Verify a batch's stored hash against its snapshot
pub fn verify(snapshot: &BatchSnapshot, stored_hash: &str) -> Result<bool, AdjustmentError> {
    Ok(snapshot_hash(snapshot)? == stored_hash)
}
