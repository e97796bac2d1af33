//! Per-field async locks for serializing read-modify-write cycles.
//!
//! One `tokio::sync::Mutex` per (owner, field) pair, created lazily. A guard is held from
//! before the read until after the write, so two submissions for the same
//! item in this process can no longer overwrite each other. Writers in other
//! processes are not covered.

use super::FieldRef;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Idle entries are pruned once the map grows past this many keys.
const PRUNE_THRESHOLD: usize = 256;

type LockKey = (String, FieldRef);

/// Lazily created lock per (owner, field).
#[derive(Debug, Default)]
pub struct ItemLocks {
    locks: Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>,
}

impl ItemLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to one field of one owner. Released when
    /// the guard drops.
    pub async fn acquire(&self, owner: &str, field: &FieldRef) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            if locks.len() >= PRUNE_THRESHOLD {
                // Only the map holds an idle lock; holders and waiters keep a clone.
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            locks
                .entry((owner.to_string(), field.clone()))
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
