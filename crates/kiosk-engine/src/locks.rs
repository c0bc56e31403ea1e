//! # Row-Lock Registry
//!
//! Scoped exclusive locks over individual products and members.
//!
//! ## Why
//! Two settlements racing on the same product must not both read stock 1
//! and both decrement. The registry hands out one async mutex per entity;
//! a settlement acquires every lock it needs **before** opening its unit of
//! work, re-reads state under the lock, and releases on every exit path
//! (success, error, panic) because the guards are RAII.
//!
//! ## Deadlock Freedom
//! `lock_all` sorts and dedups the key set before acquiring, so two carts
//! sharing two products always take the locks in the same order - the
//! classic lock-ordering discipline.
//!
//! ```text
//! Cart A: [P2, P1]  ──sort──► lock P1, then P2
//! Cart B: [P1, P2]  ──sort──► lock P1, then P2   (never crosses A)
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Identity of a lockable row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockKey {
    Product(String),
    Member(String),
}

/// Guards for one acquisition; dropping releases every lock.
pub struct RowLockGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

/// Registry of per-entity locks.
///
/// Entries are created on first use and kept for the registry's lifetime;
/// a store's product/member population is small enough that eviction is
/// not worth the complexity.
#[derive(Debug, Default)]
pub struct RowLocks {
    inner: Mutex<HashMap<LockKey, Arc<Mutex<()>>>>,
}

impl RowLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires exclusive locks on every given key, in deterministic
    /// (sorted, deduped) order. Returns a guard bundle that releases all
    /// locks when dropped.
    pub async fn lock_all(&self, mut keys: Vec<LockKey>) -> RowLockGuard {
        keys.sort();
        keys.dedup();

        // Resolve each key to its mutex first, holding the registry map
        // lock only briefly; the per-row locks are awaited outside it.
        let mutexes: Vec<Arc<Mutex<()>>> = {
            let mut map = self.inner.lock().await;
            keys.iter()
                .map(|key| Arc::clone(map.entry(key.clone()).or_default()))
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }

        RowLockGuard { _guards: guards }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
