//! Per-name mutual exclusion
//!
//! Create and delete for the same served model name never interleave. Locks
//! for different names are independent, and an entry only lives as long as
//! someone holds or waits for it.

use std::sync::Arc;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

/// Name-keyed async locks
#[derive(Debug, Default, Clone)]
pub struct NameLocks {
    /// Lock per name
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

/// Held lock for one name; released on drop
#[derive(Debug)]
pub struct NameGuard {
    /// Locked name
    name: String,

    /// Owning lock map
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,

    /// Underlying guard
    _guard: OwnedMutexGuard<()>,
}

impl NameLocks {
    /// Creates an empty lock map
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `name`
    pub async fn lock(&self, name: &str) -> NameGuard {
        let mutex = self
            .locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        trace!("Waiting for lock on {}", name);
        let guard = mutex.lock_owned().await;

        NameGuard {
            name: name.to_string(),
            locks: self.locks.clone(),
            _guard: guard,
        }
    }

    /// Number of names currently locked or awaited
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Returns true if no name is locked or awaited
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for NameGuard {
    fn drop(&mut self) {
        // Only the map and this guard reference the mutex: nobody is waiting
        self.locks
            .remove_if(&self.name, |_, mutex| Arc::strong_count(mutex) == 2);
    }
}
