//! Per-instance rotation locks
//!
//! Two overlapping rotations of the same instance would interleave
//! detach/allocate/attach calls against the same static IP name. The
//! registry hands out one async mutex per instance name; the orchestrator
//! holds its guard for the whole rotation so same-instance requests run one
//! after another while different instances proceed in parallel.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let locks = InstanceLocks::new();
//! let _guard = locks.acquire("Ubuntu-1").await;
//! // ... rotation runs while the guard is alive ...
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of per-instance async mutexes
///
/// ## Thread Safety
///
/// The map itself sits behind a synchronous mutex that is only held long
/// enough to look up or insert an entry, never across an await point.
#[derive(Debug, Clone, Default)]
pub struct InstanceLocks {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl InstanceLocks {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, instance_name: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            locks
                .entry(instance_name.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    /// Wait for exclusive access to `instance_name`
    ///
    /// The returned guard releases the instance when dropped.
    pub async fn acquire(&self, instance_name: &str) -> OwnedMutexGuard<()> {
        self.entry(instance_name).lock_owned().await
    }

    /// Try to take the lock without waiting
    ///
    /// # Returns
    ///
    /// `None` if a rotation of this instance is already in progress
    pub fn try_acquire(&self, instance_name: &str) -> Option<OwnedMutexGuard<()>> {
        self.entry(instance_name).try_lock_owned().ok()
    }

    /// Whether a rotation of `instance_name` currently holds the lock
    pub fn is_locked(&self, instance_name: &str) -> bool {
        let locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .get(instance_name)
            .is_some_and(|lock| lock.try_lock().is_err())
    }

    /// Number of instances that have ever been locked
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no instance has ever been locked
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
