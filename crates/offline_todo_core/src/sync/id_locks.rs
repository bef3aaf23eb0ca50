//! Per-task-id async locks shared by user actions and the reconciler.

use crate::model::task::TaskId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = HashMap<TaskId, Arc<AsyncMutex<()>>>;

/// Registry of per-id mutexes.
///
/// Cloning shares the registry. An entry with no holder or waiter is removed
/// on the next lock or release, including one left by a cancelled waiter, so
/// the map only grows with in-flight ids.
#[derive(Clone, Default)]
pub struct IdLocks {
    inner: Arc<Mutex<LockMap>>,
}

impl IdLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `id`.
    pub async fn lock(&self, id: &TaskId) -> IdLockGuard {
        let mutex = {
            let mut map = self.map();
            prune_idle(&mut map);
            map.entry(id.clone()).or_default().clone()
        };
        let guard = mutex.lock_owned().await;
        IdLockGuard {
            locks: self.clone(),
            guard: Some(guard),
        }
    }

    /// Number of registered ids, counting idle entries not yet pruned.
    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }

    fn map(&self) -> MutexGuard<'_, LockMap> {
        // The map holds no invariants a panicking holder could break.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Exclusive access to one task id; released on drop.
pub struct IdLockGuard {
    locks: IdLocks,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for IdLockGuard {
    fn drop(&mut self) {
        // Release first so our own reference no longer counts as a user.
        drop(self.guard.take());
        prune_idle(&mut self.locks.map());
    }
}

/// Removes entries referenced only by the map itself.
///
/// Holders and waiters each keep a clone, and clones are only taken under the
/// map lock, so a count of one cannot grow while we hold it.
fn prune_idle(map: &mut LockMap) {
    map.retain(|_, mutex| Arc::strong_count(mutex) > 1);
}
