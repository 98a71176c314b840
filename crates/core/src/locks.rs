//! Per-identifier locks for the steps that change both disk and index.
//!
//! An entry exists only while some task holds or waits for the lock of that identifier.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub(crate) struct IdLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl IdLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Waits until no other task holds `id`, in arrival order.
    pub(crate) async fn lock(&self, id: &str) -> IdGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock();
            Arc::clone(locks.entry(id.to_string()).or_default())
        };
        let guard = Arc::clone(&lock).lock_owned().await;
        IdGuard {
            owner: self,
            id: id.to_string(),
            lock,
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

pub(crate) struct IdGuard<'a> {
    owner: &'a IdLocks,
    id: String,
    lock: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for IdGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.owner.locks.lock();
        // The map and this guard are the only holders; nobody is waiting.
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.id);
        }
    }
}
