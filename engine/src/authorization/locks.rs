//! Per-transaction mutual exclusion.
//!
//! Every read-modify-write of a pending record (signing, resubmission,
//! approval, pre-authorized submission) runs while holding that record's
//! lock, including the ledger round trip in the middle. Entries are
//! dropped from the registry as soon as nobody holds or waits on them.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to transaction `id`.
    pub async fn lock(&self, id: &str) -> TransactionGuard<'_> {
        let mutex = self.locks.entry(id.to_string()).or_default().clone();
        let guard = mutex.lock_owned().await;
        TransactionGuard {
            registry: self,
            id: id.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of ids currently locked or awaited.
    pub fn active(&self) -> usize {
        self.locks.len()
    }
}

/// Held for the duration of a record mutation.
pub struct TransactionGuard<'a> {
    registry: &'a LockRegistry,
    id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        // Release first so our own Arc no longer counts.
        drop(self.guard.take());
        self.registry
            .locks
            .remove_if(&self.id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_id_is_exclusive() {
        let registry = Arc::new(LockRegistry::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let (registry, inside, max_seen) = (registry.clone(), inside.clone(), max_seen.clone());
            handles.push(tokio::spawn(async move {
                let _guard = registry.lock("tx-1").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(registry.active(), 0);
    }

    #[tokio::test]
    async fn different_ids_do_not_block() {
        let registry = LockRegistry::new();
        let _a = registry.lock("a").await;
        let _b = tokio::time::timeout(Duration::from_millis(100), registry.lock("b"))
            .await
            .expect("lock on another id should not wait");
        assert_eq!(registry.active(), 2);
    }

    #[tokio::test]
    async fn entry_removed_after_release() {
        let registry = LockRegistry::new();
        {
            let _guard = registry.lock("x").await;
            assert_eq!(registry.active(), 1);
        }
        assert_eq!(registry.active(), 0);
    }
}
