//! In-memory transaction store.

use parking_lot::RwLock;
use std::collections::HashMap;

use super::{sort_oldest_first, StoreError, StoreResult, TransactionStore};
use crate::authorization::pending::PendingTransaction;

/// A [`TransactionStore`] over a `HashMap`. Cloned records go in and out,
/// so callers never alias stored state.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, PendingTransaction>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl TransactionStore for MemoryStore {
    fn create(&self, tx: &PendingTransaction) -> StoreResult<()> {
        let mut records = self.records.write();
        if records.contains_key(tx.id()) {
            return Err(StoreError::Duplicate(tx.id().to_string()));
        }
        records.insert(tx.id().to_string(), tx.clone());
        Ok(())
    }

    fn find(&self, id: &str) -> StoreResult<Option<PendingTransaction>> {
        Ok(self.records.read().get(id).cloned())
    }

    fn update(&self, tx: &mut PendingTransaction) -> StoreResult<()> {
        let mut records = self.records.write();
        let stored = records
            .get(tx.id())
            .ok_or_else(|| StoreError::NotFound(tx.id().to_string()))?;
        if stored.version() != tx.version() {
            return Err(StoreError::VersionConflict {
                id: tx.id().to_string(),
                expected: tx.version(),
                found: stored.version(),
            });
        }
        tx.advance_version();
        records.insert(tx.id().to_string(), tx.clone());
        Ok(())
    }

    fn scan(&self) -> StoreResult<Vec<PendingTransaction>> {
        let mut all: Vec<_> = self.records.read().values().cloned().collect();
        sort_oldest_first(&mut all);
        Ok(all)
    }
}
