//! # SledStore: Persistent Transaction Store
//!
//! Pending transactions on disk, built on sled's embedded key-value store.
//!
//! ## Tree Layout
//!
//! | Tree                   | Key              | Value                        |
//! |------------------------|------------------|------------------------------|
//! | `pending_transactions` | `id` (UTF-8)     | `bincode(PendingTransaction)` |
//!
//! ## Atomicity
//!
//! Updates use sled's `compare_and_swap` against the exact bytes the
//! version check was made on. Two writers racing on one record cannot both
//! win, even across processes sharing the database.

use sled::{Db, Tree};
use std::path::Path;
use tracing::debug;

use super::{sort_oldest_first, StoreError, StoreResult, TransactionStore};
use crate::authorization::pending::PendingTransaction;

const PENDING_TREE: &str = "pending_transactions";

/// sled-backed [`TransactionStore`].
///
/// sled is thread-safe; `SledStore` can be shared via `Arc` without
/// external synchronization.
#[derive(Debug, Clone)]
pub struct SledStore {
    db: Db,
    pending: Tree,
}

impl SledStore {
    /// Open or create a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A store that lives in memory and vanishes on drop.
    pub fn open_temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let pending = db.open_tree(PENDING_TREE)?;
        Ok(Self { db, pending })
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

fn encode(tx: &PendingTransaction) -> StoreResult<Vec<u8>> {
    bincode::serialize(tx).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode(bytes: &[u8]) -> StoreResult<PendingTransaction> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

impl TransactionStore for SledStore {
    fn create(&self, tx: &PendingTransaction) -> StoreResult<()> {
        let bytes = encode(tx)?;
        self.pending
            .compare_and_swap(tx.id().as_bytes(), None as Option<&[u8]>, Some(bytes))?
            .map_err(|_| StoreError::Duplicate(tx.id().to_string()))?;
        debug!(id = tx.id(), "pending transaction created");
        Ok(())
    }

    fn find(&self, id: &str) -> StoreResult<Option<PendingTransaction>> {
        match self.pending.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn update(&self, tx: &mut PendingTransaction) -> StoreResult<()> {
        let key = tx.id().as_bytes().to_vec();
        let current = self
            .pending
            .get(&key)?
            .ok_or_else(|| StoreError::NotFound(tx.id().to_string()))?;
        let stored = decode(&current)?;
        if stored.version() != tx.version() {
            return Err(StoreError::VersionConflict {
                id: tx.id().to_string(),
                expected: tx.version(),
                found: stored.version(),
            });
        }

        let mut next = tx.clone();
        next.advance_version();
        let bytes = encode(&next)?;
        self.pending
            .compare_and_swap(&key, Some(current), Some(bytes))?
            .map_err(|cas| {
                let found = cas
                    .current
                    .as_deref()
                    .and_then(|b| decode(b).ok())
                    .map(|t| t.version())
                    .unwrap_or_default();
                StoreError::VersionConflict {
                    id: next.id().to_string(),
                    expected: tx.version(),
                    found,
                }
            })?;
        *tx = next;
        Ok(())
    }

    fn scan(&self) -> StoreResult<Vec<PendingTransaction>> {
        let mut all = Vec::with_capacity(self.pending.len());
        for entry in self.pending.iter() {
            let (_key, value) = entry?;
            all.push(decode(&value)?);
        }
        sort_oldest_first(&mut all);
        Ok(all)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::pending::tests::sample;
    use crate::crypto::keys::LedgerKeypair;
    use crate::transaction::types::SignerKey;

    #[test]
    fn open_temporary_store() {
        let store = SledStore::open_temporary().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let a = LedgerKeypair::generate().account_id();
        let tx = sample(&a, &a, None);
        {
            let store = SledStore::open(dir.path()).unwrap();
            store.create(&tx).unwrap();
            store.flush().unwrap();
        }
        let store = SledStore::open(dir.path()).unwrap();
        assert_eq!(store.find(tx.id()).unwrap(), Some(tx));
    }

    #[test]
    fn duplicate_create_fails() {
        let store = SledStore::open_temporary().unwrap();
        let a = LedgerKeypair::generate().account_id();
        let tx = sample(&a, &a, None);
        store.create(&tx).unwrap();
        assert!(matches!(store.create(&tx), Err(StoreError::Duplicate(_))));
    }

    #[test]
    fn update_is_compare_and_swap() {
        let store = SledStore::open_temporary().unwrap();
        let a = LedgerKeypair::generate().account_id();
        let tx = sample(&a, &a, None);
        store.create(&tx).unwrap();

        let mut first = tx.clone();
        let mut second = tx;
        store.update(&mut first).unwrap();
        assert_eq!(first.version(), 1);
        assert!(matches!(
            store.update(&mut second),
            Err(StoreError::VersionConflict { expected: 0, found: 1, .. })
        ));
        assert_eq!(store.find(first.id()).unwrap().unwrap().version(), 1);
    }

    #[test]
    fn scan_and_queries() {
        let store = SledStore::open_temporary().unwrap();
        let (a, b, foreign, foreign_signer) = (
            LedgerKeypair::generate().account_id(),
            LedgerKeypair::generate().account_id(),
            LedgerKeypair::generate().account_id(),
            LedgerKeypair::generate().account_id(),
        );
        store
            .create(&sample(&a, &a, Some((&foreign, &foreign_signer))))
            .unwrap();
        store.create(&sample(&b, &b, None)).unwrap();

        assert_eq!(store.scan().unwrap().len(), 2);
        assert_eq!(store.find_by_source(&b).unwrap().len(), 1);
        assert_eq!(
            store
                .find_awaiting_signer(&SignerKey::Ed25519(foreign_signer))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn missing_record_is_none() {
        let store = SledStore::open_temporary().unwrap();
        assert!(store.find("nope").unwrap().is_none());
    }
}
