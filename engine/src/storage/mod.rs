//! # Storage Module
//!
//! Persistence for [`PendingTransaction`] records behind the
//! [`TransactionStore`] trait. Coordinators receive a store at
//! construction; nothing in the engine reaches for a global handle.
//!
//! ## Architecture
//!
//! ```text
//! mod.rs    : TransactionStore trait, StoreError, derived queries
//! memory.rs : MemoryStore, a RwLock'd HashMap for tests and embedding
//! db.rs     : SledStore, records as bincode in a sled tree
//! ```
//!
//! ## Design Decisions
//!
//! 1. **Optimistic updates.** Every record carries a `version`. `update`
//!    only succeeds if the stored version still equals the caller's, and
//!    bumps it. A lost race surfaces as [`StoreError::VersionConflict`]
//!    instead of silently overwriting another writer's signatures.
//!
//! 2. **Bincode on disk.** Compact and deterministic. JSON is for the
//!    operator CLI.
//!
//! 3. **Queries are scans.** Pending sets are small and short-lived, so
//!    the derived queries filter a full scan instead of maintaining
//!    secondary indexes.

pub mod db;
pub mod memory;

use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

use crate::authorization::pending::PendingTransaction;
use crate::crypto::keys::AccountId;
use crate::transaction::types::SignerKey;

pub use db::SledStore;
pub use memory::MemoryStore;

/// Errors raised by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("transaction {0} already exists")]
    Duplicate(String),

    #[error("transaction {0} not found")]
    NotFound(String),

    #[error("transaction {id} was modified concurrently (expected version {expected}, found {found})")]
    VersionConflict { id: String, expected: u64, found: u64 },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence collaborator for pending transactions.
pub trait TransactionStore: Send + Sync {
    /// Inserts a new record. Fails with `Duplicate` if the id exists.
    fn create(&self, tx: &PendingTransaction) -> StoreResult<()>;

    fn find(&self, id: &str) -> StoreResult<Option<PendingTransaction>>;

    /// Compare-and-swap on `tx.version()`. On success `tx` carries the
    /// new version.
    fn update(&self, tx: &mut PendingTransaction) -> StoreResult<()>;

    /// Every record, oldest first.
    fn scan(&self) -> StoreResult<Vec<PendingTransaction>>;

    fn find_by_source(&self, source: &AccountId) -> StoreResult<Vec<PendingTransaction>> {
        Ok(self
            .scan()?
            .into_iter()
            .filter(|tx| tx.source_account() == source)
            .collect())
    }

    fn find_awaiting_signer(&self, key: &SignerKey) -> StoreResult<Vec<PendingTransaction>> {
        Ok(self
            .scan()?
            .into_iter()
            .filter(|tx| tx.awaits_signer(key))
            .collect())
    }

    fn find_awaiting_approver(&self, approver: &AccountId) -> StoreResult<Vec<PendingTransaction>> {
        Ok(self
            .scan()?
            .into_iter()
            .filter(|tx| tx.awaits_approver(approver))
            .collect())
    }

    /// Open records waiting on `account`, as a signer first and then as an
    /// approver, each record listed once.
    fn find_to_sign(&self, account: &AccountId) -> StoreResult<Vec<PendingTransaction>> {
        let key = SignerKey::Ed25519(account.clone());
        let mut seen = HashSet::new();
        Ok(self
            .find_awaiting_signer(&key)?
            .into_iter()
            .chain(self.find_awaiting_approver(account)?)
            .filter(|tx| seen.insert(tx.id().to_string()))
            .collect())
    }
}

impl<S: TransactionStore + ?Sized> TransactionStore for Arc<S> {
    fn create(&self, tx: &PendingTransaction) -> StoreResult<()> {
        (**self).create(tx)
    }

    fn find(&self, id: &str) -> StoreResult<Option<PendingTransaction>> {
        (**self).find(id)
    }

    fn update(&self, tx: &mut PendingTransaction) -> StoreResult<()> {
        (**self).update(tx)
    }

    fn scan(&self) -> StoreResult<Vec<PendingTransaction>> {
        (**self).scan()
    }
}

fn sort_oldest_first(records: &mut [PendingTransaction]) {
    records.sort_by(|a, b| {
        a.created_at()
            .cmp(&b.created_at())
            .then_with(|| a.id().cmp(b.id()))
    });
}
