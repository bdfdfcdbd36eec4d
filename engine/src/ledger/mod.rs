//! # Ledger Collaborator
//!
//! The engine never talks to the ledger network directly. It reads fresh
//! account snapshots and submits serialized envelopes through the
//! [`LedgerClient`] trait, injected into every coordinator.
//!
//! ## Architecture
//!
//! ```text
//! mod.rs    : LedgerClient trait, snapshots, receipts, errors, RetryOnce
//! memory.rs : MemoryLedger, an in-process ledger with real signature checks
//! ```
//!
//! Snapshots are never cached by the engine. Every quorum decision reads
//! the live thresholds, so a threshold raised between composition and
//! signing is honoured.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::crypto::keys::AccountId;
use crate::transaction::types::{SignerKey, ThresholdCategory};

pub use memory::MemoryLedger;

// ---------------------------------------------------------------------------
// Account Snapshot
// ---------------------------------------------------------------------------

/// Per-category weight thresholds plus the master key weight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub master: u32,
    pub low: u32,
    pub medium: u32,
    pub high: u32,
}

impl Thresholds {
    pub fn required(&self, category: ThresholdCategory) -> u32 {
        match category {
            ThresholdCategory::Low => self.low,
            ThresholdCategory::Medium => self.medium,
            ThresholdCategory::High => self.high,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signer {
    pub key: SignerKey,
    pub weight: u32,
}

/// Read-only view of an account, fetched fresh for every decision.
///
/// `signers` includes the master key (with weight `thresholds.master`)
/// when that weight is non-zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub account_id: AccountId,
    pub sequence: u64,
    pub thresholds: Thresholds,
    pub signers: Vec<Signer>,
}

impl AccountSnapshot {
    pub fn required_weight(&self, category: ThresholdCategory) -> u32 {
        self.thresholds.required(category)
    }

    pub fn signer_weight(&self, key: &SignerKey) -> Option<u32> {
        self.signers.iter().find(|s| &s.key == key).map(|s| s.weight)
    }
}

// ---------------------------------------------------------------------------
// Submission results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub hash: String,
    pub ledger_seq: u64,
}

/// Machine-readable result codes returned by the ledger on rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultCodes {
    pub transaction: String,
    pub operations: Vec<String>,
}

/// A submission the ledger refused. Persisted on the pending record.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct SubmissionError {
    pub message: String,
    pub result_codes: Option<ResultCodes>,
}

impl SubmissionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            result_codes: None,
        }
    }

    pub fn with_codes(
        message: impl Into<String>,
        transaction: impl Into<String>,
        operations: Vec<String>,
    ) -> Self {
        Self {
            message: message.into(),
            result_codes: Some(ResultCodes {
                transaction: transaction.into(),
                operations,
            }),
        }
    }

    /// The transaction-level result code, if the ledger returned one.
    pub fn transaction_code(&self) -> Option<&str> {
        self.result_codes.as_ref().map(|c| c.transaction.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("account {0} not found on ledger")]
    AccountNotFound(AccountId),

    #[error("transaction rejected: {0}")]
    Rejected(SubmissionError),

    /// Network-level failure; the request may or may not have arrived.
    #[error("ledger transport error: {0}")]
    Transport(String),

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
}

// ---------------------------------------------------------------------------
// LedgerClient
// ---------------------------------------------------------------------------

#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn load_account(&self, account: &AccountId) -> Result<AccountSnapshot, LedgerError>;

    async fn submit_envelope(&self, envelope: &[u8]) -> Result<SubmissionReceipt, LedgerError>;
}

#[async_trait]
impl<L: LedgerClient + ?Sized> LedgerClient for Arc<L> {
    async fn load_account(&self, account: &AccountId) -> Result<AccountSnapshot, LedgerError> {
        (**self).load_account(account).await
    }

    async fn submit_envelope(&self, envelope: &[u8]) -> Result<SubmissionReceipt, LedgerError> {
        (**self).submit_envelope(envelope).await
    }
}

/// Retries a submission exactly once when it fails at the transport level.
///
/// Ledger rejections are final and pass straight through. This is the
/// only retry anywhere on the submission path.
pub struct RetryOnce<L> {
    inner: L,
}

impl<L> RetryOnce<L> {
    pub fn new(inner: L) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> L {
        self.inner
    }
}

#[async_trait]
impl<L: LedgerClient> LedgerClient for RetryOnce<L> {
    async fn load_account(&self, account: &AccountId) -> Result<AccountSnapshot, LedgerError> {
        self.inner.load_account(account).await
    }

    async fn submit_envelope(&self, envelope: &[u8]) -> Result<SubmissionReceipt, LedgerError> {
        match self.inner.submit_envelope(envelope).await {
            Err(LedgerError::Transport(reason)) => {
                warn!(error = %reason, "submission transport failure, retrying once");
                self.inner.submit_envelope(envelope).await
            }
            other => other,
        }
    }
}
