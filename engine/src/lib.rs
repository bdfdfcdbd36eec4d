// Copyright (c) 2026 Ledger Custody Contributors. MIT License.
// See LICENSE for details.

//! # Custody Engine: Transaction Quorum & Authorization
//!
//! A custodial authorization service for a ledger whose accounts are
//! controlled by weighted signer sets. The engine composes ledger
//! transactions, tracks who has approved them, decides exactly when the
//! approved weight is enough, and submits each transaction once.
//!
//! ## Architecture
//!
//! - **transaction**: Typed operations, envelopes, hashing, threshold
//!   classification, fee injection, offer pricing.
//! - **authorization**: The composer, quorum evaluator, signing and
//!   pre-authorization coordinators, and the `TransactionService` facade.
//! - **ledger**: The `LedgerClient` seam plus an in-memory ledger that
//!   checks weighted signatures the way the real network does.
//! - **storage**: The `TransactionStore` seam with in-memory and sled
//!   backends.
//! - **crypto**: Ed25519 keys and SHA-256.
//! - **config**: Protocol constants and `EngineConfig`.
//!
//! ## Design Philosophy
//!
//! 1. Collaborators are injected. No globals, no ambient connections.
//! 2. Validation happens before anything is persisted.
//! 3. A transaction reaches the ledger at most once per quorum event.
//! 4. Secrets are only ever held for the duration of a signing call.

pub mod authorization;
pub mod config;
pub mod crypto;
pub mod ledger;
pub mod storage;
pub mod transaction;

pub use authorization::{AuthorizationError, PendingTransaction, TransactionService};
pub use config::EngineConfig;
pub use ledger::{LedgerClient, MemoryLedger};
pub use storage::{MemoryStore, SledStore, TransactionStore};
