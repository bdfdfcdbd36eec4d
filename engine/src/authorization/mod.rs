//! # Authorization Module
//!
//! Turns requested operations into pending transactions, collects weighted
//! signer approvals, and submits each transaction to the ledger exactly once
//! when its quorum is met.
//!
//! ## Architecture
//!
//! ```text
//! composer.rs : ComposeRequest → validated, fee-injected PendingTransaction
//! pending.rs  : PendingTransaction record, signature and approver slots
//! quorum.rs   : QuorumEvaluator, frozen slot weights vs live thresholds
//! signing.rs  : SigningCoordinator, sign / resubmit
//! preauth.rs  : PreAuthorizationCoordinator, pre-authorize / approve
//! submit.rs   : the one submission path, claim before submit
//! locks.rs    : per-transaction async mutexes
//! service.rs  : TransactionService facade and per-type setup calls
//! error.rs    : AuthorizationError
//! ```
//!
//! ## Design Decisions
//!
//! 1. **Weights are frozen, thresholds are not.** Signature slots copy each
//!    signer's weight at composition time. The required threshold is read
//!    from the ledger on every evaluation, so raising a threshold after
//!    composition delays submission, while reweighting a signer does not
//!    change an existing slot.
//!
//! 2. **Foreign-source operations need their own quorum.** An operation
//!    sourced by another account is cleared only once that account's signers
//!    meet its threshold. Clearing is monotonic.
//!
//! 3. **One lock per transaction id.** Every read-modify-write of a record
//!    (signing, resubmission, approval) runs under that id's lock, including
//!    the ledger round trip. Store updates are additionally guarded by the
//!    record's version.
//!
//! 4. **Claim, then submit.** `submitted=true` is persisted before the
//!    envelope reaches the ledger. A failed submission clears the claim and
//!    stores the structured error instead.

pub mod composer;
pub mod error;
pub mod locks;
pub mod pending;
pub mod preauth;
pub mod quorum;
pub mod service;
pub mod signing;
mod submit;

pub use composer::{ComposeRequest, TransactionComposer};
pub use error::{AuthorizationError, AuthorizationResult};
pub use locks::LockRegistry;
pub use pending::{ApproverSlot, Lifecycle, PendingOperation, PendingTransaction, SignatureSlot};
pub use preauth::{PreAuthorization, PreAuthorizationCoordinator};
pub use quorum::QuorumEvaluator;
pub use service::{OfferRequest, TransactionService};
pub use signing::SigningCoordinator;
