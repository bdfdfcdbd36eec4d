//! Errors surfaced by the authorization coordinators.
//!
//! Lower layers keep their own error types. They are wrapped here so every
//! public call returns one [`AuthorizationResult`].

use thiserror::Error;

use crate::crypto::keys::AccountId;
use crate::ledger::{LedgerError, SubmissionError};
use crate::storage::StoreError;
use crate::transaction::envelope::EnvelopeError;
use crate::transaction::error::CompositionError;

/// Everything a coordinator call can fail with.
#[derive(Debug, Error)]
pub enum AuthorizationError {
    #[error(transparent)]
    Composition(#[from] CompositionError),

    /// The supplied secret does not belong to the claimed public key.
    #[error("secret does not match signer key {0}")]
    KeyMismatch(AccountId),

    #[error("{signer} is not a signer on transaction {transaction_id}")]
    SignerNotAuthorized {
        signer: AccountId,
        transaction_id: String,
    },

    #[error("{approver} is not an approver on transaction {transaction_id}")]
    ApproverNotAuthorized {
        approver: AccountId,
        transaction_id: String,
    },

    /// The target does not sit on the sequence slot reserved for
    /// pre-authorization. Registering it would consume its own sequence.
    #[error("transaction {transaction_id} has sequence {actual}, pre-authorization needs {expected}")]
    SequenceNotReserved {
        transaction_id: String,
        expected: u64,
        actual: u64,
    },

    #[error("transaction {0} was already submitted")]
    AlreadySubmitted(String),

    #[error("transaction {0} not found")]
    NotFound(String),

    /// The ledger rejected the envelope. The same error is persisted on the
    /// record.
    #[error("submission rejected: {0}")]
    Submission(SubmissionError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
}

impl AuthorizationError {
    /// Whether the same call may succeed later without different input.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Submission(_)
                | Self::Ledger(LedgerError::Transport(_))
                | Self::Store(StoreError::VersionConflict { .. })
        )
    }
}

pub type AuthorizationResult<T> = Result<T, AuthorizationError>;
