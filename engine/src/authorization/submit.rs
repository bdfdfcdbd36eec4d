//! The single submission path shared by signing and pre-authorization.
//!
//! Callers must hold the transaction's lock. The claim (`submitted=true`)
//! is persisted before the ledger sees the envelope; a failure releases
//! the claim and persists the structured error instead.

use std::sync::Arc;
use tracing::{info, warn};

use super::error::{AuthorizationError, AuthorizationResult};
use super::pending::PendingTransaction;
use crate::ledger::{LedgerClient, LedgerError, SubmissionError, SubmissionReceipt};
use crate::storage::TransactionStore;

#[derive(Clone)]
pub(crate) struct Submitter {
    ledger: Arc<dyn LedgerClient>,
    store: Arc<dyn TransactionStore>,
}

impl Submitter {
    pub(crate) fn new(ledger: Arc<dyn LedgerClient>, store: Arc<dyn TransactionStore>) -> Self {
        Self { ledger, store }
    }

    /// Claims and submits `tx` exactly once.
    pub(crate) async fn submit(
        &self,
        tx: &mut PendingTransaction,
    ) -> AuthorizationResult<SubmissionReceipt> {
        if tx.is_submitted() {
            return Err(AuthorizationError::AlreadySubmitted(tx.id().to_string()));
        }
        let bytes = tx.envelope().to_bytes()?;

        tx.mark_submitted();
        self.store.update(tx)?;

        match self.ledger.submit_envelope(&bytes).await {
            Ok(receipt) => {
                info!(
                    id = tx.id(),
                    hash = tx.hash(),
                    ledger_seq = receipt.ledger_seq,
                    "transaction submitted"
                );
                Ok(receipt)
            }
            Err(err) => {
                let (persisted, returned) = match err {
                    LedgerError::Rejected(rejection) => {
                        (rejection.clone(), AuthorizationError::Submission(rejection))
                    }
                    other => (
                        SubmissionError::new(other.to_string()),
                        AuthorizationError::Ledger(other),
                    ),
                };
                warn!(
                    id = tx.id(),
                    error = %persisted,
                    codes = ?persisted.result_codes,
                    "submission failed"
                );
                tx.mark_failed(persisted);
                self.store.update(tx)?;
                Err(returned)
            }
        }
    }
}
