//! Weighted quorum evaluation.
//!
//! Signed weight comes from the slots frozen at composition. The required
//! threshold is read live from the ledger on every evaluation.

use std::sync::Arc;
use tracing::debug;

use super::pending::{Lifecycle, PendingOperation, PendingTransaction};
use crate::ledger::{LedgerClient, LedgerError};

#[derive(Clone)]
pub struct QuorumEvaluator {
    ledger: Arc<dyn LedgerClient>,
}

impl QuorumEvaluator {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self { ledger }
    }

    /// Whether `op`'s own signed weight meets its source account's live
    /// threshold for the operation's category.
    pub async fn operation_satisfied(&self, op: &PendingOperation) -> Result<bool, LedgerError> {
        let snapshot = self.ledger.load_account(&op.source_account).await?;
        let required = snapshot.required_weight(op.threshold_category);
        let signed = op.signed_weight();
        debug!(
            account = %op.source_account,
            category = %op.threshold_category,
            signed,
            required,
            "operation quorum check"
        );
        Ok(signed >= required)
    }

    /// Whether `tx` may be submitted now.
    ///
    /// Every foreign-source operation still flagged `needs_independent_quorum`
    /// is checked first; the ones that pass are cleared and stay cleared.
    /// Then the transaction-level slots must meet the source account's
    /// threshold for the transaction's category.
    pub async fn can_submit(&self, tx: &mut PendingTransaction) -> Result<bool, LedgerError> {
        let mut independent_ok = true;
        if tx.has_foreign_source_operation() {
            for op in tx.operations_mut() {
                if !op.needs_independent_quorum {
                    continue;
                }
                if self.operation_satisfied(op).await? {
                    op.needs_independent_quorum = false;
                } else {
                    independent_ok = false;
                }
            }
        }
        if !independent_ok {
            return Ok(false);
        }

        let snapshot = self.ledger.load_account(tx.source_account()).await?;
        let required = snapshot.required_weight(tx.threshold_category());
        let signed = tx.signed_weight();
        debug!(
            id = tx.id(),
            category = %tx.threshold_category(),
            signed,
            required,
            "transaction quorum check"
        );
        Ok(signed >= required)
    }

    /// Derived state of `tx` without mutating it.
    pub async fn lifecycle(&self, tx: &PendingTransaction) -> Result<Lifecycle, LedgerError> {
        if tx.is_submitted() {
            return Ok(Lifecycle::Submitted);
        }
        if tx.error().is_some() {
            return Ok(Lifecycle::SubmissionFailed);
        }
        let mut probe = tx.clone();
        if self.can_submit(&mut probe).await? {
            return Ok(Lifecycle::QuorumMet);
        }
        let any_signed = tx.signatures().iter().any(|s| s.signed)
            || tx
                .operations()
                .iter()
                .any(|op| op.signatures.iter().any(|s| s.signed));
        Ok(if any_signed {
            Lifecycle::PartiallySigned
        } else {
            Lifecycle::Composed
        })
    }
}
