//! Recording signer approvals and submitting at quorum.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use super::error::{AuthorizationError, AuthorizationResult};
use super::locks::LockRegistry;
use super::pending::PendingTransaction;
use super::quorum::QuorumEvaluator;
use super::submit::Submitter;
use crate::crypto::hash::network_id;
use crate::crypto::keys::{AccountId, LedgerKeypair};
use crate::ledger::LedgerClient;
use crate::storage::TransactionStore;
use crate::transaction::signing::sign_envelope;
use crate::transaction::types::SignerKey;

/// Parses `secret` and checks it controls `public_key`.
pub(crate) fn keypair_for(public_key: &AccountId, secret: &str) -> AuthorizationResult<LedgerKeypair> {
    let keypair = LedgerKeypair::from_secret_hex(secret)
        .map_err(|_| AuthorizationError::KeyMismatch(public_key.clone()))?;
    if &keypair.account_id() != public_key {
        return Err(AuthorizationError::KeyMismatch(public_key.clone()));
    }
    Ok(keypair)
}

pub struct SigningCoordinator {
    network_id: [u8; 32],
    store: Arc<dyn TransactionStore>,
    quorum: QuorumEvaluator,
    submitter: Submitter,
    locks: Arc<LockRegistry>,
}

impl SigningCoordinator {
    pub fn new(
        network_passphrase: &str,
        ledger: Arc<dyn LedgerClient>,
        store: Arc<dyn TransactionStore>,
        locks: Arc<LockRegistry>,
    ) -> Self {
        Self {
            network_id: network_id(network_passphrase),
            quorum: QuorumEvaluator::new(ledger.clone()),
            submitter: Submitter::new(ledger, store.clone()),
            store,
            locks,
        }
    }

    pub fn quorum(&self) -> &QuorumEvaluator {
        &self.quorum
    }

    /// Records `signer_key`'s approval of transaction `transaction_id` and
    /// submits it if that completes the quorum.
    ///
    /// Signing twice with the same key changes nothing. A ledger rejection
    /// is persisted on the record and returned as
    /// [`AuthorizationError::Submission`]; the record stays open for
    /// another attempt.
    pub async fn sign(
        &self,
        signer_key: &AccountId,
        secret: &str,
        transaction_id: &str,
    ) -> AuthorizationResult<PendingTransaction> {
        let keypair = keypair_for(signer_key, secret)?;
        let _guard = self.locks.lock(transaction_id).await;

        let mut tx = self.load(transaction_id)?;
        if tx.is_submitted() {
            return Err(AuthorizationError::AlreadySubmitted(transaction_id.to_string()));
        }
        let key = SignerKey::Ed25519(signer_key.clone());
        if !tx.has_signer(&key) {
            return Err(AuthorizationError::SignerNotAuthorized {
                signer: signer_key.clone(),
                transaction_id: transaction_id.to_string(),
            });
        }

        let newly_signed = tx.mark_signed(&key, Utc::now());
        if newly_signed > 0 {
            sign_envelope(tx.envelope_mut(), &keypair, &self.network_id);
            self.store.update(&mut tx)?;
            debug!(id = transaction_id, signer = %signer_key, slots = newly_signed, "signature recorded");
        } else {
            debug!(id = transaction_id, signer = %signer_key, "repeat signature ignored");
        }

        self.evaluate_and_submit(&mut tx).await?;
        Ok(tx)
    }

    /// Re-evaluates quorum and submits if met, without a new signature.
    /// Used after a failed submission once the ledger-side cause is fixed.
    pub async fn resubmit(&self, transaction_id: &str) -> AuthorizationResult<PendingTransaction> {
        let _guard = self.locks.lock(transaction_id).await;
        let mut tx = self.load(transaction_id)?;
        if tx.is_submitted() {
            return Err(AuthorizationError::AlreadySubmitted(transaction_id.to_string()));
        }
        self.evaluate_and_submit(&mut tx).await?;
        Ok(tx)
    }

    async fn evaluate_and_submit(&self, tx: &mut PendingTransaction) -> AuthorizationResult<()> {
        let flags_before: Vec<bool> = tx
            .operations()
            .iter()
            .map(|op| op.needs_independent_quorum)
            .collect();
        let ready = self.quorum.can_submit(tx).await?;
        let flags_changed = tx
            .operations()
            .iter()
            .zip(&flags_before)
            .any(|(op, before)| op.needs_independent_quorum != *before);

        if !ready {
            if flags_changed {
                self.store.update(tx)?;
            }
            return Ok(());
        }

        info!(id = tx.id(), "quorum met");
        self.submitter.submit(tx).await?;
        Ok(())
    }

    fn load(&self, transaction_id: &str) -> AuthorizationResult<PendingTransaction> {
        self.store
            .find(transaction_id)?
            .ok_or_else(|| AuthorizationError::NotFound(transaction_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::composer::{ComposeRequest, TransactionComposer};
    use crate::config::EngineConfig;
    use crate::ledger::{MemoryLedger, SubmissionError, Thresholds};
    use crate::storage::MemoryStore;
    use crate::transaction::operation::{Operation, OperationBody, PaymentOp};
    use crate::transaction::types::{Amount, Asset};

    struct Fixture {
        ledger: Arc<MemoryLedger>,
        store: Arc<MemoryStore>,
        composer: TransactionComposer,
        signing: SigningCoordinator,
    }

    fn fixture() -> Fixture {
        let config = EngineConfig::default();
        let ledger = Arc::new(MemoryLedger::new(&config.network_passphrase));
        let store = Arc::new(MemoryStore::new());
        let composer = TransactionComposer::new(&config, ledger.clone(), store.clone());
        let signing = SigningCoordinator::new(
            &config.network_passphrase,
            ledger.clone(),
            store.clone(),
            Arc::new(LockRegistry::new()),
        );
        Fixture {
            ledger,
            store,
            composer,
            signing,
        }
    }

    async fn native_payment(f: &Fixture, source: &AccountId) -> PendingTransaction {
        let op = Operation::new(OperationBody::Payment(PaymentOp {
            destination: LedgerKeypair::generate().account_id(),
            asset: Asset::Native,
            amount: Amount::parse("1").unwrap(),
        }));
        f.composer
            .compose(ComposeRequest::new(source.clone(), vec![op], "pay"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn single_signer_submits() {
        let f = fixture();
        let owner = LedgerKeypair::generate();
        f.ledger.create_account(&owner.account_id());
        let tx = native_payment(&f, &owner.account_id()).await;

        let signed = f
            .signing
            .sign(&owner.account_id(), &owner.secret_hex(), tx.id())
            .await
            .unwrap();
        assert!(signed.is_submitted());
        assert_eq!(signed.hash(), tx.hash());
        assert_eq!(f.ledger.submission_count(), 1);
        assert!(f.store.find(tx.id()).unwrap().unwrap().is_submitted());
    }

    #[tokio::test]
    async fn wrong_secret_is_key_mismatch() {
        let f = fixture();
        let owner = LedgerKeypair::generate();
        let other = LedgerKeypair::generate();
        f.ledger.create_account(&owner.account_id());
        let tx = native_payment(&f, &owner.account_id()).await;

        let err = f
            .signing
            .sign(&owner.account_id(), &other.secret_hex(), tx.id())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthorizationError::KeyMismatch(_)));

        let err = f
            .signing
            .sign(&owner.account_id(), "not-a-secret", tx.id())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthorizationError::KeyMismatch(_)));
    }

    #[tokio::test]
    async fn stranger_is_not_authorized() {
        let f = fixture();
        let owner = LedgerKeypair::generate();
        let stranger = LedgerKeypair::generate();
        f.ledger.create_account(&owner.account_id());
        let tx = native_payment(&f, &owner.account_id()).await;

        let err = f
            .signing
            .sign(&stranger.account_id(), &stranger.secret_hex(), tx.id())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthorizationError::SignerNotAuthorized { .. }));
    }

    #[tokio::test]
    async fn unknown_transaction_is_not_found() {
        let f = fixture();
        let owner = LedgerKeypair::generate();
        let err = f
            .signing
            .sign(&owner.account_id(), &owner.secret_hex(), "missing")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthorizationError::NotFound(_)));
    }

    #[tokio::test]
    async fn repeat_signature_is_idempotent() {
        let f = fixture();
        let owner = LedgerKeypair::generate();
        let cosigner = LedgerKeypair::generate();
        let id = owner.account_id();
        f.ledger.create_account(&id);
        f.ledger
            .set_signer(&id, SignerKey::Ed25519(cosigner.account_id()), 1);
        f.ledger.set_thresholds(
            &id,
            Thresholds {
                master: 1,
                low: 2,
                medium: 2,
                high: 2,
            },
        );
        let tx = native_payment(&f, &id).await;

        let first = f.signing.sign(&id, &owner.secret_hex(), tx.id()).await.unwrap();
        let second = f.signing.sign(&id, &owner.secret_hex(), tx.id()).await.unwrap();
        assert_eq!(first.signed_weight(), 1);
        assert_eq!(second.signed_weight(), 1);
        assert_eq!(second.envelope().signatures.len(), 1);
        assert!(!second.is_submitted());
        assert_eq!(f.ledger.submission_count(), 0);

        let done = f
            .signing
            .sign(&cosigner.account_id(), &cosigner.secret_hex(), tx.id())
            .await
            .unwrap();
        assert!(done.is_submitted());
        assert_eq!(done.envelope().signatures.len(), 2);
        assert_eq!(done.hash(), tx.hash());
    }

    #[tokio::test]
    async fn rejection_is_persisted_and_retryable() {
        let f = fixture();
        let owner = LedgerKeypair::generate();
        f.ledger.create_account(&owner.account_id());
        let tx = native_payment(&f, &owner.account_id()).await;

        f.ledger.reject_next(SubmissionError::with_codes(
            "underfunded",
            "tx_failed",
            vec!["op_underfunded".to_string()],
        ));
        let err = f
            .signing
            .sign(&owner.account_id(), &owner.secret_hex(), tx.id())
            .await
            .unwrap_err();
        match err {
            AuthorizationError::Submission(e) => assert_eq!(e.transaction_code(), Some("tx_failed")),
            other => panic!("unexpected {:?}", other),
        }

        let stored = f.store.find(tx.id()).unwrap().unwrap();
        assert!(!stored.is_submitted());
        assert_eq!(
            stored.error().and_then(|e| e.result_codes.clone()).unwrap().operations,
            vec!["op_underfunded".to_string()]
        );

        let retried = f.signing.resubmit(tx.id()).await.unwrap();
        assert!(retried.is_submitted());
        assert!(retried.error().is_none());
        assert_eq!(f.ledger.submission_count(), 2);

        assert!(matches!(
            f.signing.resubmit(tx.id()).await,
            Err(AuthorizationError::AlreadySubmitted(_))
        ));
    }
}
