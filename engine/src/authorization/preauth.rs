//! Pre-authorize now, submit later.
//!
//! The owner registers the target transaction's hash as a signer on the
//! source account, through an ordinary signed setOptions transaction.
//! From then on the ledger accepts the target envelope with no signatures
//! at all, so a designated approver can trigger submission without ever
//! holding the owner's secret.
//!
//! The target must have been composed with a reserved sequence slot: the
//! signer-adding transaction takes `sequence + 1` and the target
//! `sequence + 2`. Any other target sequence is refused before anything is
//! composed.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use super::composer::{ComposeRequest, TransactionComposer};
use super::error::{AuthorizationError, AuthorizationResult};
use super::locks::LockRegistry;
use super::pending::PendingTransaction;
use super::signing::{keypair_for, SigningCoordinator};
use super::submit::Submitter;
use crate::config::PRE_AUTH_SIGNER_MEMO;
use crate::crypto::keys::AccountId;
use crate::ledger::LedgerClient;
use crate::storage::TransactionStore;
use crate::transaction::error::CompositionError;
use crate::transaction::operation::{Operation, OperationBody, SetOptionsOp, SignerUpdate};
use crate::transaction::types::{Memo, SignerKey};

/// Outcome of [`PreAuthorizationCoordinator::pre_authorize`].
#[derive(Debug, Clone)]
pub struct PreAuthorization {
    /// The transaction that will later be submitted by the approver.
    pub target: PendingTransaction,
    /// The setOptions transaction registering the target's hash as a
    /// signer. Submitted already if the owner's signature met quorum.
    pub signer_transaction: PendingTransaction,
}

pub struct PreAuthorizationCoordinator {
    ledger: Arc<dyn LedgerClient>,
    store: Arc<dyn TransactionStore>,
    composer: Arc<TransactionComposer>,
    signing: Arc<SigningCoordinator>,
    submitter: Submitter,
    locks: Arc<LockRegistry>,
}

impl PreAuthorizationCoordinator {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        store: Arc<dyn TransactionStore>,
        composer: Arc<TransactionComposer>,
        signing: Arc<SigningCoordinator>,
        locks: Arc<LockRegistry>,
    ) -> Self {
        Self {
            submitter: Submitter::new(ledger.clone(), store.clone()),
            ledger,
            store,
            composer,
            signing,
            locks,
        }
    }

    /// Registers transaction `transaction_id`'s hash as a signer on its
    /// source account, signed by `public_key`, and optionally designates
    /// `final_approver` as the one who may submit it later.
    pub async fn pre_authorize(
        &self,
        public_key: &AccountId,
        secret: &str,
        transaction_id: &str,
        final_approver: Option<&AccountId>,
    ) -> AuthorizationResult<PreAuthorization> {
        keypair_for(public_key, secret)?;

        let target = self.load(transaction_id)?;
        if target.is_submitted() {
            return Err(AuthorizationError::AlreadySubmitted(transaction_id.to_string()));
        }

        let snapshot = self.ledger.load_account(target.source_account()).await?;
        let reserved = snapshot.sequence + 2;
        if target.envelope().sequence != reserved {
            return Err(AuthorizationError::SequenceNotReserved {
                transaction_id: transaction_id.to_string(),
                expected: reserved,
                actual: target.envelope().sequence,
            });
        }
        if snapshot
            .signer_weight(&SignerKey::Ed25519(public_key.clone()))
            .is_none()
        {
            return Err(AuthorizationError::SignerNotAuthorized {
                signer: public_key.clone(),
                transaction_id: transaction_id.to_string(),
            });
        }
        let threshold = snapshot.required_weight(target.threshold_category());
        let weight = threshold.max(1);
        debug!(id = transaction_id, hash = target.hash(), weight, "pre-authorizing");

        let add_signer = Operation::new(OperationBody::SetOptions(SetOptionsOp {
            signer: Some(SignerUpdate {
                key: SignerKey::pre_auth(target.hash()).map_err(CompositionError::from)?,
                weight,
            }),
            ..Default::default()
        }));
        let request = ComposeRequest::new(
            target.source_account().clone(),
            vec![add_signer],
            format!("Add Signer {} to {}", target.hash(), target.source_account()),
        )
        .with_memo(Memo::text(PRE_AUTH_SIGNER_MEMO)?);
        let signer_tx = self.composer.compose(request).await?;
        let signer_transaction = self
            .signing
            .sign(public_key, secret, signer_tx.id())
            .await?;

        let target = match final_approver {
            Some(approver) => self.add_approver(transaction_id, approver).await?,
            None => self.load(transaction_id)?,
        };

        info!(
            id = transaction_id,
            signer_tx = signer_transaction.id(),
            signer_submitted = signer_transaction.is_submitted(),
            "transaction pre-authorized"
        );
        Ok(PreAuthorization {
            target,
            signer_transaction,
        })
    }

    /// Submits a pre-authorized transaction on `final_approver`'s
    /// confirmation. No weighted quorum is evaluated: the pre-authorization
    /// signer on the ledger stands in for the owner's signature.
    pub async fn submit_pre_authorized(
        &self,
        transaction_id: &str,
        final_approver: &AccountId,
    ) -> AuthorizationResult<PendingTransaction> {
        let _guard = self.locks.lock(transaction_id).await;
        let mut tx = self.load(transaction_id)?;
        if tx.is_submitted() {
            return Err(AuthorizationError::AlreadySubmitted(transaction_id.to_string()));
        }
        if tx.approve(final_approver, Utc::now()).is_none() {
            return Err(AuthorizationError::ApproverNotAuthorized {
                approver: final_approver.clone(),
                transaction_id: transaction_id.to_string(),
            });
        }
        self.store.update(&mut tx)?;

        self.submitter.submit(&mut tx).await?;
        Ok(tx)
    }

    async fn add_approver(
        &self,
        transaction_id: &str,
        approver: &AccountId,
    ) -> AuthorizationResult<PendingTransaction> {
        let _guard = self.locks.lock(transaction_id).await;
        let mut tx = self.load(transaction_id)?;
        if tx.add_approver(approver.clone()) {
            self.store.update(&mut tx)?;
        }
        Ok(tx)
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
    use crate::config::EngineConfig;
    use crate::crypto::keys::LedgerKeypair;
    use crate::ledger::{MemoryLedger, SubmissionError, Thresholds};
    use crate::storage::MemoryStore;
    use crate::transaction::operation::PaymentOp;
    use crate::transaction::types::{Amount, Asset};
    use std::time::Duration;

    struct Fixture {
        ledger: Arc<MemoryLedger>,
        store: Arc<dyn TransactionStore>,
        composer: Arc<TransactionComposer>,
        preauth: PreAuthorizationCoordinator,
    }

    fn fixture() -> Fixture {
        fixture_with(Duration::ZERO)
    }

    fn fixture_with(latency: Duration) -> Fixture {
        let config = EngineConfig::default();
        let ledger = Arc::new(MemoryLedger::new(&config.network_passphrase).with_latency(latency));
        let store: Arc<dyn TransactionStore> = Arc::new(MemoryStore::new());
        let locks = Arc::new(LockRegistry::new());
        let composer = Arc::new(TransactionComposer::new(&config, ledger.clone(), store.clone()));
        let signing = Arc::new(SigningCoordinator::new(
            &config.network_passphrase,
            ledger.clone(),
            store.clone(),
            locks.clone(),
        ));
        let preauth = PreAuthorizationCoordinator::new(
            ledger.clone(),
            store.clone(),
            composer.clone(),
            signing,
            locks,
        );
        Fixture {
            ledger,
            store,
            composer,
            preauth,
        }
    }

    async fn payment(f: &Fixture, source: &AccountId, reserve: bool) -> PendingTransaction {
        let op = Operation::new(OperationBody::Payment(PaymentOp {
            destination: LedgerKeypair::generate().account_id(),
            asset: Asset::Native,
            amount: Amount::parse("3").unwrap(),
        }));
        f.composer
            .compose(
                ComposeRequest::new(source.clone(), vec![op], "later")
                    .reserve_pre_authorization_slot(reserve),
            )
            .await
            .unwrap()
    }

    async fn reserved_payment(f: &Fixture, source: &AccountId) -> PendingTransaction {
        payment(f, source, true).await
    }

    /// Funded owner plus a pre-authorized target with `approver` designated.
    async fn pre_authorized(f: &Fixture, approver: &AccountId) -> PendingTransaction {
        let owner = LedgerKeypair::generate();
        let id = owner.account_id();
        f.ledger.create_account(&id);
        let target = reserved_payment(f, &id).await;
        f.preauth
            .pre_authorize(&id, &owner.secret_hex(), target.id(), Some(approver))
            .await
            .unwrap()
            .target
    }

    #[tokio::test]
    async fn signer_transaction_carries_hash_memo_and_weight() {
        let f = fixture();
        let owner = LedgerKeypair::generate();
        let id = owner.account_id();
        f.ledger.create_account(&id);
        f.ledger.set_thresholds(
            &id,
            Thresholds {
                master: 3,
                low: 1,
                medium: 3,
                high: 3,
            },
        );
        let target = reserved_payment(&f, &id).await;

        let outcome = f
            .preauth
            .pre_authorize(&id, &owner.secret_hex(), target.id(), None)
            .await
            .unwrap();

        let signer_tx = &outcome.signer_transaction;
        assert!(signer_tx.is_submitted());
        assert_eq!(
            signer_tx.envelope().memo,
            Memo::Text(PRE_AUTH_SIGNER_MEMO.to_string())
        );
        assert_eq!(
            signer_tx.description(),
            format!("Add Signer {} to {}", target.hash(), id)
        );
        assert_eq!(
            f.ledger
                .snapshot(&id)
                .unwrap()
                .signer_weight(&SignerKey::PreAuthTx(target.hash().to_string())),
            Some(3)
        );
        assert!(outcome.target.approvers().is_empty());
    }

    #[tokio::test]
    async fn approver_submits_without_owner_secret() {
        let f = fixture();
        let owner = LedgerKeypair::generate();
        let approver = LedgerKeypair::generate().account_id();
        let id = owner.account_id();
        f.ledger.create_account(&id);
        let target = reserved_payment(&f, &id).await;

        let outcome = f
            .preauth
            .pre_authorize(&id, &owner.secret_hex(), target.id(), Some(&approver))
            .await
            .unwrap();
        assert_eq!(outcome.target.approvers().len(), 1);

        let submitted = f
            .preauth
            .submit_pre_authorized(target.id(), &approver)
            .await
            .unwrap();
        assert!(submitted.is_submitted());
        assert!(submitted.envelope().signatures.is_empty());
        assert!(submitted.approvers()[0].signed);
        assert_eq!(f.ledger.applied().len(), 2);
    }

    #[tokio::test]
    async fn unknown_approver_is_rejected() {
        let f = fixture();
        let owner = LedgerKeypair::generate();
        let id = owner.account_id();
        f.ledger.create_account(&id);
        let target = reserved_payment(&f, &id).await;
        f.preauth
            .pre_authorize(&id, &owner.secret_hex(), target.id(), Some(&id))
            .await
            .unwrap();

        let stranger = LedgerKeypair::generate().account_id();
        let err = f
            .preauth
            .submit_pre_authorized(target.id(), &stranger)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthorizationError::ApproverNotAuthorized { .. }));
    }

    #[tokio::test]
    async fn key_mismatch_composes_nothing() {
        let f = fixture();
        let owner = LedgerKeypair::generate();
        let id = owner.account_id();
        f.ledger.create_account(&id);
        let target = reserved_payment(&f, &id).await;

        let err = f
            .preauth
            .pre_authorize(&id, &LedgerKeypair::generate().secret_hex(), target.id(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthorizationError::KeyMismatch(_)));
        assert_eq!(f.ledger.submission_count(), 0);
    }

    #[tokio::test]
    async fn unreserved_target_is_refused_before_composing() {
        let f = fixture();
        let owner = LedgerKeypair::generate();
        let id = owner.account_id();
        f.ledger.create_account(&id);
        let target = payment(&f, &id, false).await;

        let err = f
            .preauth
            .pre_authorize(&id, &owner.secret_hex(), target.id(), None)
            .await
            .unwrap_err();
        match err {
            AuthorizationError::SequenceNotReserved {
                expected, actual, ..
            } => {
                assert_eq!(actual, target.envelope().sequence);
                assert_eq!(expected, actual + 1);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(f.ledger.submission_count(), 0);
        assert_eq!(f.store.find_by_source(&id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejected_submission_is_recorded_and_retryable() {
        let f = fixture();
        let approver = LedgerKeypair::generate().account_id();
        let target = pre_authorized(&f, &approver).await;

        f.ledger
            .reject_next(SubmissionError::with_codes("ledger busy", "tx_failed", vec![]));
        let err = f
            .preauth
            .submit_pre_authorized(target.id(), &approver)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthorizationError::Submission(_)));
        assert!(err.is_retryable());

        let stored = f.store.find(target.id()).unwrap().unwrap();
        assert!(!stored.is_submitted());
        assert_eq!(stored.error().and_then(|e| e.transaction_code()), Some("tx_failed"));

        let retried = f
            .preauth
            .submit_pre_authorized(target.id(), &approver)
            .await
            .unwrap();
        assert!(retried.is_submitted());
        assert!(retried.error().is_none());
        assert_eq!(f.ledger.applied().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_approvals_submit_once() {
        let f = fixture_with(Duration::from_millis(5));
        let approver = LedgerKeypair::generate().account_id();
        let target = pre_authorized(&f, &approver).await;
        let before = f.ledger.submission_count();

        let (first, second) = tokio::join!(
            f.preauth.submit_pre_authorized(target.id(), &approver),
            f.preauth.submit_pre_authorized(target.id(), &approver),
        );
        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(AuthorizationError::AlreadySubmitted(_)))));
        assert_eq!(f.ledger.submission_count(), before + 1);
        assert!(f.store.find(target.id()).unwrap().unwrap().is_submitted());
    }
}
