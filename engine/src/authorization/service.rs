//! The engine's public facade.
//!
//! [`TransactionService`] wires one composer and one of each coordinator
//! around a shared ledger, store and lock registry, and offers a setup call
//! per transaction type so callers never assemble operations by hand.

use std::sync::Arc;

use super::composer::{ComposeRequest, TransactionComposer};
use super::error::{AuthorizationError, AuthorizationResult};
use super::locks::LockRegistry;
use super::pending::{Lifecycle, PendingTransaction};
use super::preauth::{PreAuthorization, PreAuthorizationCoordinator};
use super::signing::SigningCoordinator;
use crate::config::{ConfigError, EngineConfig};
use crate::crypto::keys::AccountId;
use crate::ledger::{LedgerClient, Thresholds};
use crate::storage::TransactionStore;
use crate::transaction::error::CompositionError;
use crate::transaction::fees::FeeRate;
use crate::transaction::offer::plan_offer;
use crate::transaction::operation::{
    AccountFlag, AllowTrustOp, ChangeTrustOp, CreateAccountOp, FlagOperation, Operation,
    OperationBody, PaymentOp, SetOptionsOp, SignerUpdate,
};
use crate::transaction::types::{Amount, Asset, AssetCode, SignerKey};

/// An offer as callers phrase it: sell X of one asset for Y of another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferRequest {
    pub selling: Asset,
    pub sell_amount: String,
    pub buying: Asset,
    pub buy_amount: String,
    /// Absent, empty or `"0"` for a new offer.
    pub offer_id: Option<String>,
}

pub struct TransactionService {
    config: EngineConfig,
    store: Arc<dyn TransactionStore>,
    composer: Arc<TransactionComposer>,
    signing: Arc<SigningCoordinator>,
    preauth: PreAuthorizationCoordinator,
}

impl TransactionService {
    pub fn new(
        config: EngineConfig,
        ledger: Arc<dyn LedgerClient>,
        store: Arc<dyn TransactionStore>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let locks = Arc::new(LockRegistry::new());
        let composer = Arc::new(TransactionComposer::new(&config, ledger.clone(), store.clone()));
        let signing = Arc::new(SigningCoordinator::new(
            &config.network_passphrase,
            ledger.clone(),
            store.clone(),
            locks.clone(),
        ));
        let preauth = PreAuthorizationCoordinator::new(
            ledger,
            store.clone(),
            composer.clone(),
            signing.clone(),
            locks,
        );
        Ok(Self {
            config,
            store,
            composer,
            signing,
            preauth,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn composer(&self) -> &TransactionComposer {
        &self.composer
    }

    // -- Setup ---------------------------------------------------------------

    pub async fn setup_payment(
        &self,
        sender: &AccountId,
        receiver: &AccountId,
        asset_code: &str,
        asset_issuer: Option<&str>,
        amount: &str,
        pre_authorize: bool,
    ) -> AuthorizationResult<PendingTransaction> {
        let op = OperationBody::Payment(PaymentOp {
            destination: receiver.clone(),
            asset: Asset::from_code(asset_code, asset_issuer)?,
            amount: Amount::parse_field("amount", amount)?,
        });
        self.setup(sender, op, format!("Payment to {}", receiver), pre_authorize)
            .await
    }

    pub async fn setup_create_account(
        &self,
        source: &AccountId,
        new_account: &AccountId,
        starting_balance: &str,
        pre_authorize: bool,
    ) -> AuthorizationResult<PendingTransaction> {
        let op = OperationBody::CreateAccount(CreateAccountOp {
            destination: new_account.clone(),
            starting_balance: Amount::parse_field("startingBalance", starting_balance)?,
        });
        let description = format!("Create Account {} from {}", new_account, source);
        self.setup(source, op, description, pre_authorize).await
    }

    /// `limit` of `None` trusts up to the maximum.
    pub async fn setup_change_trust(
        &self,
        account: &AccountId,
        asset_code: &str,
        issuer: &AccountId,
        limit: Option<&str>,
        pre_authorize: bool,
    ) -> AuthorizationResult<PendingTransaction> {
        let asset = Asset::from_code(asset_code, Some(issuer.as_str()))?;
        let limit = limit
            .map(|l| Amount::parse_field("limit", l))
            .transpose()?;
        let description = format!("Change Trust for {} for {} {}", account, issuer, asset.code());
        let op = OperationBody::ChangeTrust(ChangeTrustOp { asset, limit });
        self.setup(account, op, description, pre_authorize).await
    }

    pub async fn setup_allow_trust(
        &self,
        issuer: &AccountId,
        asset_code: &str,
        trustor: &AccountId,
        authorize: bool,
        pre_authorize: bool,
    ) -> AuthorizationResult<PendingTransaction> {
        let asset_code = AssetCode::parse(asset_code)?;
        let description = format!(
            "Allow Trust for {} of {} {} = {}",
            trustor,
            issuer,
            asset_code.as_str(),
            authorize
        );
        let op = OperationBody::AllowTrust(AllowTrustOp {
            trustor: trustor.clone(),
            asset_code,
            authorize,
        });
        self.setup(issuer, op, description, pre_authorize).await
    }

    pub async fn setup_manage_offer(
        &self,
        account: &AccountId,
        offer: OfferRequest,
        pre_authorize: bool,
    ) -> AuthorizationResult<PendingTransaction> {
        let plan = plan_offer(
            offer.selling,
            &offer.sell_amount,
            offer.buying,
            &offer.buy_amount,
            offer.offer_id.as_deref(),
        )?;
        self.setup(account, OperationBody::ManageOffer(plan.op), plan.description, pre_authorize)
            .await
    }

    pub async fn setup_set_options_signer(
        &self,
        account: &AccountId,
        signer: &AccountId,
        weight: u32,
        pre_authorize: bool,
    ) -> AuthorizationResult<PendingTransaction> {
        let op = OperationBody::SetOptions(SetOptionsOp {
            signer: Some(SignerUpdate {
                key: SignerKey::Ed25519(signer.clone()),
                weight,
            }),
            ..Default::default()
        });
        let description = format!("Add Signer {} to {}", signer, account);
        self.setup(account, op, description, pre_authorize).await
    }

    pub async fn setup_set_options_weights(
        &self,
        account: &AccountId,
        weights: Thresholds,
        pre_authorize: bool,
    ) -> AuthorizationResult<PendingTransaction> {
        let op = OperationBody::SetOptions(SetOptionsOp {
            master_weight: Some(weights.master),
            low_threshold: Some(weights.low),
            med_threshold: Some(weights.medium),
            high_threshold: Some(weights.high),
            ..Default::default()
        });
        let description = format!("Set weights and thresholds for {}", account);
        self.setup(account, op, description, pre_authorize).await
    }

    pub async fn setup_set_options_flags(
        &self,
        account: &AccountId,
        operation: FlagOperation,
        flag: AccountFlag,
        pre_authorize: bool,
    ) -> AuthorizationResult<PendingTransaction> {
        let bits = Some(flag.bits());
        let op = match operation {
            FlagOperation::Set => SetOptionsOp {
                set_flags: bits,
                ..Default::default()
            },
            FlagOperation::Clear => SetOptionsOp {
                clear_flags: bits,
                ..Default::default()
            },
        };
        let description = format!("{} for {}", operation, flag);
        self.setup(account, OperationBody::SetOptions(op), description, pre_authorize)
            .await
    }

    pub async fn setup_set_options_home_domain(
        &self,
        account: &AccountId,
        domain: &str,
        pre_authorize: bool,
    ) -> AuthorizationResult<PendingTransaction> {
        let op = OperationBody::SetOptions(SetOptionsOp {
            home_domain: Some(domain.to_string()),
            ..Default::default()
        });
        let description = format!("Add home domain {} to {}", domain, account);
        self.setup(account, op, description, pre_authorize).await
    }

    async fn setup(
        &self,
        source: &AccountId,
        body: OperationBody,
        description: String,
        pre_authorize: bool,
    ) -> AuthorizationResult<PendingTransaction> {
        let request = ComposeRequest::new(source.clone(), vec![Operation::new(body)], description)
            .reserve_pre_authorization_slot(pre_authorize);
        self.composer.compose(request).await
    }

    // -- Authorization ---------------------------------------------------------

    pub async fn sign(
        &self,
        signer_key: &AccountId,
        secret: &str,
        transaction_id: &str,
    ) -> AuthorizationResult<PendingTransaction> {
        self.signing.sign(signer_key, secret, transaction_id).await
    }

    pub async fn resubmit(&self, transaction_id: &str) -> AuthorizationResult<PendingTransaction> {
        self.signing.resubmit(transaction_id).await
    }

    pub async fn pre_authorize(
        &self,
        public_key: &AccountId,
        secret: &str,
        transaction_id: &str,
        final_approver: Option<&AccountId>,
    ) -> AuthorizationResult<PreAuthorization> {
        self.preauth
            .pre_authorize(public_key, secret, transaction_id, final_approver)
            .await
    }

    pub async fn submit_pre_authorized(
        &self,
        transaction_id: &str,
        final_approver: &AccountId,
    ) -> AuthorizationResult<PendingTransaction> {
        self.preauth
            .submit_pre_authorized(transaction_id, final_approver)
            .await
    }

    pub async fn lifecycle(&self, transaction_id: &str) -> AuthorizationResult<Lifecycle> {
        let tx = self.transaction(transaction_id)?;
        Ok(self.signing.quorum().lifecycle(&tx).await?)
    }

    // -- Reads -----------------------------------------------------------------

    /// Every transaction sourced by `source`, oldest first.
    pub fn initiated_transactions(
        &self,
        source: &AccountId,
    ) -> AuthorizationResult<Vec<PendingTransaction>> {
        Ok(self.store.find_by_source(source)?)
    }

    /// Open transactions waiting on `key`, as a signer first and then as
    /// an approver.
    pub fn transactions_to_sign(
        &self,
        key: &AccountId,
    ) -> AuthorizationResult<Vec<PendingTransaction>> {
        Ok(self.store.find_to_sign(key)?)
    }

    pub fn transaction(&self, transaction_id: &str) -> AuthorizationResult<PendingTransaction> {
        self.store
            .find(transaction_id)?
            .ok_or_else(|| AuthorizationError::NotFound(transaction_id.to_string()))
    }

    pub fn fee(&self, key: &str) -> Result<&FeeRate, CompositionError> {
        self.composer
            .fees()
            .schedule()
            .get(key)
            .ok_or_else(|| CompositionError::UnknownFee(key.to_string()))
    }
}
