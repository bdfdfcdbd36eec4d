//! Service fee injection.
//!
//! Two kinds of operation owe the custody service a flat fee, paid in the
//! native asset by the same account in the same envelope:
//!
//! - a payment of an asset the sender issued itself (`FEE_ISSUANCE`);
//! - the creation of a new offer (`FEE_OFFER`). Updates and deletions
//!   are free.
//!
//! Rates come from a static [`FeeSchedule`] supplied through engine config.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::error::CompositionError;
use super::operation::{Operation, OperationBody, PaymentOp};
use super::types::{Amount, Asset, Memo};
use crate::config::{FEE_ISSUANCE, FEE_MEMO_PREFIX, FEE_OFFER};
use crate::crypto::keys::AccountId;

/// One entry of the fee table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeRate {
    /// Human-readable name; ends up in the envelope memo.
    pub name: String,
    /// Fee collector account.
    pub destination: AccountId,
    /// Flat amount of the native asset.
    pub rate: Amount,
}

/// Fee table keyed by fee key (`FEE_ISSUANCE`, `FEE_OFFER`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeeSchedule(BTreeMap<String, FeeRate>);

impl FeeSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, rate: FeeRate) -> Self {
        self.0.insert(key.into(), rate);
        self
    }

    pub fn get(&self, key: &str) -> Option<&FeeRate> {
        self.0.get(key)
    }
}

/// A fee payment to append, and the memo that names it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeAddition {
    pub key: &'static str,
    pub operation: Operation,
    pub memo: Memo,
}

/// Decides per operation whether a service fee is owed.
#[derive(Debug, Clone)]
pub struct FeeInjector {
    schedule: FeeSchedule,
}

impl FeeInjector {
    pub fn new(schedule: FeeSchedule) -> Self {
        Self { schedule }
    }

    pub fn schedule(&self) -> &FeeSchedule {
        &self.schedule
    }

    /// Which fee key, if any, `op` triggers when run inside a transaction
    /// sourced by `tx_source`.
    pub fn fee_key(op: &Operation, tx_source: &AccountId) -> Option<&'static str> {
        match &op.body {
            OperationBody::Payment(payment) => {
                let sender = op.effective_source(tx_source);
                (payment.asset.issuer() == Some(sender)).then_some(FEE_ISSUANCE)
            }
            OperationBody::ManageOffer(offer) => {
                (offer.is_new_offer() && !offer.is_delete()).then_some(FEE_OFFER)
            }
            OperationBody::CreateAccount(_)
            | OperationBody::ChangeTrust(_)
            | OperationBody::AllowTrust(_)
            | OperationBody::SetOptions(_)
            | OperationBody::AccountMerge(_)
            | OperationBody::BumpSequence(_) => None,
        }
    }

    /// Builds the fee payment owed for `op`, if any.
    ///
    /// The fee is paid by the same account the operation runs as.
    pub fn fee_for(
        &self,
        op: &Operation,
        tx_source: &AccountId,
    ) -> Result<Option<FeeAddition>, CompositionError> {
        let Some(key) = Self::fee_key(op, tx_source) else {
            return Ok(None);
        };
        let rate = self
            .schedule
            .get(key)
            .ok_or_else(|| CompositionError::UnknownFee(key.to_string()))?;

        let memo = Memo::text(format!("{}{}", FEE_MEMO_PREFIX, rate.name))?;
        let payment = Operation {
            source: op.source.clone(),
            body: OperationBody::Payment(PaymentOp {
                destination: rate.destination.clone(),
                asset: Asset::Native,
                amount: rate.rate,
            }),
        };

        debug!(fee = key, rate = %rate.rate, "injecting fee operation");
        Ok(Some(FeeAddition {
            key,
            operation: payment,
            memo,
        }))
    }
}
