//! Typed ledger operations.
//!
//! Each operation kind carries its own parameter struct. Classification,
//! fee injection, and canonical encoding are all exhaustive matches over
//! [`OperationBody`], so adding a kind is a compile error everywhere it
//! matters.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::CompositionError;
use super::types::{Amount, Asset, AssetCode, Price, SignerKey};
use crate::crypto::keys::AccountId;

/// Largest weight or threshold value an account can carry.
pub const MAX_WEIGHT: u32 = 255;

/// Longest home domain the ledger accepts.
pub const MAX_HOME_DOMAIN_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// OperationType
// ---------------------------------------------------------------------------

/// Discriminant of an [`OperationBody`], persisted on pending records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationType {
    CreateAccount,
    Payment,
    ChangeTrust,
    AllowTrust,
    ManageOffer,
    SetOptions,
    AccountMerge,
    BumpSequence,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CreateAccount => "createAccount",
            Self::Payment => "payment",
            Self::ChangeTrust => "changeTrust",
            Self::AllowTrust => "allowTrust",
            Self::ManageOffer => "manageOffer",
            Self::SetOptions => "setOptions",
            Self::AccountMerge => "accountMerge",
            Self::BumpSequence => "bumpSequence",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Parameter structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAccountOp {
    pub destination: AccountId,
    pub starting_balance: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOp {
    pub destination: AccountId,
    pub asset: Asset,
    pub amount: Amount,
}

/// Creates, updates, or (with a zero limit) removes a trustline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeTrustOp {
    pub asset: Asset,
    /// `None` means the maximum limit.
    pub limit: Option<Amount>,
}

/// Issuer-side authorization of another account's trustline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowTrustOp {
    pub trustor: AccountId,
    pub asset_code: AssetCode,
    pub authorize: bool,
}

/// Offer management. `offer_id == 0` creates a new offer; a zero `amount`
/// on an existing offer deletes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManageOfferOp {
    pub selling: Asset,
    pub buying: Asset,
    pub amount: Amount,
    pub price: Price,
    pub offer_id: u64,
}

impl ManageOfferOp {
    pub fn is_new_offer(&self) -> bool {
        self.offer_id == 0
    }

    pub fn is_delete(&self) -> bool {
        self.amount.is_zero()
    }
}

/// A signer to add (weight > 0), reweight, or remove (weight 0).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerUpdate {
    pub key: SignerKey,
    pub weight: u32,
}

/// Account option changes. Every field is optional; only the `Some` ones
/// are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetOptionsOp {
    pub clear_flags: Option<u32>,
    pub set_flags: Option<u32>,
    pub master_weight: Option<u32>,
    pub low_threshold: Option<u32>,
    pub med_threshold: Option<u32>,
    pub high_threshold: Option<u32>,
    pub home_domain: Option<String>,
    pub signer: Option<SignerUpdate>,
}

impl SetOptionsOp {
    /// Whether this change touches who may sign or how much weight they need.
    pub fn changes_authorization(&self) -> bool {
        self.signer.is_some()
            || self.master_weight.is_some()
            || self.low_threshold.is_some()
            || self.med_threshold.is_some()
            || self.high_threshold.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMergeOp {
    pub destination: AccountId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BumpSequenceOp {
    pub bump_to: u64,
}

// ---------------------------------------------------------------------------
// Account flags
// ---------------------------------------------------------------------------

/// Named account authorization flags, as accepted by the flags setup call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountFlag {
    /// Required and revocable together.
    AuthRequired,
    AuthRequiredOnly,
    AuthRevocable,
    AuthImmutable,
}

impl AccountFlag {
    pub const REQUIRED_BIT: u32 = 0x1;
    pub const REVOCABLE_BIT: u32 = 0x2;
    pub const IMMUTABLE_BIT: u32 = 0x4;

    pub fn bits(&self) -> u32 {
        match self {
            Self::AuthRequired => Self::REQUIRED_BIT | Self::REVOCABLE_BIT,
            Self::AuthRequiredOnly => Self::REQUIRED_BIT,
            Self::AuthRevocable => Self::REVOCABLE_BIT,
            Self::AuthImmutable => Self::IMMUTABLE_BIT,
        }
    }
}

impl fmt::Display for AccountFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AuthRequired => "AuthRequiredFlag",
            Self::AuthRequiredOnly => "AuthRequiredFlagOnly",
            Self::AuthRevocable => "AuthRevocableFlag",
            Self::AuthImmutable => "AuthImmutableFlag",
        };
        f.write_str(name)
    }
}

/// Whether a flags change sets or clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlagOperation {
    Set,
    Clear,
}

impl fmt::Display for FlagOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set => f.write_str("setFlags"),
            Self::Clear => f.write_str("clearFlags"),
        }
    }
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationBody {
    CreateAccount(CreateAccountOp),
    Payment(PaymentOp),
    ChangeTrust(ChangeTrustOp),
    AllowTrust(AllowTrustOp),
    ManageOffer(ManageOfferOp),
    SetOptions(SetOptionsOp),
    AccountMerge(AccountMergeOp),
    BumpSequence(BumpSequenceOp),
}

impl OperationBody {
    pub fn op_type(&self) -> OperationType {
        match self {
            Self::CreateAccount(_) => OperationType::CreateAccount,
            Self::Payment(_) => OperationType::Payment,
            Self::ChangeTrust(_) => OperationType::ChangeTrust,
            Self::AllowTrust(_) => OperationType::AllowTrust,
            Self::ManageOffer(_) => OperationType::ManageOffer,
            Self::SetOptions(_) => OperationType::SetOptions,
            Self::AccountMerge(_) => OperationType::AccountMerge,
            Self::BumpSequence(_) => OperationType::BumpSequence,
        }
    }
}

/// One operation inside a transaction envelope.
///
/// `source` is `None` when the operation runs as the transaction's own
/// source account, which is the common case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub source: Option<AccountId>,
    pub body: OperationBody,
}

impl Operation {
    pub fn new(body: OperationBody) -> Self {
        Self { source: None, body }
    }

    /// Runs this operation as `source` instead of the transaction source.
    pub fn with_source(mut self, source: AccountId) -> Self {
        self.source = Some(source);
        self
    }

    pub fn op_type(&self) -> OperationType {
        self.body.op_type()
    }

    /// The account this operation acts for inside a transaction sourced
    /// by `tx_source`.
    pub fn effective_source<'a>(&'a self, tx_source: &'a AccountId) -> &'a AccountId {
        self.source.as_ref().unwrap_or(tx_source)
    }

    /// Structural checks the ledger would otherwise reject at submission.
    pub fn validate(&self) -> Result<(), CompositionError> {
        match &self.body {
            OperationBody::CreateAccount(op) => {
                if op.starting_balance.is_zero() {
                    return Err(CompositionError::InvalidAmount {
                        value: op.starting_balance.to_string(),
                        reason: "starting balance must be > 0".to_string(),
                    });
                }
            }
            OperationBody::Payment(op) => {
                if op.amount.is_zero() {
                    return Err(CompositionError::InvalidAmount {
                        value: op.amount.to_string(),
                        reason: "payment amount must be > 0".to_string(),
                    });
                }
            }
            OperationBody::ChangeTrust(op) => {
                if op.asset.is_native() {
                    return Err(CompositionError::InvalidField {
                        field: "asset",
                        reason: "cannot trust the native asset".to_string(),
                    });
                }
            }
            OperationBody::AllowTrust(_) => {}
            OperationBody::ManageOffer(op) => {
                if op.is_delete() && op.is_new_offer() {
                    return Err(CompositionError::InvalidOfferDelete);
                }
                if op.selling == op.buying {
                    return Err(CompositionError::InvalidField {
                        field: "buying",
                        reason: "selling and buying the same asset".to_string(),
                    });
                }
            }
            OperationBody::SetOptions(op) => {
                let weights = [
                    ("masterWeight", op.master_weight),
                    ("lowThreshold", op.low_threshold),
                    ("medThreshold", op.med_threshold),
                    ("highThreshold", op.high_threshold),
                    ("signer.weight", op.signer.as_ref().map(|s| s.weight)),
                ];
                for (field, value) in weights {
                    if let Some(v) = value {
                        if v > MAX_WEIGHT {
                            return Err(CompositionError::InvalidField {
                                field,
                                reason: format!("{} exceeds {}", v, MAX_WEIGHT),
                            });
                        }
                    }
                }
                if let Some(domain) = &op.home_domain {
                    if domain.len() > MAX_HOME_DOMAIN_LENGTH {
                        return Err(CompositionError::InvalidField {
                            field: "homeDomain",
                            reason: format!("longer than {} bytes", MAX_HOME_DOMAIN_LENGTH),
                        });
                    }
                }
            }
            OperationBody::AccountMerge(_) | OperationBody::BumpSequence(_) => {}
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
