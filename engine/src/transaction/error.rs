//! Errors raised while turning a request into an envelope.
//!
//! Every variant is detected before the composer touches the ledger or the
//! store, so a `CompositionError` never leaves a half-built record behind.

use thiserror::Error;

use crate::crypto::keys::KeyError;

/// A request that cannot become a valid envelope.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompositionError {
    /// The amount string is not a non-negative decimal with at most seven
    /// fractional digits, or it overflows the ledger's 64-bit amounts.
    #[error("invalid amount '{value}': {reason}")]
    InvalidAmount { value: String, reason: String },

    /// Amounts are never negative on the ledger.
    #[error("{field} must not be negative, got '{value}'")]
    NegativeAmount { field: &'static str, value: String },

    /// Asset codes are 1–12 ASCII alphanumerics.
    #[error("malformed asset code '{0}'")]
    MalformedAssetCode(String),

    /// A credit asset was requested without an issuer.
    #[error("asset '{0}' requires an issuer")]
    MissingIssuer(String),

    /// An account id or signer key failed to parse.
    #[error("invalid key: {0}")]
    InvalidKey(#[from] KeyError),

    /// Deleting an offer (sell amount zero) needs the id of the offer.
    #[error("deleting an offer requires a non-zero offer id")]
    InvalidOfferDelete,

    /// Offer ids are unsigned integers.
    #[error("invalid offer id '{0}'")]
    InvalidOfferId(String),

    /// A new or updated offer must buy something.
    #[error("offer price is undefined: {0}")]
    InvalidPrice(String),

    /// Memo text longer than the ledger accepts.
    #[error("memo is {len} bytes, maximum is {max}")]
    MemoTooLong { len: usize, max: usize },

    /// A transaction needs at least one operation.
    #[error("transaction has no operations")]
    NoOperations,

    /// More operations than a single envelope may carry.
    #[error("transaction has {count} operations, maximum is {max}")]
    TooManyOperations { count: usize, max: usize },

    /// A fee was triggered but the fee table has no entry for it.
    #[error("fee '{0}' is not configured")]
    UnknownFee(String),

    /// Field-level validation failure not covered above.
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}
