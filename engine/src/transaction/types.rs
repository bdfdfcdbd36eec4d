//! Core value types for ledger transactions.
//!
//! Amounts and prices are fixed-point integers with seven decimal places,
//! exactly as the ledger stores them. Nothing here ever touches a float.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::CompositionError;
use crate::config::{
    AMOUNT_DECIMALS, AMOUNT_SCALE, MAX_ASSET_CODE_LENGTH, MAX_MEMO_TEXT_BYTES, NATIVE_ASSET_CODE,
};
use crate::crypto::keys::{AccountId, KeyError};

// ---------------------------------------------------------------------------
// ThresholdCategory
// ---------------------------------------------------------------------------

/// How much cumulative signer weight an operation requires.
///
/// Variants are declared in ascending order so the derived `Ord` gives
/// `Low < Medium < High`, which is what the transaction-level fold needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ThresholdCategory {
    Low,
    Medium,
    High,
}

impl ThresholdCategory {
    /// The strictest category among `categories`; `Low` for an empty input.
    pub fn max_of<I>(categories: I) -> Self
    where
        I: IntoIterator<Item = ThresholdCategory>,
    {
        categories.into_iter().fold(Self::Low, Self::max)
    }
}

impl fmt::Display for ThresholdCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
        }
    }
}

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

/// A non-negative ledger amount in the smallest unit (10^-7).
///
/// Serialized as its decimal string so that config files and persisted
/// records read the way the ledger displays them.
///
/// ```
/// use custody_engine::transaction::types::Amount;
///
/// let amount = Amount::parse("100").unwrap();
/// assert_eq!(amount.to_string(), "100.0000000");
/// assert_eq!(amount.stroops(), 1_000_000_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Wraps a raw value in the smallest unit. Negative inputs clamp to zero.
    pub fn from_stroops(value: i64) -> Self {
        Self(value.max(0))
    }

    /// Parses a decimal amount string such as `"100"`, `"0.5"` or `"33.0000001"`.
    pub fn parse(s: &str) -> Result<Self, CompositionError> {
        Self::parse_field("amount", s)
    }

    /// Like [`parse`](Self::parse) but names the offending field when the
    /// value is negative.
    pub fn parse_field(field: &'static str, s: &str) -> Result<Self, CompositionError> {
        let trimmed = s.trim();
        let invalid = |reason: &str| CompositionError::InvalidAmount {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        if trimmed.starts_with('-') {
            return Err(CompositionError::NegativeAmount {
                field,
                value: s.to_string(),
            });
        }

        let (whole, frac) = match trimmed.split_once('.') {
            Some((w, f)) => (w, f),
            None => (trimmed, ""),
        };
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("expected a decimal number"));
        }
        if !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("expected a decimal number"));
        }
        if frac.len() > AMOUNT_DECIMALS as usize {
            return Err(invalid("more than 7 decimal places"));
        }

        let whole: i64 = whole.parse().map_err(|_| invalid("too large"))?;
        let frac_value: i64 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", frac, width = AMOUNT_DECIMALS as usize);
            padded.parse().map_err(|_| invalid("expected a decimal number"))?
        };

        whole
            .checked_mul(AMOUNT_SCALE)
            .and_then(|v| v.checked_add(frac_value))
            .map(Self)
            .ok_or_else(|| invalid("too large"))
    }

    /// Raw value in the smallest unit.
    pub fn stroops(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_fixed(self.0, f)
    }
}

impl TryFrom<String> for Amount {
    type Error = CompositionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Amount> for String {
    fn from(value: Amount) -> Self {
        value.to_string()
    }
}

fn format_fixed(value: i64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
        f,
        "{}.{:0>width$}",
        value / AMOUNT_SCALE,
        value % AMOUNT_SCALE,
        width = AMOUNT_DECIMALS as usize
    )
}

// ---------------------------------------------------------------------------
// Price
// ---------------------------------------------------------------------------

/// Offer price: units of the buying asset per unit of the selling asset,
/// fixed-point with seven decimals.
///
/// Computed from a sell and a buy amount by integer division, truncating
/// anything past the seventh decimal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Price(i64);

impl Price {
    /// Price used by offer deletions, where the ledger ignores it.
    pub const ONE: Price = Price(AMOUNT_SCALE);

    /// `buy / sell`, truncated at the seventh decimal.
    pub fn from_amounts(sell: Amount, buy: Amount) -> Result<Self, CompositionError> {
        if sell.is_zero() {
            return Err(CompositionError::InvalidPrice(
                "sell amount must be > 0".to_string(),
            ));
        }
        let scaled = i128::from(buy.stroops()) * i128::from(AMOUNT_SCALE) / i128::from(sell.stroops());
        if scaled == 0 {
            return Err(CompositionError::InvalidPrice(format!(
                "buying {} for {} rounds to a zero price",
                buy, sell
            )));
        }
        i64::try_from(scaled)
            .map(Self)
            .map_err(|_| CompositionError::InvalidPrice("price overflows".to_string()))
    }

    /// Raw fixed-point value (`price * 10^7`).
    pub fn scaled(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_fixed(self.0, f)
    }
}

// ---------------------------------------------------------------------------
// Asset
// ---------------------------------------------------------------------------

/// A validated credit asset code: 1–12 ASCII alphanumerics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetCode(String);

impl AssetCode {
    pub fn parse(code: &str) -> Result<Self, CompositionError> {
        let valid = !code.is_empty()
            && code.len() <= MAX_ASSET_CODE_LENGTH
            && code.bytes().all(|b| b.is_ascii_alphanumeric());
        if !valid {
            return Err(CompositionError::MalformedAssetCode(code.to_string()));
        }
        Ok(Self(code.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Something that can be held, paid, or traded on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Asset {
    /// The ledger's native currency.
    Native,
    /// An asset issued by an account.
    Credit { code: AssetCode, issuer: AccountId },
}

impl Asset {
    /// Resolves a `(code, issuer)` pair as callers supply it: the native
    /// code means the native asset and the issuer is ignored.
    pub fn from_code(code: &str, issuer: Option<&str>) -> Result<Self, CompositionError> {
        if code.eq_ignore_ascii_case(NATIVE_ASSET_CODE) {
            return Ok(Self::Native);
        }
        let code = AssetCode::parse(code)?;
        let issuer = match issuer.map(str::trim) {
            Some(issuer) if !issuer.is_empty() => AccountId::parse(issuer)?,
            _ => return Err(CompositionError::MissingIssuer(code.to_string())),
        };
        Ok(Self::Credit { code, issuer })
    }

    pub fn code(&self) -> &str {
        match self {
            Self::Native => NATIVE_ASSET_CODE,
            Self::Credit { code, .. } => code.as_str(),
        }
    }

    pub fn issuer(&self) -> Option<&AccountId> {
        match self {
            Self::Native => None,
            Self::Credit { issuer, .. } => Some(issuer),
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Self::Native)
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => f.write_str(NATIVE_ASSET_CODE),
            Self::Credit { code, issuer } => write!(f, "{}:{}", code, issuer),
        }
    }
}

// ---------------------------------------------------------------------------
// Memo
// ---------------------------------------------------------------------------

/// Optional note attached to a transaction envelope.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Memo {
    #[default]
    None,
    Text(String),
}

impl Memo {
    /// Text memo, rejecting anything the ledger would truncate.
    pub fn text(s: impl Into<String>) -> Result<Self, CompositionError> {
        let s = s.into();
        if s.len() > MAX_MEMO_TEXT_BYTES {
            return Err(CompositionError::MemoTooLong {
                len: s.len(),
                max: MAX_MEMO_TEXT_BYTES,
            });
        }
        Ok(Self::Text(s))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

// ---------------------------------------------------------------------------
// SignerKey
// ---------------------------------------------------------------------------

/// A key that can appear in an account's signer list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignerKey {
    /// An Ed25519 public key; satisfied by a signature in the envelope.
    Ed25519(AccountId),
    /// The hash of one specific transaction; satisfied when exactly that
    /// transaction is submitted, and consumed by the ledger afterwards.
    PreAuthTx(String),
}

impl SignerKey {
    /// Pre-authorization signer for a hex-encoded transaction hash.
    pub fn pre_auth(hash_hex: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hash_hex).map_err(|_| KeyError::InvalidAccountId(hash_hex.to_string()))?;
        if bytes.len() != 32 {
            return Err(KeyError::InvalidAccountId(hash_hex.to_string()));
        }
        Ok(Self::PreAuthTx(hash_hex.to_ascii_lowercase()))
    }
}

impl From<AccountId> for SignerKey {
    fn from(value: AccountId) -> Self {
        Self::Ed25519(value)
    }
}

impl fmt::Display for SignerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ed25519(id) => write!(f, "{}", id),
            Self::PreAuthTx(hash) => write!(f, "preAuthTx:{}", hash),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
