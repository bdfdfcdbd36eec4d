//! # Engine Configuration & Constants
//!
//! Every ledger-facing magic number the engine relies on lives here, along
//! with [`EngineConfig`], the runtime configuration a deployment supplies
//! (network passphrase, base fee, envelope validity window, fee table).
//!
//! Constants mirror the rules of the upstream ledger. Changing them does not
//! change the ledger; it only makes our envelopes disagree with it.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::keys::AccountId;
use crate::transaction::fees::{FeeRate, FeeSchedule};
use crate::transaction::types::Amount;

// ---------------------------------------------------------------------------
// Ledger Rules
// ---------------------------------------------------------------------------

/// Asset code callers use to request the native asset.
pub const NATIVE_ASSET_CODE: &str = "XLM";

/// Maximum length of a credit asset code.
pub const MAX_ASSET_CODE_LENGTH: usize = 12;

/// Number of decimal places in ledger amounts and prices.
pub const AMOUNT_DECIMALS: u32 = 7;

/// `10^AMOUNT_DECIMALS`: one whole unit expressed in the smallest unit.
pub const AMOUNT_SCALE: i64 = 10_000_000;

/// Maximum memo text length in bytes.
pub const MAX_MEMO_TEXT_BYTES: usize = 28;

/// Maximum operations per transaction envelope.
pub const MAX_OPERATIONS_PER_TRANSACTION: usize = 100;

/// Per-operation base fee in the smallest native unit.
pub const DEFAULT_BASE_FEE: u32 = 100;

/// Envelope validity window. Envelopes outside `[min_time, max_time]` are
/// rejected by the ledger as too early or too late.
pub const DEFAULT_TRANSACTION_TIMEOUT_SECS: u64 = 200;

/// Passphrase of the public test network. Mixed into every transaction hash.
pub const DEFAULT_NETWORK_PASSPHRASE: &str = "Test SDF Network ; September 2015";

// ---------------------------------------------------------------------------
// Memos
// ---------------------------------------------------------------------------

/// Memo attached to the setOptions transaction that registers a
/// pre-authorization signer.
pub const PRE_AUTH_SIGNER_MEMO: &str = "PreAuthTx signer";

/// Prefix of the memo naming an injected fee.
pub const FEE_MEMO_PREFIX: &str = "tx contains ";

// ---------------------------------------------------------------------------
// Fee Keys
// ---------------------------------------------------------------------------

/// Fee charged when an account pays out an asset it issued itself.
pub const FEE_ISSUANCE: &str = "FEE_ISSUANCE";

/// Fee charged when a new offer is placed.
pub const FEE_OFFER: &str = "FEE_OFFER";

/// Fee keys every deployment's fee table must price.
pub const REQUIRED_FEE_KEYS: [&str; 2] = [FEE_ISSUANCE, FEE_OFFER];

/// Collector account of the built-in fee table.
pub const DEFAULT_FEE_COLLECTOR: &str =
    "fae80d5a158c640c45ba3ddcfab703284117fb488f1236807c3f3bba3a05124a";

/// Built-in issuance fee: 1 unit of the native asset.
pub const DEFAULT_ISSUANCE_FEE_STROOPS: i64 = 10_000_000;

/// Built-in new-offer fee: 0.1 units of the native asset.
pub const DEFAULT_OFFER_FEE_STROOPS: i64 = 1_000_000;

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Errors raised while loading or validating an [`EngineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Runtime configuration shared by the composer and the coordinators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Network passphrase. Determines the network id hashed into every
    /// transaction hash, so envelopes built for one network cannot be
    /// replayed on another.
    pub network_passphrase: String,

    /// Fee paid per operation.
    pub base_fee: u32,

    /// Seconds an envelope stays valid after it is built.
    pub transaction_timeout_secs: u64,

    /// Static fee table consulted by the fee injector.
    pub fees: FeeSchedule,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            network_passphrase: DEFAULT_NETWORK_PASSPHRASE.to_string(),
            base_fee: DEFAULT_BASE_FEE,
            transaction_timeout_secs: DEFAULT_TRANSACTION_TIMEOUT_SECS,
            fees: default_fee_schedule(),
        }
    }
}

/// The fee table used when a deployment supplies none. An unparsable
/// collector leaves it empty, which `validate()` then rejects.
fn default_fee_schedule() -> FeeSchedule {
    let Ok(collector) = AccountId::parse(DEFAULT_FEE_COLLECTOR) else {
        return FeeSchedule::new();
    };
    let rate = |name: &str, stroops: i64| FeeRate {
        name: name.to_string(),
        destination: collector.clone(),
        rate: Amount::from_stroops(stroops),
    };
    FeeSchedule::new()
        .with(FEE_ISSUANCE, rate("issuance fee", DEFAULT_ISSUANCE_FEE_STROOPS))
        .with(FEE_OFFER, rate("offer fee", DEFAULT_OFFER_FEE_STROOPS))
}

impl EngineConfig {
    /// Parses a JSON document and validates it.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON config file from disk and validates it.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Rejects configurations the ledger would refuse to work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network_passphrase.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "network_passphrase must not be empty".to_string(),
            ));
        }
        if self.base_fee == 0 {
            return Err(ConfigError::Invalid("base_fee must be > 0".to_string()));
        }
        if self.transaction_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "transaction_timeout_secs must be > 0".to_string(),
            ));
        }
        if let Some(key) = REQUIRED_FEE_KEYS
            .into_iter()
            .find(|key| self.fees.get(key).is_none())
        {
            return Err(ConfigError::Invalid(format!("fee table has no {} entry", key)));
        }
        Ok(())
    }
}
