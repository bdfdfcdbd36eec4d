//! # Key Management
//!
//! Ed25519 keypairs and account identifiers for ledger accounts.
//!
//! An account on the ledger is named by its master public key. We carry it
//! around as [`AccountId`], a validated hex string, because account ids show
//! up in persisted records, log fields and envelope bodies far more often
//! than they are used for actual curve arithmetic.
//!
//! Secrets arrive from the custody layer as hex-encoded 32-byte seeds. They
//! are turned into a [`LedgerKeypair`] for the duration of one signing call
//! and never logged, serialized, or stored by this crate.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey, SECRET_KEY_LENGTH};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Length of a signature hint: the trailing bytes of the signer's public key.
pub const SIGNATURE_HINT_LENGTH: usize = 4;

/// Errors that can occur during key operations.
///
/// Deliberately silent about the offending bytes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid secret key: expected {SECRET_KEY_LENGTH} hex-encoded bytes")]
    InvalidSecretKey,

    #[error("invalid account id: {0}")]
    InvalidAccountId(String),
}

// ---------------------------------------------------------------------------
// AccountId
// ---------------------------------------------------------------------------

/// A ledger account identifier: the account's hex-encoded Ed25519 public key.
///
/// Construction always validates, so holding an `AccountId` means holding
/// 32 bytes that decode to a curve point.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    /// Parses a hex-encoded public key.
    pub fn parse(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s).map_err(|_| KeyError::InvalidAccountId(s.to_string()))?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidAccountId(s.to_string()))?;
        VerifyingKey::from_bytes(&arr).map_err(|_| KeyError::InvalidAccountId(s.to_string()))?;
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Returns the hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Raw public key bytes.
    pub fn to_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        // Validated at construction.
        if let Ok(bytes) = hex::decode(&self.0) {
            out.copy_from_slice(&bytes);
        }
        out
    }

    /// The trailing bytes of the public key, used to pair envelope signatures
    /// with candidate signers without trying every key.
    pub fn hint(&self) -> [u8; SIGNATURE_HINT_LENGTH] {
        let bytes = self.to_bytes();
        let mut hint = [0u8; SIGNATURE_HINT_LENGTH];
        hint.copy_from_slice(&bytes[32 - SIGNATURE_HINT_LENGTH..]);
        hint
    }

    /// Verifies an Ed25519 signature made by this account's key.
    ///
    /// Malformed signatures simply fail verification.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.to_bytes()) else {
            return false;
        };
        let Ok(sig_bytes) = <[u8; 64]>::try_from(signature) else {
            return false;
        };
        verifying_key
            .verify(message, &Signature::from_bytes(&sig_bytes))
            .is_ok()
    }
}

impl TryFrom<String> for AccountId {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AccountId> for String {
    fn from(value: AccountId) -> Self {
        value.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", &self.0[..16])
    }
}

// ---------------------------------------------------------------------------
// LedgerKeypair
// ---------------------------------------------------------------------------

/// An Ed25519 keypair controlling (or co-signing for) a ledger account.
///
/// Intentionally not `Serialize`. Exporting the seed is an explicit
/// [`secret_hex`](Self::secret_hex) call.
pub struct LedgerKeypair {
    signing_key: SigningKey,
}

impl LedgerKeypair {
    /// Generates a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Builds a keypair from a 32-byte seed.
    pub fn from_seed(seed: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Parses a hex-encoded seed, the form in which custody hands us secrets.
    pub fn from_secret_hex(secret: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(secret.trim()).map_err(|_| KeyError::InvalidSecretKey)?;
        let seed: [u8; SECRET_KEY_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self::from_seed(&seed))
    }

    /// Exports the seed as hex. Handle with care.
    pub fn secret_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    /// The account id (public key) controlled by this keypair.
    pub fn account_id(&self) -> AccountId {
        AccountId(hex::encode(self.signing_key.verifying_key().to_bytes()))
    }

    /// Signs a message. Ed25519 is deterministic: same key, same message,
    /// same signature.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl Clone for LedgerKeypair {
    fn clone(&self) -> Self {
        Self::from_seed(&self.signing_key.to_bytes())
    }
}

impl fmt::Debug for LedgerKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LedgerKeypair(pub={})", self.account_id())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_hex_roundtrip_preserves_account() {
        let kp = LedgerKeypair::generate();
        let restored = LedgerKeypair::from_secret_hex(&kp.secret_hex()).unwrap();
        assert_eq!(kp.account_id(), restored.account_id());
    }

    #[test]
    fn rejects_short_secret() {
        assert_eq!(
            LedgerKeypair::from_secret_hex("abcd").unwrap_err(),
            KeyError::InvalidSecretKey
        );
        assert_eq!(
            LedgerKeypair::from_secret_hex("not hex at all").unwrap_err(),
            KeyError::InvalidSecretKey
        );
    }

    #[test]
    fn key_errors_carry_into_composition_errors() {
        use crate::transaction::error::CompositionError;

        let err = CompositionError::from(AccountId::parse("zz").unwrap_err());
        assert_eq!(err.clone(), err);
        assert!(matches!(err, CompositionError::InvalidKey(KeyError::InvalidAccountId(_))));
    }

    #[test]
    fn account_id_is_validated() {
        assert!(AccountId::parse("zz").is_err());
        assert!(AccountId::parse(&"ab".repeat(31)).is_err());

        let id = LedgerKeypair::generate().account_id();
        assert_eq!(AccountId::parse(id.as_str()).unwrap(), id);
    }

    #[test]
    fn account_id_normalizes_case() {
        let id = LedgerKeypair::generate().account_id();
        let upper = id.as_str().to_ascii_uppercase();
        assert_eq!(AccountId::parse(&upper).unwrap(), id);
    }

    #[test]
    fn sign_and_verify() {
        let kp = LedgerKeypair::generate();
        let sig = kp.sign(b"envelope hash");
        assert!(kp.account_id().verify(b"envelope hash", &sig));
        assert!(!kp.account_id().verify(b"other hash", &sig));
        assert!(!kp.account_id().verify(b"envelope hash", &sig[..10]));
    }

    #[test]
    fn signature_from_other_key_does_not_verify() {
        let kp1 = LedgerKeypair::generate();
        let kp2 = LedgerKeypair::generate();
        let sig = kp1.sign(b"msg");
        assert!(!kp2.account_id().verify(b"msg", &sig));
    }

    #[test]
    fn hint_is_public_key_suffix() {
        let id = LedgerKeypair::generate().account_id();
        assert_eq!(&id.to_bytes()[28..], &id.hint());
    }

    #[test]
    fn account_id_serde_validates() {
        let id = LedgerKeypair::generate().account_id();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
        let back: AccountId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);

        assert!(serde_json::from_str::<AccountId>("\"nope\"").is_err());
    }

    #[test]
    fn debug_never_prints_secret() {
        let kp = LedgerKeypair::generate();
        let dbg = format!("{:?}", kp);
        assert!(!dbg.contains(&kp.secret_hex()));
    }
}
