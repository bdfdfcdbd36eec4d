//! Transaction envelopes and their canonical encoding.
//!
//! The [`EnvelopeBuilder`] assembles an unsigned [`TransactionEnvelope`].
//! Signing happens separately in [`super::signing`], so composition can be
//! tested without key material.
//!
//! # Hash
//!
//! `hash = sha256(network_id || "tx" || signable_bytes)` where
//! `network_id = sha256(passphrase)`. Signatures are excluded from the
//! signable bytes, so the hash is stable no matter how many signatures
//! the envelope collects.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::operation::{Operation, OperationBody};
use super::types::{Amount, Asset, Memo, SignerKey};
use crate::crypto::hash::sha256_multi;
use crate::crypto::keys::{AccountId, SIGNATURE_HINT_LENGTH};

/// Envelope type tag mixed into the hash preimage.
const ENVELOPE_TYPE_TX: &[u8] = b"tx";

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("envelope encoding failed: {0}")]
    Encoding(#[from] bincode::Error),
}

/// Validity window in Unix seconds, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBounds {
    pub min_time: u64,
    pub max_time: u64,
}

impl TimeBounds {
    pub fn contains(&self, unix_secs: u64) -> bool {
        unix_secs >= self.min_time && unix_secs <= self.max_time
    }
}

/// A signature together with the trailing bytes of the signer's key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoratedSignature {
    pub hint: [u8; SIGNATURE_HINT_LENGTH],
    pub signature: Vec<u8>,
}

// ---------------------------------------------------------------------------
// TransactionEnvelope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEnvelope {
    pub source: AccountId,
    pub sequence: u64,
    /// Total fee: base fee times operation count.
    pub fee: u32,
    pub time_bounds: TimeBounds,
    pub memo: Memo,
    pub operations: Vec<Operation>,
    pub signatures: Vec<DecoratedSignature>,
}

impl TransactionEnvelope {
    /// Canonical bytes covered by the hash.
    ///
    /// Fixed-width little-endian integers, length-prefixed strings, one tag
    /// byte per enum variant. Signatures are not included.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128 + 96 * self.operations.len());
        put_account(&mut buf, &self.source);
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.extend_from_slice(&self.fee.to_le_bytes());
        buf.extend_from_slice(&self.time_bounds.min_time.to_le_bytes());
        buf.extend_from_slice(&self.time_bounds.max_time.to_le_bytes());

        match &self.memo {
            Memo::None => buf.push(0x00),
            Memo::Text(text) => {
                buf.push(0x01);
                put_str(&mut buf, text);
            }
        }

        buf.extend_from_slice(&(self.operations.len() as u32).to_le_bytes());
        for op in &self.operations {
            put_operation(&mut buf, op);
        }
        buf
    }

    /// Network-scoped transaction hash.
    pub fn hash(&self, network_id: &[u8; 32]) -> [u8; 32] {
        sha256_multi(&[&network_id[..], ENVELOPE_TYPE_TX, &self.signable_bytes()[..]])
    }

    pub fn hash_hex(&self, network_id: &[u8; 32]) -> String {
        hex::encode(self.hash(network_id))
    }

    /// Serialized form handed to the ledger.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        Ok(bincode::deserialize(bytes)?)
    }

    pub fn is_signed(&self) -> bool {
        !self.signatures.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Canonical encoding helpers
// ---------------------------------------------------------------------------

fn put_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

fn put_account(buf: &mut Vec<u8>, id: &AccountId) {
    buf.extend_from_slice(&id.to_bytes());
}

fn put_amount(buf: &mut Vec<u8>, amount: Amount) {
    buf.extend_from_slice(&amount.stroops().to_le_bytes());
}

fn put_opt_u32(buf: &mut Vec<u8>, value: Option<u32>) {
    match value {
        Some(v) => {
            buf.push(0x01);
            buf.extend_from_slice(&v.to_le_bytes());
        }
        None => buf.push(0x00),
    }
}

fn put_asset(buf: &mut Vec<u8>, asset: &Asset) {
    match asset {
        Asset::Native => buf.push(0x00),
        Asset::Credit { code, issuer } => {
            buf.push(0x01);
            put_str(buf, code.as_str());
            put_account(buf, issuer);
        }
    }
}

fn put_signer_key(buf: &mut Vec<u8>, key: &SignerKey) {
    match key {
        SignerKey::Ed25519(id) => {
            buf.push(0x00);
            put_account(buf, id);
        }
        SignerKey::PreAuthTx(hash) => {
            buf.push(0x01);
            put_str(buf, hash);
        }
    }
}

fn put_operation(buf: &mut Vec<u8>, op: &Operation) {
    match &op.source {
        Some(source) => {
            buf.push(0x01);
            put_account(buf, source);
        }
        None => buf.push(0x00),
    }

    match &op.body {
        OperationBody::CreateAccount(body) => {
            buf.push(0);
            put_account(buf, &body.destination);
            put_amount(buf, body.starting_balance);
        }
        OperationBody::Payment(body) => {
            buf.push(1);
            put_account(buf, &body.destination);
            put_asset(buf, &body.asset);
            put_amount(buf, body.amount);
        }
        OperationBody::ChangeTrust(body) => {
            buf.push(2);
            put_asset(buf, &body.asset);
            match body.limit {
                Some(limit) => {
                    buf.push(0x01);
                    put_amount(buf, limit);
                }
                None => buf.push(0x00),
            }
        }
        OperationBody::AllowTrust(body) => {
            buf.push(3);
            put_account(buf, &body.trustor);
            put_str(buf, body.asset_code.as_str());
            buf.push(u8::from(body.authorize));
        }
        OperationBody::ManageOffer(body) => {
            buf.push(4);
            put_asset(buf, &body.selling);
            put_asset(buf, &body.buying);
            put_amount(buf, body.amount);
            buf.extend_from_slice(&body.price.scaled().to_le_bytes());
            buf.extend_from_slice(&body.offer_id.to_le_bytes());
        }
        OperationBody::SetOptions(body) => {
            buf.push(5);
            put_opt_u32(buf, body.clear_flags);
            put_opt_u32(buf, body.set_flags);
            put_opt_u32(buf, body.master_weight);
            put_opt_u32(buf, body.low_threshold);
            put_opt_u32(buf, body.med_threshold);
            put_opt_u32(buf, body.high_threshold);
            match &body.home_domain {
                Some(domain) => {
                    buf.push(0x01);
                    put_str(buf, domain);
                }
                None => buf.push(0x00),
            }
            match &body.signer {
                Some(signer) => {
                    buf.push(0x01);
                    put_signer_key(buf, &signer.key);
                    buf.extend_from_slice(&signer.weight.to_le_bytes());
                }
                None => buf.push(0x00),
            }
        }
        OperationBody::AccountMerge(body) => {
            buf.push(6);
            put_account(buf, &body.destination);
        }
        OperationBody::BumpSequence(body) => {
            buf.push(7);
            buf.extend_from_slice(&body.bump_to.to_le_bytes());
        }
    }
}

// ---------------------------------------------------------------------------
// EnvelopeBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for unsigned envelopes.
///
/// ```
/// use custody_engine::crypto::LedgerKeypair;
/// use custody_engine::transaction::envelope::EnvelopeBuilder;
/// use custody_engine::transaction::operation::{BumpSequenceOp, Operation, OperationBody};
///
/// let source = LedgerKeypair::generate().account_id();
/// let envelope = EnvelopeBuilder::new(source, 8)
///     .base_fee(100)
///     .operation(Operation::new(OperationBody::BumpSequence(BumpSequenceOp { bump_to: 20 })))
///     .build();
/// assert_eq!(envelope.fee, 100);
/// assert!(!envelope.is_signed());
/// ```
///
/// The validity window starts at the current time unless set explicitly.
pub struct EnvelopeBuilder {
    source: AccountId,
    sequence: u64,
    base_fee: u32,
    timeout_secs: u64,
    min_time: Option<u64>,
    memo: Memo,
    operations: Vec<Operation>,
}

impl EnvelopeBuilder {
    pub fn new(source: AccountId, sequence: u64) -> Self {
        Self {
            source,
            sequence,
            base_fee: crate::config::DEFAULT_BASE_FEE,
            timeout_secs: crate::config::DEFAULT_TRANSACTION_TIMEOUT_SECS,
            min_time: None,
            memo: Memo::None,
            operations: Vec::new(),
        }
    }

    pub fn base_fee(mut self, base_fee: u32) -> Self {
        self.base_fee = base_fee;
        self
    }

    pub fn timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Pins the start of the validity window (Unix seconds).
    pub fn valid_from(mut self, unix_secs: u64) -> Self {
        self.min_time = Some(unix_secs);
        self
    }

    pub fn memo(mut self, memo: Memo) -> Self {
        self.memo = memo;
        self
    }

    pub fn operation(mut self, op: Operation) -> Self {
        self.operations.push(op);
        self
    }

    pub fn operations(mut self, ops: impl IntoIterator<Item = Operation>) -> Self {
        self.operations.extend(ops);
        self
    }

    pub fn build(self) -> TransactionEnvelope {
        // Without a pinned start the window opens at 0 and only expires.
        let start = self
            .min_time
            .unwrap_or_else(|| Utc::now().timestamp().max(0) as u64);
        let fee = self
            .base_fee
            .saturating_mul(u32::try_from(self.operations.len()).unwrap_or(u32::MAX));

        TransactionEnvelope {
            source: self.source,
            sequence: self.sequence,
            fee,
            time_bounds: TimeBounds {
                min_time: self.min_time.unwrap_or(0),
                max_time: start.saturating_add(self.timeout_secs),
            },
            memo: self.memo,
            operations: self.operations,
            signatures: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::network_id;
    use crate::crypto::keys::LedgerKeypair;
    use crate::transaction::operation::{BumpSequenceOp, PaymentOp};

    fn sample() -> TransactionEnvelope {
        let source = LedgerKeypair::from_seed(&[7u8; 32]).account_id();
        let dest = LedgerKeypair::from_seed(&[8u8; 32]).account_id();
        EnvelopeBuilder::new(source, 42)
            .valid_from(1_700_000_000)
            .memo(Memo::text("hello").unwrap())
            .operation(Operation::new(OperationBody::Payment(PaymentOp {
                destination: dest,
                asset: Asset::Native,
                amount: Amount::parse("5").unwrap(),
            })))
            .operation(Operation::new(OperationBody::BumpSequence(BumpSequenceOp {
                bump_to: 100,
            })))
            .build()
    }

    #[test]
    fn fee_scales_with_operation_count() {
        let env = sample();
        assert_eq!(env.fee, 200);
    }

    #[test]
    fn time_bounds_use_timeout() {
        let env = sample();
        assert_eq!(env.time_bounds.min_time, 1_700_000_000);
        assert_eq!(env.time_bounds.max_time, 1_700_000_200);
        assert!(env.time_bounds.contains(1_700_000_100));
        assert!(!env.time_bounds.contains(1_700_000_201));
    }

    #[test]
    fn unpinned_window_only_expires() {
        let before = Utc::now().timestamp() as u64;
        let env = EnvelopeBuilder::new(LedgerKeypair::generate().account_id(), 1)
            .timeout(200)
            .build();
        assert_eq!(env.time_bounds.min_time, 0);
        assert!(env.time_bounds.max_time >= before + 200);
        assert!(env.time_bounds.contains(before - 3_600));
    }

    #[test]
    fn hash_excludes_signatures() {
        let net = network_id("test");
        let mut env = sample();
        let before = env.hash(&net);
        env.signatures.push(DecoratedSignature {
            hint: [1, 2, 3, 4],
            signature: vec![0u8; 64],
        });
        assert_eq!(env.hash(&net), before);
    }

    #[test]
    fn hash_depends_on_network() {
        let env = sample();
        assert_ne!(env.hash(&network_id("a")), env.hash(&network_id("b")));
    }

    #[test]
    fn hash_depends_on_sequence_and_memo() {
        let net = network_id("test");
        let base = sample();

        let mut bumped = base.clone();
        bumped.sequence += 1;
        assert_ne!(base.hash(&net), bumped.hash(&net));

        let mut no_memo = base.clone();
        no_memo.memo = Memo::None;
        assert_ne!(base.hash(&net), no_memo.hash(&net));
    }

    #[test]
    fn wire_bytes_decode_back() {
        let env = sample();
        let bytes = env.to_bytes().unwrap();
        assert_eq!(TransactionEnvelope::from_bytes(&bytes).unwrap(), env);
        assert!(TransactionEnvelope::from_bytes(&bytes[..10]).is_err());
    }
}
