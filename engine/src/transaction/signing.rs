//! Envelope signing with Ed25519 keypairs.
//!
//! Signing is a separate step from building because the key is only
//! available for the duration of one signer's call. The signed message is
//! the network-scoped envelope hash, which excludes signatures, so adding
//! signatures never changes what later signers sign.

use super::envelope::{DecoratedSignature, TransactionEnvelope};
use crate::crypto::keys::{AccountId, LedgerKeypair};

/// Whether `envelope` already carries a valid signature from `account`.
pub fn has_signature_from(
    envelope: &TransactionEnvelope,
    account: &AccountId,
    network_id: &[u8; 32],
) -> bool {
    let hint = account.hint();
    let hash = envelope.hash(network_id);
    envelope
        .signatures
        .iter()
        .any(|sig| sig.hint == hint && account.verify(&hash, &sig.signature))
}

/// Appends `keypair`'s signature over the envelope hash.
///
/// Returns `false` without touching the envelope when a signature from
/// this key is already present, so re-signing never duplicates.
///
/// ```
/// use custody_engine::crypto::{network_id, LedgerKeypair};
/// use custody_engine::transaction::envelope::EnvelopeBuilder;
/// use custody_engine::transaction::signing::sign_envelope;
///
/// let keypair = LedgerKeypair::generate();
/// let net = network_id("Test SDF Network ; September 2015");
/// let mut envelope = EnvelopeBuilder::new(keypair.account_id(), 1).build();
///
/// assert!(sign_envelope(&mut envelope, &keypair, &net));
/// assert!(!sign_envelope(&mut envelope, &keypair, &net));
/// assert_eq!(envelope.signatures.len(), 1);
/// ```
pub fn sign_envelope(
    envelope: &mut TransactionEnvelope,
    keypair: &LedgerKeypair,
    network_id: &[u8; 32],
) -> bool {
    let account = keypair.account_id();
    if has_signature_from(envelope, &account, network_id) {
        return false;
    }
    let hash = envelope.hash(network_id);
    envelope.signatures.push(DecoratedSignature {
        hint: account.hint(),
        signature: keypair.sign(&hash).to_vec(),
    });
    true
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
