//! The persisted authorization record.
//!
//! A [`PendingTransaction`] is created once by the composer and afterwards
//! changed only through the `pub(crate)` mutators here, which the signing
//! and pre-authorization coordinators call under the per-transaction lock.
//! Its `hash` is fixed at construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::keys::AccountId;
use crate::ledger::SubmissionError;
use crate::transaction::envelope::TransactionEnvelope;
use crate::transaction::operation::OperationType;
use crate::transaction::types::{SignerKey, ThresholdCategory};

/// One signer's share of a quorum. `weight` is frozen at composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureSlot {
    pub signer_key: SignerKey,
    pub weight: u32,
    pub signed: bool,
    pub signed_at: Option<DateTime<Utc>>,
}

impl SignatureSlot {
    pub fn unsigned(signer_key: SignerKey, weight: u32) -> Self {
        Self {
            signer_key,
            weight,
            signed: false,
            signed_at: None,
        }
    }

    fn sign(&mut self, at: DateTime<Utc>) -> bool {
        if self.signed {
            return false;
        }
        self.signed = true;
        self.signed_at = Some(at);
        true
    }
}

/// Binary confirmation gate used by pre-authorized submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproverSlot {
    pub approver_key: AccountId,
    pub signed: bool,
    pub signed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub op_type: OperationType,
    pub source_account: AccountId,
    pub threshold_category: ThresholdCategory,
    pub is_primary_source: bool,
    /// Set for foreign-source operations until their own account's quorum
    /// is met. Never set again once cleared.
    pub needs_independent_quorum: bool,
    /// Slots for this operation's own source account. Empty for
    /// primary-source operations, which share the transaction-level slots.
    pub signatures: Vec<SignatureSlot>,
}

impl PendingOperation {
    pub fn signed_weight(&self) -> u32 {
        signed_weight(&self.signatures)
    }
}

/// Derived authorization state. Only `Submitted` and `SubmissionFailed`
/// are backed by stored fields; the rest are computed from signatures and
/// live thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    Composed,
    PartiallySigned,
    QuorumMet,
    Submitted,
    SubmissionFailed,
}

fn signed_weight(slots: &[SignatureSlot]) -> u32 {
    slots
        .iter()
        .filter(|slot| slot.signed)
        .map(|slot| slot.weight)
        .sum()
}

// ---------------------------------------------------------------------------
// PendingTransaction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    id: String,
    source_account: AccountId,
    envelope: TransactionEnvelope,
    hash: String,
    description: String,
    submitted: bool,
    error: Option<SubmissionError>,
    threshold_category: ThresholdCategory,
    has_foreign_source_operation: bool,
    signatures: Vec<SignatureSlot>,
    approvers: Vec<ApproverSlot>,
    operations: Vec<PendingOperation>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
}

impl PendingTransaction {
    /// Fresh record straight out of composition: nothing signed, nothing
    /// submitted, version 0.
    pub(crate) fn new(
        envelope: TransactionEnvelope,
        hash: String,
        description: String,
        signatures: Vec<SignatureSlot>,
        operations: Vec<PendingOperation>,
    ) -> Self {
        let threshold_category =
            ThresholdCategory::max_of(operations.iter().map(|op| op.threshold_category));
        let has_foreign_source_operation = operations.iter().any(|op| !op.is_primary_source);
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_account: envelope.source.clone(),
            envelope,
            hash,
            description,
            submitted: false,
            error: None,
            threshold_category,
            has_foreign_source_operation,
            signatures,
            approvers: Vec::new(),
            operations,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    // -- Accessors -----------------------------------------------------------

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source_account(&self) -> &AccountId {
        &self.source_account
    }

    pub fn envelope(&self) -> &TransactionEnvelope {
        &self.envelope
    }

    /// Hex-encoded network-scoped hash of the unsigned envelope.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    /// The last submission failure, cleared by a successful submission.
    pub fn error(&self) -> Option<&SubmissionError> {
        self.error.as_ref()
    }

    pub fn threshold_category(&self) -> ThresholdCategory {
        self.threshold_category
    }

    pub fn has_foreign_source_operation(&self) -> bool {
        self.has_foreign_source_operation
    }

    pub fn signatures(&self) -> &[SignatureSlot] {
        &self.signatures
    }

    pub fn approvers(&self) -> &[ApproverSlot] {
        &self.approvers
    }

    pub fn operations(&self) -> &[PendingOperation] {
        &self.operations
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Optimistic concurrency counter, bumped by every store update.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Signed weight over the transaction-level slots.
    pub fn signed_weight(&self) -> u32 {
        signed_weight(&self.signatures)
    }

    // -- Queries ---------------------------------------------------------------

    /// Whether `key` holds any signature slot on this transaction.
    pub fn has_signer(&self, key: &SignerKey) -> bool {
        self.signatures.iter().any(|s| &s.signer_key == key)
            || self
                .operations
                .iter()
                .any(|op| op.signatures.iter().any(|s| &s.signer_key == key))
    }

    /// Still open and waiting on `key`: an unsigned transaction-level slot,
    /// or an unsigned slot on an operation that still needs its own quorum.
    pub fn awaits_signer(&self, key: &SignerKey) -> bool {
        if self.submitted {
            return false;
        }
        let unsigned = |s: &SignatureSlot| &s.signer_key == key && !s.signed;
        self.signatures.iter().any(unsigned)
            || self
                .operations
                .iter()
                .any(|op| op.needs_independent_quorum && op.signatures.iter().any(unsigned))
    }

    /// Still open and waiting on `approver` to confirm.
    pub fn awaits_approver(&self, approver: &AccountId) -> bool {
        !self.submitted
            && self
                .approvers
                .iter()
                .any(|a| &a.approver_key == approver && !a.signed)
    }

    // -- Mutators ----------------------------------------------------------------

    /// Marks every slot held by `key` as signed. Returns how many slots
    /// changed; zero means the call was a repeat.
    pub(crate) fn mark_signed(&mut self, key: &SignerKey, at: DateTime<Utc>) -> usize {
        let mut changed = 0;
        let slots = self
            .signatures
            .iter_mut()
            .chain(self.operations.iter_mut().flat_map(|op| op.signatures.iter_mut()));
        for slot in slots.filter(|s| &s.signer_key == key) {
            if slot.sign(at) {
                changed += 1;
            }
        }
        changed
    }

    pub(crate) fn envelope_mut(&mut self) -> &mut TransactionEnvelope {
        &mut self.envelope
    }

    pub(crate) fn operations_mut(&mut self) -> &mut [PendingOperation] {
        &mut self.operations
    }

    /// Adds an approver slot unless the approver already has one.
    pub(crate) fn add_approver(&mut self, approver: AccountId) -> bool {
        if self.approvers.iter().any(|a| a.approver_key == approver) {
            return false;
        }
        self.approvers.push(ApproverSlot {
            approver_key: approver,
            signed: false,
            signed_at: None,
        });
        true
    }

    /// Confirms `approver`'s slot. `None` if the approver has no slot.
    pub(crate) fn approve(&mut self, approver: &AccountId, at: DateTime<Utc>) -> Option<()> {
        let slot = self
            .approvers
            .iter_mut()
            .find(|a| &a.approver_key == approver)?;
        if !slot.signed {
            slot.signed = true;
            slot.signed_at = Some(at);
        }
        Some(())
    }

    /// Records a successful submission.
    pub(crate) fn mark_submitted(&mut self) {
        self.submitted = true;
        self.error = None;
    }

    /// Records a failed submission and reopens the record.
    pub(crate) fn mark_failed(&mut self, error: SubmissionError) {
        self.submitted = false;
        self.error = Some(error);
    }

    /// Store implementations call this after a successful compare-and-swap.
    pub fn advance_version(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
