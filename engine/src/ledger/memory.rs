//! In-process ledger.
//!
//! Holds accounts in memory and applies submitted envelopes with the same
//! checks the real network performs on our behalf: sequence numbers, time
//! bounds, and weighted signatures per source account (Ed25519 signatures
//! and pre-authorized transaction hashes). Used by the integration suite
//! and anywhere a real network is not available.
//!
//! Submissions can be scripted to fail so that retry paths are testable.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::time::Duration;
use tracing::{debug, info};

use super::{
    AccountSnapshot, LedgerClient, LedgerError, Signer, SubmissionError, SubmissionReceipt,
    Thresholds,
};
use crate::crypto::hash::network_id;
use crate::crypto::keys::AccountId;
use crate::transaction::envelope::TransactionEnvelope;
use crate::transaction::operation::OperationBody;
use crate::transaction::threshold::classify;
use crate::transaction::types::{SignerKey, ThresholdCategory};

/// Starting sequence number for accounts created through the test helpers.
const INITIAL_SEQUENCE: u64 = 100;

#[derive(Debug, Clone)]
struct LedgerAccount {
    sequence: u64,
    thresholds: Thresholds,
    /// Additional signers; the master key is implied by `thresholds.master`.
    signers: Vec<Signer>,
    flags: u32,
    home_domain: Option<String>,
}

impl LedgerAccount {
    fn new(sequence: u64) -> Self {
        Self {
            sequence,
            thresholds: Thresholds {
                master: 1,
                low: 0,
                medium: 0,
                high: 0,
            },
            signers: Vec::new(),
            flags: 0,
            home_domain: None,
        }
    }

    fn snapshot(&self, id: &AccountId) -> AccountSnapshot {
        let mut signers = Vec::with_capacity(self.signers.len() + 1);
        if self.thresholds.master > 0 {
            signers.push(Signer {
                key: SignerKey::Ed25519(id.clone()),
                weight: self.thresholds.master,
            });
        }
        signers.extend(self.signers.iter().cloned());
        AccountSnapshot {
            account_id: id.clone(),
            sequence: self.sequence,
            thresholds: self.thresholds,
            signers,
        }
    }
}

enum Scripted {
    Reject(SubmissionError),
    Drop,
}

struct Inner {
    accounts: HashMap<AccountId, LedgerAccount>,
    script: VecDeque<Scripted>,
    submissions: usize,
    applied: Vec<String>,
    ledger_seq: u64,
}

/// An in-memory ledger implementing [`LedgerClient`].
pub struct MemoryLedger {
    network_id: [u8; 32],
    latency: Duration,
    inner: Mutex<Inner>,
}

impl MemoryLedger {
    pub fn new(network_passphrase: &str) -> Self {
        Self {
            network_id: network_id(network_passphrase),
            latency: Duration::ZERO,
            inner: Mutex::new(Inner {
                accounts: HashMap::new(),
                script: VecDeque::new(),
                submissions: 0,
                applied: Vec::new(),
                ledger_seq: 1,
            }),
        }
    }

    /// Delays every call, to widen race windows in concurrency tests.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    // -- Account setup -------------------------------------------------------

    /// Creates an account with master weight 1 and all thresholds 0.
    pub fn create_account(&self, id: &AccountId) {
        self.inner
            .lock()
            .accounts
            .insert(id.clone(), LedgerAccount::new(INITIAL_SEQUENCE));
    }

    pub fn set_thresholds(&self, id: &AccountId, thresholds: Thresholds) {
        if let Some(account) = self.inner.lock().accounts.get_mut(id) {
            account.thresholds = thresholds;
        }
    }

    /// Adds, reweights, or (weight 0) removes a signer.
    pub fn set_signer(&self, id: &AccountId, key: SignerKey, weight: u32) {
        if let Some(account) = self.inner.lock().accounts.get_mut(id) {
            apply_signer(account, key, weight);
        }
    }

    pub fn snapshot(&self, id: &AccountId) -> Option<AccountSnapshot> {
        self.inner.lock().accounts.get(id).map(|a| a.snapshot(id))
    }

    pub fn sequence(&self, id: &AccountId) -> Option<u64> {
        self.inner.lock().accounts.get(id).map(|a| a.sequence)
    }

    pub fn flags(&self, id: &AccountId) -> Option<u32> {
        self.inner.lock().accounts.get(id).map(|a| a.flags)
    }

    pub fn home_domain(&self, id: &AccountId) -> Option<String> {
        self.inner
            .lock()
            .accounts
            .get(id)
            .and_then(|a| a.home_domain.clone())
    }

    // -- Scripting & inspection ---------------------------------------------

    /// The next submission is rejected with `error`.
    pub fn reject_next(&self, error: SubmissionError) {
        self.inner.lock().script.push_back(Scripted::Reject(error));
    }

    /// The next submission fails at the transport level.
    pub fn drop_next(&self) {
        self.inner.lock().script.push_back(Scripted::Drop);
    }

    /// Number of `submit_envelope` calls received, whatever their outcome.
    pub fn submission_count(&self) -> usize {
        self.inner.lock().submissions
    }

    /// Hashes of successfully applied transactions, in order.
    pub fn applied(&self) -> Vec<String> {
        self.inner.lock().applied.clone()
    }

    // -- Application ---------------------------------------------------------

    fn apply(&self, envelope: &TransactionEnvelope) -> Result<SubmissionReceipt, SubmissionError> {
        let hash = envelope.hash(&self.network_id);
        let hash_hex = hex::encode(hash);
        let mut inner = self.inner.lock();

        let source = inner
            .accounts
            .get(&envelope.source)
            .ok_or_else(|| SubmissionError::with_codes("source account missing", "tx_no_account", vec![]))?;

        if envelope.sequence != source.sequence + 1 {
            return Err(SubmissionError::with_codes(
                format!(
                    "bad sequence: expected {}, got {}",
                    source.sequence + 1,
                    envelope.sequence
                ),
                "tx_bad_seq",
                vec![],
            ));
        }

        let now = Utc::now().timestamp().max(0) as u64;
        if !envelope.time_bounds.contains(now) {
            return Err(if now < envelope.time_bounds.min_time {
                SubmissionError::with_codes("too early", "tx_too_early", vec![])
            } else {
                SubmissionError::with_codes("too late", "tx_too_late", vec![])
            });
        }

        // Required category per distinct source account.
        let mut required: HashMap<&AccountId, ThresholdCategory> = HashMap::new();
        required.insert(&envelope.source, ThresholdCategory::Low);
        for op in &envelope.operations {
            let account = op.effective_source(&envelope.source);
            let category = classify(&op.body);
            let entry = required.entry(account).or_insert(category);
            *entry = (*entry).max(category);
        }

        let mut op_codes = Vec::with_capacity(envelope.operations.len());
        let mut failed = false;
        for op in &envelope.operations {
            let account = op.effective_source(&envelope.source);
            let code = match inner.accounts.get(account) {
                None => "op_no_account",
                Some(state) => {
                    let category = required.get(account).copied().unwrap_or(ThresholdCategory::Low);
                    if self.authorized(account, state, envelope, &hash_hex, &hash, category) {
                        match &op.body {
                            OperationBody::CreateAccount(create)
                                if inner.accounts.contains_key(&create.destination) =>
                            {
                                "op_already_exists"
                            }
                            _ => "op_success",
                        }
                    } else {
                        "op_bad_auth"
                    }
                }
            };
            failed |= code != "op_success";
            op_codes.push(code.to_string());
        }

        let source_state = inner
            .accounts
            .get(&envelope.source)
            .ok_or_else(|| SubmissionError::with_codes("source account missing", "tx_no_account", vec![]))?;
        if !self.authorized(
            &envelope.source,
            source_state,
            envelope,
            &hash_hex,
            &hash,
            ThresholdCategory::Low,
        ) {
            return Err(SubmissionError::with_codes(
                "insufficient signatures",
                "tx_bad_auth",
                vec![],
            ));
        }
        if failed {
            return Err(SubmissionError::with_codes(
                "one or more operations failed",
                "tx_failed",
                op_codes,
            ));
        }

        // All checks passed; apply effects.
        if let Some(source) = inner.accounts.get_mut(&envelope.source) {
            source.sequence = envelope.sequence;
        }
        for op in &envelope.operations {
            let account_id = op.effective_source(&envelope.source).clone();
            match &op.body {
                OperationBody::CreateAccount(create) => {
                    // New accounts start at the current ledger's sequence space.
                    let seq = inner.ledger_seq << 32;
                    inner
                        .accounts
                        .insert(create.destination.clone(), LedgerAccount::new(seq));
                }
                OperationBody::SetOptions(set) => {
                    if let Some(account) = inner.accounts.get_mut(&account_id) {
                        if let Some(w) = set.master_weight {
                            account.thresholds.master = w;
                        }
                        if let Some(t) = set.low_threshold {
                            account.thresholds.low = t;
                        }
                        if let Some(t) = set.med_threshold {
                            account.thresholds.medium = t;
                        }
                        if let Some(t) = set.high_threshold {
                            account.thresholds.high = t;
                        }
                        if let Some(bits) = set.clear_flags {
                            account.flags &= !bits;
                        }
                        if let Some(bits) = set.set_flags {
                            account.flags |= bits;
                        }
                        if let Some(domain) = &set.home_domain {
                            account.home_domain = Some(domain.clone());
                        }
                        if let Some(signer) = &set.signer {
                            apply_signer(account, signer.key.clone(), signer.weight);
                        }
                    }
                }
                OperationBody::BumpSequence(bump) => {
                    if let Some(account) = inner.accounts.get_mut(&account_id) {
                        account.sequence = account.sequence.max(bump.bump_to);
                    }
                }
                OperationBody::AccountMerge(_) => {
                    inner.accounts.remove(&account_id);
                }
                OperationBody::Payment(_)
                | OperationBody::ChangeTrust(_)
                | OperationBody::AllowTrust(_)
                | OperationBody::ManageOffer(_) => {}
            }
        }

        // A pre-authorized transaction hash is consumed once used.
        let consumed = SignerKey::PreAuthTx(hash_hex.clone());
        for account in inner.accounts.values_mut() {
            account.signers.retain(|s| s.key != consumed);
        }

        inner.ledger_seq += 1;
        inner.applied.push(hash_hex.clone());
        Ok(SubmissionReceipt {
            hash: hash_hex,
            ledger_seq: inner.ledger_seq,
        })
    }

    /// Whether the signatures on `envelope` carry enough weight for
    /// `category` on `account`.
    fn authorized(
        &self,
        account_id: &AccountId,
        account: &LedgerAccount,
        envelope: &TransactionEnvelope,
        hash_hex: &str,
        hash: &[u8; 32],
        category: ThresholdCategory,
    ) -> bool {
        let snapshot = account.snapshot(account_id);
        let mut seen = BTreeSet::new();
        let weight: u32 = snapshot
            .signers
            .iter()
            .filter(|signer| match &signer.key {
                SignerKey::Ed25519(key) => {
                    let hint = key.hint();
                    envelope
                        .signatures
                        .iter()
                        .any(|sig| sig.hint == hint && key.verify(hash, &sig.signature))
                }
                SignerKey::PreAuthTx(h) => h == hash_hex,
            })
            .filter(|signer| seen.insert(signer.key.to_string()))
            .map(|signer| signer.weight)
            .sum();
        weight >= snapshot.thresholds.required(category).max(1)
    }
}

fn apply_signer(account: &mut LedgerAccount, key: SignerKey, weight: u32) {
    account.signers.retain(|s| s.key != key);
    if weight > 0 {
        account.signers.push(Signer { key, weight });
    }
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn load_account(&self, account: &AccountId) -> Result<AccountSnapshot, LedgerError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.snapshot(account)
            .ok_or_else(|| LedgerError::AccountNotFound(account.clone()))
    }

    async fn submit_envelope(&self, envelope: &[u8]) -> Result<SubmissionReceipt, LedgerError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let scripted = {
            let mut inner = self.inner.lock();
            inner.submissions += 1;
            inner.script.pop_front()
        };
        match scripted {
            Some(Scripted::Drop) => {
                return Err(LedgerError::Transport("connection reset".to_string()));
            }
            Some(Scripted::Reject(error)) => return Err(LedgerError::Rejected(error)),
            None => {}
        }

        let envelope = TransactionEnvelope::from_bytes(envelope)
            .map_err(|e| LedgerError::MalformedEnvelope(e.to_string()))?;
        match self.apply(&envelope) {
            Ok(receipt) => {
                info!(hash = %receipt.hash, ledger_seq = receipt.ledger_seq, "transaction applied");
                Ok(receipt)
            }
            Err(error) => {
                debug!(error = %error, codes = ?error.result_codes, "transaction rejected");
                Err(LedgerError::Rejected(error))
            }
        }
    }
}
