//! Turning operations into a persisted, unsigned [`PendingTransaction`].
//!
//! Composition runs in a fixed order: validate every operation, inject
//! fees, then (and only then) touch the ledger and the store. A request
//! that fails validation leaves no trace.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::error::AuthorizationResult;
use super::pending::{PendingOperation, PendingTransaction, SignatureSlot};
use crate::config::{EngineConfig, MAX_OPERATIONS_PER_TRANSACTION};
use crate::crypto::hash::network_id;
use crate::crypto::keys::AccountId;
use crate::ledger::{AccountSnapshot, LedgerClient};
use crate::storage::TransactionStore;
use crate::transaction::envelope::EnvelopeBuilder;
use crate::transaction::error::CompositionError;
use crate::transaction::fees::FeeInjector;
use crate::transaction::operation::Operation;
use crate::transaction::threshold::classify;
use crate::transaction::types::Memo;

/// What to compose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeRequest {
    pub source: AccountId,
    pub operations: Vec<Operation>,
    pub memo: Memo,
    pub description: String,
    /// Leave one sequence number free before this transaction, for the
    /// signer-adding transaction a later pre-authorization submits first.
    pub reserve_pre_authorization_slot: bool,
}

impl ComposeRequest {
    pub fn new(source: AccountId, operations: Vec<Operation>, description: impl Into<String>) -> Self {
        Self {
            source,
            operations,
            memo: Memo::None,
            description: description.into(),
            reserve_pre_authorization_slot: false,
        }
    }

    pub fn with_memo(mut self, memo: Memo) -> Self {
        self.memo = memo;
        self
    }

    pub fn reserve_pre_authorization_slot(mut self, reserve: bool) -> Self {
        self.reserve_pre_authorization_slot = reserve;
        self
    }
}

fn slots_for(snapshot: &AccountSnapshot) -> Vec<SignatureSlot> {
    snapshot
        .signers
        .iter()
        .map(|signer| SignatureSlot::unsigned(signer.key.clone(), signer.weight))
        .collect()
}

pub struct TransactionComposer {
    network_id: [u8; 32],
    base_fee: u32,
    timeout_secs: u64,
    fees: FeeInjector,
    ledger: Arc<dyn LedgerClient>,
    store: Arc<dyn TransactionStore>,
}

impl TransactionComposer {
    pub fn new(
        config: &EngineConfig,
        ledger: Arc<dyn LedgerClient>,
        store: Arc<dyn TransactionStore>,
    ) -> Self {
        Self {
            network_id: network_id(&config.network_passphrase),
            base_fee: config.base_fee,
            timeout_secs: config.transaction_timeout_secs,
            fees: FeeInjector::new(config.fees.clone()),
            ledger,
            store,
        }
    }

    pub fn fees(&self) -> &FeeInjector {
        &self.fees
    }

    /// Validates, injects fees, and assembles the final operation list and
    /// memo. Pure: no ledger or store access.
    pub fn prepare(&self, request: &ComposeRequest) -> Result<(Vec<Operation>, Memo), CompositionError> {
        if request.operations.is_empty() {
            return Err(CompositionError::NoOperations);
        }
        for op in &request.operations {
            op.validate()?;
        }

        let mut operations = request.operations.clone();
        let mut memo = request.memo.clone();
        for op in &request.operations {
            if let Some(fee) = self.fees.fee_for(op, &request.source)? {
                if memo.is_none() {
                    memo = fee.memo;
                }
                operations.push(fee.operation);
            }
        }

        if operations.len() > MAX_OPERATIONS_PER_TRANSACTION {
            return Err(CompositionError::TooManyOperations {
                count: operations.len(),
                max: MAX_OPERATIONS_PER_TRANSACTION,
            });
        }
        Ok((operations, memo))
    }

    pub async fn compose(&self, request: ComposeRequest) -> AuthorizationResult<PendingTransaction> {
        let (operations, memo) = self.prepare(&request)?;
        debug!(
            source = %request.source,
            operations = operations.len(),
            reserve = request.reserve_pre_authorization_slot,
            "composing transaction"
        );

        let source_snapshot = self.ledger.load_account(&request.source).await?;
        let mut sequence = source_snapshot.sequence + 1;
        if request.reserve_pre_authorization_slot {
            sequence += 1;
        }

        // One live snapshot per distinct foreign account.
        let mut foreign: HashMap<AccountId, AccountSnapshot> = HashMap::new();
        for op in &operations {
            let account = op.effective_source(&request.source);
            if account != &request.source && !foreign.contains_key(account) {
                let snapshot = self.ledger.load_account(account).await?;
                foreign.insert(account.clone(), snapshot);
            }
        }

        let pending_ops = operations
            .iter()
            .map(|op| {
                let account = op.effective_source(&request.source).clone();
                let is_primary_source = account == request.source;
                let signatures = if is_primary_source {
                    Vec::new()
                } else {
                    foreign.get(&account).map(slots_for).unwrap_or_default()
                };
                PendingOperation {
                    op_type: op.op_type(),
                    source_account: account,
                    threshold_category: classify(&op.body),
                    is_primary_source,
                    needs_independent_quorum: !is_primary_source,
                    signatures,
                }
            })
            .collect();

        let envelope = EnvelopeBuilder::new(request.source.clone(), sequence)
            .base_fee(self.base_fee)
            .timeout(self.timeout_secs)
            .memo(memo)
            .operations(operations)
            .build();
        let hash = envelope.hash_hex(&self.network_id);

        let tx = PendingTransaction::new(
            envelope,
            hash,
            request.description,
            slots_for(&source_snapshot),
            pending_ops,
        );
        self.store.create(&tx)?;

        info!(
            id = tx.id(),
            hash = tx.hash(),
            source = %tx.source_account(),
            category = %tx.threshold_category(),
            foreign = tx.has_foreign_source_operation(),
            "transaction composed"
        );
        Ok(tx)
    }
}
