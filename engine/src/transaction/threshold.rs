//! Threshold classification.
//!
//! Maps each operation to the signer-weight category the ledger will
//! demand from its source account. The transaction's category is the
//! strictest category among its operations.

use super::operation::{Operation, OperationBody};
use super::types::ThresholdCategory;

/// The category an operation requires.
///
/// `setOptions` is High only when it changes signers, the master weight,
/// or any threshold. A field explicitly set to zero still counts as set.
pub fn classify(body: &OperationBody) -> ThresholdCategory {
    match body {
        OperationBody::SetOptions(op) if op.changes_authorization() => ThresholdCategory::High,
        OperationBody::AccountMerge(_) => ThresholdCategory::High,
        OperationBody::BumpSequence(_) => ThresholdCategory::Low,
        OperationBody::AllowTrust(_) => ThresholdCategory::Low,
        OperationBody::SetOptions(_)
        | OperationBody::CreateAccount(_)
        | OperationBody::Payment(_)
        | OperationBody::ChangeTrust(_)
        | OperationBody::ManageOffer(_) => ThresholdCategory::Medium,
    }
}

/// Category of a whole transaction.
pub fn classify_transaction(operations: &[Operation]) -> ThresholdCategory {
    ThresholdCategory::max_of(operations.iter().map(|op| classify(&op.body)))
}
