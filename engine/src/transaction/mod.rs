//! # Transaction Module
//!
//! The ledger-facing vocabulary: typed operations, envelopes, signing, and
//! the two pure policies that run during composition (threshold
//! classification and fee injection).
//!
//! ## Architecture
//!
//! ```text
//! types.rs     : Value types (Amount, Price, Asset, Memo, SignerKey, ThresholdCategory)
//! operation.rs : Operation and its per-kind parameter structs
//! envelope.rs  : TransactionEnvelope, canonical bytes, hash, EnvelopeBuilder
//! signing.rs   : Appending Ed25519 signatures to an envelope
//! threshold.rs : Operation -> ThresholdCategory classification
//! fees.rs      : Fee table and the fee injector
//! offer.rs     : Sell/buy requests -> offer amount and price
//! error.rs     : CompositionError
//! ```
//!
//! ## Design Decisions
//!
//! - Amounts and prices are `i64` fixed-point with seven decimals. No
//!   floating point anywhere near monetary values.
//! - The envelope hash covers everything except signatures, so it is
//!   computed once at composition and stays valid through signing.
//! - Classification and fee rules are exhaustive matches over
//!   [`OperationBody`]; there is no "unknown operation" path.

pub mod envelope;
pub mod error;
pub mod fees;
pub mod offer;
pub mod operation;
pub mod signing;
pub mod threshold;
pub mod types;

pub use envelope::{EnvelopeBuilder, EnvelopeError, TransactionEnvelope};
pub use error::CompositionError;
pub use fees::{FeeInjector, FeeRate, FeeSchedule};
pub use operation::{Operation, OperationBody, OperationType};
pub use signing::sign_envelope;
pub use threshold::{classify, classify_transaction};
pub use types::{Amount, Asset, Memo, Price, SignerKey, ThresholdCategory};
