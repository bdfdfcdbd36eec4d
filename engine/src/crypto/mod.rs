//! # Cryptographic Primitives
//!
//! Thin wrappers over `ed25519-dalek` and `sha2`. Nothing here is clever on
//! purpose.

pub mod hash;
pub mod keys;

pub use hash::{network_id, sha256, sha256_multi};
pub use keys::{AccountId, KeyError, LedgerKeypair};
