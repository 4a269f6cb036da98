// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Preconfirmation Error Types
//!
//! One error type for every failure of the confidential bid commitment
//! protocol. Each failure is terminal for the single bid or key-exchange
//! bundle being processed and is returned to the caller; nothing in this
//! crate retries.
//!
//! ## Error Kinds
//!
//! - **MissingRequiredFields**: bid without tx hash, amount or block number
//! - **InvalidAmount**: bid amount is not a base-10 non-negative integer
//! - **MissingHashSignature**: digest or signature absent where required
//! - **InvalidHash**: recomputed hash does not match the carried digest
//! - **InvalidSignature**: ECDSA recovery or verification failed
//! - **AddressMismatch**: observed signer differs from the claimed peer
//! - **NoAesKeyFound** / **NoMatchingKey**: decryption key unavailable
//! - **DecryptionFailed**: AEAD tag mismatch, truncated or malformed input
//! - **StaleTimestamp**: key-exchange freshness window exceeded
//! - **InvalidPeerType**: a peer of the wrong role sent a message
//!
//! ## Usage Example
//!
//! ```rust
//! use mev_commit_preconf::PreconfError;
//!
//! fn decrypt(ciphertext: &[u8]) -> Result<Vec<u8>, PreconfError> {
//!     Err(PreconfError::DecryptionFailed {
//!         operation: "bid".to_string(),
//!         reason: format!("{} bytes is too short", ciphertext.len()),
//!     })
//! }
//! ```

use ethers::types::Address;
use std::time::Duration;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, PreconfError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreconfError {
    #[error("missing required fields: tx hash, bid amount and block number must be set")]
    MissingRequiredFields,

    #[error("invalid bid amount {amount:?}: expected a base-10 non-negative integer")]
    InvalidAmount { amount: String },

    #[error("missing hash or signature")]
    MissingHashSignature,

    #[error("hash doesn't match payload")]
    InvalidHash,

    #[error("invalid signature: {reason}")]
    InvalidSignature { reason: String },

    #[error("signature verification failed: {reason}")]
    SignatureVerificationFailed { reason: String },

    #[error("address mismatch: expected {expected:?}, observed {observed:?}")]
    AddressMismatch { expected: Address, observed: Address },

    #[error("no AES key found for bidder {bidder:?}")]
    NoAesKeyFound { bidder: Address },

    #[error("none of the {tried} encrypted keys could be decrypted")]
    NoMatchingKey { tried: usize },

    #[error("decryption failed during {operation}: {reason}")]
    DecryptionFailed { operation: String, reason: String },

    #[error("stale timestamp: message is {age:?} old, window is {window:?}")]
    StaleTimestamp { age: Duration, window: Duration },

    #[error("invalid peer type: expected {expected}, got {actual}")]
    InvalidPeerType { expected: String, actual: String },

    #[error("invalid key ({key_type}): {reason}")]
    InvalidKey { key_type: String, reason: String },

    #[error("invalid payload field '{field}': {reason}")]
    InvalidPayload { field: String, reason: String },

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("stream error with {peer:?}: {reason}")]
    Stream { peer: Address, reason: String },

    #[error("no providers available")]
    NoProvidersAvailable,

    #[error("failed to distribute to {} of {total} providers: {}", .failures.len(), .failures.join("; "))]
    DistributionFailed { failures: Vec<String>, total: usize },

    #[error("configuration error: {0}")]
    Config(String),
}

impl PreconfError {
    pub(crate) fn decryption(operation: &str, reason: impl ToString) -> Self {
        PreconfError::DecryptionFailed {
            operation: operation.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid_key(key_type: &str, reason: impl ToString) -> Self {
        PreconfError::InvalidKey {
            key_type: key_type.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid_signature(reason: impl ToString) -> Self {
        PreconfError::InvalidSignature {
            reason: reason.to_string(),
        }
    }
}

impl From<hex::FromHexError> for PreconfError {
    fn from(err: hex::FromHexError) -> Self {
        PreconfError::InvalidPayload {
            field: "hex_field".to_string(),
            reason: format!("hex decode error: {}", err),
        }
    }
}

impl From<bincode::Error> for PreconfError {
    fn from(err: bincode::Error) -> Self {
        PreconfError::Serialization(err.to_string())
    }
}

impl From<k256::ecdsa::Error> for PreconfError {
    fn from(err: k256::ecdsa::Error) -> Self {
        PreconfError::invalid_signature(format!("k256 error: {}", err))
    }
}

impl From<std::io::Error> for PreconfError {
    fn from(err: std::io::Error) -> Self {
        PreconfError::Storage(err.to_string())
    }
}
