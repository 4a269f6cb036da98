// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Key Exchange Messages
//!
//! **Bundle Format** (bincode):
//! ```text
//! EkmWithSignature {
//!     message:   bincode(EncryptedKeysMessage { encrypted_keys, timestamp_message }),
//!     signature: sign(keccak256(message)),   // 65 bytes, v in 27/28
//! }
//! ```
//!
//! `encrypted_keys[i]` is the bidder's AES key ECIES-encrypted to the i-th
//! provider. `timestamp_message` is the AES-GCM encryption of
//! `"mev-commit bidder <address> setup <unix seconds>"`.

use ethers::types::Address;
use ethers::utils::to_checksum;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{PreconfError, Result};

/// Default freshness window for the setup message
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedKeysMessage {
    pub encrypted_keys: Vec<Vec<u8>>,
    pub timestamp_message: Vec<u8>,
}

/// Signed key exchange bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EkmWithSignature {
    pub message: Vec<u8>,
    pub signature: Vec<u8>,
}

/// `"mev-commit bidder <checksummed address> setup <unix seconds>"`
pub fn format_timestamp_message(bidder: Address, unix_secs: i64) -> String {
    format!("mev-commit bidder {} setup {}", to_checksum(&bidder, None), unix_secs)
}

/// Split a setup message into bidder address and timestamp
pub fn parse_timestamp_message(message: &str) -> Result<(Address, i64)> {
    let invalid = |reason: &str| PreconfError::InvalidPayload {
        field: "timestamp_message".to_string(),
        reason: reason.to_string(),
    };

    let parts: Vec<&str> = message.split(' ').collect();
    match parts.as_slice() {
        ["mev-commit", "bidder", address, "setup", timestamp] => {
            let address: Address = address.parse().map_err(|_| invalid("bad bidder address"))?;
            let timestamp: i64 = timestamp.parse().map_err(|_| invalid("bad timestamp"))?;
            Ok((address, timestamp))
        }
        _ => Err(invalid("unexpected format")),
    }
}

/// Check a decrypted setup message against its authenticated sender
///
/// # Errors
///
/// - `InvalidPayload` if the message is malformed
/// - `AddressMismatch` if the embedded address is not `sender`
/// - `StaleTimestamp` if `now - timestamp > window`; exactly `window` is accepted
/// - `InvalidPayload` if the timestamp is more than `window` in the future
pub fn validate_timestamp_message(
    message: &str,
    sender: Address,
    now_unix: i64,
    window: Duration,
) -> Result<()> {
    let (bidder, timestamp) = parse_timestamp_message(message)?;
    if bidder != sender {
        return Err(PreconfError::AddressMismatch {
            expected: sender,
            observed: bidder,
        });
    }

    let window_secs = i64::try_from(window.as_secs()).unwrap_or(i64::MAX);
    let age = now_unix.saturating_sub(timestamp);
    if age < -window_secs {
        return Err(PreconfError::InvalidPayload {
            field: "timestamp_message".to_string(),
            reason: format!("timestamp is {}s in the future", age.unsigned_abs()),
        });
    }
    if age > window_secs {
        return Err(PreconfError::StaleTimestamp {
            age: Duration::from_secs(age as u64),
            window,
        });
    }
    Ok(())
}
