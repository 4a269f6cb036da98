// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Preconfirmation Wire Types
//!
//! Serialized with bincode. Byte fields left empty mean "not yet set":
//! a bid has no `digest`/`signature` until the bidder signs it.

use ethers::types::Address;
use serde::{Deserialize, Serialize};

/// A bid for inclusion of a transaction in a given block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub tx_hash: String,
    /// Comma-separated hashes allowed to revert
    pub reverting_tx_hashes: String,
    /// Base-10 integer amount in wei
    pub bid_amount: String,
    pub block_number: i64,
    /// Unix milliseconds
    pub decay_start_timestamp: i64,
    /// Unix milliseconds
    pub decay_end_timestamp: i64,
    /// Bidder's ephemeral NIKE public key, 64 bytes
    pub nike_public_key: Vec<u8>,
    pub digest: Vec<u8>,
    pub signature: Vec<u8>,
}

impl Bid {
    pub fn new(
        tx_hash: impl Into<String>,
        bid_amount: impl Into<String>,
        block_number: i64,
        decay_start_timestamp: i64,
        decay_end_timestamp: i64,
    ) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            bid_amount: bid_amount.into(),
            block_number,
            decay_start_timestamp,
            decay_end_timestamp,
            ..Default::default()
        }
    }

    pub fn with_reverting_tx_hashes(mut self, hashes: impl Into<String>) -> Self {
        self.reverting_tx_hashes = hashes.into();
        self
    }

    pub fn is_signed(&self) -> bool {
        !self.digest.is_empty() && !self.signature.is_empty()
    }
}

/// `nonce || AES-GCM(serialize(Bid))`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBid {
    pub ciphertext: Vec<u8>,
}

/// A provider's commitment to a bid, kept by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreConfirmation {
    pub bid: Bid,
    /// NIKE shared point, 64 bytes
    pub shared_secret: Vec<u8>,
    pub provider_address: Address,
    pub digest: Vec<u8>,
    pub signature: Vec<u8>,
    /// Unix nanoseconds at signing
    pub dispatch_timestamp: i64,
}

/// What the provider sends back to the bidder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPreConfirmation {
    pub commitment: Vec<u8>,
    pub signature: Vec<u8>,
    pub dispatch_timestamp: i64,
}
