// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Confidential Bids and Commitments
//!
//! ## Protocol Flow
//!
//! 1. Bidder generates an ephemeral NIKE keypair and puts the public half in the bid
//! 2. Bidder hashes and signs the bid, then encrypts it with its symmetric key
//! 3. Provider decrypts with the key it received through the key exchange
//! 4. Provider verifies the bid and derives `own_nike_sk · bidder_pk_e`
//! 5. Provider signs a commitment over the bid digest, bid signature and shared point
//! 6. Bidder derives `sk_e · provider_nike_pk`, rebuilds the commitment hash
//!    and recovers the provider's address

pub mod bidder;
pub mod hash;
pub mod provider;
pub mod types;

pub use bidder::{verify_bid, BidEncryptor, VerifiedCommitment};
pub use hash::{compute_domain_separator, parse_bid_amount, HashDomain};
pub use provider::{BidState, CommitmentEncryptor};
pub use types::{Bid, EncryptedBid, EncryptedPreConfirmation, PreConfirmation};

pub const PROTOCOL_NAME: &str = "preconfirmation";
pub const PROTOCOL_VERSION: &str = "3.0.0";
