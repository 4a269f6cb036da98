// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Confidential bid commitments for mev-commit preconfirmations.
//!
//! Bidders share a symmetric key with providers through [`keyexchange`],
//! send AES-GCM encrypted, signed bids, and receive commitments bound to a
//! BN254 NIKE shared secret ([`preconf`]).
pub mod cli;
pub mod config;
pub mod crypto;
pub mod error;
pub mod keyexchange;
pub mod keystore;
pub mod p2p;
pub mod preconf;

pub use config::PreconfConfig;
pub use error::{PreconfError, Result};
pub use keyexchange::KeyExchange;
pub use keystore::KeyStore;
pub use preconf::{Bid, BidEncryptor, CommitmentEncryptor, HashDomain};
