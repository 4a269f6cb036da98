// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Cryptographic Primitives
//!
//! - **AES-GCM**: AES-256-GCM with a prefixed random nonce, for bids and
//!   freshness messages
//! - **ECIES**: P-256 ECDH + HKDF-SHA256 + AES-GCM, for shipping symmetric
//!   keys to providers
//! - **NIKE**: BN254 G1 scalar multiplication, for the bid/commitment
//!   shared secret
//! - **Signature**: secp256k1 ECDSA with Ethereum address recovery
//! - **Signer**: the node identity key
//!
//! ## Security Considerations
//!
//! - Secret keys never appear in logs or `Debug` output
//! - Nonces are drawn from the OS RNG per encryption
//! - High-S signatures are rejected

pub mod aes_gcm;
pub mod ecies;
pub mod nike;
pub mod signature;
pub mod signer;

use tiny_keccak::{Hasher, Keccak};

pub use aes_gcm::{decrypt_aes_gcm, encrypt_aes_gcm, generate_aes_key};
pub use ecies::{encrypt_ecies, EciesKeypair};
pub use nike::{derive_shared_secret, NikePublicKey, NikeSecretKey};
pub use signature::{address_from_verifying_key, recover_signer, sign, verify};
pub use signer::{KeySigner, PrivateKeySigner};

/// Keccak-256 of `data`
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut hash = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut hash);
    hash
}
