// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Node Identity Signer
//!
//! A node's identity is an Ethereum (secp256k1) private key. The
//! [`KeySigner`] trait is the seam between protocol code and wherever that
//! key lives; [`PrivateKeySigner`] keeps it in memory.
//!
//! ## Security Considerations
//!
//! - The key is read from `MEV_COMMIT_PRIVATE_KEY` (0x-prefixed hex)
//! - Key material is NEVER logged; `Debug` prints only the address

use ethers::types::Address;
use k256::ecdsa::SigningKey;
use rand::rngs::OsRng;
use std::env;
use tracing::info;

use super::signature::address_from_verifying_key;
use crate::error::{PreconfError, Result};

/// Environment variable holding the identity key
pub const PRIVATE_KEY_ENV: &str = "MEV_COMMIT_PRIVATE_KEY";

/// Signs 32-byte hashes on behalf of an Ethereum address
pub trait KeySigner: Send + Sync {
    /// Address derived from the signing key
    fn address(&self) -> Address;

    /// Sign a 32-byte prehash
    ///
    /// Returns `r || s || v` with `v` as the raw recovery id (0 or 1).
    fn sign_hash(&self, hash: &[u8; 32]) -> Result<[u8; 65]>;
}

/// In-memory secp256k1 key
#[derive(Clone)]
pub struct PrivateKeySigner {
    signing_key: SigningKey,
    address: Address,
}

impl PrivateKeySigner {
    /// Generate a fresh random identity
    pub fn random() -> Self {
        Self::from_signing_key(SigningKey::random(&mut OsRng))
    }

    /// Load a raw 32-byte private key
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let signing_key = SigningKey::from_slice(bytes)
            .map_err(|e| PreconfError::invalid_key("secp256k1", e))?;
        Ok(Self::from_signing_key(signing_key))
    }

    /// Load a hex private key, with or without the `0x` prefix
    pub fn from_hex(key: &str) -> Result<Self> {
        let key = key.trim();
        let key = key.strip_prefix("0x").unwrap_or(key);
        if key.len() != 64 {
            return Err(PreconfError::invalid_key(
                "secp256k1",
                format!("expected 64 hex characters, got {}", key.len()),
            ));
        }
        let bytes = hex::decode(key)?;
        Self::from_bytes(&bytes)
    }

    /// Load the key from `MEV_COMMIT_PRIVATE_KEY`
    ///
    /// # Errors
    ///
    /// - Environment variable not set or empty
    /// - Key is not valid hex or not 32 bytes
    pub fn from_env() -> Result<Self> {
        let key = env::var(PRIVATE_KEY_ENV).map_err(|_| {
            PreconfError::Config(format!("{} environment variable not set", PRIVATE_KEY_ENV))
        })?;
        if key.trim().is_empty() {
            return Err(PreconfError::Config(format!("{} is empty", PRIVATE_KEY_ENV)));
        }

        let signer = Self::from_hex(&key)?;
        info!("🔑 Identity key loaded for {:?}", signer.address);
        Ok(signer)
    }

    /// Raw 32-byte private key, for export by the keygen command
    pub fn to_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.signing_key.to_bytes());
        out
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = address_from_verifying_key(signing_key.verifying_key());
        Self {
            signing_key,
            address,
        }
    }
}

impl KeySigner for PrivateKeySigner {
    fn address(&self) -> Address {
        self.address
    }

    fn sign_hash(&self, hash: &[u8; 32]) -> Result<[u8; 65]> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(hash)
            .map_err(|e| PreconfError::invalid_signature(format!("signing failed: {}", e)))?;

        let mut sig_bytes = [0u8; 65];
        sig_bytes[..64].copy_from_slice(&signature.to_bytes());
        sig_bytes[64] = recovery_id.to_byte();
        Ok(sig_bytes)
    }
}

impl std::fmt::Debug for PrivateKeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKeySigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
