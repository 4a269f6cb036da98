// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! AES-256-GCM Payload Encryption
//!
//! Symmetric encryption for bids and key-exchange freshness messages.
//!
//! **Encryption Format**:
//! ```text
//! [nonce (12 bytes) | ciphertext+tag (variable length)]
//! ```
//!
//! - Nonce: 12 random bytes, fresh per encryption
//! - Ciphertext+Tag: Encrypted data + 16-byte authentication tag
//! - No Additional Authenticated Data (AAD)

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::{rngs::OsRng, RngCore};

use crate::error::{PreconfError, Result};

/// Nonce length prepended to every ciphertext
pub const NONCE_LEN: usize = 12;

/// GCM authentication tag length
pub const TAG_LEN: usize = 16;

/// Generate a fresh random 32-byte AES-256 key
pub fn generate_aes_key() -> [u8; 32] {
    let mut key = [0u8; 32];
    OsRng.fill_bytes(&mut key);
    key
}

/// Encrypt `plaintext` under a 32-byte key
///
/// # Returns
///
/// `nonce (12 bytes) || ciphertext+tag`
///
/// # Errors
///
/// Returns `DecryptionFailed` with operation `"encrypt"` only if the cipher
/// rejects the input, which AES-GCM does for messages beyond its length limit.
pub fn encrypt_aes_gcm(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);

    let cipher = Aes256Gcm::new(key.into());
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext,
                aad: b"",
            },
        )
        .map_err(|e| PreconfError::decryption("encrypt", e))?;

    let mut encrypted = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    encrypted.extend_from_slice(&nonce_bytes);
    encrypted.extend_from_slice(&ciphertext);
    Ok(encrypted)
}

/// Decrypt data produced by [`encrypt_aes_gcm`]
///
/// # Arguments
///
/// * `key` - 32-byte (256-bit) AES key
/// * `encrypted` - Encrypted data (nonce + ciphertext+tag)
///
/// # Errors
///
/// Returns `DecryptionFailed` if:
/// - Encrypted data is shorter than nonce plus tag
/// - Authentication tag verification fails (wrong key or tampered data)
pub fn decrypt_aes_gcm(key: &[u8; 32], encrypted: &[u8]) -> Result<Vec<u8>> {
    // 1. Validate input size
    if encrypted.len() < NONCE_LEN + TAG_LEN {
        return Err(PreconfError::decryption(
            "decrypt",
            format!(
                "ciphertext too short: expected at least {} bytes, got {}",
                NONCE_LEN + TAG_LEN,
                encrypted.len()
            ),
        ));
    }

    // 2. Split nonce and ciphertext+tag
    let (nonce_bytes, ciphertext) = encrypted.split_at(NONCE_LEN);

    // 3. Decrypt and verify authentication tag
    let cipher = Aes256Gcm::new(key.into());
    cipher
        .decrypt(
            Nonce::from_slice(nonce_bytes),
            Payload {
                msg: ciphertext,
                aad: b"",
            },
        )
        .map_err(|_| {
            PreconfError::decryption(
                "decrypt",
                "authentication failed (wrong key or corrupted data)",
            )
        })
}
