// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ECIES Key Bootstrap on P-256
//!
//! Used only to ship a bidder's symmetric key to providers. Each encryption
//! uses a fresh ephemeral P-256 key:
//!
//! 1. `shared = ECDH(ephemeral_sk, recipient_pk)`
//! 2. `key = HKDF-SHA256(salt = ephemeral_pk, ikm = shared, info = "mev-commit ecies")`
//! 3. `body = AES-256-GCM(key, plaintext)` (nonce prefixed)
//!
//! **Wire Format**:
//! ```text
//! [ephemeral public key (33 bytes, SEC1 compressed) | nonce (12) | ciphertext+tag]
//! ```

use hkdf::Hkdf;
use p256::ecdh::EphemeralSecret;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use sha2::Sha256;

use super::aes_gcm::{decrypt_aes_gcm, encrypt_aes_gcm, NONCE_LEN, TAG_LEN};
use crate::error::{PreconfError, Result};

/// Length of a compressed P-256 public key
pub const ECIES_PUBLIC_KEY_LEN: usize = 33;

const HKDF_INFO: &[u8] = b"mev-commit ecies";

/// Long-term ECIES keypair of a provider
#[derive(Clone)]
pub struct EciesKeypair {
    secret: SecretKey,
}

impl EciesKeypair {
    /// Generate a fresh keypair
    pub fn generate() -> Self {
        Self {
            secret: SecretKey::random(&mut OsRng),
        }
    }

    /// Restore from a 32-byte big-endian scalar
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let secret = SecretKey::from_slice(bytes)
            .map_err(|e| PreconfError::invalid_key("ecies", e))?;
        Ok(Self { secret })
    }

    /// 32-byte big-endian scalar
    pub fn to_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.secret.to_bytes());
        out
    }

    /// 33-byte SEC1 compressed public key
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.secret
            .public_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec()
    }

    /// Decrypt a message produced by [`encrypt_ecies`]
    ///
    /// # Errors
    ///
    /// `DecryptionFailed` on truncated input, an invalid ephemeral point or
    /// an authentication failure (message not addressed to this key).
    pub fn decrypt(&self, encrypted: &[u8]) -> Result<Vec<u8>> {
        if encrypted.len() < ECIES_PUBLIC_KEY_LEN + NONCE_LEN + TAG_LEN {
            return Err(PreconfError::decryption(
                "ecies",
                format!("message too short: {} bytes", encrypted.len()),
            ));
        }

        let (eph_bytes, body) = encrypted.split_at(ECIES_PUBLIC_KEY_LEN);
        let eph_pub = PublicKey::from_sec1_bytes(eph_bytes)
            .map_err(|_| PreconfError::decryption("ecies", "invalid ephemeral public key"))?;

        let shared = p256::ecdh::diffie_hellman(self.secret.to_nonzero_scalar(), eph_pub.as_affine());
        let key = derive_key(eph_bytes, shared.raw_secret_bytes())?;

        decrypt_aes_gcm(&key, body).map_err(|_| PreconfError::decryption("ecies", "authentication failed"))
    }
}

impl std::fmt::Debug for EciesKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EciesKeypair")
            .field("public_key", &hex::encode(self.public_key_bytes()))
            .finish_non_exhaustive()
    }
}

/// Encrypt `plaintext` to the holder of `recipient_public_key`
///
/// # Arguments
///
/// * `recipient_public_key` - SEC1 encoded P-256 point (compressed or uncompressed)
/// * `plaintext` - Bytes to encrypt, typically a 32-byte AES key
///
/// # Errors
///
/// `InvalidKey` if the recipient key is not a valid P-256 point.
pub fn encrypt_ecies(recipient_public_key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let recipient = PublicKey::from_sec1_bytes(recipient_public_key)
        .map_err(|e| PreconfError::invalid_key("ecies public key", e))?;

    let ephemeral = EphemeralSecret::random(&mut OsRng);
    let eph_point = ephemeral.public_key().to_encoded_point(true);
    let eph_bytes = eph_point.as_bytes();

    let shared = ephemeral.diffie_hellman(&recipient);
    let key = derive_key(eph_bytes, shared.raw_secret_bytes())?;
    let body = encrypt_aes_gcm(&key, plaintext)?;

    let mut out = Vec::with_capacity(eph_bytes.len() + body.len());
    out.extend_from_slice(eph_bytes);
    out.extend_from_slice(&body);
    Ok(out)
}

fn derive_key(salt: &[u8], shared_secret: &[u8]) -> Result<[u8; 32]> {
    let hk = Hkdf::<Sha256>::new(Some(salt), shared_secret);
    let mut key = [0u8; 32];
    hk.expand(HKDF_INFO, &mut key)
        .map_err(|e| PreconfError::decryption("ecies", format!("HKDF expand failed: {}", e)))?;
    Ok(key)
}
