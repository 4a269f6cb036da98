// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Non-Interactive Key Exchange on BN254 G1
//!
//! A bidder attaches an ephemeral public key `pk_e = sk_e·G` to every bid.
//! The provider answers with `sk_p·pk_e`, which equals `sk_e·pk_p`, so the
//! bidder can later reconstruct the same shared point from the provider's
//! long-term public key. Only the G1 group law is used, no pairings.
//!
//! ## Encoding
//!
//! ```text
//! [X (32 bytes, big-endian) | Y (32 bytes, big-endian)]
//! ```
//!
//! The identity point encodes as 64 zero bytes and is never accepted by
//! [`NikePublicKey::from_bytes`]. Secret keys are 32-byte big-endian scalars.

use ark_bn254::{Fq, Fr, G1Affine};
use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::{BigInteger, PrimeField, UniformRand};
use rand::rngs::OsRng;

use crate::error::{PreconfError, Result};

/// Length of an encoded G1 point
pub const NIKE_PUBLIC_KEY_LEN: usize = 64;

/// Length of an encoded scalar
pub const NIKE_SECRET_KEY_LEN: usize = 32;

/// Scalar in the BN254 scalar field
#[derive(Clone, PartialEq, Eq)]
pub struct NikeSecretKey(Fr);

/// Point on BN254 G1
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NikePublicKey(G1Affine);

impl NikeSecretKey {
    /// Sample a uniformly random scalar
    pub fn generate() -> Self {
        Self(Fr::rand(&mut OsRng))
    }

    /// Decode a 32-byte big-endian scalar (reduced modulo the group order)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != NIKE_SECRET_KEY_LEN {
            return Err(PreconfError::invalid_key(
                "nike secret key",
                format!("expected {} bytes, got {}", NIKE_SECRET_KEY_LEN, bytes.len()),
            ));
        }
        Ok(Self(Fr::from_be_bytes_mod_order(bytes)))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.0.into_bigint().to_bytes_be());
        out
    }

    /// `sk·G`
    pub fn public_key(&self) -> NikePublicKey {
        NikePublicKey((G1Affine::generator() * self.0).into_affine())
    }

    /// `sk·pk`, the shared point both sides of the exchange arrive at
    pub fn shared_secret(&self, public_key: &NikePublicKey) -> NikePublicKey {
        NikePublicKey((public_key.0 * self.0).into_affine())
    }
}

impl std::fmt::Debug for NikeSecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("NikeSecretKey(..)")
    }
}

impl NikePublicKey {
    /// The generator `(1, 2)`
    pub fn generator() -> Self {
        Self(G1Affine::generator())
    }

    /// Decode `X || Y`
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if:
    /// - Input is not 64 bytes
    /// - A coordinate is not a canonical base-field element
    /// - The point is the identity
    /// - The point is not on the curve
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != NIKE_PUBLIC_KEY_LEN {
            return Err(PreconfError::invalid_key(
                "nike public key",
                format!("expected {} bytes, got {}", NIKE_PUBLIC_KEY_LEN, bytes.len()),
            ));
        }

        if bytes.iter().all(|b| *b == 0) {
            return Err(PreconfError::invalid_key("nike public key", "identity point"));
        }

        let x = decode_coordinate(&bytes[..32])?;
        let y = decode_coordinate(&bytes[32..])?;

        let point = G1Affine::new_unchecked(x, y);
        if !point.is_on_curve() {
            return Err(PreconfError::invalid_key("nike public key", "point not on curve"));
        }
        if !point.is_in_correct_subgroup_assuming_on_curve() {
            return Err(PreconfError::invalid_key("nike public key", "point not in G1"));
        }

        Ok(Self(point))
    }

    pub fn to_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        if self.0.is_zero() {
            return out;
        }
        out[..32].copy_from_slice(&self.0.x.into_bigint().to_bytes_be());
        out[32..].copy_from_slice(&self.0.y.into_bigint().to_bytes_be());
        out
    }

    pub fn is_identity(&self) -> bool {
        self.0.is_zero()
    }
}

fn decode_coordinate(bytes: &[u8]) -> Result<Fq> {
    let value = Fq::from_be_bytes_mod_order(bytes);
    // Reject values >= p, which would silently reduce.
    if value.into_bigint().to_bytes_be() != bytes {
        return Err(PreconfError::invalid_key(
            "nike public key",
            "coordinate is not a canonical field element",
        ));
    }
    Ok(value)
}

/// Derive `sk·pk` from encoded inputs
pub fn derive_shared_secret(secret_key: &NikeSecretKey, public_key: &[u8]) -> Result<[u8; 64]> {
    let pk = NikePublicKey::from_bytes(public_key)?;
    Ok(secret_key.shared_secret(&pk).to_bytes())
}
