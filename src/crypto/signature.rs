// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ECDSA Signing and Verification
//!
//! 65-byte `r || s || v` signatures over 32-byte prehashes, as checked by
//! the on-chain verifier. Signatures leave this module with `v` in 27/28;
//! verification accepts either 0/1 or 27/28.

use ethers::types::Address;
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;

use super::keccak256;
use super::signer::KeySigner;
use crate::error::{PreconfError, Result};

/// Length of an `r || s || v` signature
pub const SIGNATURE_LEN: usize = 65;

/// Derive the Ethereum address of a public key
///
/// `keccak256(uncompressed_point[1..])[12..]`
pub fn address_from_verifying_key(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    // Skip the 0x04 prefix byte
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

/// Sign `hash` and move `v` into the 27/28 range
pub fn sign(signer: &dyn KeySigner, hash: &[u8; 32]) -> Result<Vec<u8>> {
    let mut sig = signer.sign_hash(hash)?;
    if sig[64] == 0 || sig[64] == 1 {
        sig[64] += 27;
    }
    Ok(sig.to_vec())
}

/// Check that `digest` is the locally recomputed `hash` and recover its signer
///
/// # Errors
///
/// - `InvalidHash` if `hash != digest`
/// - `InvalidSignature` if the signature is malformed, high-S, not
///   recoverable, or does not verify under the recovered key
pub fn verify(hash: &[u8; 32], digest: &[u8], signature: &[u8]) -> Result<Address> {
    if hash.as_slice() != digest {
        return Err(PreconfError::InvalidHash);
    }

    let (address, _) = recover_signer(hash, signature)?;
    Ok(address)
}

/// Recover the address and public key that produced `signature` over `hash`
pub fn recover_signer(hash: &[u8], signature: &[u8]) -> Result<(Address, VerifyingKey)> {
    // 1. Validate sizes
    if hash.len() != 32 {
        return Err(PreconfError::InvalidHash);
    }
    if signature.len() != SIGNATURE_LEN {
        return Err(PreconfError::invalid_signature(format!(
            "expected {} bytes, got {}",
            SIGNATURE_LEN,
            signature.len()
        )));
    }

    // 2. Normalize v back to 0/1
    let mut v = signature[64];
    if v == 27 || v == 28 {
        v -= 27;
    }
    let recovery_id = RecoveryId::from_byte(v)
        .ok_or_else(|| PreconfError::invalid_signature(format!("invalid recovery id {}", v)))?;

    // 3. Parse r || s and reject malleable high-S values
    let sig = Signature::from_slice(&signature[..64])?;
    if sig.normalize_s().is_some() {
        return Err(PreconfError::invalid_signature("high-S signature"));
    }

    // 4. Recover and re-verify
    let key = VerifyingKey::recover_from_prehash(hash, &sig, recovery_id)
        .map_err(|e| PreconfError::invalid_signature(format!("recovery failed: {}", e)))?;
    key.verify_prehash(hash, &sig)
        .map_err(|e| PreconfError::invalid_signature(format!("verification failed: {}", e)))?;

    Ok((address_from_verifying_key(&key), key))
}
