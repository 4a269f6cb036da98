// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ECDSA Signature Tests
//!
//! Signatures must be interchangeable with what Ethereum tooling produces
//! and recovers.

use ethers::types::{Address, RecoveryMessage, Signature as EthSignature, H256};
use mev_commit_preconf::crypto::signature::{recover_signer, sign, verify, SIGNATURE_LEN};
use mev_commit_preconf::crypto::signer::{KeySigner, PrivateKeySigner};
use mev_commit_preconf::crypto::keccak256;
use mev_commit_preconf::PreconfError;

const ANVIL_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const ANVIL_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

#[test]
fn test_known_key_address() {
    let signer = PrivateKeySigner::from_hex(ANVIL_KEY).unwrap();
    assert_eq!(signer.address(), ANVIL_ADDRESS.parse::<Address>().unwrap());
}

#[test]
fn test_ethers_recovers_our_signature() {
    let signer = PrivateKeySigner::from_hex(ANVIL_KEY).unwrap();
    let hash = keccak256(b"mev-commit");
    let sig = sign(&signer, &hash).unwrap();
    assert_eq!(sig.len(), SIGNATURE_LEN);

    let eth_sig = EthSignature::try_from(sig.as_slice()).unwrap();
    let recovered = eth_sig
        .recover(RecoveryMessage::Hash(H256::from(hash)))
        .unwrap();
    assert_eq!(recovered, signer.address());
}

#[test]
fn test_signing_is_deterministic() {
    // RFC 6979 nonces
    let signer = PrivateKeySigner::from_hex(ANVIL_KEY).unwrap();
    let hash = keccak256(b"same hash");
    assert_eq!(sign(&signer, &hash).unwrap(), sign(&signer, &hash).unwrap());
}

#[test]
fn test_verify_against_wrong_hash() {
    let signer = PrivateKeySigner::random();
    let hash = keccak256(b"signed");
    let sig = sign(&signer, &hash).unwrap();

    // Digest and hash agree but the signature covers something else
    let other = keccak256(b"not signed");
    let recovered = verify(&other, &other, &sig);
    match recovered {
        Ok(address) => assert_ne!(address, signer.address()),
        Err(e) => assert!(matches!(e, PreconfError::InvalidSignature { .. })),
    }
}

#[test]
fn test_recover_rejects_short_hash() {
    let signer = PrivateKeySigner::random();
    let hash = keccak256(b"x");
    let sig = sign(&signer, &hash).unwrap();
    assert_eq!(
        recover_signer(&hash[..31], &sig).unwrap_err(),
        PreconfError::InvalidHash
    );
}

#[test]
fn test_v_offsets_are_equivalent() {
    let signer = PrivateKeySigner::random();
    let hash = keccak256(b"v");
    let mut sig = sign(&signer, &hash).unwrap();

    let (with_offset, _) = recover_signer(&hash, &sig).unwrap();
    sig[64] -= 27;
    let (raw, _) = recover_signer(&hash, &sig).unwrap();
    assert_eq!(with_offset, raw);
}

#[test]
fn test_from_hex_rejects_bad_keys() {
    assert!(PrivateKeySigner::from_hex("0x1234").is_err());
    assert!(PrivateKeySigner::from_hex(&"zz".repeat(32)).is_err());
    // Zero is not a valid scalar
    assert!(PrivateKeySigner::from_hex(&"00".repeat(32)).is_err());
}
