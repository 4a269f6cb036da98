// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Tests for ECIES on P-256, used to hand AES keys to providers

use mev_commit_preconf::crypto::aes_gcm::generate_aes_key;
use mev_commit_preconf::crypto::ecies::{encrypt_ecies, EciesKeypair, ECIES_PUBLIC_KEY_LEN};
use mev_commit_preconf::PreconfError;
use p256::elliptic_curve::sec1::ToEncodedPoint;

#[test]
fn test_encrypt_aes_key_to_provider() {
    let provider = EciesKeypair::generate();
    let aes_key = generate_aes_key();

    let encrypted = encrypt_ecies(&provider.public_key_bytes(), &aes_key).unwrap();
    assert_eq!(provider.decrypt(&encrypted).unwrap(), aes_key.to_vec());
}

#[test]
fn test_only_recipient_can_decrypt() {
    let alice = EciesKeypair::generate();
    let bob = EciesKeypair::generate();

    let encrypted = encrypt_ecies(&alice.public_key_bytes(), b"for alice").unwrap();
    assert!(matches!(
        bob.decrypt(&encrypted),
        Err(PreconfError::DecryptionFailed { .. })
    ));
}

#[test]
fn test_accepts_uncompressed_recipient_key() {
    let provider = EciesKeypair::generate();
    let secret = p256::SecretKey::from_slice(&provider.to_bytes()).unwrap();
    let uncompressed = secret.public_key().to_encoded_point(false);

    let encrypted = encrypt_ecies(uncompressed.as_bytes(), b"hello").unwrap();
    assert_eq!(provider.decrypt(&encrypted).unwrap(), b"hello");
}

#[test]
fn test_ephemeral_key_prefix() {
    let provider = EciesKeypair::generate();
    let a = encrypt_ecies(&provider.public_key_bytes(), b"x").unwrap();
    let b = encrypt_ecies(&provider.public_key_bytes(), b"x").unwrap();

    // Fresh ephemeral key per message
    assert_ne!(a[..ECIES_PUBLIC_KEY_LEN], b[..ECIES_PUBLIC_KEY_LEN]);
    assert!(a[0] == 0x02 || a[0] == 0x03);
}

#[test]
fn test_invalid_recipient_key() {
    for bad in [vec![], vec![0x02; 10], vec![0x05; 33]] {
        assert!(matches!(
            encrypt_ecies(&bad, b"x"),
            Err(PreconfError::InvalidKey { .. })
        ));
    }
}

#[test]
fn test_keypair_restores_from_bytes() {
    let original = EciesKeypair::generate();
    let restored = EciesKeypair::from_bytes(&original.to_bytes()).unwrap();
    assert_eq!(original.public_key_bytes(), restored.public_key_bytes());

    let encrypted = encrypt_ecies(&original.public_key_bytes(), b"persisted").unwrap();
    assert_eq!(restored.decrypt(&encrypted).unwrap(), b"persisted");
}
