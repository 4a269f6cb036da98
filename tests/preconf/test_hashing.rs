// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Bid and Commitment Hash Tests
//!
//! Pinned vectors for the devnet domain (chain 31337, preconf contract
//! 0xA4AD4f68d0b91CFD19687c881e50f3A00242828c) and tamper sensitivity of
//! signed bids.

use std::sync::Arc;

use mev_commit_preconf::crypto::nike::NikePublicKey;
use mev_commit_preconf::crypto::signer::PrivateKeySigner;
use mev_commit_preconf::crypto::KeySigner;
use mev_commit_preconf::preconf::verify_bid;
use mev_commit_preconf::{Bid, BidEncryptor, KeyStore, PreconfConfig, PreconfError};

fn kartik_bid() -> Bid {
    let mut bid = Bid::new("0xkartik", "2", 2, 10, 20).with_reverting_tx_hashes("0xkartik");
    bid.nike_public_key = NikePublicKey::generator().to_bytes().to_vec();
    bid
}

#[test]
fn test_devnet_bid_hash() {
    let domain = PreconfConfig::devnet().hash_domain();
    let hash = domain.bid_hash(&kartik_bid()).unwrap();
    assert_eq!(
        hex::encode(hash),
        "520eacb6555b9bfb82c1b0f04b5969c0b4cb277a030f62aa6cab3f7dec011b75"
    );
}

#[test]
fn test_devnet_commitment_hash() {
    let domain = PreconfConfig::devnet().hash_domain();
    let digest = domain.bid_hash(&kartik_bid()).unwrap();
    let signature = hex::decode(
        "5cd1f790192a0ab79661c48f39e77937a6de537ccf6b428682583d13d30294cb\
         113cea12822f821c064c9db918667bf74490535b35b4ef4f28f5d67b133ec22e1b",
    )
    .unwrap();

    let hash = domain
        .pre_confirmation_hash(&digest, &signature, &NikePublicKey::generator().to_bytes())
        .unwrap();
    assert_eq!(
        hex::encode(hash),
        "231927c8650e00e98ac0d0e01f9b88deb5ca4ee2658841905ff7e6bcb541d83f"
    );
}

#[test]
fn test_bid_hash_covers_every_field() {
    let domain = PreconfConfig::devnet().hash_domain();
    let base = domain.bid_hash(&kartik_bid()).unwrap();

    let mut variants = vec![
        Bid { tx_hash: "0xother".into(), ..kartik_bid() },
        Bid { reverting_tx_hashes: String::new(), ..kartik_bid() },
        Bid { bid_amount: "3".into(), ..kartik_bid() },
        Bid { block_number: 3, ..kartik_bid() },
        Bid { decay_start_timestamp: 11, ..kartik_bid() },
        Bid { decay_end_timestamp: 21, ..kartik_bid() },
    ];
    let mut other_key = kartik_bid();
    other_key.nike_public_key = NikePublicKey::generator().to_bytes().to_vec();
    other_key.nike_public_key[63] = 3;
    variants.push(other_key);

    for bid in variants {
        assert_ne!(domain.bid_hash(&bid).unwrap(), base, "{:?}", bid);
    }
}

#[test]
fn test_signature_is_not_part_of_bid_hash() {
    let domain = PreconfConfig::devnet().hash_domain();
    let mut signed = kartik_bid();
    signed.digest = vec![1u8; 32];
    signed.signature = vec![2u8; 65];
    assert_eq!(
        domain.bid_hash(&signed).unwrap(),
        domain.bid_hash(&kartik_bid()).unwrap()
    );
}

#[tokio::test]
async fn test_tampered_bid_is_invalid_hash() {
    let config = PreconfConfig::devnet();
    let signer = Arc::new(PrivateKeySigner::random());
    let store = KeyStore::in_memory();
    store.get_or_create_aes_key(signer.address()).await.unwrap();
    let encryptor = BidEncryptor::new(signer, store, config.hash_domain());

    let (bid, _, _) = encryptor
        .construct_encrypted_bid(Bid::new("0xabc", "1000", 100, 1_000, 2_000))
        .await
        .unwrap();
    assert!(verify_bid(&config.hash_domain(), &bid).is_ok());

    let tampered = [
        Bid { bid_amount: "1001".into(), ..bid.clone() },
        Bid { block_number: 101, ..bid.clone() },
        Bid { decay_start_timestamp: 999, ..bid.clone() },
        Bid { decay_end_timestamp: 2_001, ..bid.clone() },
    ];
    for bid in tampered {
        assert_eq!(
            verify_bid(&config.hash_domain(), &bid),
            Err(PreconfError::InvalidHash)
        );
    }
}

#[tokio::test]
async fn test_bid_from_other_chain_is_rejected() {
    let devnet = PreconfConfig::devnet();
    let mainnet = PreconfConfig {
        chain_id: 1,
        ..PreconfConfig::devnet()
    };

    let signer = Arc::new(PrivateKeySigner::random());
    let store = KeyStore::in_memory();
    store.get_or_create_aes_key(signer.address()).await.unwrap();
    let encryptor = BidEncryptor::new(signer, store, devnet.hash_domain());

    let (bid, _, _) = encryptor
        .construct_encrypted_bid(Bid::new("0xabc", "1", 1, 0, 12_000))
        .await
        .unwrap();
    assert_eq!(
        verify_bid(&mainnet.hash_domain(), &bid),
        Err(PreconfError::InvalidHash)
    );
}
