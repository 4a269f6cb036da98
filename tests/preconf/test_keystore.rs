// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Key Store Tests
//!
//! File-backed persistence of provider keys and bidder AES keys.

use ethers::types::Address;
use futures::future::join_all;
use tempfile::TempDir;

use mev_commit_preconf::keystore::{FileStorage, Storage};
use mev_commit_preconf::{KeyStore, PreconfConfig, PreconfError};

#[tokio::test]
async fn test_provider_keys_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("keys.json");

    let first = KeyStore::open_file(&path)
        .unwrap()
        .get_or_create_provider_keys()
        .await
        .unwrap();
    let second = KeyStore::open_file(&path)
        .unwrap()
        .get_or_create_provider_keys()
        .await
        .unwrap();

    assert_eq!(first.pke_public_key(), second.pke_public_key());
    assert_eq!(first.nike_public_key(), second.nike_public_key());
}

#[tokio::test]
async fn test_aes_keys_are_namespaced_per_bidder() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("keys.json");
    let store = KeyStore::open_file(&path).unwrap();

    let alice = Address::from([1u8; 20]);
    let bob = Address::from([2u8; 20]);
    store.set_aes_key(alice, &[0xaa; 32]).await.unwrap();
    store.set_aes_key(bob, &[0xbb; 32]).await.unwrap();

    let storage = FileStorage::open(&path).unwrap();
    assert_eq!(
        storage.get(&format!("aes/{:?}", alice)).unwrap(),
        Some(vec![0xaa; 32])
    );
    assert_eq!(
        storage.get(&format!("aes/{:?}", bob)).unwrap(),
        Some(vec![0xbb; 32])
    );
}

#[tokio::test]
async fn test_delete_and_rotate() {
    let store = KeyStore::in_memory();
    let bidder = Address::from([3u8; 20]);

    let original = store.get_or_create_aes_key(bidder).await.unwrap();
    let rotated = store.rotate_aes_key(bidder).await.unwrap();
    assert_ne!(original, rotated);
    assert_eq!(store.get_aes_key(bidder).await.unwrap(), Some(rotated));

    store.delete_aes_key(bidder).await.unwrap();
    assert_eq!(store.get_aes_key(bidder).await.unwrap(), None);
}

#[tokio::test]
async fn test_concurrent_first_use_agrees() {
    let dir = TempDir::new().unwrap();
    let store = KeyStore::open_file(dir.path().join("keys.json")).unwrap();
    let bidder = Address::from([4u8; 20]);

    let keys = join_all((0..16).map(|_| {
        let store = store.clone();
        tokio::spawn(async move { store.get_or_create_aes_key(bidder).await.unwrap() })
    }))
    .await;

    let first = keys[0].as_ref().unwrap();
    assert!(keys.iter().all(|k| k.as_ref().unwrap() == first));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_writers_all_reach_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("keys.json");
    let store = KeyStore::open_file(&path).unwrap();
    let bidders: Vec<Address> = (1..=32u8).map(|i| Address::from([i; 20])).collect();

    let written = join_all(bidders.iter().map(|&bidder| {
        let store = store.clone();
        tokio::spawn(async move { store.get_or_create_aes_key(bidder).await.unwrap() })
    }))
    .await;

    // Every rewrite saw the entries before it
    let reopened = KeyStore::open_file(&path).unwrap();
    for (bidder, key) in bidders.iter().zip(written) {
        assert_eq!(reopened.get_aes_key(*bidder).await.unwrap(), Some(key.unwrap()));
    }
}

#[tokio::test]
async fn test_corrupt_stored_key() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("keys.json");
    let bidder = Address::from([5u8; 20]);

    let mut storage = FileStorage::open(&path).unwrap();
    storage.put(&format!("aes/{:?}", bidder), &[1, 2, 3]).unwrap();

    let store = KeyStore::open_file(&path).unwrap();
    assert!(matches!(
        store.get_aes_key(bidder).await,
        Err(PreconfError::Storage(_))
    ));
}

#[tokio::test]
async fn test_config_opens_file_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state").join("keys.json");
    let config = PreconfConfig {
        keystore_path: Some(path.clone()),
        ..PreconfConfig::devnet()
    };

    let store = config.open_keystore().unwrap();
    store.get_or_create_provider_keys().await.unwrap();
    assert!(path.exists());
}
