// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Bid Round Trip Tests
//!
//! Bidder encrypts and signs, provider decrypts and commits, bidder checks
//! the commitment. Run both directly and over the in-memory network.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use ethers::types::Address;
use mev_commit_preconf::crypto::signer::{KeySigner, PrivateKeySigner};
use mev_commit_preconf::p2p::{
    stream_pair, Keys, MemoryNetwork, MemoryStream, Peer, PeerType, Stream, StreamDesc,
    StreamHandler, Streamer,
};
use mev_commit_preconf::preconf::EncryptedPreConfirmation;
use mev_commit_preconf::{
    Bid, BidEncryptor, CommitmentEncryptor, HashDomain, KeyStore, PreconfConfig, PreconfError,
};

/// Dials that never connect
struct StalledStreamer;

#[async_trait]
impl Streamer for StalledStreamer {
    async fn new_stream(
        &self,
        _peer: &Peer,
        _desc: &StreamDesc,
    ) -> mev_commit_preconf::Result<Box<dyn Stream>> {
        futures::future::pending().await
    }
}

/// Connects, reads nothing, answers nothing
#[derive(Default)]
struct SilentStreamer {
    held: Mutex<Vec<MemoryStream>>,
}

#[async_trait]
impl Streamer for SilentStreamer {
    async fn new_stream(
        &self,
        peer: &Peer,
        _desc: &StreamDesc,
    ) -> mev_commit_preconf::Result<Box<dyn Stream>> {
        let (local, remote) = stream_pair(Address::zero(), peer.eth_address);
        self.held.lock().unwrap().push(remote);
        Ok(Box::new(local))
    }
}

struct Setup {
    domain: HashDomain,
    bidder: BidEncryptor,
    bidder_address: Address,
    shared_key: [u8; 32],
    provider: CommitmentEncryptor,
    provider_store: KeyStore,
}

/// Bidder and provider that already share a symmetric key
async fn setup() -> Setup {
    let domain = PreconfConfig::devnet().hash_domain();

    let bidder_signer = Arc::new(PrivateKeySigner::random());
    let bidder_store = KeyStore::in_memory();
    let key = bidder_store
        .get_or_create_aes_key(bidder_signer.address())
        .await
        .unwrap();

    let provider_store = KeyStore::in_memory();
    provider_store
        .set_aes_key(bidder_signer.address(), &key)
        .await
        .unwrap();

    let provider = CommitmentEncryptor::new(
        Arc::new(PrivateKeySigner::random()),
        provider_store.clone(),
        domain.clone(),
    )
    .await
    .unwrap();

    Setup {
        bidder_address: bidder_signer.address(),
        bidder: BidEncryptor::new(bidder_signer, bidder_store, domain.clone()),
        domain,
        shared_key: key,
        provider,
        provider_store,
    }
}

#[tokio::test]
async fn test_full_round_trip() {
    let s = setup().await;

    let (bid, encrypted, nike_secret) = s
        .bidder
        .construct_encrypted_bid(Bid::new("0xdeadbeef", "1000000", 42, 1_700_000_000_000, 1_700_000_012_000))
        .await
        .unwrap();
    assert_eq!(s.domain.bid_hash(&bid).unwrap().to_vec(), bid.digest);

    let (pre_confirmation, commitment) = s
        .provider
        .process_encrypted_bid(s.bidder_address, &encrypted)
        .await
        .unwrap();
    assert_eq!(pre_confirmation.bid, bid);
    assert_eq!(pre_confirmation.provider_address, s.provider.address());
    assert_eq!(pre_confirmation.digest, commitment.commitment);

    let (shared_secret, provider) = s
        .bidder
        .verify_encrypted_pre_confirmation(
            &bid,
            &s.provider.nike_public_key().to_bytes(),
            &nike_secret,
            &commitment,
        )
        .unwrap();
    assert_eq!(provider, s.provider.address());
    assert_eq!(shared_secret, pre_confirmation.shared_secret);
    assert_eq!(shared_secret.len(), 64);
}

#[tokio::test]
async fn test_decrypted_bid_matches_signed_bid() {
    let s = setup().await;
    let (bid, encrypted, _) = s
        .bidder
        .construct_encrypted_bid(
            Bid::new("0x01,0x02", "5", 9, 0, 12_000).with_reverting_tx_hashes("0x02"),
        )
        .await
        .unwrap();

    let decrypted = s.provider.decrypt_bid(s.bidder_address, &encrypted).await.unwrap();
    assert_eq!(decrypted, bid);
    assert_eq!(s.provider.verify_bid(&decrypted).unwrap(), s.bidder_address);

    let (originator, _) = s.provider.bid_originator(&decrypted).unwrap();
    assert_eq!(originator, s.bidder_address);
}

#[tokio::test]
async fn test_bid_relayed_by_other_peer_is_rejected() {
    let s = setup().await;
    let (_, encrypted, _) = s
        .bidder
        .construct_encrypted_bid(Bid::new("0xabc", "1", 1, 0, 12_000))
        .await
        .unwrap();

    // A relayer holding the same symmetric key under its own address
    let relayer = Address::from([9u8; 20]);
    s.provider_store.set_aes_key(relayer, &s.shared_key).await.unwrap();

    let err = s
        .provider
        .process_encrypted_bid(relayer, &encrypted)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        PreconfError::AddressMismatch {
            expected: relayer,
            observed: s.bidder_address,
        }
    );
}

#[tokio::test]
async fn test_commitment_for_other_bid_fails() {
    let s = setup().await;
    let (bid_a, enc_a, sk_a) = s
        .bidder
        .construct_encrypted_bid(Bid::new("0xa", "1", 1, 0, 12_000))
        .await
        .unwrap();
    let (bid_b, enc_b, _) = s
        .bidder
        .construct_encrypted_bid(Bid::new("0xb", "1", 1, 0, 12_000))
        .await
        .unwrap();
    assert_ne!(bid_a.nike_public_key, bid_b.nike_public_key);

    let (_, commit_a) = s.provider.process_encrypted_bid(s.bidder_address, &enc_a).await.unwrap();
    let (_, commit_b) = s.provider.process_encrypted_bid(s.bidder_address, &enc_b).await.unwrap();

    let provider_pk = s.provider.nike_public_key().to_bytes();
    assert!(s
        .bidder
        .verify_encrypted_pre_confirmation(&bid_a, &provider_pk, &sk_a, &commit_a)
        .is_ok());
    assert_eq!(
        s.bidder
            .verify_encrypted_pre_confirmation(&bid_a, &provider_pk, &sk_a, &commit_b),
        Err(PreconfError::InvalidHash)
    );
}

#[tokio::test]
async fn test_forged_commitment_signature() {
    let s = setup().await;
    let (bid, encrypted, sk) = s
        .bidder
        .construct_encrypted_bid(Bid::new("0xabc", "1", 1, 0, 12_000))
        .await
        .unwrap();
    let (_, commitment) = s.provider.process_encrypted_bid(s.bidder_address, &encrypted).await.unwrap();

    let mut forged = commitment.clone();
    forged.signature[10] ^= 0xff;

    let result = s.bidder.verify_encrypted_pre_confirmation(
        &bid,
        &s.provider.nike_public_key().to_bytes(),
        &sk,
        &forged,
    );
    match result {
        Ok((_, signer)) => assert_ne!(signer, s.provider.address()),
        Err(e) => assert!(matches!(e, PreconfError::InvalidSignature { .. })),
    }
}

#[tokio::test]
async fn test_wrong_symmetric_key() {
    let s = setup().await;
    let (_, encrypted, _) = s
        .bidder
        .construct_encrypted_bid(Bid::new("0xabc", "1", 1, 0, 12_000))
        .await
        .unwrap();

    s.provider_store
        .set_aes_key(s.bidder_address, &[0u8; 32])
        .await
        .unwrap();
    assert!(matches!(
        s.provider.decrypt_bid(s.bidder_address, &encrypted).await,
        Err(PreconfError::DecryptionFailed { .. })
    ));
}

#[tokio::test]
async fn test_send_bid_over_memory_network() {
    let domain = PreconfConfig::devnet().hash_domain();
    let network = MemoryNetwork::new();

    let bidder_signer = Arc::new(PrivateKeySigner::random());
    let bidder_store = KeyStore::in_memory();
    let key = bidder_store
        .get_or_create_aes_key(bidder_signer.address())
        .await
        .unwrap();

    let provider_signer = Arc::new(PrivateKeySigner::random());
    let provider_store = KeyStore::in_memory();
    provider_store.set_aes_key(bidder_signer.address(), &key).await.unwrap();
    let provider_keys = provider_store.get_or_create_provider_keys().await.unwrap();
    let committer = CommitmentEncryptor::new(provider_signer.clone(), provider_store, domain.clone())
        .await
        .unwrap();
    network.register(
        provider_signer.address(),
        &CommitmentEncryptor::stream_desc(),
        Arc::new(committer),
    );

    let provider_peer = Peer::new(provider_signer.address(), PeerType::Provider).with_keys(Keys {
        pke_public_key: provider_keys.pke_public_key(),
        nike_public_key: provider_keys.nike_public_key().to_bytes().to_vec(),
    });
    let streamer = network.streamer(Peer::new(bidder_signer.address(), PeerType::Bidder));
    let encryptor = BidEncryptor::new(bidder_signer, bidder_store, domain);

    let (bid, verified) = encryptor
        .send_bid(&streamer, &provider_peer, Bid::new("0xabc", "77", 12, 0, 12_000), Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(verified.provider, provider_signer.address());
    assert_eq!(verified.shared_secret.len(), 64);
    assert!(bid.is_signed());
    assert!(network.wait_idle().await.iter().all(|r| r.is_ok()));
}

#[tokio::test]
async fn test_provider_refuses_non_bidder_stream() {
    let domain = PreconfConfig::devnet().hash_domain();
    let network = MemoryNetwork::new();

    let provider_signer = Arc::new(PrivateKeySigner::random());
    let committer = CommitmentEncryptor::new(provider_signer.clone(), KeyStore::in_memory(), domain)
        .await
        .unwrap();
    network.register(
        provider_signer.address(),
        &CommitmentEncryptor::stream_desc(),
        Arc::new(committer),
    );

    let other_provider = Peer::new(Address::from([5u8; 20]), PeerType::Provider);
    let streamer = network.streamer(other_provider);
    let target = Peer::new(provider_signer.address(), PeerType::Provider);

    let mut stream = streamer
        .new_stream(&target, &CommitmentEncryptor::stream_desc())
        .await
        .unwrap();
    let reply: Result<EncryptedPreConfirmation, _> =
        mev_commit_preconf::p2p::read_message(stream.as_mut()).await;
    assert!(reply.is_err());

    let results = network.wait_idle().await;
    assert!(matches!(
        results.as_slice(),
        [Err(PreconfError::InvalidPeerType { .. })]
    ));
}

async fn keyed_provider_peer(s: &Setup) -> Peer {
    let keys = s.provider_store.get_or_create_provider_keys().await.unwrap();
    Peer::new(s.provider.address(), PeerType::Provider).with_keys(Keys {
        pke_public_key: keys.pke_public_key(),
        nike_public_key: s.provider.nike_public_key().to_bytes().to_vec(),
    })
}

fn assert_deadline_exceeded(err: PreconfError, expected_peer: Address) {
    match err {
        PreconfError::Stream { peer, reason } => {
            assert_eq!(peer, expected_peer);
            assert_eq!(reason, "deadline exceeded");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_send_bid_gives_up_on_stalled_dial() {
    let s = setup().await;
    let provider = keyed_provider_peer(&s).await;

    let started = Instant::now();
    let err = s
        .bidder
        .send_bid(
            &StalledStreamer,
            &provider,
            Bid::new("0xabc", "77", 12, 0, 12_000),
            Duration::from_millis(200),
        )
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_deadline_exceeded(err, provider.eth_address);
}

#[tokio::test]
async fn test_send_bid_gives_up_on_silent_provider() {
    let s = setup().await;
    let provider = keyed_provider_peer(&s).await;
    let streamer = SilentStreamer::default();

    let started = Instant::now();
    let err = s
        .bidder
        .send_bid(
            &streamer,
            &provider,
            Bid::new("0xabc", "77", 12, 0, 12_000),
            Duration::from_millis(200),
        )
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_deadline_exceeded(err, provider.eth_address);

    // The bid went out; only the reply was missing
    let mut remote = streamer.held.lock().unwrap().pop().unwrap();
    let sent: mev_commit_preconf::preconf::EncryptedBid =
        mev_commit_preconf::p2p::read_message(&mut remote).await.unwrap();
    assert!(!sent.ciphertext.is_empty());
}

#[tokio::test]
async fn test_provider_drops_stream_without_bid() {
    let s = setup().await;
    let provider = s.provider.with_stream_timeout(Duration::from_millis(200));

    // Bidder end stays open but never writes
    let (_bidder_end, provider_end) = stream_pair(s.bidder_address, provider.address());
    let bidder = Peer::new(s.bidder_address, PeerType::Bidder);

    let started = Instant::now();
    let err = provider
        .handle_stream(bidder, Box::new(provider_end))
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_deadline_exceeded(err, s.bidder_address);
}
