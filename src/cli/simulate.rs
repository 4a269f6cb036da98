// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::Args;
use ethers::types::Address;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::DomainArgs;
use crate::crypto::signer::{KeySigner, PrivateKeySigner};
use crate::keyexchange::KeyExchange;
use crate::keystore::KeyStore;
use crate::p2p::{Keys, MemoryNetwork, Peer, PeerTable, PeerType};
use crate::preconf::{Bid, BidEncryptor, CommitmentEncryptor, HashDomain};

/// Arguments for simulate command
#[derive(Args, Debug)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub domain: DomainArgs,

    /// Number of providers
    #[arg(long, default_value_t = 3)]
    pub providers: usize,

    /// Bids to send to each provider
    #[arg(long, default_value_t = 1)]
    pub bids: usize,

    /// Bid amount in wei
    #[arg(long, default_value = "1000000000")]
    pub amount: String,

    /// Target block
    #[arg(long, default_value_t = 1)]
    pub block_number: i64,
}

/// Outcome of one simulated run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationReport {
    pub bidder: Address,
    pub providers: Vec<Address>,
    /// (provider, bid digest) for every verified commitment
    pub commitments: Vec<(Address, Vec<u8>)>,
}

struct SimulatedProvider {
    peer: Peer,
    store: KeyStore,
}

async fn spawn_provider(
    network: &Arc<MemoryNetwork>,
    domain: &HashDomain,
    timeout: Duration,
    freshness_window: Duration,
) -> Result<SimulatedProvider> {
    let signer = Arc::new(PrivateKeySigner::random());
    let store = KeyStore::in_memory();
    let keys = store.get_or_create_provider_keys().await?;

    let peer = Peer::new(signer.address(), PeerType::Provider).with_keys(Keys {
        pke_public_key: keys.pke_public_key(),
        nike_public_key: keys.nike_public_key().to_bytes().to_vec(),
    });

    let exchange = KeyExchange::new(
        Arc::new(PeerTable::new()),
        Arc::new(network.streamer(peer.clone())),
        signer.clone(),
        store.clone(),
    )
    .with_timeout(timeout)
    .with_freshness_window(freshness_window);
    network.register(peer.eth_address, &KeyExchange::stream_desc(), Arc::new(exchange));

    let committer = CommitmentEncryptor::new(signer, store.clone(), domain.clone())
        .await?
        .with_stream_timeout(timeout);
    network.register(
        peer.eth_address,
        &CommitmentEncryptor::stream_desc(),
        Arc::new(committer),
    );

    Ok(SimulatedProvider { peer, store })
}

/// Key exchange followed by bids, all over an in-memory network
pub async fn simulate(
    domain: HashDomain,
    provider_count: usize,
    bids_per_provider: usize,
    amount: &str,
    block_number: i64,
    timeout: Duration,
    freshness_window: Duration,
) -> Result<SimulationReport> {
    let network = MemoryNetwork::new();
    let topology = Arc::new(PeerTable::new());

    let mut providers = Vec::with_capacity(provider_count);
    for _ in 0..provider_count {
        let provider = spawn_provider(&network, &domain, timeout, freshness_window).await?;
        topology.add_peer(provider.peer.clone());
        providers.push(provider);
    }

    let signer = Arc::new(PrivateKeySigner::random());
    let bidder = Peer::new(signer.address(), PeerType::Bidder);
    let streamer = Arc::new(network.streamer(bidder.clone()));
    let bidder_store = KeyStore::in_memory();
    info!("Simulating bidder {:?} against {} providers", bidder.eth_address, provider_count);

    // 1. Key exchange
    let exchange = KeyExchange::new(
        topology,
        streamer.clone(),
        signer.clone(),
        bidder_store.clone(),
    )
    .with_timeout(timeout)
    .with_freshness_window(freshness_window);
    exchange.send_symmetric_key().await?;

    for result in network.wait_idle().await {
        result?;
    }
    for provider in &providers {
        if provider.store.get_aes_key(bidder.eth_address).await?.is_none() {
            return Err(anyhow!(
                "provider {:?} did not store the bidder key",
                provider.peer.eth_address
            ));
        }
    }

    // 2. Bids
    let encryptor = BidEncryptor::new(signer, bidder_store, domain);
    let now_ms = Utc::now().timestamp_millis();
    let mut commitments = Vec::new();
    for provider in &providers {
        for i in 0..bids_per_provider {
            let bid = Bid::new(
                format!("0x{}", hex::encode(rand::random::<[u8; 32]>())),
                amount,
                block_number,
                now_ms,
                now_ms + 12_000 + i as i64,
            );
            let (bid, commitment) = encryptor
                .send_bid(streamer.as_ref(), &provider.peer, bid, timeout)
                .await?;
            commitments.push((commitment.provider, bid.digest));
        }
    }

    for result in network.wait_idle().await {
        result?;
    }

    Ok(SimulationReport {
        bidder: bidder.eth_address,
        providers: providers.iter().map(|p| p.peer.eth_address).collect(),
        commitments,
    })
}

pub async fn run(args: SimulateArgs) -> Result<()> {
    let config = args.domain.resolve()?;

    println!(
        "🧪 Simulating {} providers, {} bid(s) each, on chain {}",
        args.providers, args.bids, config.chain_id
    );
    let report = simulate(
        config.hash_domain(),
        args.providers,
        args.bids,
        &args.amount,
        args.block_number,
        config.key_exchange_timeout(),
        config.freshness_window(),
    )
    .await?;

    println!("\n📋 Simulation Results:");
    println!("  Bidder:      {:?}", report.bidder);
    for provider in &report.providers {
        println!("  Provider:    {:?}", provider);
    }
    for (provider, digest) in &report.commitments {
        println!("  ✅ {:?} committed to 0x{}", provider, hex::encode(digest));
    }
    Ok(())
}
