// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::Args;

use super::DomainArgs;
use crate::preconf::{Bid, HashDomain};

/// Arguments for bid-hash command
#[derive(Args, Debug)]
pub struct BidHashArgs {
    #[command(flatten)]
    pub domain: DomainArgs,

    /// Transaction hash (or comma-separated bundle)
    #[arg(long)]
    pub tx_hash: String,

    /// Comma-separated hashes allowed to revert
    #[arg(long, default_value = "")]
    pub reverting_tx_hashes: String,

    /// Bid amount in wei, base 10
    #[arg(long)]
    pub amount: String,

    #[arg(long)]
    pub block_number: i64,

    /// Decay start, unix milliseconds
    #[arg(long, default_value_t = 0)]
    pub decay_start: i64,

    /// Decay end, unix milliseconds
    #[arg(long, default_value_t = 0)]
    pub decay_end: i64,

    /// Bidder NIKE public key, 64 bytes hex
    #[arg(long)]
    pub nike_public_key: String,
}

/// Arguments for commitment-hash command
#[derive(Args, Debug)]
pub struct CommitmentHashArgs {
    #[command(flatten)]
    pub domain: DomainArgs,

    /// Bid hash, 32 bytes hex
    #[arg(long)]
    pub bid_hash: String,

    /// Bidder signature, hex
    #[arg(long)]
    pub signature: String,

    /// NIKE shared secret, 64 bytes hex
    #[arg(long)]
    pub shared_secret: String,
}

fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>> {
    hex::decode(value.trim_start_matches("0x")).with_context(|| format!("invalid hex in --{}", field))
}

pub fn compute_bid_hash(domain: &HashDomain, args: &BidHashArgs) -> Result<[u8; 32]> {
    let mut bid = Bid::new(
        args.tx_hash.clone(),
        args.amount.clone(),
        args.block_number,
        args.decay_start,
        args.decay_end,
    )
    .with_reverting_tx_hashes(args.reverting_tx_hashes.clone());
    bid.nike_public_key = decode_hex("nike-public-key", &args.nike_public_key)?;

    Ok(domain.bid_hash(&bid)?)
}

pub fn compute_commitment_hash(domain: &HashDomain, args: &CommitmentHashArgs) -> Result<[u8; 32]> {
    let bid_hash = decode_hex("bid-hash", &args.bid_hash)?;
    let signature = decode_hex("signature", &args.signature)?;
    let shared_secret = decode_hex("shared-secret", &args.shared_secret)?;

    Ok(domain.pre_confirmation_hash(&bid_hash, &signature, &shared_secret)?)
}

pub fn bid_hash(args: BidHashArgs) -> Result<()> {
    let domain = args.domain.resolve()?.hash_domain();
    let hash = compute_bid_hash(&domain, &args)?;
    println!("0x{}", hex::encode(hash));
    Ok(())
}

pub fn commitment_hash(args: CommitmentHashArgs) -> Result<()> {
    let domain = args.domain.resolve()?.hash_domain();
    let hash = compute_commitment_hash(&domain, &args)?;
    println!("0x{}", hex::encode(hash));
    Ok(())
}
