// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod hashing;
pub mod keygen;
pub mod simulate;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use ethers::types::Address;

use crate::config::{PreconfConfig, CHAIN_ID_ENV, PRECONF_CONTRACT_ENV};

/// mev-commit preconfirmation CLI
#[derive(Parser, Debug)]
#[command(name = "preconf-cli")]
#[command(version = "0.1.0")]
#[command(about = "Tools for the mev-commit confidential bid protocol", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate identity, ECIES and NIKE keys
    Keygen(keygen::KeygenArgs),

    /// Compute the hash a bidder signs for a bid
    BidHash(hashing::BidHashArgs),

    /// Compute the hash a provider signs for a commitment
    CommitmentHash(hashing::CommitmentHashArgs),

    /// Run bidders and providers against each other in memory
    Simulate(simulate::SimulateArgs),
}

/// Chain and contract the hashes are bound to
#[derive(Args, Debug, Clone)]
pub struct DomainArgs {
    /// Chain ID (defaults to the devnet, 31337)
    #[arg(long, env = CHAIN_ID_ENV)]
    pub chain_id: Option<u64>,

    /// Preconf manager contract address
    #[arg(long, env = PRECONF_CONTRACT_ENV)]
    pub preconf_contract: Option<Address>,
}

impl DomainArgs {
    /// Environment config with command-line overrides applied
    pub fn resolve(&self) -> Result<PreconfConfig> {
        let mut config = PreconfConfig::from_env()?;
        if let Some(chain_id) = self.chain_id {
            config.chain_id = chain_id;
        }
        if let Some(contract) = self.preconf_contract {
            config.preconf_contract = contract;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Keygen(args) => keygen::run(args).await,
        Commands::BidHash(args) => hashing::bid_hash(args),
        Commands::CommitmentHash(args) => hashing::commitment_hash(args),
        Commands::Simulate(args) => simulate::run(args).await,
    }
}
