// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Protocol Configuration
//!
//! Loaded from `MEV_COMMIT_*` environment variables (a `.env` file is read
//! first when present) or from a TOML file:
//!
//! ```toml
//! chain_id = 31337
//! preconf_contract = "0xA4AD4f68d0b91CFD19687c881e50f3A00242828c"
//! key_exchange_timeout_secs = 10
//! freshness_window_secs = 60
//! keystore_path = "/var/lib/mev-commit/keys.json"
//! ```
//!
//! Missing fields fall back to [`PreconfConfig::devnet`].

use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::error::{PreconfError, Result};
use crate::keystore::KeyStore;
use crate::preconf::HashDomain;

pub const CHAIN_ID_ENV: &str = "MEV_COMMIT_CHAIN_ID";
pub const PRECONF_CONTRACT_ENV: &str = "MEV_COMMIT_PRECONF_CONTRACT";
pub const KEY_EXCHANGE_TIMEOUT_ENV: &str = "MEV_COMMIT_KEY_EXCHANGE_TIMEOUT_SECS";
pub const FRESHNESS_WINDOW_ENV: &str = "MEV_COMMIT_FRESHNESS_WINDOW_SECS";
pub const KEYSTORE_PATH_ENV: &str = "MEV_COMMIT_KEYSTORE_PATH";

/// Local devnet preconf manager contract
pub const DEVNET_PRECONF_CONTRACT: [u8; 20] = [
    0xa4, 0xad, 0x4f, 0x68, 0xd0, 0xb9, 0x1c, 0xfd, 0x19, 0x68, 0x7c, 0x88, 0x1e, 0x50, 0xf3,
    0xa0, 0x02, 0x42, 0x82, 0x8c,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreconfConfig {
    pub chain_id: u64,
    pub preconf_contract: Address,
    pub key_exchange_timeout_secs: u64,
    pub freshness_window_secs: u64,
    /// In-memory key store when unset
    pub keystore_path: Option<PathBuf>,
}

impl Default for PreconfConfig {
    fn default() -> Self {
        Self::devnet()
    }
}

impl PreconfConfig {
    pub fn devnet() -> Self {
        Self {
            chain_id: 31337,
            preconf_contract: Address::from(DEVNET_PRECONF_CONTRACT),
            key_exchange_timeout_secs: 10,
            freshness_window_secs: 60,
            keystore_path: None,
        }
    }

    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup` on top of the devnet defaults
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::devnet();

        if let Some(val) = lookup(CHAIN_ID_ENV) {
            config.chain_id = parse_var(CHAIN_ID_ENV, &val)?;
        }
        if let Some(val) = lookup(PRECONF_CONTRACT_ENV) {
            config.preconf_contract = parse_var(PRECONF_CONTRACT_ENV, &val)?;
        }
        if let Some(val) = lookup(KEY_EXCHANGE_TIMEOUT_ENV) {
            config.key_exchange_timeout_secs = parse_var(KEY_EXCHANGE_TIMEOUT_ENV, &val)?;
        }
        if let Some(val) = lookup(FRESHNESS_WINDOW_ENV) {
            config.freshness_window_secs = parse_var(FRESHNESS_WINDOW_ENV, &val)?;
        }
        if let Some(val) = lookup(KEYSTORE_PATH_ENV) {
            if !val.trim().is_empty() {
                config.keystore_path = Some(PathBuf::from(val.trim()));
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| PreconfError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| PreconfError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chain_id == 0 {
            return Err(PreconfError::Config("chain_id must be non-zero".to_string()));
        }
        if self.preconf_contract.is_zero() {
            return Err(PreconfError::Config(
                "preconf_contract must be set".to_string(),
            ));
        }
        if self.key_exchange_timeout_secs == 0 {
            return Err(PreconfError::Config(
                "key_exchange_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn hash_domain(&self) -> HashDomain {
        HashDomain::new(self.chain_id, self.preconf_contract)
    }

    pub fn key_exchange_timeout(&self) -> Duration {
        Duration::from_secs(self.key_exchange_timeout_secs)
    }

    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.freshness_window_secs)
    }

    /// File-backed store at `keystore_path`, or a fresh in-memory one
    pub fn open_keystore(&self) -> Result<KeyStore> {
        match &self.keystore_path {
            Some(path) => {
                info!("Opening key store at {}", path.display());
                KeyStore::open_file(path)
            }
            None => Ok(KeyStore::in_memory()),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| PreconfError::Config(format!("invalid value for {}: {:?}", name, value)))
}
