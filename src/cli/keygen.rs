// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use crate::config::{PreconfConfig, KEYSTORE_PATH_ENV};
use crate::crypto::ecies::EciesKeypair;
use crate::crypto::nike::NikeSecretKey;
use crate::crypto::signer::{KeySigner, PrivateKeySigner};
use crate::keystore::KeyStore;

/// Arguments for keygen command
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Also write the ECIES and NIKE keys into this key file
    #[arg(long, env = KEYSTORE_PATH_ENV)]
    pub keystore: Option<PathBuf>,
}

/// Freshly generated key material, hex-encoded
#[derive(Debug, Serialize)]
pub struct GeneratedKeys {
    pub address: String,
    pub private_key: String,
    pub ecies_private_key: String,
    pub ecies_public_key: String,
    pub nike_private_key: String,
    pub nike_public_key: String,
}

/// Provider key pair plus a new identity
pub struct KeyMaterial {
    pub identity: PrivateKeySigner,
    pub ecies: EciesKeypair,
    pub nike: NikeSecretKey,
}

impl KeyMaterial {
    pub fn generate() -> Self {
        Self {
            identity: PrivateKeySigner::random(),
            ecies: EciesKeypair::generate(),
            nike: NikeSecretKey::generate(),
        }
    }

    pub fn encode(&self) -> GeneratedKeys {
        GeneratedKeys {
            address: format!("{:?}", self.identity.address()),
            private_key: format!("0x{}", hex::encode(self.identity.to_bytes())),
            ecies_private_key: hex::encode(self.ecies.to_bytes()),
            ecies_public_key: hex::encode(self.ecies.public_key_bytes()),
            nike_private_key: hex::encode(self.nike.to_bytes()),
            nike_public_key: hex::encode(self.nike.public_key().to_bytes()),
        }
    }

    /// Replace the node keys held in `store`
    ///
    /// The identity key is never written; it lives in `MEV_COMMIT_PRIVATE_KEY`.
    pub async fn persist(&self, store: &KeyStore) -> Result<()> {
        store.set_ecies_keypair(&self.ecies).await?;
        store.set_nike_secret_key(&self.nike).await?;
        Ok(())
    }
}

pub async fn run(args: KeygenArgs) -> Result<()> {
    let material = KeyMaterial::generate();
    let keys = material.encode();

    if let Some(path) = &args.keystore {
        let config = PreconfConfig {
            keystore_path: Some(path.clone()),
            ..PreconfConfig::devnet()
        };
        material.persist(&config.open_keystore()?).await?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&keys)?);
        return Ok(());
    }

    println!("🔑 Generated keys (store the private halves securely):");
    println!("  Address:           {}", keys.address);
    println!("  Private Key:       {}", keys.private_key);
    println!("  ECIES Private Key: {}", keys.ecies_private_key);
    println!("  ECIES Public Key:  {}", keys.ecies_public_key);
    println!("  NIKE Private Key:  {}", keys.nike_private_key);
    println!("  NIKE Public Key:   {}", keys.nike_public_key);
    if let Some(path) = &args.keystore {
        println!("  💾 ECIES and NIKE keys written to {}", path.display());
    }
    Ok(())
}
