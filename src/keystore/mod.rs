// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Key Storage
//!
//! Holds the long-term keys of a node and the symmetric keys it shares
//! with counterparties:
//!
//! | Namespace        | Value                                     |
//! |------------------|-------------------------------------------|
//! | `aes/<address>`  | 32-byte AES key shared with that bidder   |
//! | `ecies/`         | 32-byte P-256 ECIES secret scalar         |
//! | `nike/`          | 32-byte BN254 NIKE secret scalar          |
//!
//! A bidder stores its own AES key under its own address; a provider
//! stores each bidder's key under that bidder's address.
//!
//! All access goes through a `tokio::sync::RwLock`: lookups share the lock,
//! mutations and lazy creation take it exclusively.

pub mod storage;

use ethers::types::Address;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::crypto::aes_gcm::generate_aes_key;
use crate::crypto::ecies::EciesKeypair;
use crate::crypto::nike::{NikePublicKey, NikeSecretKey};
use crate::error::{PreconfError, Result};

pub use storage::{FileStorage, MemoryStorage, Storage};

const AES_KEYS_NS: &str = "aes/";
const ECIES_PRIVATE_KEY_NS: &str = "ecies/";
const NIKE_PRIVATE_KEY_NS: &str = "nike/";

fn bidder_aes_key(bidder: Address) -> String {
    format!("{}{:?}", AES_KEYS_NS, bidder)
}

/// Long-term keys a provider advertises through the handshake
#[derive(Clone, Debug)]
pub struct ProviderKeys {
    pub ecies: EciesKeypair,
    pub nike: NikeSecretKey,
}

impl ProviderKeys {
    pub fn pke_public_key(&self) -> Vec<u8> {
        self.ecies.public_key_bytes()
    }

    pub fn nike_public_key(&self) -> NikePublicKey {
        self.nike.public_key()
    }
}

/// Thread-safe key store over an injected [`Storage`] backend
#[derive(Clone)]
pub struct KeyStore {
    storage: Arc<RwLock<Box<dyn Storage>>>,
}

impl KeyStore {
    pub fn new(storage: impl Storage + 'static) -> Self {
        Self {
            storage: Arc::new(RwLock::new(Box::new(storage))),
        }
    }

    /// Key store backed by [`MemoryStorage`]
    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::new())
    }

    /// Key store backed by a JSON file at `path`
    ///
    /// Every mutation rewrites the file under the write lock; see [`FileStorage`].
    pub fn open_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(FileStorage::open(path)?))
    }

    /// Store the symmetric key shared with `bidder`, replacing any previous key
    pub async fn set_aes_key(&self, bidder: Address, key: &[u8; 32]) -> Result<()> {
        let mut storage = self.storage.write().await;
        storage.put(&bidder_aes_key(bidder), key)?;
        info!("🔑 AES key stored for bidder {:?}", bidder);
        Ok(())
    }

    /// Symmetric key shared with `bidder`, if a key exchange has happened
    pub async fn get_aes_key(&self, bidder: Address) -> Result<Option<[u8; 32]>> {
        let storage = self.storage.read().await;
        storage
            .get(&bidder_aes_key(bidder))?
            .map(|bytes| to_key32(&bytes, "aes"))
            .transpose()
    }

    /// Return the key for `bidder`, creating and storing one if absent
    ///
    /// Runs entirely under the write lock, so concurrent first calls agree
    /// on a single key.
    pub async fn get_or_create_aes_key(&self, bidder: Address) -> Result<[u8; 32]> {
        let mut storage = self.storage.write().await;
        let name = bidder_aes_key(bidder);

        if let Some(bytes) = storage.get(&name)? {
            return to_key32(&bytes, "aes");
        }

        let key = generate_aes_key();
        storage.put(&name, &key)?;
        info!("🔑 Generated new AES key for {:?}", bidder);
        Ok(key)
    }

    /// Replace the key for `bidder` with a fresh one
    ///
    /// Providers keep the old key until the next key exchange reaches them.
    pub async fn rotate_aes_key(&self, bidder: Address) -> Result<[u8; 32]> {
        let mut storage = self.storage.write().await;
        let key = generate_aes_key();
        storage.put(&bidder_aes_key(bidder), &key)?;
        info!("🔄 Rotated AES key for {:?}", bidder);
        Ok(key)
    }

    pub async fn delete_aes_key(&self, bidder: Address) -> Result<()> {
        let mut storage = self.storage.write().await;
        storage.delete(&bidder_aes_key(bidder))?;
        info!("🗑️  AES key removed for {:?}", bidder);
        Ok(())
    }

    pub async fn set_ecies_keypair(&self, keypair: &EciesKeypair) -> Result<()> {
        let mut storage = self.storage.write().await;
        storage.put(ECIES_PRIVATE_KEY_NS, &keypair.to_bytes())
    }

    pub async fn get_ecies_keypair(&self) -> Result<Option<EciesKeypair>> {
        let storage = self.storage.read().await;
        storage
            .get(ECIES_PRIVATE_KEY_NS)?
            .map(|bytes| EciesKeypair::from_bytes(&bytes))
            .transpose()
    }

    pub async fn set_nike_secret_key(&self, key: &NikeSecretKey) -> Result<()> {
        let mut storage = self.storage.write().await;
        storage.put(NIKE_PRIVATE_KEY_NS, &key.to_bytes())
    }

    pub async fn get_nike_secret_key(&self) -> Result<Option<NikeSecretKey>> {
        let storage = self.storage.read().await;
        storage
            .get(NIKE_PRIVATE_KEY_NS)?
            .map(|bytes| NikeSecretKey::from_bytes(&bytes))
            .transpose()
    }

    /// Load the node's ECIES and NIKE keys, generating whichever is missing
    pub async fn get_or_create_provider_keys(&self) -> Result<ProviderKeys> {
        let mut storage = self.storage.write().await;

        let ecies = match storage.get(ECIES_PRIVATE_KEY_NS)? {
            Some(bytes) => EciesKeypair::from_bytes(&bytes)?,
            None => {
                let keypair = EciesKeypair::generate();
                storage.put(ECIES_PRIVATE_KEY_NS, &keypair.to_bytes())?;
                info!("🔑 Generated ECIES keypair");
                keypair
            }
        };

        let nike = match storage.get(NIKE_PRIVATE_KEY_NS)? {
            Some(bytes) => NikeSecretKey::from_bytes(&bytes)?,
            None => {
                let key = NikeSecretKey::generate();
                storage.put(NIKE_PRIVATE_KEY_NS, &key.to_bytes())?;
                info!("🔑 Generated NIKE keypair");
                key
            }
        };

        Ok(ProviderKeys { ecies, nike })
    }
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore").finish_non_exhaustive()
    }
}

fn to_key32(bytes: &[u8], key_type: &str) -> Result<[u8; 32]> {
    bytes.try_into().map_err(|_| {
        PreconfError::Storage(format!(
            "stored {} key has {} bytes, expected 32",
            key_type,
            bytes.len()
        ))
    })
}
