// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Symmetric Key Exchange
//!
//! Bootstraps the AES key a bidder uses to encrypt bids, and hands it to
//! every connected provider.
//!
//! ## Protocol Flow
//!
//! 1. Bidder loads (or lazily creates) its AES key
//! 2. Bidder ECIES-encrypts the key once per provider
//! 3. Bidder AES-encrypts a timestamped setup message with the key
//! 4. Bidder signs the bundle and sends the same bundle to every provider in parallel
//! 5. Provider checks the sender's role and signature, finds its own entry,
//!    checks the setup message is fresh, and stores the key for that bidder
//!
//! Every provider receives every entry, so each learns how many providers
//! the bidder addressed.

pub mod message;

use async_trait::async_trait;
use chrono::Utc;
use ethers::types::Address;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, error, info, warn};

use crate::crypto::aes_gcm::{decrypt_aes_gcm, encrypt_aes_gcm};
use crate::crypto::ecies::encrypt_ecies;
use crate::crypto::signer::KeySigner;
use crate::crypto::{keccak256, signature};
use crate::error::{PreconfError, Result};
use crate::keystore::KeyStore;
use crate::p2p::{self, Peer, PeerType, Query, Stream, StreamDesc, StreamHandler, Streamer, Topology};

pub use message::{
    format_timestamp_message, parse_timestamp_message, validate_timestamp_message,
    EkmWithSignature, EncryptedKeysMessage, DEFAULT_FRESHNESS_WINDOW,
};

pub const PROTOCOL_NAME: &str = "keyexchange";
pub const PROTOCOL_VERSION: &str = "1.0.0";

/// Default deadline for distributing a bundle to all providers
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Key exchange service, usable from either role
pub struct KeyExchange {
    topology: Arc<dyn Topology>,
    streamer: Arc<dyn Streamer>,
    signer: Arc<dyn KeySigner>,
    store: KeyStore,
    timeout: Duration,
    freshness_window: Duration,
}

impl KeyExchange {
    pub fn new(
        topology: Arc<dyn Topology>,
        streamer: Arc<dyn Streamer>,
        signer: Arc<dyn KeySigner>,
        store: KeyStore,
    ) -> Self {
        Self {
            topology,
            streamer,
            signer,
            store,
            timeout: DEFAULT_TIMEOUT,
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_freshness_window(mut self, window: Duration) -> Self {
        self.freshness_window = window;
        self
    }

    pub fn stream_desc() -> StreamDesc {
        StreamDesc::new(PROTOCOL_NAME, PROTOCOL_VERSION)
    }

    /// Send this bidder's symmetric key to every connected provider
    ///
    /// # Errors
    ///
    /// - `NoProvidersAvailable` if the topology has no providers
    /// - `InvalidKey` if a provider advertised no usable ECIES key
    /// - `DistributionFailed` listing every provider that was not reached
    ///   before the deadline
    pub async fn send_symmetric_key(&self) -> Result<()> {
        let providers = self.topology.get_peers(Query {
            peer_type: PeerType::Provider,
        });
        if providers.is_empty() {
            error!("❌ No providers available for key exchange");
            return Err(PreconfError::NoProvidersAvailable);
        }

        let bundle = self.build_bundle(&providers).await?;
        self.distribute(&providers, bundle).await
    }

    /// Build the signed bundle addressed to `providers`, in order
    pub async fn build_bundle(&self, providers: &[Peer]) -> Result<EkmWithSignature> {
        let bidder = self.signer.address();
        let aes_key = self.store.get_or_create_aes_key(bidder).await?;

        // 1. One ECIES ciphertext per provider
        let mut encrypted_keys = Vec::with_capacity(providers.len());
        for provider in providers {
            let pke_public_key = provider
                .keys
                .as_ref()
                .map(|k| k.pke_public_key.as_slice())
                .ok_or_else(|| {
                    PreconfError::invalid_key(
                        "ecies public key",
                        format!("provider {:?} advertised no keys", provider.eth_address),
                    )
                })?;
            encrypted_keys.push(encrypt_ecies(pke_public_key, &aes_key)?);
        }

        // 2. Freshness proof under the symmetric key
        let setup = format_timestamp_message(bidder, Utc::now().timestamp());
        let timestamp_message = encrypt_aes_gcm(&aes_key, setup.as_bytes())?;

        // 3. Sign keccak256 of the serialized message
        let message = bincode::serialize(&EncryptedKeysMessage {
            encrypted_keys,
            timestamp_message,
        })?;
        let signature = signature::sign(self.signer.as_ref(), &keccak256(&message))?;

        Ok(EkmWithSignature { message, signature })
    }

    async fn distribute(&self, providers: &[Peer], bundle: EkmWithSignature) -> Result<()> {
        let deadline = Instant::now() + self.timeout;
        let desc = Self::stream_desc();

        let handles: Vec<_> = providers
            .iter()
            .cloned()
            .map(|provider| {
                let streamer = Arc::clone(&self.streamer);
                let bundle = bundle.clone();
                let desc = desc.clone();
                tokio::spawn(async move {
                    let address = provider.eth_address;
                    let result = match timeout_at(
                        deadline,
                        send_bundle(streamer.as_ref(), &provider, &desc, &bundle),
                    )
                    .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(PreconfError::Stream {
                            peer: address,
                            reason: "deadline exceeded".to_string(),
                        }),
                    };
                    (address, result)
                })
            })
            .collect();

        let mut failures = Vec::new();
        for (index, joined) in join_all(handles).await.into_iter().enumerate() {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((address, Err(e))) => {
                    warn!("Failed to send key to provider {:?}: {}", address, e);
                    failures.push(describe_failure(address, &e));
                }
                Err(e) => {
                    let address = providers[index].eth_address;
                    warn!("Key delivery task for {:?} failed: {}", address, e);
                    failures.push(format!("{:?}: task failed: {}", address, e));
                }
            }
        }

        if !failures.is_empty() {
            return Err(PreconfError::DistributionFailed {
                failures,
                total: providers.len(),
            });
        }

        info!("📤 Symmetric key distributed to {} providers", providers.len());
        Ok(())
    }

    /// Accept a bundle from `peer` and store the key it carries
    ///
    /// `peer` must be the handshake-authenticated sender.
    ///
    /// # Errors
    ///
    /// - `InvalidPeerType` if `peer` is not a bidder
    /// - `SignatureVerificationFailed` / `AddressMismatch` if the bundle was not signed by `peer`
    /// - `NoMatchingKey` if no entry is addressed to this provider
    /// - `DecryptionFailed` / `InvalidPayload` if the setup message is malformed
    /// - `StaleTimestamp` if the setup message is older than the freshness window
    pub async fn receive_symmetric_key(&self, peer: &Peer, bundle: &EkmWithSignature) -> Result<()> {
        // 1. Only bidders send keys
        if peer.peer_type != PeerType::Bidder {
            return Err(PreconfError::InvalidPeerType {
                expected: PeerType::Bidder.to_string(),
                actual: peer.peer_type.to_string(),
            });
        }

        // 2. Authenticate the bundle
        let (signer, _) = signature::recover_signer(&keccak256(&bundle.message), &bundle.signature)
            .map_err(|e| PreconfError::SignatureVerificationFailed {
                reason: e.to_string(),
            })?;
        if signer != peer.eth_address {
            return Err(PreconfError::AddressMismatch {
                expected: peer.eth_address,
                observed: signer,
            });
        }

        let message: EncryptedKeysMessage = bincode::deserialize(&bundle.message)
            .map_err(|e| PreconfError::decryption("key exchange message", e))?;

        // 3. Find our entry
        let aes_key = self.decrypt_own_entry(&message.encrypted_keys).await?;

        // 4. Freshness
        let setup = decrypt_aes_gcm(&aes_key, &message.timestamp_message)?;
        let setup = String::from_utf8(setup).map_err(|_| PreconfError::InvalidPayload {
            field: "timestamp_message".to_string(),
            reason: "not UTF-8".to_string(),
        })?;
        validate_timestamp_message(
            &setup,
            peer.eth_address,
            Utc::now().timestamp(),
            self.freshness_window,
        )?;

        // 5. Store
        self.store.set_aes_key(peer.eth_address, &aes_key).await?;
        info!("✅ Accepted symmetric key from bidder {:?}", peer.eth_address);
        Ok(())
    }

    async fn decrypt_own_entry(&self, encrypted_keys: &[Vec<u8>]) -> Result<[u8; 32]> {
        let keypair = self
            .store
            .get_ecies_keypair()
            .await?
            .ok_or_else(|| PreconfError::Storage("no ECIES private key".to_string()))?;

        let mut found = None;
        for entry in encrypted_keys {
            if let Ok(plaintext) = keypair.decrypt(entry) {
                if let Ok(key) = <[u8; 32]>::try_from(plaintext.as_slice()) {
                    found = Some(key);
                    break;
                }
            }
        }

        found.ok_or(PreconfError::NoMatchingKey {
            tried: encrypted_keys.len(),
        })
    }
}

/// Stream errors already name the peer
fn describe_failure(address: Address, error: &PreconfError) -> String {
    match error {
        PreconfError::Stream { .. } => error.to_string(),
        other => format!("{:?}: {}", address, other),
    }
}

async fn send_bundle(
    streamer: &dyn Streamer,
    provider: &Peer,
    desc: &StreamDesc,
    bundle: &EkmWithSignature,
) -> Result<()> {
    let mut stream = streamer.new_stream(provider, desc).await?;
    let written = p2p::write_message(stream.as_mut(), bundle).await;
    stream.close().await?;
    written?;
    debug!("Sent key bundle to {:?}", provider.eth_address);
    Ok(())
}

#[async_trait]
impl StreamHandler for KeyExchange {
    async fn handle_stream(&self, peer: Peer, mut stream: Box<dyn Stream>) -> Result<()> {
        let sender: Address = peer.eth_address;
        let bundle: EkmWithSignature = timeout(self.timeout, p2p::read_message(stream.as_mut()))
            .await
            .map_err(|_| PreconfError::Stream {
                peer: sender,
                reason: "deadline exceeded".to_string(),
            })??;
        stream.close().await?;

        let result = self.receive_symmetric_key(&peer, &bundle).await;
        if let Err(e) = &result {
            warn!("Rejected key bundle from {:?}: {}", sender, e);
        }
        result
    }
}
