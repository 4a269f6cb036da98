// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Provider Side
//!
//! Decrypts bids from bidders it shares a symmetric key with, verifies
//! them, and answers with a signed commitment bound to the NIKE shared
//! secret.
//!
//! ## Bid Lifecycle
//!
//! ```text
//! Received -> Decrypted -> BidVerified -> SharedSecretDerived -> Signed -> Sent
//! ```
//!
//! Any failure is terminal for that bid and is returned to the caller.

use async_trait::async_trait;
use chrono::Utc;
use ethers::types::Address;
use k256::ecdsa::VerifyingKey;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::bidder::verify_bid;
use super::hash::HashDomain;
use super::types::{Bid, EncryptedBid, EncryptedPreConfirmation, PreConfirmation};
use super::{PROTOCOL_NAME, PROTOCOL_VERSION};
use crate::crypto::aes_gcm::decrypt_aes_gcm;
use crate::crypto::nike::{NikePublicKey, NikeSecretKey};
use crate::crypto::signature;
use crate::crypto::signer::KeySigner;
use crate::error::{PreconfError, Result};
use crate::keystore::KeyStore;
use crate::p2p::{self, Peer, PeerType, Stream, StreamDesc, StreamHandler};

/// Stage a bid has reached inside [`CommitmentEncryptor::process_encrypted_bid`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidState {
    Received,
    Decrypted,
    BidVerified,
    SharedSecretDerived,
    Signed,
    Sent,
}

impl fmt::Display for BidState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BidState::Received => "received",
            BidState::Decrypted => "decrypted",
            BidState::BidVerified => "bid_verified",
            BidState::SharedSecretDerived => "shared_secret_derived",
            BidState::Signed => "signed",
            BidState::Sent => "sent",
        };
        f.write_str(name)
    }
}

/// Encrypts commitments for the provider role
#[derive(Clone)]
pub struct CommitmentEncryptor {
    signer: Arc<dyn KeySigner>,
    store: KeyStore,
    domain: HashDomain,
    nike_secret: NikeSecretKey,
    stream_timeout: Duration,
}

impl CommitmentEncryptor {
    /// Load the provider's NIKE key from `store`, generating it on first start
    pub async fn new(signer: Arc<dyn KeySigner>, store: KeyStore, domain: HashDomain) -> Result<Self> {
        let keys = store.get_or_create_provider_keys().await?;
        Ok(Self {
            signer,
            store,
            domain,
            nike_secret: keys.nike,
            stream_timeout: Duration::from_secs(10),
        })
    }

    /// Deadline for each read and write on a bid stream
    pub fn with_stream_timeout(mut self, stream_timeout: Duration) -> Self {
        self.stream_timeout = stream_timeout;
        self
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn nike_public_key(&self) -> NikePublicKey {
        self.nike_secret.public_key()
    }

    pub fn stream_desc() -> StreamDesc {
        StreamDesc::new(PROTOCOL_NAME, PROTOCOL_VERSION)
    }

    /// Decrypt a bid from `bidder`
    ///
    /// # Errors
    ///
    /// - `NoAesKeyFound` if no key exchange with `bidder` has completed
    /// - `DecryptionFailed` on a bad tag, truncated ciphertext or malformed plaintext
    pub async fn decrypt_bid(&self, bidder: Address, encrypted: &EncryptedBid) -> Result<Bid> {
        let aes_key = self
            .store
            .get_aes_key(bidder)
            .await?
            .ok_or(PreconfError::NoAesKeyFound { bidder })?;

        let plaintext = decrypt_aes_gcm(&aes_key, &encrypted.ciphertext)?;
        bincode::deserialize(&plaintext).map_err(|e| PreconfError::decryption("bid", e))
    }

    pub fn verify_bid(&self, bid: &Bid) -> Result<Address> {
        verify_bid(&self.domain, bid)
    }

    /// Recover who signed `bid` without recomputing its hash
    pub fn bid_originator(&self, bid: &Bid) -> Result<(Address, VerifyingKey)> {
        if bid.digest.is_empty() || bid.signature.is_empty() {
            return Err(PreconfError::MissingHashSignature);
        }
        signature::recover_signer(&bid.digest, &bid.signature)
    }

    /// Commit to a verified bid
    ///
    /// # Errors
    ///
    /// `InvalidKey` if the bid's NIKE public key does not decode.
    pub fn construct_encrypted_pre_confirmation(
        &self,
        bid: &Bid,
    ) -> Result<(PreConfirmation, EncryptedPreConfirmation)> {
        let bidder_key = NikePublicKey::from_bytes(&bid.nike_public_key)?;
        let shared_secret = self.nike_secret.shared_secret(&bidder_key).to_bytes();

        let hash = self
            .domain
            .pre_confirmation_hash(&bid.digest, &bid.signature, &shared_secret)?;
        let sig = signature::sign(self.signer.as_ref(), &hash)?;
        let dispatch_timestamp = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);

        let pre_confirmation = PreConfirmation {
            bid: bid.clone(),
            shared_secret: shared_secret.to_vec(),
            provider_address: self.signer.address(),
            digest: hash.to_vec(),
            signature: sig.clone(),
            dispatch_timestamp,
        };
        let encrypted = EncryptedPreConfirmation {
            commitment: hash.to_vec(),
            signature: sig,
            dispatch_timestamp,
        };

        Ok((pre_confirmation, encrypted))
    }

    /// Run one encrypted bid from `bidder` through to a signed commitment
    ///
    /// Rejects bids whose signer is not the peer that sent them.
    pub async fn process_encrypted_bid(
        &self,
        bidder: Address,
        encrypted: &EncryptedBid,
    ) -> Result<(PreConfirmation, EncryptedPreConfirmation)> {
        trace_state(bidder, BidState::Received);

        let bid = self.decrypt_bid(bidder, encrypted).await?;
        trace_state(bidder, BidState::Decrypted);

        let signer = self.verify_bid(&bid)?;
        if signer != bidder {
            return Err(PreconfError::AddressMismatch {
                expected: bidder,
                observed: signer,
            });
        }
        trace_state(bidder, BidState::BidVerified);

        let result = self.construct_encrypted_pre_confirmation(&bid)?;
        trace_state(bidder, BidState::SharedSecretDerived);
        trace_state(bidder, BidState::Signed);

        info!(
            "✅ Committed to bid 0x{} from {:?} for block {}",
            hex::encode(&bid.digest),
            bidder,
            bid.block_number
        );
        Ok(result)
    }

    async fn serve_bid(&self, peer: &Peer, stream: &mut dyn Stream) -> Result<PreConfirmation> {
        let encrypted: EncryptedBid = timeout(self.stream_timeout, p2p::read_message(stream))
            .await
            .map_err(|_| stream_timeout_error(peer.eth_address))??;

        let (pre_confirmation, reply) = self.process_encrypted_bid(peer.eth_address, &encrypted).await?;

        timeout(self.stream_timeout, p2p::write_message(stream, &reply))
            .await
            .map_err(|_| stream_timeout_error(peer.eth_address))??;
        trace_state(peer.eth_address, BidState::Sent);

        Ok(pre_confirmation)
    }
}

fn trace_state(bidder: Address, state: BidState) {
    debug!("Bid from {:?} -> {}", bidder, state);
}

fn stream_timeout_error(peer: Address) -> PreconfError {
    PreconfError::Stream {
        peer,
        reason: "deadline exceeded".to_string(),
    }
}

#[async_trait]
impl StreamHandler for CommitmentEncryptor {
    async fn handle_stream(&self, peer: Peer, mut stream: Box<dyn Stream>) -> Result<()> {
        if peer.peer_type != PeerType::Bidder {
            return Err(PreconfError::InvalidPeerType {
                expected: PeerType::Bidder.to_string(),
                actual: peer.peer_type.to_string(),
            });
        }

        let result = self.serve_bid(&peer, stream.as_mut()).await;
        if let Err(e) = &result {
            warn!("Rejected bid from {:?}: {}", peer.eth_address, e);
        }
        stream.close().await?;
        result.map(|_| ())
    }
}
