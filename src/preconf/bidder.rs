// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Bidder Side
//!
//! Builds encrypted, signed bids and checks the commitments providers send
//! back. The bidder must have completed a key exchange first so that its
//! symmetric key exists in the key store.

use ethers::types::Address;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info};

use super::hash::HashDomain;
use super::provider::CommitmentEncryptor;
use super::types::{Bid, EncryptedBid, EncryptedPreConfirmation};
use crate::crypto::aes_gcm::encrypt_aes_gcm;
use crate::crypto::nike::{NikePublicKey, NikeSecretKey};
use crate::crypto::signature;
use crate::crypto::signer::KeySigner;
use crate::error::{PreconfError, Result};
use crate::keystore::KeyStore;
use crate::p2p::{self, Peer, Streamer};

/// A provider's commitment, checked against the bid it answers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCommitment {
    pub provider: Address,
    /// 64-byte NIKE shared point
    pub shared_secret: Vec<u8>,
    pub commitment: EncryptedPreConfirmation,
}

/// Encrypts bids for the bidder role
#[derive(Clone)]
pub struct BidEncryptor {
    signer: Arc<dyn KeySigner>,
    store: KeyStore,
    domain: HashDomain,
}

impl BidEncryptor {
    pub fn new(signer: Arc<dyn KeySigner>, store: KeyStore, domain: HashDomain) -> Self {
        Self {
            signer,
            store,
            domain,
        }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn domain(&self) -> &HashDomain {
        &self.domain
    }

    /// Sign and encrypt a bid
    ///
    /// # Arguments
    ///
    /// * `bid` - Unsigned bid; any `nike_public_key`, `digest` or `signature`
    ///   already present is overwritten
    ///
    /// # Returns
    ///
    /// The signed bid, its ciphertext, and the ephemeral NIKE secret the
    /// bidder needs to verify the matching commitment.
    ///
    /// # Errors
    ///
    /// - `MissingRequiredFields` if tx hash or amount is empty or block number is zero
    /// - `InvalidPayload` if block number or a decay timestamp is negative,
    ///   or the decay window does not end after it starts
    /// - `InvalidAmount` if the amount is not a base-10 integer
    /// - `NoAesKeyFound` if no key exchange has happened yet
    pub async fn construct_encrypted_bid(
        &self,
        mut bid: Bid,
    ) -> Result<(Bid, EncryptedBid, NikeSecretKey)> {
        // 1. Required fields
        if bid.tx_hash.is_empty() || bid.bid_amount.is_empty() || bid.block_number == 0 {
            return Err(PreconfError::MissingRequiredFields);
        }
        check_bid_range(&bid)?;

        // 2. Fresh ephemeral NIKE key, bound into the signed hash
        let nike_secret = NikeSecretKey::generate();
        bid.nike_public_key = nike_secret.public_key().to_bytes().to_vec();

        // 3. Hash and sign
        let bid_hash = self.domain.bid_hash(&bid)?;
        bid.signature = signature::sign(self.signer.as_ref(), &bid_hash)?;
        bid.digest = bid_hash.to_vec();

        // 4. Encrypt under the symmetric key shared with providers
        let bidder = self.signer.address();
        let aes_key = self
            .store
            .get_aes_key(bidder)
            .await?
            .ok_or(PreconfError::NoAesKeyFound { bidder })?;

        let plaintext = bincode::serialize(&bid)?;
        let ciphertext = encrypt_aes_gcm(&aes_key, &plaintext)?;

        debug!(
            "Constructed encrypted bid 0x{} for block {}",
            hex::encode(&bid.digest),
            bid.block_number
        );

        Ok((bid, EncryptedBid { ciphertext }, nike_secret))
    }

    /// Verify a signed bid and return its signer
    pub fn verify_bid(&self, bid: &Bid) -> Result<Address> {
        verify_bid(&self.domain, bid)
    }

    /// Verify a provider's commitment to `bid`
    ///
    /// # Arguments
    ///
    /// * `bid` - The signed bid the commitment answers
    /// * `provider_nike_public_key` - Provider's long-term NIKE key, 64 bytes
    /// * `nike_secret` - Ephemeral secret returned by [`Self::construct_encrypted_bid`]
    /// * `commitment` - What the provider sent back
    ///
    /// # Returns
    ///
    /// The 64-byte shared secret and the provider address that signed.
    pub fn verify_encrypted_pre_confirmation(
        &self,
        bid: &Bid,
        provider_nike_public_key: &[u8],
        nike_secret: &NikeSecretKey,
        commitment: &EncryptedPreConfirmation,
    ) -> Result<(Vec<u8>, Address)> {
        if commitment.signature.is_empty() {
            return Err(PreconfError::MissingHashSignature);
        }

        let provider_key = NikePublicKey::from_bytes(provider_nike_public_key)?;
        let shared_secret = nike_secret.shared_secret(&provider_key).to_bytes();

        let hash = self
            .domain
            .pre_confirmation_hash(&bid.digest, &bid.signature, &shared_secret)?;
        let provider = signature::verify(&hash, &commitment.commitment, &commitment.signature)?;

        Ok((shared_secret.to_vec(), provider))
    }

    /// Send a bid to one provider and verify the commitment it returns
    ///
    /// Every stream operation shares one deadline.
    ///
    /// # Errors
    ///
    /// - `InvalidKey` if the provider advertised no NIKE key
    /// - `Stream` if the provider is unreachable or misses the deadline
    /// - `AddressMismatch` if someone other than `provider` signed the commitment
    pub async fn send_bid(
        &self,
        streamer: &dyn Streamer,
        provider: &Peer,
        bid: Bid,
        deadline: Duration,
    ) -> Result<(Bid, VerifiedCommitment)> {
        let nike_public_key = provider
            .keys
            .as_ref()
            .map(|k| k.nike_public_key.clone())
            .ok_or_else(|| PreconfError::invalid_key("nike public key", "provider advertised no keys"))?;

        let (bid, encrypted, nike_secret) = self.construct_encrypted_bid(bid).await?;

        let deadline = Instant::now() + deadline;
        let expired = || PreconfError::Stream {
            peer: provider.eth_address,
            reason: "deadline exceeded".to_string(),
        };

        let desc = CommitmentEncryptor::stream_desc();
        let mut stream = timeout_at(deadline, streamer.new_stream(provider, &desc))
            .await
            .map_err(|_| expired())??;
        timeout_at(deadline, p2p::write_message(stream.as_mut(), &encrypted))
            .await
            .map_err(|_| expired())??;
        let reply: EncryptedPreConfirmation =
            timeout_at(deadline, p2p::read_message(stream.as_mut()))
                .await
                .map_err(|_| expired())??;
        stream.close().await?;

        let (shared_secret, signer) =
            self.verify_encrypted_pre_confirmation(&bid, &nike_public_key, &nike_secret, &reply)?;
        if signer != provider.eth_address {
            return Err(PreconfError::AddressMismatch {
                expected: provider.eth_address,
                observed: signer,
            });
        }

        info!(
            "🤝 Provider {:?} committed to bid 0x{}",
            provider.eth_address,
            hex::encode(&bid.digest)
        );
        Ok((
            bid,
            VerifiedCommitment {
                provider: signer,
                shared_secret,
                commitment: reply,
            },
        ))
    }
}

/// Block number and decay window must fit the settlement contract's uint64
/// fields, with `decay_start < decay_end`
fn check_bid_range(bid: &Bid) -> Result<()> {
    let invalid = |field: &str, reason: &str| PreconfError::InvalidPayload {
        field: field.to_string(),
        reason: reason.to_string(),
    };

    if bid.block_number < 0 {
        return Err(invalid("block_number", "must not be negative"));
    }
    if bid.decay_start_timestamp < 0 {
        return Err(invalid("decay_start_timestamp", "must not be negative"));
    }
    if bid.decay_end_timestamp < 0 {
        return Err(invalid("decay_end_timestamp", "must not be negative"));
    }
    if bid.decay_start_timestamp >= bid.decay_end_timestamp {
        return Err(invalid(
            "decay_end_timestamp",
            "must be after decay_start_timestamp",
        ));
    }
    Ok(())
}

/// Recompute the hash of a signed bid and recover its signer
///
/// # Errors
///
/// - `MissingHashSignature` if digest or signature is absent
/// - `InvalidHash` if the bid content no longer matches its digest
/// - `InvalidSignature` if the signature does not verify
pub fn verify_bid(domain: &HashDomain, bid: &Bid) -> Result<Address> {
    if bid.digest.is_empty() || bid.signature.is_empty() {
        return Err(PreconfError::MissingHashSignature);
    }

    let hash = domain.bid_hash(bid)?;
    signature::verify(&hash, &bid.digest, &bid.signature)
}
