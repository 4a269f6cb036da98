// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! EIP-712 Style Hashing
//!
//! Hashes must match the PreConfCommitmentStore verifier byte for byte.
//!
//! ## Formulas
//!
//! ```text
//! domainSeparator(name) = keccak256(abi.encode(
//!     keccak256("EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)"),
//!     name, "1", chainId, verifyingContract))          // name and "1" as dynamic strings
//!
//! bidStruct = keccak256(abi.encode(TYPEHASH_BID,
//!     keccak256(txnHash), keccak256(revertingTxHashes), bidAmt,
//!     blockNumber, decayStart, decayEnd, bidderPKx, bidderPKy))
//! bidHash = keccak256(0x1901 || domainSeparator("PreConfBid") || bidStruct)
//!
//! commitStruct = keccak256(abi.encode(TYPEHASH_COMMIT,
//!     bidDigest, keccak256(bidSignature), sharedKeyX, sharedKeyY))
//! commitmentHash = keccak256(0x1901 || domainSeparator("OpenedCommitment") || commitStruct)
//! ```

use ethers::abi::{encode, Token};
use ethers::types::{Address, I256, U256};

use super::types::Bid;
use crate::crypto::keccak256;
use crate::crypto::nike::NIKE_PUBLIC_KEY_LEN;
use crate::error::{PreconfError, Result};

pub const EIP712_DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

pub const BID_TYPE: &str = "PreConfBid(string txnHash,string revertingTxHashes,uint256 bidAmt,uint64 blockNumber,uint64 decayStartTimeStamp,uint64 decayEndTimeStamp,uint256 bidderPKx,uint256 bidderPKy)";

pub const COMMITMENT_TYPE: &str = "OpenedCommitment(bytes32 bidHash,string signature,uint256 sharedKeyX,uint256 sharedKeyY)";

pub const BID_DOMAIN_NAME: &str = "PreConfBid";
pub const COMMITMENT_DOMAIN_NAME: &str = "OpenedCommitment";
pub const DOMAIN_VERSION: &str = "1";

/// `keccak256(abi.encode(domainTypeHash, name, "1", chainId, verifyingContract))`
pub fn compute_domain_separator(name: &str, chain_id: u64, verifying_contract: Address) -> [u8; 32] {
    let encoded = encode(&[
        Token::FixedBytes(keccak256(EIP712_DOMAIN_TYPE.as_bytes()).to_vec()),
        Token::String(name.to_string()),
        Token::String(DOMAIN_VERSION.to_string()),
        Token::Uint(U256::from(chain_id)),
        Token::Address(verifying_contract),
    ]);
    keccak256(&encoded)
}

/// Parse a base-10 bid amount into a uint256
pub fn parse_bid_amount(amount: &str) -> Result<U256> {
    let invalid = || PreconfError::InvalidAmount {
        amount: amount.to_string(),
    };
    if amount.is_empty() || !amount.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    U256::from_dec_str(amount).map_err(|_| invalid())
}

/// Two's-complement 256-bit word, as the EVM widens a signed 64-bit value
fn int_word(value: i64) -> Token {
    Token::Uint(I256::from(value).into_raw())
}

fn point_words(encoded: &[u8], what: &str) -> Result<(Token, Token)> {
    if encoded.len() != NIKE_PUBLIC_KEY_LEN {
        return Err(PreconfError::invalid_key(
            what,
            format!("expected {} bytes, got {}", NIKE_PUBLIC_KEY_LEN, encoded.len()),
        ));
    }
    Ok((
        Token::Uint(U256::from_big_endian(&encoded[..32])),
        Token::Uint(U256::from_big_endian(&encoded[32..])),
    ))
}

fn typed_data_hash(domain_separator: &[u8; 32], struct_hash: &[u8; 32]) -> [u8; 32] {
    let mut raw = Vec::with_capacity(2 + 32 + 32);
    raw.extend_from_slice(b"\x19\x01");
    raw.extend_from_slice(domain_separator);
    raw.extend_from_slice(struct_hash);
    keccak256(&raw)
}

/// Domain separators for one chain id and verifying contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashDomain {
    chain_id: u64,
    verifying_contract: Address,
    bid_domain: [u8; 32],
    commitment_domain: [u8; 32],
    bid_typehash: [u8; 32],
    commitment_typehash: [u8; 32],
}

impl HashDomain {
    pub fn new(chain_id: u64, verifying_contract: Address) -> Self {
        Self {
            chain_id,
            verifying_contract,
            bid_domain: compute_domain_separator(BID_DOMAIN_NAME, chain_id, verifying_contract),
            commitment_domain: compute_domain_separator(
                COMMITMENT_DOMAIN_NAME,
                chain_id,
                verifying_contract,
            ),
            bid_typehash: keccak256(BID_TYPE.as_bytes()),
            commitment_typehash: keccak256(COMMITMENT_TYPE.as_bytes()),
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn verifying_contract(&self) -> Address {
        self.verifying_contract
    }

    pub fn bid_domain_separator(&self) -> [u8; 32] {
        self.bid_domain
    }

    pub fn commitment_domain_separator(&self) -> [u8; 32] {
        self.commitment_domain
    }

    /// Struct hash of a bid, before domain separation
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `bid_amount` is not a base-10 uint256
    /// - `InvalidKey` if `nike_public_key` is not 64 bytes
    pub fn bid_struct_hash(&self, bid: &Bid) -> Result<[u8; 32]> {
        let amount = parse_bid_amount(&bid.bid_amount)?;
        let (pk_x, pk_y) = point_words(&bid.nike_public_key, "bidder nike public key")?;

        let encoded = encode(&[
            Token::FixedBytes(self.bid_typehash.to_vec()),
            Token::FixedBytes(keccak256(bid.tx_hash.as_bytes()).to_vec()),
            Token::FixedBytes(keccak256(bid.reverting_tx_hashes.as_bytes()).to_vec()),
            Token::Uint(amount),
            int_word(bid.block_number),
            int_word(bid.decay_start_timestamp),
            int_word(bid.decay_end_timestamp),
            pk_x,
            pk_y,
        ]);
        Ok(keccak256(&encoded))
    }

    /// Final bid hash signed by the bidder
    pub fn bid_hash(&self, bid: &Bid) -> Result<[u8; 32]> {
        let struct_hash = self.bid_struct_hash(bid)?;
        Ok(typed_data_hash(&self.bid_domain, &struct_hash))
    }

    /// Final commitment hash signed by the provider
    ///
    /// # Arguments
    ///
    /// * `bid_digest` - 32-byte bid hash
    /// * `bid_signature` - Bidder's signature bytes, hashed as-is
    /// * `shared_secret` - 64-byte NIKE shared point
    ///
    /// # Errors
    ///
    /// - `InvalidHash` if `bid_digest` is not 32 bytes
    /// - `InvalidKey` if `shared_secret` is not 64 bytes
    pub fn pre_confirmation_hash(
        &self,
        bid_digest: &[u8],
        bid_signature: &[u8],
        shared_secret: &[u8],
    ) -> Result<[u8; 32]> {
        if bid_digest.len() != 32 {
            return Err(PreconfError::InvalidHash);
        }
        let (key_x, key_y) = point_words(shared_secret, "shared secret")?;

        let encoded = encode(&[
            Token::FixedBytes(self.commitment_typehash.to_vec()),
            Token::FixedBytes(bid_digest.to_vec()),
            Token::FixedBytes(keccak256(bid_signature).to_vec()),
            key_x,
            key_y,
        ]);
        let struct_hash = keccak256(&encoded);
        Ok(typed_data_hash(&self.commitment_domain, &struct_hash))
    }
}
