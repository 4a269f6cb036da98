// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Peer-to-Peer Contracts
//!
//! The protocol code talks to the network through three seams:
//!
//! - [`Topology`]: which peers are connected, and in which role
//! - [`Streamer`]: open a new stream to a peer for a protocol
//! - [`Stream`]: read and write length-delimited messages
//!
//! A libp2p transport and handshake implement these in production. The
//! crate ships an in-memory [`PeerTable`] and [`MemoryNetwork`] for local
//! simulation and tests. Peers reaching a [`StreamHandler`] are already
//! authenticated: `Peer::eth_address` is the handshake-verified identity.

pub mod memory;
pub mod topology;

use async_trait::async_trait;
use ethers::types::Address;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{PreconfError, Result};

pub use memory::{stream_pair, MemoryNetwork, MemoryStream, MemoryStreamer};
pub use topology::PeerTable;

/// Role a peer announced during the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerType {
    Bootnode,
    Provider,
    Bidder,
}

impl fmt::Display for PeerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PeerType::Bootnode => "bootnode",
            PeerType::Provider => "provider",
            PeerType::Bidder => "bidder",
        };
        f.write_str(name)
    }
}

impl FromStr for PeerType {
    type Err = PreconfError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "bootnode" => Ok(PeerType::Bootnode),
            "provider" => Ok(PeerType::Provider),
            "bidder" => Ok(PeerType::Bidder),
            other => Err(PreconfError::Config(format!("unknown peer type: {}", other))),
        }
    }
}

/// Public keys a provider advertises
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keys {
    /// SEC1 compressed P-256 point used for ECIES
    pub pke_public_key: Vec<u8>,
    /// 64-byte BN254 G1 point used for the NIKE
    pub nike_public_key: Vec<u8>,
}

/// A connected, authenticated peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub eth_address: Address,
    pub peer_type: PeerType,
    /// Present for providers, absent for bidders and bootnodes
    pub keys: Option<Keys>,
}

impl Peer {
    pub fn new(eth_address: Address, peer_type: PeerType) -> Self {
        Self {
            eth_address,
            peer_type,
            keys: None,
        }
    }

    pub fn with_keys(mut self, keys: Keys) -> Self {
        self.keys = Some(keys);
        self
    }
}

/// Filter for [`Topology::get_peers`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Query {
    pub peer_type: PeerType,
}

/// View of the currently connected peers
pub trait Topology: Send + Sync {
    fn get_peers(&self, query: Query) -> Vec<Peer>;
}

/// Names a protocol; streams are routed by `/<name>/<version>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamDesc {
    pub name: String,
    pub version: String,
}

impl StreamDesc {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn protocol_id(&self) -> String {
        format!("/{}/{}", self.name, self.version)
    }
}

/// Bidirectional message stream between two peers for one protocol
///
/// Callers wrap every operation in a deadline.
#[async_trait]
pub trait Stream: Send {
    async fn read_msg(&mut self) -> Result<Vec<u8>>;
    async fn write_msg(&mut self, msg: &[u8]) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
}

/// Opens outbound streams
#[async_trait]
pub trait Streamer: Send + Sync {
    async fn new_stream(&self, peer: &Peer, desc: &StreamDesc) -> Result<Box<dyn Stream>>;
}

/// Serves inbound streams for one protocol
#[async_trait]
pub trait StreamHandler: Send + Sync {
    async fn handle_stream(&self, peer: Peer, stream: Box<dyn Stream>) -> Result<()>;
}

/// Serialize `msg` with bincode and write it as one frame
pub async fn write_message<T: Serialize + Sync>(stream: &mut dyn Stream, msg: &T) -> Result<()> {
    let bytes = bincode::serialize(msg)?;
    stream.write_msg(&bytes).await
}

/// Read one frame and deserialize it with bincode
pub async fn read_message<T: DeserializeOwned>(stream: &mut dyn Stream) -> Result<T> {
    let bytes = stream.read_msg().await?;
    Ok(bincode::deserialize(&bytes)?)
}
