// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! In-memory peer table

use ethers::types::Address;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

use super::{Peer, Query, Topology};

/// Connected peers keyed by Ethereum address
///
/// Peers are returned in address order so fan-out is deterministic.
#[derive(Debug, Default)]
pub struct PeerTable {
    peers: RwLock<HashMap<Address, Peer>>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a peer after a successful handshake, replacing any previous entry
    pub fn add_peer(&self, peer: Peer) {
        let mut peers = self.peers.write().unwrap_or_else(|e| e.into_inner());
        debug!("Peer connected: {:?} ({})", peer.eth_address, peer.peer_type);
        peers.insert(peer.eth_address, peer);
    }

    pub fn remove_peer(&self, address: &Address) -> Option<Peer> {
        let mut peers = self.peers.write().unwrap_or_else(|e| e.into_inner());
        peers.remove(address)
    }

    pub fn len(&self) -> usize {
        self.peers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Topology for PeerTable {
    fn get_peers(&self, query: Query) -> Vec<Peer> {
        let peers = self.peers.read().unwrap_or_else(|e| e.into_inner());
        let mut matching: Vec<Peer> = peers
            .values()
            .filter(|p| p.peer_type == query.peer_type)
            .cloned()
            .collect();
        matching.sort_by_key(|p| p.eth_address);
        matching
    }
}
