// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! In-Memory Streams
//!
//! [`stream_pair`] connects two [`MemoryStream`]s with bounded channels.
//! [`MemoryNetwork`] routes [`MemoryStreamer::new_stream`] calls to the
//! [`StreamHandler`] registered for the remote address and protocol, running
//! each handler on its own task as a real transport would.

use async_trait::async_trait;
use ethers::types::Address;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{Peer, Stream, StreamDesc, StreamHandler, Streamer};
use crate::error::{PreconfError, Result};

const CHANNEL_CAPACITY: usize = 16;

/// One end of an in-memory stream
#[derive(Debug)]
pub struct MemoryStream {
    remote: Address,
    tx: Option<mpsc::Sender<Vec<u8>>>,
    rx: mpsc::Receiver<Vec<u8>>,
}

/// Create a connected pair: `(a's end, b's end)`
pub fn stream_pair(a: Address, b: Address) -> (MemoryStream, MemoryStream) {
    let (a_tx, b_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (b_tx, a_rx) = mpsc::channel(CHANNEL_CAPACITY);
    (
        MemoryStream {
            remote: b,
            tx: Some(a_tx),
            rx: a_rx,
        },
        MemoryStream {
            remote: a,
            tx: Some(b_tx),
            rx: b_rx,
        },
    )
}

impl MemoryStream {
    fn closed(&self) -> PreconfError {
        PreconfError::Stream {
            peer: self.remote,
            reason: "stream closed".to_string(),
        }
    }
}

#[async_trait]
impl Stream for MemoryStream {
    async fn read_msg(&mut self) -> Result<Vec<u8>> {
        match self.rx.recv().await {
            Some(msg) => Ok(msg),
            None => Err(self.closed()),
        }
    }

    async fn write_msg(&mut self, msg: &[u8]) -> Result<()> {
        let tx = self.tx.as_ref().ok_or_else(|| self.closed())?;
        tx.send(msg.to_vec()).await.map_err(|_| self.closed())
    }

    async fn close(&mut self) -> Result<()> {
        self.tx.take();
        Ok(())
    }
}

type HandlerKey = (Address, String);

/// Routing table for in-memory streams
#[derive(Default)]
pub struct MemoryNetwork {
    handlers: Mutex<HashMap<HandlerKey, Arc<dyn StreamHandler>>>,
    tasks: Mutex<Vec<JoinHandle<Result<()>>>>,
}

impl MemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Serve `desc` on behalf of `address`
    pub fn register(&self, address: Address, desc: &StreamDesc, handler: Arc<dyn StreamHandler>) {
        let mut handlers = self.handlers.lock().unwrap_or_else(|e| e.into_inner());
        handlers.insert((address, desc.protocol_id()), handler);
    }

    /// Streamer that opens streams as `local`
    pub fn streamer(self: &Arc<Self>, local: Peer) -> MemoryStreamer {
        MemoryStreamer {
            local,
            network: Arc::clone(self),
        }
    }

    /// Wait for every handler spawned so far and collect their results
    pub async fn wait_idle(&self) -> Vec<Result<()>> {
        let tasks: Vec<_> = {
            let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
            tasks.drain(..).collect()
        };

        let mut results = Vec::with_capacity(tasks.len());
        for task in tasks {
            results.push(match task.await {
                Ok(result) => result,
                Err(e) => Err(PreconfError::Stream {
                    peer: Address::zero(),
                    reason: format!("handler task failed: {}", e),
                }),
            });
        }
        results
    }

    fn handler(&self, address: Address, protocol: &str) -> Option<Arc<dyn StreamHandler>> {
        let handlers = self.handlers.lock().unwrap_or_else(|e| e.into_inner());
        handlers.get(&(address, protocol.to_string())).cloned()
    }
}

/// [`Streamer`] bound to one local identity on a [`MemoryNetwork`]
pub struct MemoryStreamer {
    local: Peer,
    network: Arc<MemoryNetwork>,
}

#[async_trait]
impl Streamer for MemoryStreamer {
    async fn new_stream(&self, peer: &Peer, desc: &StreamDesc) -> Result<Box<dyn Stream>> {
        let protocol = desc.protocol_id();
        let handler = self
            .network
            .handler(peer.eth_address, &protocol)
            .ok_or_else(|| PreconfError::Stream {
                peer: peer.eth_address,
                reason: format!("protocol {} not supported", protocol),
            })?;

        let (local_end, remote_end) = stream_pair(self.local.eth_address, peer.eth_address);
        let local = self.local.clone();
        debug!("Opening {} stream to {:?}", protocol, peer.eth_address);

        let task = tokio::spawn(async move {
            let sender = local.eth_address;
            let result = handler.handle_stream(local, Box::new(remote_end)).await;
            if let Err(e) = &result {
                warn!("Stream handler for {:?} failed: {}", sender, e);
            }
            result
        });
        self.network
            .tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(task);

        Ok(Box::new(local_end))
    }
}
