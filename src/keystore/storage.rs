// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Key-Value Storage Backends
//!
//! The [`KeyStore`](super::KeyStore) persists keys through this trait.
//! Two backends ship with the crate:
//!
//! - [`MemoryStorage`]: `HashMap`, lost on restart
//! - [`FileStorage`]: JSON object of hex values, rewritten on every change

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{PreconfError, Result};

/// Byte-valued key-value store
///
/// Implementations need no internal locking: the key store serializes
/// writers and lets readers share.
pub trait Storage: Send + Sync {
    /// Value under `key`, or `None` if absent
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Insert or overwrite `key`
    fn put(&mut self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove `key`; removing an absent key is not an error
    fn delete(&mut self, key: &str) -> Result<()>;
}

/// Volatile in-memory backend
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// JSON file backend
///
/// The whole map is loaded on open and written back after each `put` or
/// `delete`. Values are hex-encoded.
///
/// Writes are synchronous and happen while the key store's write lock is
/// held. Suited to the low write rate of node keys and per-bidder key
/// exchanges, not to a hot path.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: HashMap<String, String>,
}

impl FileStorage {
    /// Open `path`, creating an empty store if the file does not exist
    ///
    /// # Errors
    ///
    /// `Storage` if the file exists but cannot be read or is not a JSON
    /// object of strings.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            if contents.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&contents).map_err(|e| {
                    PreconfError::Storage(format!("failed to parse {}: {}", path.display(), e))
                })?
            }
        } else {
            HashMap::new()
        };

        debug!("Opened key file {} ({} entries)", path.display(), entries.len());
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| PreconfError::Serialization(e.to_string()))?;

        // Replace atomically via rename
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.entries.get(key) {
            Some(value) => Ok(Some(hex::decode(value).map_err(|e| {
                PreconfError::Storage(format!("corrupt value under {}: {}", key, e))
            })?)),
            None => Ok(None),
        }
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.entries.insert(key.to_string(), hex::encode(value));
        self.flush()
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}
