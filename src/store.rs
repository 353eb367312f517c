//! # Pid persistence.
//!
//! [`PidStore`] persists a single integer, the last observed daemon pid,
//! keyed by a network-derived string. The supervisor writes it before every
//! reset and consults it on every `start` to find orphans left behind by a
//! previous run.
//!
//! The store is injected so tests can stub it; [`MemoryStore`] backs tests
//! and [`JsonFileStore`] backs deployments. Writes are last-writer-wins;
//! concurrent supervisors on one key are unsupported.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::RwLock;

/// Single-integer key-value store for the daemon pid.
#[async_trait]
pub trait PidStore: Send + Sync {
    /// Reads the pid recorded under `key`, if any.
    async fn get(&self, key: &str) -> io::Result<Option<u32>>;

    /// Records `pid` under `key`.
    async fn set(&self, key: &str, pid: u32) -> io::Result<()>;
}

/// In-memory store; the default for tests and embedded use.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, u32>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PidStore for MemoryStore {
    async fn get(&self, key: &str) -> io::Result<Option<u32>> {
        Ok(self.entries.read().await.get(key).copied())
    }

    async fn set(&self, key: &str, pid: u32) -> io::Result<()> {
        self.entries.write().await.insert(key.to_string(), pid);
        Ok(())
    }
}

/// JSON-file-backed store: one object mapping keys to pids.
///
/// Read-modify-write on every `set`; a missing file reads as empty.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Creates a store backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read_map(&self) -> io::Result<HashMap<String, u32>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl PidStore for JsonFileStore {
    async fn get(&self, key: &str) -> io::Result<Option<u32>> {
        Ok(self.read_map().await?.get(key).copied())
    }

    async fn set(&self, key: &str, pid: u32) -> io::Result<()> {
        let mut map = self.read_map().await?;
        map.insert(key.to_string(), pid);
        let bytes = serde_json::to_vec_pretty(&map)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        tokio::fs::write(&self.path, bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("mainnet-previous-node-pid").await.unwrap(), None);
        store.set("mainnet-previous-node-pid", 4242).await.unwrap();
        assert_eq!(
            store.get("mainnet-previous-node-pid").await.unwrap(),
            Some(4242)
        );
    }

    #[tokio::test]
    async fn memory_store_last_writer_wins() {
        let store = MemoryStore::new();
        store.set("k", 1).await.unwrap();
        store.set("k", 2).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn json_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("pids.json"));
        assert_eq!(store.get("testnet-previous-node-pid").await.unwrap(), None);
        store.set("testnet-previous-node-pid", 31337).await.unwrap();
        assert_eq!(
            store.get("testnet-previous-node-pid").await.unwrap(),
            Some(31337)
        );

        // A second store over the same file sees the write.
        let reopened = JsonFileStore::new(dir.path().join("pids.json"));
        assert_eq!(
            reopened.get("testnet-previous-node-pid").await.unwrap(),
            Some(31337)
        );
    }
}
