//! Persistence for the seen-record key set.
//!
//! The coordinator reads the full set at the start of a sync and writes it
//! back once at the end; `unlink` clears it entirely.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;

/// Named key-set holding every record key already delivered to the client.
pub trait SeenRecordStore: Send {
    fn load(&self) -> Result<HashSet<String>>;
    fn store(&self, keys: &HashSet<String>) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// JSON file store under the platform config directory.
pub struct JsonSeenRecordStore {
    path: PathBuf,
}

impl JsonSeenRecordStore {
    pub fn new() -> Result<Self> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("HealthLink");
        fs::create_dir_all(&path)?;
        path.push("seen_records.json");
        Ok(Self { path })
    }

    /// Store backed by an explicit file, for tests and embedding hosts.
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }
}

impl SeenRecordStore for JsonSeenRecordStore {
    fn load(&self) -> Result<HashSet<String>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => return Err(e.into()),
        };
        let keys: Vec<String> = serde_json::from_str(&contents)?;
        Ok(keys.into_iter().collect())
    }

    fn store(&self, keys: &HashSet<String>) -> Result<()> {
        // Sorted for stable file contents across runs.
        let mut sorted: Vec<&String> = keys.iter().collect();
        sorted.sort();
        let json = serde_json::to_string_pretty(&sorted)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store for tests and hosts that persist elsewhere.
#[derive(Debug, Clone, Default)]
pub struct MemorySeenRecordStore {
    keys: Arc<Mutex<HashSet<String>>>,
}

impl MemorySeenRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SeenRecordStore for MemorySeenRecordStore {
    fn load(&self) -> Result<HashSet<String>> {
        let keys = self
            .keys
            .lock()
            .map_err(|_| anyhow::anyhow!("Lock error"))?;
        Ok(keys.clone())
    }

    fn store(&self, keys: &HashSet<String>) -> Result<()> {
        let mut guard = self
            .keys
            .lock()
            .map_err(|_| anyhow::anyhow!("Lock error"))?;
        *guard = keys.clone();
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut guard = self
            .keys
            .lock()
            .map_err(|_| anyhow::anyhow!("Lock error"))?;
        guard.clear();
        Ok(())
    }
}
