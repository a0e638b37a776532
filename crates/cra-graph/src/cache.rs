//! Best-effort local cache of the last materialized graph per contract.
//!
//! Entries are JSON files named after the contract id. Every failure is
//! logged and swallowed; callers only ever see a hit or a miss.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cra_core::Error;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::types::GraphSnapshot;

const KEY_PREFIX: &str = "contract_kg_";

pub struct GraphCache {
    dir: PathBuf,
    /// Entries written or read during this process.
    memory: RwLock<HashMap<String, Arc<GraphSnapshot>>>,
}

impl GraphCache {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            memory: RwLock::new(HashMap::new()),
        }
    }

    /// Cache key for a contract id. Bytes outside `[A-Za-z0-9_-]` are
    /// percent-encoded, so distinct ids never share an entry.
    pub fn key(contract_id: &str) -> String {
        let mut key = String::with_capacity(KEY_PREFIX.len() + contract_id.len());
        key.push_str(KEY_PREFIX);
        for byte in contract_id.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
                key.push(byte as char);
            } else {
                key.push_str(&format!("%{:02X}", byte));
            }
        }
        key
    }

    fn entry_path(&self, contract_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", Self::key(contract_id)))
    }

    /// Store a snapshot. Failures are logged, never returned.
    pub fn save(&self, contract_id: &str, snapshot: &GraphSnapshot) {
        self.memory
            .write()
            .insert(Self::key(contract_id), Arc::new(snapshot.clone()));

        if let Err(e) = self.write_entry(contract_id, snapshot) {
            warn!(
                "Failed to save knowledge graph for contract {}: {}",
                contract_id, e
            );
        }
    }

    fn write_entry(&self, contract_id: &str, snapshot: &GraphSnapshot) -> cra_core::Result<()> {
        let path = self.entry_path(contract_id);
        let cache_err = |e: &dyn std::fmt::Display| Error::Cache(format!("{}: {}", path.display(), e));

        std::fs::create_dir_all(&self.dir).map_err(|e| cache_err(&e))?;
        let json = serde_json::to_string(snapshot)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| cache_err(&e))?;
        std::fs::rename(&tmp, &path).map_err(|e| cache_err(&e))?;
        debug!("Cached knowledge graph at {}", path.display());
        Ok(())
    }

    /// Load the last saved snapshot, or `None`.
    pub fn load(&self, contract_id: &str) -> Option<GraphSnapshot> {
        if let Some(hit) = self.memory.read().get(&Self::key(contract_id)) {
            return Some(hit.as_ref().clone());
        }

        match self.read_entry(contract_id) {
            Ok(Some(snapshot)) => {
                self.memory
                    .write()
                    .insert(Self::key(contract_id), Arc::new(snapshot.clone()));
                Some(snapshot)
            }
            Ok(None) => {
                debug!("No cached knowledge graph for contract {}", contract_id);
                None
            }
            Err(e) => {
                warn!("Discarding cached knowledge graph for contract {}: {}", contract_id, e);
                None
            }
        }
    }

    fn read_entry(&self, contract_id: &str) -> cra_core::Result<Option<GraphSnapshot>> {
        let path = self.entry_path(contract_id);
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Cache(format!("{}: {}", path.display(), e))),
        };
        let snapshot: GraphSnapshot = serde_json::from_str(&data)
            .map_err(|e| Error::Cache(format!("{} is unreadable: {}", path.display(), e)))?;
        snapshot
            .validate()
            .map_err(|e| Error::Cache(format!("{} is inconsistent: {}", path.display(), e)))?;
        Ok(Some(snapshot))
    }
}
