//! Key-value persistence for the session snapshot
//!
//! One JSON document per key. Loading never fails the caller: a missing or
//! unreadable snapshot falls back to defaults.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::Result;
use crate::state::session::SessionSnapshot;

/// Key the session snapshot is stored under.
pub const SESSION_KEY: &str = "suaraai_app_state_v1";

/// Minimal string key-value store.
pub trait KeyValueStore {
    /// Value for `key`, or `None` if it was never written.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value for `key`.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Store keeping each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create the store, creating `dir` if needed.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        // Write then rename so a crash never leaves half a snapshot
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// In-memory store for tests and throwaway sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Load the saved session, falling back to defaults when the entry is
/// missing or corrupt.
pub fn load_session(store: &dyn KeyValueStore) -> SessionSnapshot {
    let raw = match store.get(SESSION_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!("no saved session, using defaults");
            return SessionSnapshot::default();
        }
        Err(e) => {
            warn!(error = %e, "failed to read saved session, using defaults");
            return SessionSnapshot::default();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(error = %e, "saved session is corrupt, using defaults");
            SessionSnapshot::default()
        }
    }
}

/// Write the session snapshot.
pub fn save_session(store: &mut dyn KeyValueStore, snapshot: &SessionSnapshot) -> Result<()> {
    let json = serde_json::to_string(snapshot)?;
    store.set(SESSION_KEY, &json)
}
