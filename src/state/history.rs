//! Generation history and encoded artifacts
//!
//! Every finished generation, transform or upload becomes an immutable
//! [`HistoryItem`]. Its WAV bytes live in an [`ArtifactRegistry`] behind a
//! handle that must be released once nothing refers to it any more.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::engine::AudioBuffer;
use crate::error::{Result, SuaraError};
use crate::state::session::ActiveTab;

/// Default number of items kept in the history list.
pub const DEFAULT_MAX_HISTORY: usize = 50;

/// Opaque reference to an encoded WAV held by an [`ArtifactRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactHandle(Uuid);

impl fmt::Display for ArtifactHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "artifact:{}", self.0)
    }
}

#[derive(Debug)]
struct Artifact {
    bytes: Arc<Vec<u8>>,
    refs: usize,
}

/// Reference-counted store of encoded WAV artifacts.
///
/// A handle stays valid until it has been released as many times as it was
/// registered or retained.
#[derive(Debug, Default)]
pub struct ArtifactRegistry {
    artifacts: HashMap<ArtifactHandle, Artifact>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `bytes` and return a handle holding one reference.
    pub fn register(&mut self, bytes: Vec<u8>) -> ArtifactHandle {
        let handle = ArtifactHandle(Uuid::new_v4());
        debug!(%handle, size = bytes.len(), "artifact registered");
        self.artifacts.insert(
            handle.clone(),
            Artifact {
                bytes: Arc::new(bytes),
                refs: 1,
            },
        );
        handle
    }

    /// Add a reference to an existing artifact.
    pub fn retain(&mut self, handle: &ArtifactHandle) -> Result<()> {
        let artifact = self
            .artifacts
            .get_mut(handle)
            .ok_or_else(|| SuaraError::ArtifactNotFound {
                id: handle.to_string(),
            })?;
        artifact.refs += 1;
        Ok(())
    }

    /// Drop a reference. The bytes are freed when the last one goes.
    pub fn release(&mut self, handle: &ArtifactHandle) {
        let freed = match self.artifacts.get_mut(handle) {
            Some(artifact) if artifact.refs > 1 => {
                artifact.refs -= 1;
                false
            }
            Some(_) => true,
            None => false,
        };
        if freed {
            self.artifacts.remove(handle);
            debug!(%handle, "artifact released");
        }
    }

    pub fn get(&self, handle: &ArtifactHandle) -> Result<Arc<Vec<u8>>> {
        self.artifacts
            .get(handle)
            .map(|a| Arc::clone(&a.bytes))
            .ok_or_else(|| SuaraError::ArtifactNotFound {
                id: handle.to_string(),
            })
    }

    pub fn contains(&self, handle: &ArtifactHandle) -> bool {
        self.artifacts.contains_key(handle)
    }

    /// Number of artifacts still held.
    pub fn live_count(&self) -> usize {
        self.artifacts.len()
    }
}

/// One finished result.
#[derive(Debug, Clone)]
pub struct HistoryItem {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: ActiveTab,
    pub title: String,
    pub artifact: ArtifactHandle,
    pub buffer: Arc<AudioBuffer>,
}

impl HistoryItem {
    pub fn new(
        kind: ActiveTab,
        title: impl Into<String>,
        artifact: ArtifactHandle,
        buffer: Arc<AudioBuffer>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            kind,
            title: title.into(),
            artifact,
            buffer,
        }
    }
}

/// Bounded list of results, newest first.
#[derive(Debug)]
pub struct History {
    items: Vec<HistoryItem>,
    max_items: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl History {
    pub fn new(max_items: usize) -> Self {
        Self {
            items: Vec::new(),
            max_items: max_items.max(1),
        }
    }

    /// Insert at the front, releasing the artifacts of evicted items.
    pub fn push(&mut self, item: HistoryItem, registry: &mut ArtifactRegistry) {
        self.items.insert(0, item);
        while self.items.len() > self.max_items {
            if let Some(evicted) = self.items.pop() {
                debug!(id = %evicted.id, title = %evicted.title, "history item evicted");
                registry.release(&evicted.artifact);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&HistoryItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn items(&self) -> &[HistoryItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    /// Drop every item and release its artifact.
    pub fn clear(&mut self, registry: &mut ArtifactRegistry) {
        for item in self.items.drain(..) {
            registry.release(&item.artifact);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(registry: &mut ArtifactRegistry, title: &str) -> HistoryItem {
        let handle = registry.register(vec![0u8; 44]);
        HistoryItem::new(
            ActiveTab::Script,
            title,
            handle,
            Arc::new(AudioBuffer::new(1, 10, 24000)),
        )
    }

    #[test]
    fn test_newest_first() {
        let mut registry = ArtifactRegistry::new();
        let mut history = History::default();
        let first = item(&mut registry, "first");
        let second = item(&mut registry, "second");
        history.push(first, &mut registry);
        history.push(second, &mut registry);

        assert_eq!(history.items()[0].title, "second");
        assert_eq!(history.items()[1].title, "first");
    }

    #[test]
    fn test_eviction_releases_artifact() {
        let mut registry = ArtifactRegistry::new();
        let mut history = History::new(2);
        let oldest = item(&mut registry, "a");
        let oldest_handle = oldest.artifact.clone();
        history.push(oldest, &mut registry);
        for title in ["b", "c"] {
            let next = item(&mut registry, title);
            history.push(next, &mut registry);
        }

        assert_eq!(history.len(), 2);
        assert!(!registry.contains(&oldest_handle));
        assert_eq!(registry.live_count(), 2);
    }

    #[test]
    fn test_retained_artifact_survives_one_release() {
        let mut registry = ArtifactRegistry::new();
        let handle = registry.register(vec![1, 2, 3]);
        registry.retain(&handle).unwrap();

        registry.release(&handle);
        assert_eq!(registry.get(&handle).unwrap().as_slice(), &[1, 2, 3]);

        registry.release(&handle);
        assert!(matches!(
            registry.get(&handle),
            Err(SuaraError::ArtifactNotFound { .. })
        ));
        // Releasing a freed handle is a no-op
        registry.release(&handle);
    }

    #[test]
    fn test_clear_releases_everything() {
        let mut registry = ArtifactRegistry::new();
        let mut history = History::default();
        for title in ["x", "y", "z"] {
            let next = item(&mut registry, title);
            history.push(next, &mut registry);
        }
        history.clear(&mut registry);
        assert!(history.is_empty());
        assert_eq!(registry.live_count(), 0);
    }
}
