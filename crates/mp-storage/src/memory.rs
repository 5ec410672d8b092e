//! In-memory artifact store, used by tests and dry runs.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::{validate_name, ArtifactStore, SavedArtifact, StorageResult};

/// Entries kept before the oldest is evicted.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub content: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Default)]
struct Entries {
    by_name: HashMap<String, StoredArtifact>,
    /// Insertion order, oldest first.
    order: VecDeque<String>,
}

/// Artifact store backed by a bounded `HashMap<name, artifact>`.
///
/// Once `max_entries` artifacts are held, each new name evicts the oldest
/// one. Overwriting an existing name does not change its position.
#[derive(Debug)]
pub struct MemoryArtifactStore {
    entries: Mutex<Entries>,
    max_entries: usize,
}

impl Default for MemoryArtifactStore {
    fn default() -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, name: &str) -> Option<StoredArtifact> {
        self.entries().by_name.get(name).cloned()
    }

    /// Stored names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries().by_name.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries().by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    fn backend(&self) -> &str {
        "memory"
    }

    async fn save(
        &self,
        name: &str,
        content: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<SavedArtifact> {
        validate_name(name)?;
        let size = content.len();
        let artifact = StoredArtifact {
            content,
            content_type: content_type.to_string(),
        };

        let mut entries = self.entries();
        if entries.by_name.insert(name.to_string(), artifact).is_none() {
            entries.order.push_back(name.to_string());
        }
        while entries.order.len() > self.max_entries {
            if let Some(oldest) = entries.order.pop_front() {
                entries.by_name.remove(&oldest);
                debug!(name = %oldest, "Evicted artifact from memory");
            }
        }
        drop(entries);
        debug!(name, size, "Stored artifact in memory");

        Ok(SavedArtifact {
            name: name.to_string(),
            uri: format!("memory://{}", name),
            size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_and_get() {
        let store = MemoryArtifactStore::new();
        let saved = store
            .save("a/b.json", b"{}".to_vec(), "application/json")
            .await
            .unwrap();

        assert_eq!(saved.size, 2);
        assert_eq!(store.names(), vec!["a/b.json".to_string()]);
        assert_eq!(store.get("a/b.json").unwrap().content, b"{}".to_vec());
    }

    #[tokio::test]
    async fn test_overwrite_keeps_single_entry() {
        let store = MemoryArtifactStore::new();
        store.save("x.json", b"1".to_vec(), "application/json").await.unwrap();
        store.save("x.json", b"22".to_vec(), "application/json").await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("x.json").unwrap().content, b"22".to_vec());
    }

    #[tokio::test]
    async fn test_oldest_entry_evicted_at_capacity() {
        let store = MemoryArtifactStore::new().with_max_entries(2);
        store.save("a.json", b"1".to_vec(), "application/json").await.unwrap();
        store.save("b.json", b"2".to_vec(), "application/json").await.unwrap();
        store.save("a.json", b"11".to_vec(), "application/json").await.unwrap();
        store.save("c.json", b"3".to_vec(), "application/json").await.unwrap();

        assert_eq!(store.names(), vec!["b.json".to_string(), "c.json".to_string()]);
        assert!(store.get("a.json").is_none());
    }

    #[tokio::test]
    async fn test_rejects_traversal() {
        let store = MemoryArtifactStore::new();
        assert!(store.save("../x.json", vec![], "application/json").await.is_err());
        assert!(store.is_empty());
    }
}
