//! mp-storage: Artifact persistence for MetroPulse
//!
//! Pipelines persist their validated JSON output through the
//! `ArtifactStore` trait. Backends:
//! - `GcsArtifactStore`: Google Cloud Storage bucket (production)
//! - `LocalArtifactStore`: a directory on disk (development)
//! - `MemoryArtifactStore`: a map in memory (tests, dry runs)

pub mod error;
pub mod gcs;
pub mod local;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use error::StorageError;
pub use gcs::{GcsArtifactStore, TokenSource};
pub use local::LocalArtifactStore;
pub use memory::MemoryArtifactStore;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Timestamp layout used in artifact names.
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// A stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedArtifact {
    /// Name relative to the store root.
    pub name: String,
    /// Fully qualified location, e.g. `gs://bucket/city_data/pune_20250101_120000.json`.
    pub uri: String,
    pub size: usize,
}

/// Write-once blob store for pipeline output.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &str;

    /// Store `content` under `name`, replacing any previous object.
    async fn save(
        &self,
        name: &str,
        content: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<SavedArtifact>;
}

/// Serialize `value` as pretty JSON and store it under `name`.
pub async fn save_json<T: Serialize + ?Sized>(
    store: &dyn ArtifactStore,
    name: &str,
    value: &T,
) -> StorageResult<SavedArtifact> {
    let content = serde_json::to_vec_pretty(value)?;
    store.save(name, content, JSON_CONTENT_TYPE).await
}

/// Lowercase `entity` and replace whitespace and path separators with `_`.
pub fn slug(entity: &str) -> String {
    entity
        .trim()
        .chars()
        .map(|c| {
            if c.is_whitespace() || c == '/' || c == '\\' {
                '_'
            } else {
                c
            }
        })
        .flat_map(char::to_lowercase)
        .collect()
}

/// Artifact name of the form `<prefix>/<slug>_<YYYYmmdd_HHMMSS>.json`.
pub fn artifact_key(prefix: &str, entity: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}/{}_{}.json",
        prefix.trim_end_matches('/'),
        slug(entity),
        now.format(TIMESTAMP_FORMAT)
    )
}

/// Reject names that are empty, absolute or that climb out of the store root.
pub(crate) fn validate_name(name: &str) -> StorageResult<()> {
    if name.trim().is_empty() {
        return Err(StorageError::invalid_name(name, "name is empty"));
    }
    if name.starts_with('/') || name.starts_with('\\') {
        return Err(StorageError::invalid_name(name, "name must be relative"));
    }
    if name.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(StorageError::invalid_name(name, "name must not contain '..'"));
    }
    Ok(())
}
