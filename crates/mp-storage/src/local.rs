//! Filesystem artifact store for local development.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::{validate_name, ArtifactStore, SavedArtifact, StorageResult};

/// Writes artifacts below a root directory, creating parents on demand.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        name.split('/')
            .filter(|s| !s.is_empty())
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    fn backend(&self) -> &str {
        "local"
    }

    async fn save(
        &self,
        name: &str,
        content: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<SavedArtifact> {
        validate_name(name)?;
        let path = self.path_for(name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let size = content.len();
        tokio::fs::write(&path, content).await?;

        let absolute = tokio::fs::canonicalize(&path).await.unwrap_or(path);
        debug!(path = %absolute.display(), size, "Wrote artifact to disk");

        Ok(SavedArtifact {
            name: name.to_string(),
            uri: format!("file://{}", absolute.display()),
            size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path());

        let saved = store
            .save(
                "city_data/pune_20250101_000000.json",
                b"{\"city\":\"Pune\"}".to_vec(),
                "application/json",
            )
            .await
            .unwrap();

        let written = std::fs::read_to_string(dir.path().join("city_data/pune_20250101_000000.json")).unwrap();
        assert_eq!(written, "{\"city\":\"Pune\"}");
        assert!(saved.uri.starts_with("file://"));
        assert!(saved.uri.ends_with("pune_20250101_000000.json"));
        assert_eq!(saved.size, 15);
    }

    #[tokio::test]
    async fn test_rejects_escape_from_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path().join("artifacts"));
        let err = store
            .save("../outside.json", b"{}".to_vec(), "application/json")
            .await
            .unwrap_err();
        assert!(matches!(err, crate::StorageError::InvalidName { .. }));
        assert!(!dir.path().join("outside.json").exists());
    }
}
