//! Google Cloud Storage backend.
//!
//! Uploads use the JSON API's simple media upload. Access tokens come either
//! from configuration or from the GCE/Cloud Run metadata server, in which
//! case they are cached until shortly before they expire.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::error::StorageError;
use crate::{validate_name, ArtifactStore, SavedArtifact, StorageResult};

const DEFAULT_UPLOAD_BASE: &str = "https://storage.googleapis.com/upload/storage/v1";
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
/// Tokens are refreshed this long before the metadata server says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Where bearer tokens for uploads come from.
#[derive(Debug, Clone)]
pub enum TokenSource {
    /// A fixed token, e.g. from `gcloud auth print-access-token`.
    Static(String),
    /// The instance metadata server.
    Metadata { url: String },
}

impl TokenSource {
    pub fn metadata() -> Self {
        TokenSource::Metadata {
            url: METADATA_TOKEN_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

pub struct GcsArtifactStore {
    client: Client,
    bucket: String,
    prefix: String,
    upload_base: String,
    token_source: TokenSource,
    cached_token: RwLock<Option<CachedToken>>,
}

impl GcsArtifactStore {
    /// Create a store for `bucket`. A leading `gs://` is ignored.
    pub fn new(bucket: impl Into<String>, token_source: TokenSource) -> StorageResult<Self> {
        let bucket = bucket.into();
        let bucket = bucket
            .trim()
            .trim_start_matches("gs://")
            .trim_end_matches('/')
            .to_string();
        if bucket.is_empty() {
            return Err(StorageError::config("GCS bucket name is empty"));
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StorageError::config(e.to_string()))?;

        Ok(Self {
            client,
            bucket,
            prefix: String::new(),
            upload_base: DEFAULT_UPLOAD_BASE.to_string(),
            token_source,
            cached_token: RwLock::new(None),
        })
    }

    /// Prepend `prefix` to every object name.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let prefix = prefix.trim_matches('/');
        self.prefix = if prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", prefix)
        };
        self
    }

    pub fn with_upload_base(mut self, base: impl Into<String>) -> Self {
        self.upload_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn object_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    fn object_uri(&self, object: &str) -> String {
        format!("gs://{}/{}", self.bucket, object)
    }

    async fn access_token(&self) -> StorageResult<String> {
        let url = match &self.token_source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::Metadata { url } => url,
        };

        if let Some(cached) = self.cached_token.read().await.as_ref() {
            if Instant::now() < cached.refresh_at {
                return Ok(cached.value.clone());
            }
        }

        let mut cache = self.cached_token.write().await;
        // Another upload may have refreshed while we waited for the lock
        if let Some(cached) = cache.as_ref() {
            if Instant::now() < cached.refresh_at {
                return Ok(cached.value.clone());
            }
        }

        debug!(url = %url, "Fetching access token from metadata server");
        let response = self
            .client
            .get(url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| StorageError::Auth(format!("metadata server unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Auth(format!(
                "metadata server returned {}: {}",
                status.as_u16(),
                body
            )));
        }

        let token: MetadataToken = response
            .json()
            .await
            .map_err(|e| StorageError::Auth(format!("invalid metadata token response: {}", e)))?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cache = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });

        Ok(token.access_token)
    }
}

#[async_trait]
impl ArtifactStore for GcsArtifactStore {
    fn backend(&self) -> &str {
        "gcs"
    }

    async fn save(
        &self,
        name: &str,
        content: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<SavedArtifact> {
        validate_name(name)?;
        let object = self.object_name(name);
        let token = self.access_token().await?;
        let size = content.len();
        let url = format!("{}/b/{}/o", self.upload_base, self.bucket);

        debug!(bucket = %self.bucket, object = %object, size, "Uploading artifact");

        let response = self
            .client
            .post(&url)
            .query(&[("uploadType", "media"), ("name", object.as_str())])
            .bearer_auth(token)
            .header("Content-Type", content_type)
            .body(content)
            .send()
            .await
            .map_err(|e| StorageError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %body, object = %object, "GCS upload failed");
            return Err(match status.as_u16() {
                401 | 403 => StorageError::Auth(body),
                code => StorageError::Upload {
                    status: code,
                    message: body,
                },
            });
        }

        let uri = self.object_uri(&object);
        info!(uri = %uri, size, "Artifact uploaded");

        Ok(SavedArtifact {
            name: name.to_string(),
            uri,
            size,
        })
    }
}
