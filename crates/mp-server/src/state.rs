//! Shared handles built once at startup.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use mp_agents::{CityInfoPipeline, EventReportPipeline};
use mp_core::Provider;
use mp_providers::GeminiProvider;
use mp_storage::{
    ArtifactStore, GcsArtifactStore, LocalArtifactStore, MemoryArtifactStore, TokenSource,
};

use crate::config::{Config, StorageBackend};

#[derive(Clone)]
pub struct AppState {
    pub events: Arc<EventReportPipeline>,
    pub city: Arc<CityInfoPipeline>,
}

impl AppState {
    pub fn new(provider: Arc<dyn Provider>, store: Arc<dyn ArtifactStore>, config: &Config) -> Self {
        let mut events = EventReportPipeline::new(Arc::clone(&provider), config.models.clone());
        if config.storage.persist_event_summaries {
            events = events.with_store(Arc::clone(&store));
        }

        let city = CityInfoPipeline::new(provider, config.models.clone(), store)
            .with_max_attempts(config.pipeline.max_validation_attempts);

        Self {
            events: Arc::new(events),
            city: Arc::new(city),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = build_provider(config)?;
        let store = build_store(config)?;
        Ok(Self::new(provider, store, config))
    }
}

pub fn build_provider(config: &Config) -> Result<Arc<dyn Provider>> {
    let gemini = &config.gemini;
    let api_key = gemini.api_key.clone().context(
        "No Gemini API key configured. Set GOOGLE_API_KEY or gemini.api_key in the config file",
    )?;

    let mut provider = GeminiProvider::with_timeout(api_key, Duration::from_secs(gemini.timeout_secs))
        .with_max_retries(gemini.max_retries);
    if let Some(base_url) = &gemini.base_url {
        provider = provider.with_base_url(base_url);
    }
    if let Some(model) = &gemini.default_model {
        provider = provider.with_default_model(model);
    }

    Ok(Arc::new(provider))
}

pub fn build_store(config: &Config) -> Result<Arc<dyn ArtifactStore>> {
    let storage = &config.storage;
    let store: Arc<dyn ArtifactStore> = match storage.resolved_backend() {
        StorageBackend::Gcs => {
            let bucket = storage
                .bucket
                .clone()
                .context("GCS storage needs a bucket. Set GOOGLE_CLOUD_STAGING_BUCKET")?;
            let token_source = match &storage.access_token {
                Some(token) => TokenSource::Static(token.clone()),
                None => TokenSource::metadata(),
            };
            let mut store = GcsArtifactStore::new(bucket, token_source)?;
            if let Some(prefix) = &storage.prefix {
                store = store.with_prefix(prefix);
            }
            Arc::new(store)
        }
        StorageBackend::Local | StorageBackend::Auto => {
            Arc::new(LocalArtifactStore::new(storage.local_dir.clone()))
        }
        StorageBackend::Memory => Arc::new(MemoryArtifactStore::new()),
    };

    info!(backend = store.backend(), "Artifact store ready");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_requires_api_key() {
        let err = build_provider(&Config::default()).err().unwrap();
        assert!(err.to_string().contains("GOOGLE_API_KEY"));
    }

    #[test]
    fn test_store_selection() {
        let mut config = Config::default();
        config.storage.backend = StorageBackend::Memory;
        assert_eq!(build_store(&config).unwrap().backend(), "memory");

        config.storage.backend = StorageBackend::Auto;
        config.storage.bucket = Some("metropulse-staging".to_string());
        config.storage.access_token = Some("token".to_string());
        assert_eq!(build_store(&config).unwrap().backend(), "gcs");
    }

    #[test]
    fn test_gcs_without_bucket_fails() {
        let mut config = Config::default();
        config.storage.backend = StorageBackend::Gcs;
        assert!(build_store(&config).is_err());
    }
}
