use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use mp_agents::AgentModels;

const ENV_PREFIX: &str = "METROPULSE_";
const LOCAL_CONFIG_FILE: &str = "metropulse.toml";
const REDACTED: &str = "********";
pub const DEFAULT_BODY_LIMIT: usize = 50 * 1024 * 1024;

/// Effective configuration: defaults, then TOML file, then `METROPULSE_*` env.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub gemini: GeminiConfig,
    pub models: AgentModels,
    pub storage: StorageConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Maximum request body size in bytes (uploads included)
    pub body_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Model for requests that name none; agents normally pick their own
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,

    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            default_model: None,
            timeout_secs: 300,
            max_retries: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// GCS when a bucket is configured, otherwise the local directory
    #[default]
    Auto,
    Gcs,
    Local,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,

    /// Object name prefix inside the bucket
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    /// Static OAuth token; the metadata server is used when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    pub local_dir: PathBuf,

    /// Also store event summaries, not just city data
    pub persist_event_summaries: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Auto,
            bucket: None,
            prefix: None,
            access_token: None,
            local_dir: PathBuf::from("artifacts"),
            persist_event_summaries: false,
        }
    }
}

impl StorageConfig {
    pub fn resolved_backend(&self) -> StorageBackend {
        match self.backend {
            StorageBackend::Auto if self.bucket.is_some() => StorageBackend::Gcs,
            StorageBackend::Auto => StorageBackend::Local,
            backend => backend,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// City data validations before giving up, counting the first
    pub max_validation_attempts: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_validation_attempts: mp_agents::MAX_VALIDATION_ATTEMPTS,
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from the first default location that exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => {
                if !p.exists() {
                    anyhow::bail!("Config file not found: {}", p.display());
                }
                Some(p.to_path_buf())
            }
            None => Self::default_paths().into_iter().find(|p| p.exists()),
        };

        if let Some(file) = &file {
            tracing::debug!(path = %file.display(), "Loading config file");
        }

        let mut config: Config = Self::figment(file.as_deref(), ENV_PREFIX)
            .extract()
            .context("Invalid configuration")?;
        config.apply_env_fallbacks(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn figment(file: Option<&Path>, env_prefix: &str) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(env_prefix).split("__"))
    }

    /// Fill unset values from the conventional Google environment variables.
    pub fn apply_env_fallbacks(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if self.gemini.api_key.is_none() {
            self.gemini.api_key = lookup("GOOGLE_API_KEY").or_else(|| lookup("GEMINI_API_KEY"));
        }
        if self.storage.bucket.is_none() {
            self.storage.bucket = lookup("GOOGLE_CLOUD_STAGING_BUCKET")
                .map(|b| b.trim().trim_start_matches("gs://").to_string());
        }
        if self.storage.access_token.is_none() {
            self.storage.access_token = lookup("GOOGLE_OAUTH_ACCESS_TOKEN");
        }
    }

    /// Copy of the configuration that is safe to print.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.gemini.api_key.is_some() {
            config.gemini.api_key = Some(REDACTED.to_string());
        }
        if config.storage.access_token.is_some() {
            config.storage.access_token = Some(REDACTED.to_string());
        }
        config
    }

    fn default_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Ok(path) = Self::config_path() {
            paths.push(path);
        }
        paths
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("metropulse").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.body_limit, 50 * 1024 * 1024);
        assert_eq!(config.pipeline.max_validation_attempts, 3);
        assert_eq!(config.storage.resolved_backend(), StorageBackend::Local);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
            [server]
            port = 9000

            [gemini]
            api_key = "test-key"

            [models]
            corrector = "gemini-2.5-pro"

            [storage]
            backend = "gcs"
            bucket = "metropulse-staging"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.gemini.api_key.as_deref(), Some("test-key"));
        assert_eq!(config.models.corrector.as_deref(), Some("gemini-2.5-pro"));
        assert_eq!(config.storage.resolved_backend(), StorageBackend::Gcs);
    }

    #[test]
    fn test_layering_file_then_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metropulse.toml");
        std::fs::write(
            &path,
            "[server]\nport = 9000\nhost = \"127.0.0.1\"\n\n[storage]\nbackend = \"memory\"\n",
        )
        .unwrap();

        // Unique prefix so parallel tests never see these variables
        std::env::set_var("MPTEST_LAYERING_SERVER__PORT", "9100");

        let config: Config = Config::figment(Some(&path), "MPTEST_LAYERING_")
            .extract()
            .unwrap();
        std::env::remove_var("MPTEST_LAYERING_SERVER__PORT");

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.server.body_limit, DEFAULT_BODY_LIMIT);
    }

    #[test]
    fn test_env_fallbacks() {
        let env: HashMap<&str, &str> = [
            ("GEMINI_API_KEY", "gemini-key"),
            ("GOOGLE_CLOUD_STAGING_BUCKET", "gs://metropulse-staging"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env_fallbacks(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.gemini.api_key.as_deref(), Some("gemini-key"));
        assert_eq!(config.storage.bucket.as_deref(), Some("metropulse-staging"));
        assert_eq!(config.storage.resolved_backend(), StorageBackend::Gcs);
        assert!(config.storage.access_token.is_none());
    }

    #[test]
    fn test_fallbacks_do_not_override_explicit_values() {
        let mut config = Config::default();
        config.gemini.api_key = Some("from-file".to_string());
        config.apply_env_fallbacks(|_| Some("from-env".to_string()));
        assert_eq!(config.gemini.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_redacted_hides_secrets() {
        let mut config = Config::default();
        config.gemini.api_key = Some("AIza-secret".to_string());
        config.storage.access_token = Some("ya29.secret".to_string());

        let printed = toml::to_string_pretty(&config.redacted()).unwrap();
        assert!(!printed.contains("secret"));
        assert!(printed.contains(REDACTED));
    }
}
