// Configuration module
//
// YAML configuration with `${VAR}` environment substitution. Every section
// except `server` is optional and falls back to defaults that run the
// gateway fully in memory.

mod providers;
mod quota;
mod server;
mod storage;
mod watermark;

pub use providers::{ProviderConfig, ProviderMethod};
pub use quota::QuotaConfig;
pub use server::{LogFormat, ServerConfig};
pub use storage::{MetadataBackend, MetadataConfig, S3StorageConfig, StorageBackend, StorageConfig};
pub use watermark::{WatermarkConfig, WatermarkFetcherConfig, WatermarkPreset};

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::constants::MAX_LOG_PAGE_SIZE;
use crate::upstream::UrlTemplate;
use crate::watermark::ImageSource;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    /// Upstream providers keyed by endpoint name
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
    #[serde(default)]
    pub watermark: WatermarkConfig,
}

impl Config {
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, String> {
        // Replace ${VAR_NAME} with environment variable values
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").map_err(|e| e.to_string())?;

        let mut missing = Vec::new();
        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            let var_name = &caps[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    missing.push(var_name.to_string());
                    String::new()
                }
            }
        });

        if let Some(var_name) = missing.first() {
            return Err(format!(
                "Environment variable '{}' is referenced but not set",
                var_name
            ));
        }

        serde_yaml::from_str(&substituted).map_err(|e| e.to_string())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_yaml_with_env(&yaml)
    }

    pub fn provider(&self, endpoint: &str) -> Option<&ProviderConfig> {
        self.providers.get(endpoint)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server.address.is_empty() {
            return Err("server.address cannot be empty".to_string());
        }

        if let Some(base) = &self.server.public_base_url {
            if !(base.starts_with("http://") || base.starts_with("https://")) {
                return Err(format!(
                    "server.public_base_url '{}' must start with http:// or https://",
                    base
                ));
            }
        }

        if matches!(self.server.admin_secret.as_deref(), Some("")) {
            return Err("server.admin_secret cannot be empty when set".to_string());
        }

        if self.storage.backend == StorageBackend::S3 {
            match &self.storage.s3 {
                None => return Err("storage.s3 is required when backend is s3".to_string()),
                Some(s3) if s3.bucket.is_empty() => {
                    return Err("storage.s3.bucket cannot be empty".to_string())
                }
                Some(s3) if s3.access_key.is_some() != s3.secret_key.is_some() => {
                    return Err(
                        "storage.s3 access_key and secret_key must be set together".to_string()
                    )
                }
                Some(_) => {}
            }
        }

        if self.metadata.backend == MetadataBackend::Redis && self.metadata.redis_url.is_none() {
            return Err("metadata.redis_url is required when backend is redis".to_string());
        }
        if self.metadata.request_log_retention < MAX_LOG_PAGE_SIZE {
            return Err(format!(
                "metadata.request_log_retention must be at least {}, got {}",
                MAX_LOG_PAGE_SIZE, self.metadata.request_log_retention
            ));
        }

        for (name, provider) in &self.providers {
            UrlTemplate::parse(&provider.url)
                .map_err(|e| format!("Provider '{}' has an invalid url template: {}", name, e))?;
        }

        for (name, preset) in &self.watermark.presets {
            if !(1..=100).contains(&preset.size) {
                return Err(format!(
                    "Watermark preset '{}' size must be 1-100, got {}",
                    name, preset.size
                ));
            }
            if !(1..=100).contains(&preset.opacity) {
                return Err(format!(
                    "Watermark preset '{}' opacity must be 1-100, got {}",
                    name, preset.opacity
                ));
            }
            preset
                .anchor()
                .map_err(|e| format!("Watermark preset '{}': {}", name, e))?;
            ImageSource::parse(&preset.source)
                .map_err(|e| format!("Watermark preset '{}': {}", name, e))?;
        }

        // Watermarking generators need a preset to know which asset to apply
        for endpoint in ["text2img", "imagine"] {
            if self.providers.contains_key(endpoint) && self.watermark.preset(endpoint).is_none() {
                return Err(format!(
                    "Provider '{}' is configured but watermark preset '{}' is missing",
                    endpoint, endpoint
                ));
            }
        }

        Ok(())
    }
}
