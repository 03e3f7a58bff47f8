//! Watermark asset fetcher with optional caching.
//!
//! # Supported Sources
//!
//! - `store://path/to/key` - read from the artifact blob store
//! - `https://example.com/logo.png` (or `http://`) - fetched over HTTP
//!
//! Assets are kept as raw encoded bytes; decoding happens inside the
//! compositor so that empty buffers are rejected before any image-library
//! call. The in-memory cache is off unless configured.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use moka::future::Cache;

use super::WatermarkError;
use crate::config::WatermarkFetcherConfig;
use crate::storage::BlobStore;

/// Parsed source location for watermark images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Key inside the configured blob store.
    Store { key: String },
    /// Remote HTTP(S) URL.
    Remote(String),
}

impl ImageSource {
    /// Parse a source string.
    pub fn parse(source: &str) -> Result<Self, WatermarkError> {
        if let Some(key) = source.strip_prefix("store://") {
            if key.is_empty() {
                return Err(WatermarkError::ConfigError(format!(
                    "Invalid store source: {source}. Expected store://key"
                )));
            }
            Ok(ImageSource::Store {
                key: key.to_string(),
            })
        } else if source.starts_with("https://") || source.starts_with("http://") {
            Ok(ImageSource::Remote(source.to_string()))
        } else {
            Err(WatermarkError::ConfigError(format!(
                "Unsupported source protocol: {source}. Use store:// or https://"
            )))
        }
    }

    /// Get a cache key for this source.
    pub fn cache_key(&self) -> String {
        match self {
            ImageSource::Store { key } => format!("store://{key}"),
            ImageSource::Remote(url) => url.clone(),
        }
    }
}

/// Fetcher for watermark assets.
#[derive(Clone)]
pub struct ImageFetcher {
    cache: Option<Cache<String, Bytes>>,
    http_client: reqwest::Client,
    blob_store: Option<Arc<dyn BlobStore>>,
}

impl ImageFetcher {
    /// Create a new fetcher.
    ///
    /// `blob_store` is required to resolve `store://` sources.
    pub fn new(
        config: &WatermarkFetcherConfig,
        blob_store: Option<Arc<dyn BlobStore>>,
    ) -> Result<Self, WatermarkError> {
        let cache = config.cache_enabled.then(|| {
            Cache::builder()
                .max_capacity(config.max_cache_entries)
                .time_to_live(Duration::from_secs(config.cache_ttl_secs))
                .build()
        });

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                WatermarkError::ConfigError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            cache,
            http_client,
            blob_store,
        })
    }

    /// Fetch the raw bytes of a watermark asset.
    pub async fn fetch(&self, source: &str) -> Result<Bytes, WatermarkError> {
        let parsed = ImageSource::parse(source)?;
        let cache_key = parsed.cache_key();

        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(&cache_key).await {
                return Ok(cached);
            }
        }

        let data = match &parsed {
            ImageSource::Store { key } => self.fetch_from_store(key).await?,
            ImageSource::Remote(url) => self.fetch_from_http(url).await?,
        };

        if data.is_empty() {
            return Err(WatermarkError::EmptyInput("watermark"));
        }

        if let Some(cache) = &self.cache {
            cache.insert(cache_key, data.clone()).await;
        }

        Ok(data)
    }

    async fn fetch_from_store(&self, key: &str) -> Result<Bytes, WatermarkError> {
        let store = self.blob_store.as_ref().ok_or_else(|| {
            WatermarkError::FetchError("blob store required for store:// sources".to_string())
        })?;

        store
            .get(key)
            .await
            .map_err(|e| WatermarkError::FetchError(format!("store fetch failed: {e}")))
    }

    async fn fetch_from_http(&self, url: &str) -> Result<Bytes, WatermarkError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| WatermarkError::FetchError(format!("HTTP fetch failed: {e}")))?;

        if !response.status().is_success() {
            return Err(WatermarkError::FetchError(format!(
                "HTTP request failed with status: {}",
                response.status()
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| WatermarkError::FetchError(format!("Failed to read HTTP body: {e}")))
    }

    /// Number of cached assets (0 when caching is disabled).
    pub fn cache_size(&self) -> u64 {
        self.cache.as_ref().map(|c| c.entry_count()).unwrap_or(0)
    }
}
