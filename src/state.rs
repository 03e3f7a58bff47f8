//! Shared application state.
//!
//! Everything a handler needs, built once per process. Tests assemble the
//! same state from in-memory stores and a stub upstream client with
//! [`AppState::from_parts`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::OnceCell;

use crate::accounting::UsageAccountant;
use crate::artifact::ArtifactStore;
use crate::config::{Config, WatermarkPreset};
use crate::error::GatewayError;
use crate::metadata::{build_metadata_store, MetadataStore};
use crate::metrics::GatewayMetrics;
use crate::quota::GuestQuota;
use crate::storage::{build_blob_store, BlobStore};
use crate::upstream::{HttpUpstream, Provider, UpstreamClient};
use crate::watermark::ImageFetcher;

pub struct AppState {
    pub config: Arc<Config>,
    pub artifacts: ArtifactStore,
    pub metadata: Arc<dyn MetadataStore>,
    pub accountant: UsageAccountant,
    pub quota: GuestQuota,
    pub upstream: Arc<dyn UpstreamClient>,
    pub providers: HashMap<String, Provider>,
    pub watermark_fetcher: ImageFetcher,
    pub metrics: Arc<GatewayMetrics>,
    pub started_at: Instant,
}

impl AppState {
    /// Assemble state from already-built backends.
    pub fn from_parts(
        config: Config,
        blobs: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
        upstream: Arc<dyn UpstreamClient>,
    ) -> Result<Self, GatewayError> {
        let metrics = Arc::new(
            GatewayMetrics::new()
                .map_err(|e| GatewayError::Internal(format!("metrics registry: {}", e)))?,
        );

        let providers = config
            .providers
            .iter()
            .map(|(name, provider)| {
                Provider::new(name.clone(), provider.clone(), Arc::clone(&upstream))
                    .map(|p| (name.clone(), p))
            })
            .collect::<Result<HashMap<_, _>, _>>()?;

        let watermark_fetcher =
            ImageFetcher::new(&config.watermark.fetcher, Some(Arc::clone(&blobs)))?;

        let artifacts = ArtifactStore::new(
            Arc::clone(&blobs),
            Arc::clone(&metadata),
            config.storage.key_prefix.clone(),
        )
        .with_metrics(Arc::clone(&metrics));
        let accountant =
            UsageAccountant::new(Arc::clone(&metadata)).with_metrics(Arc::clone(&metrics));
        let quota = GuestQuota::new(config.quota.clone(), Arc::clone(&metadata))
            .with_metrics(Arc::clone(&metrics));

        Ok(Self {
            config: Arc::new(config),
            artifacts,
            metadata,
            accountant,
            quota,
            upstream,
            providers,
            watermark_fetcher,
            metrics,
            started_at: Instant::now(),
        })
    }

    /// Build the configured backends and assemble state.
    pub async fn from_config(config: Config) -> Result<Self, String> {
        let blobs = build_blob_store(&config.storage)
            .await
            .map_err(|e| format!("Failed to initialize blob store: {}", e))?;
        let metadata = build_metadata_store(&config.metadata)
            .await
            .map_err(|e| format!("Failed to initialize metadata store: {}", e))?;
        let upstream: Arc<dyn UpstreamClient> =
            Arc::new(HttpUpstream::new().map_err(|e| e.to_string())?);

        tracing::info!(
            blob_store = blobs.backend_name(),
            metadata_store = metadata.backend_name(),
            providers = config.providers.len(),
            presets = config.watermark.presets.len(),
            "Backends initialized"
        );

        Self::from_parts(config, blobs, metadata, upstream).map_err(|e| e.to_string())
    }

    pub fn creator(&self) -> &str {
        &self.config.server.creator
    }

    /// Provider configured for `endpoint`; unconfigured endpoints are
    /// unavailable rather than broken.
    pub fn provider(&self, endpoint: &str) -> Result<&Provider, GatewayError> {
        self.providers.get(endpoint).ok_or_else(|| {
            GatewayError::Unavailable(format!("endpoint {} is not configured", endpoint))
        })
    }

    pub fn preset(&self, endpoint: &str) -> Result<&WatermarkPreset, GatewayError> {
        self.config.watermark.preset(endpoint).ok_or_else(|| {
            GatewayError::Unavailable(format!("watermark preset {} is not configured", endpoint))
        })
    }

    /// Link to a stored result, absolute when a public base URL is set.
    pub fn result_url(&self, kind: &str, id: &str) -> String {
        self.config
            .server
            .public_url(&format!("/api/result/{}/{}", kind, id))
    }
}

/// [`AppState`] built on the first request.
///
/// Backend clients spawn driver tasks on the runtime that builds them, and
/// the daemon fork keeps only the calling thread. Building inside the
/// serving runtime keeps those tasks alive in the forked process. A failed
/// build is retried by the next request.
pub struct LazyState {
    config: Config,
    cell: OnceCell<Arc<AppState>>,
}

impl LazyState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            cell: OnceCell::new(),
        }
    }

    /// Wrap state that is already assembled.
    pub fn ready(state: AppState) -> Self {
        Self {
            config: state.config.as_ref().clone(),
            cell: OnceCell::new_with(Some(Arc::new(state))),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_ready(&self) -> bool {
        self.cell.initialized()
    }

    pub async fn get(&self) -> Result<&Arc<AppState>, String> {
        self.cell
            .get_or_try_init(|| async {
                AppState::from_config(self.config.clone()).await.map(Arc::new)
            })
            .await
    }
}
