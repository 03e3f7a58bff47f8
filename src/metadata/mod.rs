//! Metadata store: artifact rows, usage counters, request log, guest usage
//! windows, maintenance flag and server status.
//!
//! Two backends ship with the gateway: Redis for deployments and an
//! in-memory map for tests and single-node runs. Counter and guest-window
//! increments use the backend's atomic increment, so concurrent requests
//! never lose updates.

mod memory;
pub mod models;
mod redis_store;

pub use memory::MemoryMetadataStore;
pub use redis_store::RedisMetadataStore;
pub use models::{
    ArtifactKind, ArtifactRecord, Counter, MaintenanceState, RequestLogEntry, ServerStatus,
    UsageCounters,
};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::config::{MetadataBackend, MetadataConfig};

/// Errors returned by metadata stores.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Artifact {0} already exists")]
    Conflict(String),

    #[error("Metadata backend error: {0}")]
    Backend(String),

    #[error("Metadata serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Metadata configuration error: {0}")]
    Config(String),
}

impl From<redis::RedisError> for MetadataError {
    fn from(err: redis::RedisError) -> Self {
        MetadataError::Backend(err.to_string())
    }
}

/// Row/key store consumed by the gateway.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert an artifact row; fails with `Conflict` if the id exists.
    async fn insert_artifact(&self, record: &ArtifactRecord) -> Result<(), MetadataError>;

    /// Insert or overwrite an artifact row.
    async fn upsert_artifact(&self, record: &ArtifactRecord) -> Result<(), MetadataError>;

    async fn get_artifact(&self, id: &str) -> Result<Option<ArtifactRecord>, MetadataError>;

    /// Atomically increment a counter, returning the new value.
    async fn increment_counter(&self, counter: Counter) -> Result<u64, MetadataError>;

    async fn counters(&self) -> Result<UsageCounters, MetadataError>;

    async fn append_request_log(&self, entry: &RequestLogEntry) -> Result<(), MetadataError>;

    /// Most recent request log rows, newest first.
    async fn recent_request_logs(
        &self,
        limit: usize,
    ) -> Result<Vec<RequestLogEntry>, MetadataError>;

    /// Atomically increment the guest window for (`ip`, `week_start`).
    ///
    /// `retention` bounds the window's lifetime when set; it is applied when
    /// the window is created.
    async fn increment_guest_usage(
        &self,
        ip: &str,
        week_start: NaiveDate,
        retention: Option<Duration>,
    ) -> Result<u64, MetadataError>;

    async fn guest_usage(&self, ip: &str, week_start: NaiveDate) -> Result<u64, MetadataError>;

    async fn maintenance(&self) -> Result<MaintenanceState, MetadataError>;

    async fn set_maintenance(&self, state: &MaintenanceState) -> Result<(), MetadataError>;

    async fn server_status(&self) -> Result<ServerStatus, MetadataError>;

    async fn set_server_status(&self, status: &ServerStatus) -> Result<(), MetadataError>;

    fn backend_name(&self) -> &'static str;
}

/// Build the configured metadata store.
pub async fn build_metadata_store(
    config: &MetadataConfig,
) -> Result<Arc<dyn MetadataStore>, MetadataError> {
    match config.backend {
        MetadataBackend::Memory => Ok(Arc::new(
            MemoryMetadataStore::new().with_request_log_retention(config.request_log_retention),
        )),
        MetadataBackend::Redis => {
            let url = config.redis_url.as_deref().ok_or_else(|| {
                MetadataError::Config("metadata.redis_url is required for the redis backend".into())
            })?;
            let store = RedisMetadataStore::connect(url, config.key_prefix.clone())
                .await?
                .with_request_log_retention(config.request_log_retention);
            Ok(Arc::new(store))
        }
    }
}
