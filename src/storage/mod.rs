//! Blob storage for generated artifacts.
//!
//! The gateway only needs two operations from object storage: write a blob
//! under a key (overwriting whatever is there) and read it back. Production
//! deployments use [`S3BlobStore`]; tests and single-node setups use
//! [`MemoryBlobStore`].

mod memory;
mod s3;

pub use memory::MemoryBlobStore;
pub use s3::S3BlobStore;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::config::{StorageBackend, StorageConfig};

/// Errors returned by blob stores.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Storage configuration error: {0}")]
    Config(String),
}

/// Key/blob store consumed by the artifact adapter.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `key`, replacing any existing blob.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StorageError>;

    /// Fetch the blob stored under `key`.
    async fn get(&self, key: &str) -> Result<Bytes, StorageError>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}

/// Build the configured blob store.
pub async fn build_blob_store(config: &StorageConfig) -> Result<Arc<dyn BlobStore>, StorageError> {
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryBlobStore::new())),
        StorageBackend::S3 => {
            let s3 = config.s3.as_ref().ok_or_else(|| {
                StorageError::Config("storage.s3 section is required for the s3 backend".into())
            })?;
            Ok(Arc::new(S3BlobStore::from_config(s3).await))
        }
    }
}
