//! Blob storage and metadata store configuration.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BLOB_KEY_PREFIX, DEFAULT_METADATA_KEY_PREFIX, DEFAULT_REQUEST_LOG_RETENTION,
    DEFAULT_S3_REGION,
};

fn default_blob_prefix() -> String {
    DEFAULT_BLOB_KEY_PREFIX.to_string()
}

fn default_metadata_prefix() -> String {
    DEFAULT_METADATA_KEY_PREFIX.to_string()
}

fn default_request_log_retention() -> usize {
    DEFAULT_REQUEST_LOG_RETENTION
}

fn default_region() -> String {
    DEFAULT_S3_REGION.to_string()
}

/// Blob store backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    S3,
}

/// S3-compatible bucket settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct S3StorageConfig {
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint (MinIO, Spaces, R2). AWS when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Prefix of every artifact blob key
    #[serde(default = "default_blob_prefix")]
    pub key_prefix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3StorageConfig>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            key_prefix: default_blob_prefix(),
            s3: None,
        }
    }
}

/// Metadata store backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MetadataBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetadataConfig {
    #[serde(default)]
    pub backend: MetadataBackend,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redis_url: Option<String>,
    #[serde(default = "default_metadata_prefix")]
    pub key_prefix: String,
    /// Newest request log rows kept; older rows are trimmed on append
    #[serde(default = "default_request_log_retention")]
    pub request_log_retention: usize,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            backend: MetadataBackend::default(),
            redis_url: None,
            key_prefix: default_metadata_prefix(),
            request_log_retention: default_request_log_retention(),
        }
    }
}
