//! Artifact store adapter.
//!
//! Generates artifact ids, uploads blobs and writes the metadata row that
//! makes a result retrievable. Order matters: the id exists before any
//! upload, and the primary blob is uploaded before the row is inserted, so a
//! row never points at a blob that was never written.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use uuid::Uuid;

use crate::error::GatewayError;
use crate::metadata::{ArtifactKind, ArtifactRecord, MetadataStore};
use crate::metrics::GatewayMetrics;
use crate::storage::{BlobStore, StorageError};

/// Identifier shared by an artifact's blobs and its metadata row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactId(String);

impl ArtifactId {
    pub const LEN: usize = 16;

    /// 16 lowercase hex characters taken from a v4 UUID.
    pub fn generate() -> Self {
        let simple = Uuid::new_v4().simple().to_string();
        Self(simple[..Self::LEN].to_string())
    }

    /// Accept only ids of the generated shape.
    pub fn parse(value: &str) -> Option<Self> {
        let valid = value.len() == Self::LEN
            && value
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        valid.then(|| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// File extension for a content type; `bin` when unknown.
pub fn extension_for(content_type: &str) -> &'static str {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    match essence.to_ascii_lowercase().as_str() {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/mp4" | "audio/x-m4a" | "audio/aac" => "m4a",
        "audio/ogg" => "ogg",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/webm" => "webm",
        _ => "bin",
    }
}

/// A blob waiting to be uploaded.
#[derive(Debug, Clone, PartialEq)]
pub struct BlobPayload {
    pub data: Bytes,
    pub content_type: String,
}

impl BlobPayload {
    pub fn new(data: Bytes, content_type: impl Into<String>) -> Self {
        Self {
            data,
            content_type: content_type.into(),
        }
    }
}

/// Where the blobs of one artifact ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlobs {
    pub primary_path: String,
    pub primary_content_type: String,
    pub secondary_path: Option<String>,
    pub secondary_content_type: Option<String>,
}

/// Which blob of an artifact to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobRole {
    Primary,
    Secondary,
}

/// Optional display metadata attached to a record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub thumbnail: Option<String>,
}

#[derive(Clone)]
pub struct ArtifactStore {
    blobs: Arc<dyn BlobStore>,
    metadata: Arc<dyn MetadataStore>,
    key_prefix: String,
    metrics: Option<Arc<GatewayMetrics>>,
}

impl ArtifactStore {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            blobs,
            metadata,
            key_prefix: key_prefix.into().trim_matches('/').to_string(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<GatewayMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn blob_store(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataStore> {
        &self.metadata
    }

    fn key_base(&self, kind: ArtifactKind) -> String {
        if self.key_prefix.is_empty() {
            kind.as_str().to_string()
        } else {
            format!("{}/{}", self.key_prefix, kind)
        }
    }

    /// `{prefix}/{kind}/{id}.{ext}`
    pub fn primary_key(&self, kind: ArtifactKind, id: &ArtifactId, content_type: &str) -> String {
        format!("{}/{}.{}", self.key_base(kind), id, extension_for(content_type))
    }

    /// `{prefix}/{kind}/{id}-{role}.{ext}`
    pub fn secondary_key(
        &self,
        kind: ArtifactKind,
        id: &ArtifactId,
        role: &str,
        content_type: &str,
    ) -> String {
        format!(
            "{}/{}-{}.{}",
            self.key_base(kind),
            id,
            role,
            extension_for(content_type)
        )
    }

    fn count_upload(&self, kind: ArtifactKind, success: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_upload(kind.as_str(), success);
        }
    }

    /// Upload the primary blob and, optionally, one secondary blob.
    ///
    /// A primary failure aborts. A secondary failure is logged and the
    /// secondary is reported absent.
    pub async fn store(
        &self,
        kind: ArtifactKind,
        id: &ArtifactId,
        primary: BlobPayload,
        secondary: Option<(&str, BlobPayload)>,
    ) -> Result<StoredBlobs, GatewayError> {
        let primary_path = self.primary_key(kind, id, &primary.content_type);
        if let Err(e) = self
            .blobs
            .put(&primary_path, primary.data, &primary.content_type)
            .await
        {
            self.count_upload(kind, false);
            tracing::error!(artifact_id = %id, key = %primary_path, error = %e, "Primary upload failed");
            return Err(e.into());
        }
        self.count_upload(kind, true);

        let mut stored = StoredBlobs {
            primary_path,
            primary_content_type: primary.content_type,
            secondary_path: None,
            secondary_content_type: None,
        };

        if let Some((role, payload)) = secondary {
            let path = self.secondary_key(kind, id, role, &payload.content_type);
            match self.blobs.put(&path, payload.data, &payload.content_type).await {
                Ok(()) => {
                    self.count_upload(kind, true);
                    stored.secondary_path = Some(path);
                    stored.secondary_content_type = Some(payload.content_type);
                }
                Err(e) => {
                    self.count_upload(kind, false);
                    tracing::warn!(
                        artifact_id = %id,
                        key = %path,
                        role = role,
                        error = %e,
                        "Secondary upload failed, continuing without it"
                    );
                }
            }
        }

        Ok(stored)
    }

    /// Insert the metadata row; fails if the id is already taken.
    pub async fn record_metadata(&self, record: &ArtifactRecord) -> Result<(), GatewayError> {
        self.metadata.insert_artifact(record).await?;
        Ok(())
    }

    /// Insert or overwrite the metadata row.
    pub async fn upsert_metadata(&self, record: &ArtifactRecord) -> Result<(), GatewayError> {
        self.metadata.upsert_artifact(record).await?;
        Ok(())
    }

    /// Upload blobs and record the row in one step.
    #[allow(clippy::too_many_arguments)]
    pub async fn persist(
        &self,
        kind: ArtifactKind,
        endpoint: &str,
        params: serde_json::Value,
        primary: BlobPayload,
        secondary: Option<(&str, BlobPayload)>,
        display: DisplayInfo,
    ) -> Result<ArtifactRecord, GatewayError> {
        let id = ArtifactId::generate();
        let stored = self.store(kind, &id, primary, secondary).await?;

        let record = ArtifactRecord {
            id: id.to_string(),
            kind,
            endpoint: endpoint.to_string(),
            params,
            primary_path: stored.primary_path,
            primary_content_type: stored.primary_content_type,
            secondary_path: stored.secondary_path,
            secondary_content_type: stored.secondary_content_type,
            title: display.title,
            author: display.author,
            thumbnail: display.thumbnail,
            created_at: Utc::now(),
        };
        self.record_metadata(&record).await?;

        tracing::info!(artifact_id = %record.id, endpoint = endpoint, kind = %kind, "Artifact stored");
        Ok(record)
    }

    /// Look up a record by id. Malformed and unknown ids are `NotFound`.
    pub async fn load(&self, id: &str) -> Result<ArtifactRecord, GatewayError> {
        let id = ArtifactId::parse(id)
            .ok_or_else(|| GatewayError::NotFound(format!("result {} not found", id)))?;
        self.metadata
            .get_artifact(id.as_str())
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("result {} not found", id)))
    }

    /// Read one blob of a record, with its content type.
    ///
    /// A missing secondary is `NotFound`. A missing primary means the store
    /// lost data the row promises, which is a storage error.
    pub async fn load_blob(
        &self,
        record: &ArtifactRecord,
        role: BlobRole,
    ) -> Result<(Bytes, String), GatewayError> {
        let (path, content_type) = match role {
            BlobRole::Primary => (
                record.primary_path.as_str(),
                record.primary_content_type.clone(),
            ),
            BlobRole::Secondary => match (&record.secondary_path, &record.secondary_content_type) {
                (Some(path), content_type) => (
                    path.as_str(),
                    content_type
                        .clone()
                        .unwrap_or_else(|| "application/octet-stream".to_string()),
                ),
                (None, _) => {
                    return Err(GatewayError::NotFound(format!(
                        "result {} has no secondary file",
                        record.id
                    )))
                }
            },
        };

        let data = self.blobs.get(path).await.map_err(|e| match e {
            StorageError::NotFound(key) => {
                StorageError::Backend(format!("blob {} missing for recorded artifact", key))
            }
            other => other,
        })?;
        Ok((data, content_type))
    }
}
