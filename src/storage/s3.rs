// S3-compatible blob store (AWS, MinIO, DigitalOcean Spaces, R2, ...)

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;

use super::{BlobStore, StorageError};
use crate::config::S3StorageConfig;

/// Blob store writing to a single S3 bucket.
#[derive(Debug, Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    /// Build a client from configuration.
    ///
    /// Static credentials are used when both keys are configured, otherwise
    /// the default AWS provider chain applies.
    pub async fn from_config(config: &S3StorageConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
            loader = loader.credentials_provider(aws_credential_types::Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                "kagami-config",
            ));
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();

        Self::new(Client::from_conf(s3_config), config.bucket.clone())
    }

    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| {
                StorageError::Backend(format!(
                    "put_object {}/{} failed: {}",
                    self.bucket,
                    key,
                    e.into_service_error()
                ))
            })?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    StorageError::NotFound(key.to_string())
                } else {
                    StorageError::Backend(format!(
                        "get_object {}/{} failed: {}",
                        self.bucket, key, service_error
                    ))
                }
            })?;

        let body = object
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Backend(format!("failed to read {}: {}", key, e)))?;

        Ok(body.into_bytes())
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}
