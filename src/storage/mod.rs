//! Storage - Artifact Upload to Object Storage
//!
//! ## Responsibilities
//!
//! - Upload finished recording artifacts to S3
//! - Hand back a durable https URL for alerting
//!
//! Uploads happen once per finished recording; a failure leaves the
//! artifact on local disk for manual recovery.

use crate::error::{Error, Result};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use std::path::Path;

/// The object store boundary.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload a local file under `object_key`, returning a durable URL.
    async fn upload(&self, local_path: &Path, object_key: &str) -> Result<String>;
}

/// S3-backed object store
pub struct S3Storage {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(client: aws_sdk_s3::Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    /// Build a client from the ambient AWS environment
    pub async fn from_env(bucket: String) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(aws_sdk_s3::Client::new(&config), bucket)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for S3Storage {
    async fn upload(&self, local_path: &Path, object_key: &str) -> Result<String> {
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| Error::Upload(format!("cannot read {}: {}", local_path.display(), e)))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(object_key)
            .content_type("video/mp4")
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Upload(format!("put_object failed: {}", e)))?;

        let url = format!("https://{}.s3.amazonaws.com/{}", self.bucket, object_key);
        tracing::info!(
            key = %object_key,
            url = %url,
            "Artifact uploaded"
        );
        Ok(url)
    }
}
