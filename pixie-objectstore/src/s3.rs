use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;

use crate::{ObjectStore, ObjectStoreError};

const DEFAULT_REGION: &str = "us-east-1";

/// Talks to an S3-compatible endpoint with forced path-style addressing.
/// Never assumes TLS — the scheme is whatever `endpoint` itself carries
/// (`http://` for local MinIO-style deployments, `https://` otherwise).
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(endpoint: &str, access_key: &str, secret_key: &str, bucket: &str) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "pixie-static");
        let config = aws_sdk_s3::Config::builder()
            .endpoint_url(endpoint)
            .region(Region::new(DEFAULT_REGION))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(config),
            bucket: bucket.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), ObjectStoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| ObjectStoreError::Transport(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<(Bytes, String), ObjectStoreError> {
        let result = self.client.get_object().bucket(&self.bucket).key(key).send().await;

        let output = match result {
            Ok(output) => output,
            Err(SdkError::ServiceError(err)) if matches!(err.err(), GetObjectError::NoSuchKey(_)) => {
                return Err(ObjectStoreError::NotFound(key.to_string()));
            }
            Err(e) => return Err(ObjectStoreError::Transport(e.to_string())),
        };

        let content_type = output.content_type().unwrap_or("application/octet-stream").to_string();
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| ObjectStoreError::Transport(e.to_string()))?
            .into_bytes();

        Ok((bytes, content_type))
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Transport(e.to_string()))?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        match self.client.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(err)) if err.raw().status().as_u16() == 404 => Ok(false),
            Err(e) => Err(ObjectStoreError::Transport(e.to_string())),
        }
    }

    async fn ensure_bucket(&self) -> Result<(), ObjectStoreError> {
        match self.client.create_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(()),
            Err(SdkError::ServiceError(err)) => {
                let code = err.err().meta().code().unwrap_or_default();
                if code == "BucketAlreadyOwnedByYou" || code == "BucketAlreadyExists" {
                    Ok(())
                } else {
                    Err(ObjectStoreError::Transport(err.err().to_string()))
                }
            }
            Err(e) => Err(ObjectStoreError::Transport(e.to_string())),
        }
    }
}
