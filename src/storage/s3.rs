//! AWS S3 object storage.
//!
//! Every object lives directly under the bucket root. `PutObject` replaces an
//! object atomically, which is what makes publishing all-or-nothing.
//! Conditional writes use `If-None-Match: *` for create-only puts and
//! `If-Match: <etag>` for compare-and-swap.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream;

use crate::error::{AppError, Result};
use crate::storage::{ObjectStore, VersionedObject};

/// S3-based object storage.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Create a new S3 storage instance.
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Create S3 storage from a loaded SDK configuration.
    pub fn from_sdk_config(sdk_config: &aws_config::SdkConfig, bucket: impl Into<String>) -> Self {
        Self::new(Client::new(sdk_config), bucket)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// `CopySource` value for a key in this bucket.
    fn copy_source(&self, key: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(key.as_bytes()).collect();
        format!("{}/{}", self.bucket, encoded)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn copy(&self, src_key: &str, dst_key: &str) -> Result<()> {
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(self.copy_source(src_key))
            .key(dst_key)
            .send()
            .await
            .map_err(|err| {
                let service_err = err.into_service_error();
                match service_err.code() {
                    Some("NoSuchKey") | Some("NotFound") => {
                        AppError::NotFound(self.location(src_key))
                    }
                    _ => AppError::object_store(format!(
                        "copy {} -> {}: {}",
                        self.location(src_key),
                        self.location(dst_key),
                        service_err
                    )),
                }
            })?;

        log::info!(
            "Copied {} to {}",
            self.location(src_key),
            self.location(dst_key)
        );
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>> {
        Ok(self.download_versioned(key).await?.bytes)
    }

    async fn download_versioned(&self, key: &str) -> Result<VersionedObject> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    AppError::NotFound(self.location(key))
                } else {
                    AppError::object_store(format!("get {}: {}", self.location(key), service_err))
                }
            })?;

        let version = output
            .e_tag()
            .map(str::to_string)
            .ok_or_else(|| AppError::object_store(format!("get {}: no ETag", self.location(key))))?;
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| AppError::object_store(format!("read {}: {}", self.location(key), e)))?;
        Ok(VersionedObject {
            bytes: bytes.into_bytes().to_vec(),
            version,
        })
    }

    async fn replace_if_matches(&self, key: &str, version: &str, bytes: Vec<u8>) -> Result<bool> {
        let result = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .if_match(version)
            .body(ByteStream::from(bytes))
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) => {
                let service_err = err.into_service_error();
                match service_err.code() {
                    Some("PreconditionFailed")
                    | Some("ConditionalRequestConflict")
                    | Some("NoSuchKey") => Ok(false),
                    _ => Err(AppError::object_store(format!(
                        "conditional replace {}: {}",
                        self.location(key),
                        service_err
                    ))),
                }
            }
        }
    }

    async fn upload(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|err| {
                AppError::object_store(format!(
                    "put {}: {}",
                    self.location(key),
                    err.into_service_error()
                ))
            })?;

        log::info!("Wrote {} bytes to {}", size, self.location(key));
        Ok(())
    }

    async fn upload_if_absent(&self, key: &str, bytes: Vec<u8>) -> Result<bool> {
        let result = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .if_none_match("*")
            .body(ByteStream::from(bytes))
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) => {
                let service_err = err.into_service_error();
                match service_err.code() {
                    // 409 ConditionalRequestConflict: a concurrent create is in flight
                    Some("PreconditionFailed") | Some("ConditionalRequestConflict") => Ok(false),
                    _ => Err(AppError::object_store(format!(
                        "conditional put {}: {}",
                        self.location(key),
                        service_err
                    ))),
                }
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                AppError::object_store(format!(
                    "delete {}: {}",
                    self.location(key),
                    err.into_service_error()
                ))
            })?;

        log::info!("Deleted {}", self.location(key));
        Ok(())
    }

    fn location(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}
