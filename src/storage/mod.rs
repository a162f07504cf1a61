//! Object storage abstractions for the persistent store.
//!
//! The pipeline only needs a handful of single-object operations on a flat
//! key space:
//!
//! ```text
//! {bucket}/
//! ├── fdiodb.db          # authoritative store
//! ├── fdiodb.db_bak      # backup taken at the start of every run
//! └── fdiodb.db.lock     # run lease (present only while a run holds it)
//! ```
//!
//! Every write replaces a whole object; backends must make that replacement
//! all-or-nothing.

pub mod local;
#[cfg(feature = "aws")]
pub mod s3;

use async_trait::async_trait;

use crate::error::Result;

// Re-export for convenience
pub use local::LocalObjectStore;
#[cfg(feature = "aws")]
pub use s3::S3ObjectStore;

/// An object body and the opaque version tag it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedObject {
    pub bytes: Vec<u8>,
    pub version: String,
}

/// Trait for object storage backends.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Copy `src_key` over `dst_key`.
    ///
    /// Fails with [`AppError::NotFound`](crate::error::AppError::NotFound)
    /// when the source does not exist.
    async fn copy(&self, src_key: &str, dst_key: &str) -> Result<()>;

    /// Read a whole object.
    async fn download(&self, key: &str) -> Result<Vec<u8>>;

    /// Replace an object with `bytes`.
    async fn upload(&self, key: &str, bytes: Vec<u8>) -> Result<()>;

    /// Create an object only if the key is free.
    ///
    /// Returns `false` without writing when the key already exists.
    async fn upload_if_absent(&self, key: &str, bytes: Vec<u8>) -> Result<bool>;

    /// Read a whole object together with the version it was read at.
    async fn download_versioned(&self, key: &str) -> Result<VersionedObject>;

    /// Replace an object only while it is still at `version`.
    ///
    /// Returns `false` without writing when the object changed or vanished
    /// after it was read.
    async fn replace_if_matches(&self, key: &str, version: &str, bytes: Vec<u8>) -> Result<bool>;

    /// Delete an object. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Human-readable location of `key`, for logs and reports.
    fn location(&self, key: &str) -> String;
}
