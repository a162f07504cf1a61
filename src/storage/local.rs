//! Local filesystem object storage.
//!
//! Mirrors the bucket layout under a root directory. Used by the CLI for
//! local runs and by tests. Production deployments use `S3ObjectStore`.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::{ObjectStore, VersionedObject};
use crate::utils::sha256_hex;

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root_dir: PathBuf,
}

impl LocalObjectStore {
    /// Create a new store rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Get the full path for a key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Path of the marker held while a conditional replace is in flight.
    fn guard_path(&self, key: &str) -> PathBuf {
        let mut guard = self.path(key).into_os_string();
        guard.push(".cas");
        PathBuf::from(guard)
    }

    /// Compare and write, with the replace marker already held.
    async fn swap(&self, key: &str, version: &str, bytes: &[u8]) -> Result<bool> {
        match self.read_bytes(key).await? {
            Some(current) if sha256_hex(&current) == version => {
                self.write_bytes(key, bytes).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Read bytes, returning None if the file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn copy(&self, src_key: &str, dst_key: &str) -> Result<()> {
        let bytes = self
            .read_bytes(src_key)
            .await?
            .ok_or_else(|| AppError::NotFound(self.location(src_key)))?;
        self.write_bytes(dst_key, &bytes).await?;
        log::debug!("Copied {} to {}", src_key, dst_key);
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>> {
        self.read_bytes(key)
            .await?
            .ok_or_else(|| AppError::NotFound(self.location(key)))
    }

    async fn upload(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.write_bytes(key, &bytes).await
    }

    async fn upload_if_absent(&self, key: &str, bytes: Vec<u8>) -> Result<bool> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let created = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await;

        match created {
            Ok(mut file) => {
                file.write_all(&bytes).await?;
                file.flush().await?;
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn download_versioned(&self, key: &str) -> Result<VersionedObject> {
        let bytes = self.download(key).await?;
        let version = sha256_hex(&bytes);
        Ok(VersionedObject { bytes, version })
    }

    /// The version of a local object is the SHA-256 of its content.
    ///
    /// Writers serialize on a `{key}.cas` marker created with `create_new`;
    /// a writer that finds the marker taken reports a lost race. A marker
    /// left by a crashed process has to be removed by hand.
    async fn replace_if_matches(&self, key: &str, version: &str, bytes: Vec<u8>) -> Result<bool> {
        let guard = self.guard_path(key);
        self.ensure_dir(&guard).await?;

        let marker = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&guard)
            .await;
        match marker {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(AppError::Io(e)),
        }

        let swapped = self.swap(key, version, &bytes).await;
        tokio::fs::remove_file(&guard).await?;
        swapped
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    fn location(&self, key: &str) -> String {
        self.path(key).display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_upload_and_download() {
        let tmp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(tmp.path());

        store.upload("db", b"hello".to_vec()).await.unwrap();
        assert_eq!(store.download("db").await.unwrap(), b"hello".to_vec());
        assert!(!tmp.path().join("db.tmp").exists());
    }

    #[tokio::test]
    async fn test_download_missing_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(tmp.path());

        let err = store.download("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_copy_overwrites_destination() {
        let tmp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(tmp.path());

        store.upload("db", b"v1".to_vec()).await.unwrap();
        store.upload("db_bak", b"old".to_vec()).await.unwrap();
        store.copy("db", "db_bak").await.unwrap();

        assert_eq!(store.download("db_bak").await.unwrap(), b"v1".to_vec());
    }

    #[tokio::test]
    async fn test_copy_missing_source_fails() {
        let tmp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(tmp.path());

        assert!(store.copy("db", "db_bak").await.unwrap_err().is_not_found());
        assert!(!tmp.path().join("db_bak").exists());
    }

    #[tokio::test]
    async fn test_upload_if_absent() {
        let tmp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(tmp.path());

        assert!(store.upload_if_absent("lock", b"a".to_vec()).await.unwrap());
        assert!(!store.upload_if_absent("lock", b"b".to_vec()).await.unwrap());
        assert_eq!(store.download("lock").await.unwrap(), b"a".to_vec());
    }

    #[tokio::test]
    async fn test_replace_if_matches_current_version() {
        let tmp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(tmp.path());
        store.upload("lock", b"a".to_vec()).await.unwrap();

        let read = store.download_versioned("lock").await.unwrap();
        assert!(store.replace_if_matches("lock", &read.version, b"b".to_vec()).await.unwrap());
        assert_eq!(store.download("lock").await.unwrap(), b"b".to_vec());
        assert!(!tmp.path().join("lock.cas").exists());
    }

    #[tokio::test]
    async fn test_replace_if_matches_rejects_changed_object() {
        let tmp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(tmp.path());
        store.upload("lock", b"a".to_vec()).await.unwrap();

        let read = store.download_versioned("lock").await.unwrap();
        store.upload("lock", b"other".to_vec()).await.unwrap();

        assert!(!store.replace_if_matches("lock", &read.version, b"b".to_vec()).await.unwrap());
        assert_eq!(store.download("lock").await.unwrap(), b"other".to_vec());

        store.delete("lock").await.unwrap();
        assert!(!store.replace_if_matches("lock", &read.version, b"b".to_vec()).await.unwrap());
        assert!(store.download("lock").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_replace_if_matches_yields_to_writer_in_flight() {
        let tmp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(tmp.path());
        store.upload("lock", b"a".to_vec()).await.unwrap();
        let read = store.download_versioned("lock").await.unwrap();

        std::fs::write(tmp.path().join("lock.cas"), b"").unwrap();
        assert!(!store.replace_if_matches("lock", &read.version, b"b".to_vec()).await.unwrap());
        assert_eq!(store.download("lock").await.unwrap(), b"a".to_vec());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(tmp.path());

        store.upload("lock", b"a".to_vec()).await.unwrap();
        store.delete("lock").await.unwrap();
        store.delete("lock").await.unwrap();
        assert!(store.download("lock").await.unwrap_err().is_not_found());
    }
}
