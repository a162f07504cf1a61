// src/pipeline/snapshot.rs

//! Backup, local staging and publish-back of the persistent store.
//!
//! The remote object is only ever replaced as a whole, by [`SnapshotManager::publish`].
//! Everything a run changes goes into the [`StagedCopy`] first.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Result;
use crate::models::{PublishReport, StorageConfig};
use crate::pipeline::guard::PublishGuard;
use crate::storage::ObjectStore;
use crate::store::ContributionStore;
use crate::utils::sha256_hex;

/// Files SQLite keeps next to a database while it is open.
const SQLITE_SIDECARS: [&str; 3] = ["-journal", "-wal", "-shm"];

/// The run's local working copy of the store.
///
/// Dropping it closes the SQLite connection; the file stays on disk until the
/// next run overwrites it.
pub struct StagedCopy {
    path: PathBuf,
    store: ContributionStore,
    pub(super) baseline: usize,
}

impl StagedCopy {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn store(&self) -> &ContributionStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ContributionStore {
        &mut self.store
    }

    /// Record count at staging time.
    pub fn baseline(&self) -> usize {
        self.baseline
    }
}

/// Moves the store between object storage and the staging area.
pub struct SnapshotManager {
    objects: Arc<dyn ObjectStore>,
    storage: StorageConfig,
    guard: PublishGuard,
}

impl SnapshotManager {
    pub fn new(objects: Arc<dyn ObjectStore>, storage: StorageConfig) -> Self {
        Self {
            objects,
            storage,
            guard: PublishGuard::new(),
        }
    }

    /// Overwrite the backup object with the current remote store.
    pub async fn backup(&self) -> Result<()> {
        let source = &self.storage.database_name;
        let target = self.storage.backup_key();

        self.objects.copy(source, &target).await?;
        log::info!(
            "Backed up {} to {}",
            self.objects.location(source),
            self.objects.location(&target)
        );
        Ok(())
    }

    /// Download the remote store into the staging area and open it.
    pub async fn stage_local(&self) -> Result<StagedCopy> {
        let key = &self.storage.database_name;
        let bytes = self.objects.download(key).await?;
        let path = self.storage.staged_path();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // A journal or WAL left behind by an earlier run would be replayed
        // into the fresh download.
        for suffix in SQLITE_SIDECARS {
            remove_if_exists(&sibling(&path, suffix)).await?;
        }
        write_atomic(&path, &bytes).await?;

        let store = ContributionStore::open(&path)?;
        let baseline = store.count()?;
        log::info!(
            "Staged {} ({} bytes, {} records) at {:?}",
            self.objects.location(key),
            bytes.len(),
            baseline,
            path
        );

        Ok(StagedCopy {
            path,
            store,
            baseline,
        })
    }

    /// Check the staged copy and upload it over the remote store.
    pub async fn publish(&self, staged: StagedCopy) -> Result<PublishReport> {
        self.guard.validate(&staged)?;

        let StagedCopy { path, store, .. } = staged;
        let record_count = store.count()?;
        store.close()?;

        let bytes = tokio::fs::read(&path).await?;
        let size = bytes.len();
        let sha256 = sha256_hex(&bytes);

        let key = &self.storage.database_name;
        self.objects.upload(key, bytes).await?;

        let location = self.objects.location(key);
        log::info!("Published {} ({} bytes, sha256 {})", location, size, sha256);

        Ok(PublishReport {
            location,
            bytes: size,
            sha256,
            record_count,
        })
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Write through a temp file so a crash never leaves a half-written store.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = sibling(path, ".part");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
