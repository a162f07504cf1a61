// Recording fakes shared by the pipeline integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::HeaderMap;

use fdio_crawler::error::{AppError, Result};
use fdio_crawler::models::{
    Candidate, CandidatePage, Category, Config, ContributionRecord, RunContext,
};
use fdio_crawler::secrets::SecretStore;
use fdio_crawler::source::ContributionSource;
use fdio_crawler::storage::{ObjectStore, VersionedObject};
use fdio_crawler::store::ContributionStore;
use fdio_crawler::utils::sha256_hex;

pub const DB_KEY: &str = "fdiodb.db";
pub const BACKUP_KEY: &str = "fdiodb.db_bak";
pub const LOCK_KEY: &str = "fdiodb.db.lock";

/// Ordered log of every external call, shared between fakes.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Entries that do not touch the lock object.
    pub fn without_lease(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| !e.contains(LOCK_KEY))
            .collect()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| e.as_str() == entry).count()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }
}

/// In-memory bucket that records its calls.
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    failing: Mutex<HashSet<String>>,
    stalled: Mutex<HashMap<String, Duration>>,
    journal: Journal,
}

impl MemoryObjectStore {
    pub fn new(journal: Journal) -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            stalled: Mutex::new(HashMap::new()),
            journal,
        }
    }

    /// Put an object without recording a call.
    pub fn seed(&self, key: &str, bytes: Vec<u8>) {
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
    }

    /// Drop an object without recording a call.
    pub fn remove(&self, key: &str) {
        self.objects.lock().unwrap().remove(key);
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    /// Make a call fail, e.g. `fail("download fdiodb.db")`.
    pub fn fail(&self, call: &str) {
        self.failing.lock().unwrap().insert(call.to_string());
    }

    /// Make a call hang for `delay` before it takes effect.
    pub fn stall(&self, call: &str, delay: Duration) {
        self.stalled.lock().unwrap().insert(call.to_string(), delay);
    }

    async fn record(&self, call: String) -> Result<()> {
        self.journal.push(call.clone());
        let delay = self.stalled.lock().unwrap().get(&call).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(&call) {
            return Err(AppError::object_store(format!("injected failure: {call}")));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn copy(&self, src_key: &str, dst_key: &str) -> Result<()> {
        self.record(format!("copy {src_key} -> {dst_key}")).await?;
        let mut objects = self.objects.lock().unwrap();
        let bytes = objects
            .get(src_key)
            .cloned()
            .ok_or_else(|| AppError::NotFound(src_key.to_string()))?;
        objects.insert(dst_key.to_string(), bytes);
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>> {
        self.record(format!("download {key}")).await?;
        self.get(key)
            .ok_or_else(|| AppError::NotFound(key.to_string()))
    }

    async fn upload(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.record(format!("upload {key}")).await?;
        self.seed(key, bytes);
        Ok(())
    }

    async fn upload_if_absent(&self, key: &str, bytes: Vec<u8>) -> Result<bool> {
        self.record(format!("upload_if_absent {key}")).await?;
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(key) {
            return Ok(false);
        }
        objects.insert(key.to_string(), bytes);
        Ok(true)
    }

    async fn download_versioned(&self, key: &str) -> Result<VersionedObject> {
        self.record(format!("download {key}")).await?;
        let bytes = self
            .get(key)
            .ok_or_else(|| AppError::NotFound(key.to_string()))?;
        let version = sha256_hex(&bytes);
        Ok(VersionedObject { bytes, version })
    }

    async fn replace_if_matches(&self, key: &str, version: &str, bytes: Vec<u8>) -> Result<bool> {
        self.record(format!("replace {key}")).await?;
        let mut objects = self.objects.lock().unwrap();
        match objects.get(key) {
            Some(current) if sha256_hex(current) == version => {
                objects.insert(key.to_string(), bytes);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.record(format!("delete {key}")).await?;
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    fn location(&self, key: &str) -> String {
        format!("memory://{key}")
    }
}

/// Secret store holding at most one value.
pub struct StaticSecretStore(pub Option<String>);

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn get(&self, name: &str, _decrypt: bool) -> Result<String> {
        self.0
            .clone()
            .ok_or_else(|| AppError::NotFound(name.to_string()))
    }
}

/// Source serving one page per category and resolving every candidate.
pub struct ScriptedSource {
    candidates: HashMap<Category, Vec<Candidate>>,
    failing: Option<Category>,
    delay: Option<Duration>,
    journal: Journal,
}

impl ScriptedSource {
    pub fn new(journal: Journal) -> Self {
        Self {
            candidates: HashMap::new(),
            failing: None,
            delay: None,
            journal,
        }
    }

    pub fn with(mut self, category: Category, candidates: Vec<Candidate>) -> Self {
        self.candidates.insert(category, candidates);
        self
    }

    pub fn failing(mut self, category: Category) -> Self {
        self.failing = Some(category);
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl ContributionSource for ScriptedSource {
    async fn fetch_page(
        &self,
        _headers: &HeaderMap,
        category: Category,
        page: u32,
    ) -> Result<CandidatePage> {
        self.journal.push(format!("search {category} {page}"));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing == Some(category) {
            return Err(AppError::api(401, "https://api.github.com/search", "Bad credentials"));
        }
        let items = self.candidates.get(&category).cloned().unwrap_or_default();
        Ok(CandidatePage::last(items))
    }

    async fn resolve(
        &self,
        _headers: &HeaderMap,
        candidate: &Candidate,
    ) -> Result<Option<ContributionRecord>> {
        Ok(Some(ContributionRecord {
            category: candidate.category,
            key: candidate.key.clone(),
            name: candidate.key.replace('/', "-"),
            version: "0.0.1".to_string(),
            title: String::new(),
            description: candidate.description.clone(),
            author: candidate.owner.clone(),
            url: candidate.url.clone(),
            reference: format!("github.com/{}", candidate.key),
            updated_at: candidate.updated_at,
        }))
    }
}

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 6, 0, 0).unwrap()
}

pub fn run_context(run_id: &str) -> RunContext {
    RunContext::new(run_id, now())
}

/// A candidate last updated `age_hours` before [`now`].
pub fn candidate(category: Category, key: &str, age_hours: i64) -> Candidate {
    Candidate {
        category,
        key: key.to_string(),
        url: format!("https://github.com/{key}"),
        default_branch: "master".to_string(),
        description: format!("{key} description"),
        owner: key.split('/').next().unwrap_or_default().to_string(),
        updated_at: now() - chrono::Duration::hours(age_hours),
    }
}

/// Default configuration staging into `staging_dir`.
pub fn config(staging_dir: &Path) -> Config {
    let mut config = Config::default();
    config.storage.staging_dir = staging_dir.to_path_buf();
    config
}

/// Open a published database image and count its records per category.
pub fn record_counts(bytes: &[u8]) -> (usize, usize) {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("published.db");
    std::fs::write(&path, bytes).unwrap();
    let store = ContributionStore::open_read_only(&path).unwrap();
    (
        store.count_category(Category::Activity).unwrap(),
        store.count_category(Category::Trigger).unwrap(),
    )
}
