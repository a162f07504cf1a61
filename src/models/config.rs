//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::RecencyWindow;

/// Root application configuration.
///
/// Built once at process start and passed by reference afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// AWS region and client settings
    #[serde(default)]
    pub aws: AwsConfig,

    /// Persistent store location and local staging area
    #[serde(default)]
    pub storage: StorageConfig,

    /// Credential lookup
    #[serde(default)]
    pub secrets: SecretsConfig,

    /// GitHub crawl behavior
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// Run-scoped lock on the store key
    #[serde(default)]
    pub lease: LeaseConfig,

    /// Whole-run limits
    #[serde(default)]
    pub run: RunConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.aws.region.trim().is_empty() {
            return Err(AppError::validation("aws.region is empty"));
        }
        if self.storage.bucket.trim().is_empty() {
            return Err(AppError::validation("storage.bucket is empty"));
        }
        if self.storage.database_name.trim().is_empty() {
            return Err(AppError::validation("storage.database_name is empty"));
        }
        if self.storage.backup_suffix.is_empty() {
            return Err(AppError::validation(
                "storage.backup_suffix must not be empty",
            ));
        }
        if self.secrets.token_name.trim().is_empty() {
            return Err(AppError::validation("secrets.token_name is empty"));
        }
        if self.crawl.window_hours == 0 {
            return Err(AppError::validation("crawl.window_hours must be > 0"));
        }
        if self.crawl.per_page == 0 || self.crawl.per_page > 100 {
            return Err(AppError::validation("crawl.per_page must be in 1..=100"));
        }
        if self.crawl.max_pages == 0 {
            return Err(AppError::validation("crawl.max_pages must be > 0"));
        }
        if !self.crawl.query.contains("{category}") {
            return Err(AppError::validation(
                "crawl.query must contain a {category} placeholder",
            ));
        }
        if self.crawl.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawl.user_agent is empty"));
        }
        if self.crawl.timeout_secs == 0 {
            return Err(AppError::validation("crawl.timeout_secs must be > 0"));
        }
        if self.lease.enabled && self.lease.ttl_secs == 0 {
            return Err(AppError::validation("lease.ttl_secs must be > 0"));
        }
        if self.run.deadline_secs == 0 {
            return Err(AppError::validation("run.deadline_secs must be > 0"));
        }
        // A run must end before its own lease can be taken over.
        if self.lease.enabled && self.run.deadline_secs >= self.lease.ttl_secs {
            return Err(AppError::validation(format!(
                "run.deadline_secs ({}) must be shorter than lease.ttl_secs ({})",
                self.run.deadline_secs, self.lease.ttl_secs
            )));
        }
        Ok(())
    }
}

/// AWS client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    /// Region the function and its resources live in
    #[serde(default = "defaults::region")]
    pub region: String,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: defaults::region(),
        }
    }
}

/// Where the persistent store lives and where it is staged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Bucket holding the database object
    #[serde(default = "defaults::bucket")]
    pub bucket: String,

    /// Object key of the database, also the staged file name
    #[serde(default = "defaults::database_name")]
    pub database_name: String,

    /// Appended to the database name to form the backup key
    #[serde(default = "defaults::backup_suffix")]
    pub backup_suffix: String,

    /// Local folder for the staged copy
    #[serde(default = "defaults::staging_dir")]
    pub staging_dir: PathBuf,
}

impl StorageConfig {
    pub fn backup_key(&self) -> String {
        format!("{}{}", self.database_name, self.backup_suffix)
    }

    pub fn lock_key(&self) -> String {
        format!("{}.lock", self.database_name)
    }

    pub fn staged_path(&self) -> PathBuf {
        self.staging_dir.join(&self.database_name)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: defaults::bucket(),
            database_name: defaults::database_name(),
            backup_suffix: defaults::backup_suffix(),
            staging_dir: defaults::staging_dir(),
        }
    }
}

/// Credential lookup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// Parameter name of the GitHub token
    #[serde(default = "defaults::token_name")]
    pub token_name: String,

    #[serde(default = "defaults::decrypt")]
    pub decrypt: bool,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            token_name: defaults::token_name(),
            decrypt: defaults::decrypt(),
        }
    }
}

/// How the crawl treats the source's descending-recency ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderingPolicy {
    /// Stop at the first out-of-window candidate, never check ordering
    Trust,
    /// Stop early, but fall back to a full scan once ordering is violated
    #[default]
    Verify,
    /// Never stop early; filter every candidate client-side
    FullScan,
}

impl FromStr for OrderingPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "trust" => Ok(Self::Trust),
            "verify" => Ok(Self::Verify),
            "full_scan" | "full-scan" => Ok(Self::FullScan),
            other => Err(AppError::config(format!("unknown ordering policy '{other}'"))),
        }
    }
}

/// GitHub crawl behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Hours between now and the oldest update still crawled
    #[serde(default = "defaults::window_hours")]
    pub window_hours: u32,

    #[serde(default)]
    pub ordering: OrderingPolicy,

    /// Repository search query; `{category}` is replaced per category
    #[serde(default = "defaults::query")]
    pub query: String,

    /// Search results per page (GitHub allows at most 100)
    #[serde(default = "defaults::per_page")]
    pub per_page: u32,

    /// Upper bound on pages pulled per category
    #[serde(default = "defaults::max_pages")]
    pub max_pages: u32,

    #[serde(default = "defaults::api_base")]
    pub api_base: String,

    /// Host serving raw repository files
    #[serde(default = "defaults::raw_base")]
    pub raw_base: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl CrawlConfig {
    pub fn window(&self) -> RecencyWindow {
        RecencyWindow::hours(self.window_hours)
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            window_hours: defaults::window_hours(),
            ordering: OrderingPolicy::default(),
            query: defaults::query(),
            per_page: defaults::per_page(),
            max_pages: defaults::max_pages(),
            api_base: defaults::api_base(),
            raw_base: defaults::raw_base(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Run-scoped lock settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseConfig {
    #[serde(default = "defaults::lease_enabled")]
    pub enabled: bool,

    /// Seconds after which an abandoned lock may be taken over
    #[serde(default = "defaults::lease_ttl")]
    pub ttl_secs: u64,
}

impl LeaseConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::lease_enabled(),
            ttl_secs: defaults::lease_ttl(),
        }
    }
}

/// Whole-run limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Seconds a run may take before it is failed without publishing
    #[serde(default = "defaults::deadline")]
    pub deadline_secs: u64,
}

impl RunConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            deadline_secs: defaults::deadline(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // AWS defaults
    pub fn region() -> String {
        "us-west-2".into()
    }

    // Storage defaults
    pub fn bucket() -> String {
        "retgits-fdio".into()
    }
    pub fn database_name() -> String {
        "fdiodb.db".into()
    }
    pub fn backup_suffix() -> String {
        "_bak".into()
    }
    pub fn staging_dir() -> PathBuf {
        PathBuf::from("/tmp")
    }

    // Secret defaults
    pub fn token_name() -> String {
        "/github/apptoken".into()
    }
    pub fn decrypt() -> bool {
        true
    }

    // Crawl defaults
    pub fn window_hours() -> u32 {
        48
    }
    pub fn query() -> String {
        "flogo {category} in:name,description,readme".into()
    }
    pub fn per_page() -> u32 {
        100
    }
    pub fn max_pages() -> u32 {
        10
    }
    pub fn api_base() -> String {
        "https://api.github.com".into()
    }
    pub fn raw_base() -> String {
        "https://raw.githubusercontent.com".into()
    }
    pub fn user_agent() -> String {
        "fdio-crawler/0.1".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Lease defaults
    pub fn lease_enabled() -> bool {
        true
    }
    pub fn lease_ttl() -> u64 {
        900
    }

    // Run defaults
    pub fn deadline() -> u64 {
        840
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
