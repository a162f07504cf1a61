// src/error.rs

//! Unified error handling for the crawler.
//!
//! [`AppError`] carries the cause reported by a collaborator (object storage,
//! secret store, GitHub, the staged database). [`RunError`] is the terminal
//! taxonomy of a pipeline run; each variant wraps the `AppError` that caused it.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::models::{Category, RunStep};

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Object storage rejected an operation
    #[error("Object storage error: {0}")]
    ObjectStore(String),

    /// Object or parameter does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Secret store error
    #[error("Secret store error: {0}")]
    Secret(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// External API answered with a non-success status
    #[error("API error ({status}) for {url}: {message}")]
    Api {
        status: u16,
        url: String,
        message: String,
    },

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Staged database error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Run lease could not be taken or released
    #[error("Lease error: {0}")]
    Lease(String),

    /// Staged copy failed a pre-publish check
    #[error("Integrity check failed: {0}")]
    Integrity(String),
}

impl AppError {
    /// Create an object storage error.
    pub fn object_store(message: impl fmt::Display) -> Self {
        Self::ObjectStore(message.to_string())
    }

    /// Create a secret store error.
    pub fn secret(message: impl fmt::Display) -> Self {
        Self::Secret(message.to_string())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an API error for a non-success response.
    pub fn api(status: u16, url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Api {
            status,
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a lease error.
    pub fn lease(message: impl Into<String>) -> Self {
        Self::Lease(message.into())
    }

    /// Create an integrity error.
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity(message.into())
    }

    /// Whether this error means the target object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Terminal failure kinds of a pipeline run. None are retried within a run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("lease unavailable: {0}")]
    LeaseUnavailable(#[source] AppError),

    #[error("backup failed: {0}")]
    BackupFailed(#[source] AppError),

    #[error("staging failed: {0}")]
    StageFailed(#[source] AppError),

    #[error("secret unavailable: {0}")]
    SecretUnavailable(#[source] AppError),

    #[error("crawl failed for {category}: {source}")]
    CrawlFailed {
        category: Category,
        #[source]
        source: AppError,
    },

    #[error("publish failed: {0}")]
    PublishFailed(#[source] AppError),

    #[error("run deadline of {}s exceeded", .0.as_secs())]
    DeadlineExceeded(Duration),
}

/// A run that stopped at `step` because of `error`.
#[derive(Error, Debug)]
#[error("run failed while {step}: {error}")]
pub struct RunFailure {
    pub step: RunStep,
    #[source]
    pub error: RunError,
}

impl RunFailure {
    pub fn new(step: RunStep, error: RunError) -> Self {
        Self { step, error }
    }
}
