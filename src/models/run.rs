//! Run context, step names, and reports.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Category, UpsertOutcome};

/// Trigger input for one run.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Opaque identifier used for log correlation and lease ownership
    pub run_id: String,

    /// Invocation time; the "now" of window checks. Leases use the wall clock.
    pub invoked_at: DateTime<Utc>,
}

impl RunContext {
    pub fn new(run_id: impl Into<String>, invoked_at: DateTime<Utc>) -> Self {
        Self {
            run_id: run_id.into(),
            invoked_at,
        }
    }
}

/// Steps of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStep {
    Idle,
    Leasing,
    BackingUp,
    Staging,
    ResolvingSecret,
    Crawling(Category),
    Publishing,
}

impl fmt::Display for RunStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStep::Idle => f.write_str("idle"),
            RunStep::Leasing => f.write_str("leasing"),
            RunStep::BackingUp => f.write_str("backing up"),
            RunStep::Staging => f.write_str("staging"),
            RunStep::ResolvingSecret => f.write_str("resolving secret"),
            RunStep::Crawling(category) => write!(f, "crawling {category}"),
            RunStep::Publishing => f.write_str("publishing"),
        }
    }
}

/// Counters for one category's crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlReport {
    pub category: Category,
    /// Candidates pulled from the source
    pub scanned: usize,
    pub in_window: usize,
    pub out_of_window: usize,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    /// In-window candidates that were not contributions
    pub unresolved: usize,
    pub ordering_violations: usize,
    /// Enumeration ended at the first out-of-window candidate
    pub stopped_early: bool,
    /// Enumeration hit a page or result limit before leaving the window
    pub truncated: bool,
}

impl CrawlReport {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            scanned: 0,
            in_window: 0,
            out_of_window: 0,
            inserted: 0,
            updated: 0,
            skipped: 0,
            unresolved: 0,
            ordering_violations: 0,
            stopped_early: false,
            truncated: false,
        }
    }

    pub fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Skipped => self.skipped += 1,
        }
    }

    /// Records merged into the store (inserted or updated).
    pub fn merged(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Result of uploading the staged copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    pub location: String,
    pub bytes: usize,
    /// SHA-256 of the uploaded object, hex encoded
    pub sha256: String,
    pub record_count: usize,
}

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub crawls: Vec<CrawlReport>,
    pub publish: PublishReport,
}

impl RunReport {
    pub fn merged(&self) -> usize {
        self.crawls.iter().map(CrawlReport::merged).sum()
    }
}
