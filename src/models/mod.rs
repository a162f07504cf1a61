// src/models/mod.rs

//! Domain models for the crawler.
//!
//! This module contains the data structures shared between the pipeline
//! steps, organized by their primary purpose.

mod category;
mod config;
mod record;
mod run;
mod window;

// Re-export all public types
pub use category::Category;
pub use config::{
    AwsConfig, Config, CrawlConfig, LeaseConfig, LoggingConfig, OrderingPolicy, RunConfig,
    SecretsConfig, StorageConfig,
};
pub use record::{Candidate, CandidatePage, ContributionRecord, UpsertOutcome};
pub use run::{CrawlReport, PublishReport, RunContext, RunReport, RunStep};
pub use window::RecencyWindow;
