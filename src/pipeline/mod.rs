//! The safe-update pipeline.
//!
//! - `snapshot`: backup, local staging and publish-back of the store
//! - `crawl`: windowed crawl of one category into the staged copy
//! - `guard`: last check before a staged copy is published
//! - `lease`: run-scoped lock on the store key
//! - `orchestrator`: sequences one run and decides whether to publish

pub mod crawl;
pub mod guard;
pub mod lease;
pub mod orchestrator;
pub mod snapshot;

pub use crawl::CrawlController;
pub use guard::{GuardResult, PublishGuard};
pub use lease::{Lease, LeaseManager};
pub use orchestrator::PipelineOrchestrator;
pub use snapshot::{SnapshotManager, StagedCopy};
