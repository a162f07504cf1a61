//! Publish guard.
//!
//! Last check before the staged copy replaces the remote store. A run only
//! ever inserts or updates records, so a staged copy that holds fewer records
//! than it did at staging time, or that SQLite itself reports as damaged, is
//! never published.

use crate::error::{AppError, Result};
use crate::pipeline::snapshot::StagedCopy;

/// Outcome of a guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardResult {
    /// Safe to publish
    Safe { current: usize, baseline: usize },
    /// SQLite integrity check failed
    Corrupt { reason: String },
    /// Fewer records than at staging time
    Shrunk { current: usize, baseline: usize },
}

/// Refuses to publish a corrupt or shrunken staged copy.
#[derive(Debug, Clone, Default)]
pub struct PublishGuard;

impl PublishGuard {
    pub fn new() -> Self {
        Self
    }

    /// Inspect the staged copy.
    ///
    /// Errors reading the store are returned as-is; only the verdict is a
    /// [`GuardResult`].
    pub fn check(&self, staged: &StagedCopy) -> Result<GuardResult> {
        let store = staged.store();

        if let Err(e) = store.integrity_check() {
            return Ok(GuardResult::Corrupt {
                reason: e.to_string(),
            });
        }

        let current = store.count()?;
        let baseline = staged.baseline();
        if current < baseline {
            return Ok(GuardResult::Shrunk { current, baseline });
        }

        Ok(GuardResult::Safe { current, baseline })
    }

    /// Ok if the staged copy may be published.
    pub fn validate(&self, staged: &StagedCopy) -> Result<()> {
        match self.check(staged)? {
            GuardResult::Safe { current, baseline } => {
                log::info!(
                    "Publish guard: SAFE ({} records, {} at staging)",
                    current,
                    baseline
                );
                Ok(())
            }
            GuardResult::Corrupt { reason } => {
                log::error!("Publish guard: CORRUPT ({})", reason);
                Err(AppError::integrity(reason))
            }
            GuardResult::Shrunk { current, baseline } => {
                log::error!(
                    "Publish guard: SHRUNK {} -> {} records, refusing to publish",
                    baseline,
                    current
                );
                Err(AppError::integrity(format!(
                    "staged copy lost records ({baseline} -> {current})"
                )))
            }
        }
    }
}
