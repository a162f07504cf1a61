//! Contribution records and the candidates they are resolved from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Category;

/// An item enumerated from the source API, not yet resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub category: Category,

    /// Repository full name (`owner/repo`)
    pub key: String,

    /// Browser URL of the repository
    pub url: String,

    /// Branch holding the descriptor file
    pub default_branch: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub owner: String,

    /// Last-updated timestamp reported by the source
    pub updated_at: DateTime<Utc>,
}

/// One page of candidates.
#[derive(Debug, Clone, Default)]
pub struct CandidatePage {
    pub items: Vec<Candidate>,

    /// Whether another page may follow this one
    pub has_more: bool,

    /// The source matched more candidates than it will ever list
    pub truncated: bool,
}

impl CandidatePage {
    pub fn last(items: Vec<Candidate>) -> Self {
        Self {
            items,
            has_more: false,
            truncated: false,
        }
    }

    pub fn more(items: Vec<Candidate>) -> Self {
        Self {
            items,
            has_more: true,
            truncated: false,
        }
    }

    /// Last page the source serves although more candidates matched.
    pub fn capped(items: Vec<Candidate>) -> Self {
        Self {
            items,
            has_more: false,
            truncated: true,
        }
    }
}

/// A contribution as stored in the persistent store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionRecord {
    pub category: Category,
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    pub url: String,

    /// Import path used by Flogo apps (`github.com/owner/repo`)
    #[serde(default)]
    pub reference: String,

    pub updated_at: DateTime<Utc>,
}

/// What the store did with a proposed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Skipped,
}
