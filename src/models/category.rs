//! Contribution categories.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A fixed tag partitioning crawled content into independent merge passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Activity,
    Trigger,
}

impl Category {
    /// Every category, in the order a run crawls them.
    pub const ALL: [Category; 2] = [Category::Activity, Category::Trigger];

    /// Name stored in the `category` column and shown in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Activity => "Activity",
            Category::Trigger => "Trigger",
        }
    }

    /// Descriptor file at the root of a contribution repository.
    pub fn descriptor_file(&self) -> &'static str {
        match self {
            Category::Activity => "activity.json",
            Category::Trigger => "trigger.json",
        }
    }

    /// Expected `type` field of the descriptor.
    pub fn descriptor_type(&self) -> &'static str {
        match self {
            Category::Activity => "flogo:activity",
            Category::Trigger => "flogo:trigger",
        }
    }

    /// Lowercase form used in search queries.
    pub fn search_term(&self) -> &'static str {
        match self {
            Category::Activity => "activity",
            Category::Trigger => "trigger",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "activity" => Ok(Category::Activity),
            "trigger" => Ok(Category::Trigger),
            other => Err(AppError::validation(format!("unknown category '{other}'"))),
        }
    }
}
