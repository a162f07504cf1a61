//! GitHub contribution source.
//!
//! Candidates come from the repository search API sorted by last update,
//! which satisfies the descending-recency contract. A candidate is resolved by
//! reading the category's descriptor (`activity.json` / `trigger.json`) from
//! the repository root.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::Deserialize;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Candidate, CandidatePage, Category, ContributionRecord, CrawlConfig};
use crate::source::ContributionSource;
use crate::utils::http::fetch_text;

/// GitHub search never returns more than this many results for one query.
const SEARCH_RESULT_LIMIT: u64 = 1000;

/// Repository search response.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    total_count: u64,
    #[serde(default)]
    incomplete_results: bool,
    items: Vec<Repository>,
}

#[derive(Debug, Deserialize)]
struct Repository {
    full_name: String,
    html_url: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    owner: Option<Owner>,
    #[serde(default = "default_branch")]
    default_branch: String,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct Owner {
    login: String,
}

fn default_branch() -> String {
    "master".to_string()
}

/// Flogo contribution descriptor.
#[derive(Debug, Deserialize)]
struct Descriptor {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    author: String,
    #[serde(default, rename = "ref")]
    reference: String,
}

/// Contribution source backed by the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubSource {
    client: Client,
    api_base: String,
    raw_base: String,
    query: String,
    per_page: u32,
}

impl GitHubSource {
    pub fn new(client: Client, config: &CrawlConfig) -> Self {
        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            raw_base: config.raw_base.trim_end_matches('/').to_string(),
            query: config.query.clone(),
            per_page: config.per_page,
        }
    }

    /// Search URL for one page of a category.
    fn search_url(&self, category: Category, page: u32) -> Result<Url> {
        let query = self.query.replace("{category}", category.search_term());
        let url = Url::parse_with_params(
            &format!("{}/search/repositories", self.api_base),
            &[
                ("q", query.as_str()),
                ("sort", "updated"),
                ("order", "desc"),
                ("per_page", &self.per_page.to_string()),
                ("page", &page.to_string()),
            ],
        )?;
        Ok(url)
    }

    /// Raw URL of the category descriptor in a candidate repository.
    fn descriptor_url(&self, candidate: &Candidate) -> String {
        format!(
            "{}/{}/{}/{}",
            self.raw_base,
            candidate.key,
            candidate.default_branch,
            candidate.category.descriptor_file()
        )
    }

    /// Whether more results follow `page` given what the search reported.
    fn has_more(&self, page: u32, received: usize, total_count: u64) -> bool {
        let reachable = total_count.min(SEARCH_RESULT_LIMIT);
        let seen = u64::from(page) * u64::from(self.per_page);
        received == self.per_page as usize && seen < reachable
    }

    /// This page reached the search limit while more repositories matched.
    fn is_capped(&self, page: u32, received: usize, total_count: u64) -> bool {
        let seen = u64::from(page) * u64::from(self.per_page);
        received == self.per_page as usize
            && total_count > SEARCH_RESULT_LIMIT
            && seen >= SEARCH_RESULT_LIMIT
    }

    fn to_candidate(category: Category, repo: Repository) -> Candidate {
        Candidate {
            category,
            key: repo.full_name,
            url: repo.html_url,
            default_branch: repo.default_branch,
            description: repo.description.unwrap_or_default(),
            owner: repo.owner.map(|o| o.login).unwrap_or_default(),
            updated_at: repo.updated_at,
        }
    }

    fn to_record(candidate: &Candidate, descriptor: Descriptor) -> ContributionRecord {
        let non_empty = |value: String, fallback: &str| {
            if value.trim().is_empty() {
                fallback.to_string()
            } else {
                value
            }
        };

        ContributionRecord {
            category: candidate.category,
            key: candidate.key.clone(),
            name: descriptor.name,
            version: descriptor.version,
            title: descriptor.title,
            description: non_empty(descriptor.description, &candidate.description),
            author: non_empty(descriptor.author, &candidate.owner),
            url: candidate.url.clone(),
            reference: non_empty(
                descriptor.reference,
                &format!("github.com/{}", candidate.key),
            ),
            updated_at: candidate.updated_at,
        }
    }
}

#[async_trait]
impl ContributionSource for GitHubSource {
    async fn fetch_page(
        &self,
        headers: &HeaderMap,
        category: Category,
        page: u32,
    ) -> Result<CandidatePage> {
        let url = self.search_url(category, page)?;

        let mut headers = headers.clone();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));

        let body = fetch_text(&self.client, url.as_str(), &headers)
            .await?
            .ok_or_else(|| AppError::api(404, url.as_str(), "search endpoint not found"))?;
        let response: SearchResponse = serde_json::from_str(&body)?;

        if response.incomplete_results {
            log::warn!(
                "GitHub search for {} page {} returned incomplete results",
                category,
                page
            );
        }

        let received = response.items.len();
        let has_more = self.has_more(page, received, response.total_count);
        let truncated = !has_more && self.is_capped(page, received, response.total_count);
        let items = response
            .items
            .into_iter()
            .map(|repo| Self::to_candidate(category, repo))
            .collect();

        Ok(CandidatePage {
            items,
            has_more,
            truncated,
        })
    }

    async fn resolve(
        &self,
        headers: &HeaderMap,
        candidate: &Candidate,
    ) -> Result<Option<ContributionRecord>> {
        let url = self.descriptor_url(candidate);

        let Some(body) = fetch_text(&self.client, &url, headers).await? else {
            log::debug!("{} has no {}", candidate.key, candidate.category.descriptor_file());
            return Ok(None);
        };

        let descriptor: Descriptor = match serde_json::from_str(&body) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                log::warn!("Ignoring unparsable descriptor {}: {}", url, e);
                return Ok(None);
            }
        };

        if descriptor.kind != candidate.category.descriptor_type() {
            log::debug!(
                "{} declares type {}, not {}",
                candidate.key,
                descriptor.kind,
                candidate.category.descriptor_type()
            );
            return Ok(None);
        }

        Ok(Some(Self::to_record(candidate, descriptor)))
    }
}
