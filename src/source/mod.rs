//! External contribution sources.
//!
//! A [`ContributionSource`] enumerates candidates page by page and resolves
//! each one into a [`ContributionRecord`].
//!
//! # Ordering contract
//!
//! Implementations must yield candidates in **descending `updated_at` order**
//! across all pages of a category. The crawl relies on this to stop at the
//! first candidate older than the recency window. The crawl cannot enforce
//! the contract; under the default ordering policy it detects violations it
//! happens to observe and falls back to a full scan.

mod github;

use async_trait::async_trait;
use futures::stream::{self, Stream, TryStreamExt};
use reqwest::header::HeaderMap;

use crate::error::{AppError, Result};
use crate::models::{Candidate, CandidatePage, Category, ContributionRecord};

pub use github::GitHubSource;

/// A paginated source of contribution candidates.
#[async_trait]
pub trait ContributionSource: Send + Sync {
    /// Fetch page `page` (1-based) of candidates for `category`, newest first.
    async fn fetch_page(
        &self,
        headers: &HeaderMap,
        category: Category,
        page: u32,
    ) -> Result<CandidatePage>;

    /// Resolve a candidate into a record.
    ///
    /// Returns `Ok(None)` when the candidate turns out not to be a contribution
    /// of its category.
    async fn resolve(
        &self,
        headers: &HeaderMap,
        candidate: &Candidate,
    ) -> Result<Option<ContributionRecord>>;
}

/// One item of a category enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listed {
    Candidate(Candidate),
    /// Enumeration stopped at a page or result limit with candidates left
    Truncated,
}

/// Lazily enumerate the candidates of `category`.
///
/// A page is only requested once the previous one has been consumed, so
/// dropping the stream early saves the remaining requests. Enumeration ends
/// on an empty page or when the source reports no more. Ending at
/// `max_pages` or at the source's own result limit yields a final
/// [`Listed::Truncated`].
pub fn candidates<'a>(
    source: &'a dyn ContributionSource,
    headers: &'a HeaderMap,
    category: Category,
    max_pages: u32,
) -> impl Stream<Item = Result<Listed>> + Send + 'a {
    stream::try_unfold(Some(1u32), move |next| async move {
        let page = match next {
            Some(page) if page <= max_pages => page,
            Some(_) => {
                log::warn!(
                    "{} enumeration reached the {}-page limit, later pages not fetched",
                    category,
                    max_pages
                );
                return Ok::<_, AppError>(Some((stream::iter(vec![Ok(Listed::Truncated)]), None)));
            }
            None => return Ok(None),
        };

        let CandidatePage {
            items,
            has_more,
            truncated,
        } = source.fetch_page(headers, category, page).await?;
        log::debug!(
            "Fetched page {} of {} candidates ({} items)",
            page,
            category,
            items.len()
        );

        let next = (has_more && !items.is_empty()).then_some(page + 1);
        let mut listed: Vec<Result<Listed>> =
            items.into_iter().map(|c| Ok(Listed::Candidate(c))).collect();
        if truncated && next.is_none() {
            log::warn!("{} enumeration reached the source's result limit", category);
            listed.push(Ok(Listed::Truncated));
        }
        Ok(Some((stream::iter(listed), next)))
    })
    .try_flatten()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use chrono::{TimeZone, Utc};

    use super::*;

    struct PagedSource {
        pages: Vec<CandidatePage>,
        fetched: AtomicU32,
        fail_on: Option<u32>,
    }

    impl PagedSource {
        fn new(pages: Vec<CandidatePage>) -> Self {
            Self {
                pages,
                fetched: AtomicU32::new(0),
                fail_on: None,
            }
        }
    }

    #[async_trait]
    impl ContributionSource for PagedSource {
        async fn fetch_page(
            &self,
            _headers: &HeaderMap,
            _category: Category,
            page: u32,
        ) -> Result<CandidatePage> {
            self.fetched.fetch_add(1, Ordering::SeqCst);
            if self.fail_on == Some(page) {
                return Err(AppError::api(502, "page", "bad gateway"));
            }
            Ok(self
                .pages
                .get(page as usize - 1)
                .cloned()
                .unwrap_or_default())
        }

        async fn resolve(
            &self,
            _headers: &HeaderMap,
            _candidate: &Candidate,
        ) -> Result<Option<ContributionRecord>> {
            Ok(None)
        }
    }

    fn keys(listed: &[Listed]) -> Vec<&str> {
        listed
            .iter()
            .filter_map(|item| match item {
                Listed::Candidate(c) => Some(c.key.as_str()),
                Listed::Truncated => None,
            })
            .collect()
    }

    fn candidate(key: &str) -> Candidate {
        Candidate {
            category: Category::Activity,
            key: key.to_string(),
            url: format!("https://github.com/{key}"),
            default_branch: "master".to_string(),
            description: String::new(),
            owner: String::new(),
            updated_at: Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_flattens_pages_in_order() {
        let source = PagedSource::new(vec![
            CandidatePage::more(vec![candidate("a/1"), candidate("a/2")]),
            CandidatePage::last(vec![candidate("a/3")]),
        ]);
        let headers = HeaderMap::new();

        let listed: Vec<Listed> = candidates(&source, &headers, Category::Activity, 10)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(keys(&listed), vec!["a/1", "a/2", "a/3"]);
        assert!(!listed.contains(&Listed::Truncated));
        assert_eq!(source.fetched.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_pages_are_fetched_lazily() {
        let source = PagedSource::new(vec![
            CandidatePage::more(vec![candidate("a/1")]),
            CandidatePage::more(vec![candidate("a/2")]),
            CandidatePage::last(vec![candidate("a/3")]),
        ]);
        let headers = HeaderMap::new();

        let mut stream = std::pin::pin!(candidates(&source, &headers, Category::Activity, 10));
        let first = stream.try_next().await.unwrap().unwrap();

        assert_eq!(first, Listed::Candidate(candidate("a/1")));
        assert_eq!(source.fetched.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_max_pages_bounds_enumeration() {
        let source = PagedSource::new(vec![
            CandidatePage::more(vec![candidate("a/1")]),
            CandidatePage::more(vec![candidate("a/2")]),
            CandidatePage::more(vec![candidate("a/3")]),
        ]);
        let headers = HeaderMap::new();

        let listed: Vec<Listed> = candidates(&source, &headers, Category::Activity, 2)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(keys(&listed), vec!["a/1", "a/2"]);
        assert_eq!(listed.last(), Some(&Listed::Truncated));
        assert_eq!(source.fetched.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_source_limit_marks_truncation() {
        let source = PagedSource::new(vec![CandidatePage::capped(vec![candidate("a/1")])]);
        let headers = HeaderMap::new();

        let listed: Vec<Listed> = candidates(&source, &headers, Category::Activity, 10)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(
            listed,
            vec![Listed::Candidate(candidate("a/1")), Listed::Truncated]
        );
    }

    #[tokio::test]
    async fn test_page_error_ends_stream_with_error() {
        let mut source = PagedSource::new(vec![
            CandidatePage::more(vec![candidate("a/1")]),
            CandidatePage::more(vec![candidate("a/2")]),
        ]);
        source.fail_on = Some(2);
        let headers = HeaderMap::new();

        let result: Result<Vec<Listed>> = candidates(&source, &headers, Category::Activity, 10)
            .try_collect()
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_empty_source() {
        let source = PagedSource::new(vec![]);
        let headers = HeaderMap::new();

        let all: Vec<Listed> = candidates(&source, &headers, Category::Trigger, 10)
            .try_collect()
            .await
            .unwrap();

        assert!(all.is_empty());
        assert_eq!(source.fetched.load(Ordering::SeqCst), 1);
    }
}
