// src/pipeline/crawl.rs

//! Windowed crawl of one category into the staged copy.

use std::pin::pin;

use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use reqwest::header::HeaderMap;

use crate::error::Result;
use crate::models::{Category, CrawlConfig, CrawlReport, OrderingPolicy, RecencyWindow};
use crate::pipeline::snapshot::StagedCopy;
use crate::source::{ContributionSource, Listed, candidates};

/// Pulls recently updated candidates of a category and merges them.
pub struct CrawlController<'a> {
    source: &'a dyn ContributionSource,
    ordering: OrderingPolicy,
    max_pages: u32,
}

impl<'a> CrawlController<'a> {
    pub fn new(source: &'a dyn ContributionSource, config: &CrawlConfig) -> Self {
        Self {
            source,
            ordering: config.ordering,
            max_pages: config.max_pages,
        }
    }

    /// Crawl `category` and upsert every resolved in-window candidate.
    ///
    /// The first error aborts the category. Records merged before it stay in
    /// the staged copy; the caller decides whether that copy is published.
    pub async fn run(
        &self,
        headers: &HeaderMap,
        staged: &mut StagedCopy,
        window: RecencyWindow,
        category: Category,
        now: DateTime<Utc>,
    ) -> Result<CrawlReport> {
        log::info!(
            "Crawling {} updated since {} ({:?} ordering)",
            category,
            window.cutoff(now),
            self.ordering
        );

        let mut report = CrawlReport::new(category);
        let mut full_scan = self.ordering == OrderingPolicy::FullScan;
        let mut previous: Option<DateTime<Utc>> = None;

        let mut stream = pin!(candidates(self.source, headers, category, self.max_pages));
        while let Some(listed) = stream.try_next().await? {
            let candidate = match listed {
                Listed::Candidate(candidate) => candidate,
                Listed::Truncated => {
                    report.truncated = true;
                    continue;
                }
            };
            report.scanned += 1;

            if self.ordering != OrderingPolicy::Trust {
                if let Some(previous) = previous {
                    if candidate.updated_at > previous {
                        report.ordering_violations += 1;
                        if !full_scan {
                            log::warn!(
                                "{} candidates out of order at {} ({} after {}), scanning all pages",
                                category,
                                candidate.key,
                                candidate.updated_at,
                                previous
                            );
                            full_scan = true;
                        }
                    }
                }
                previous = Some(candidate.updated_at);
            }

            if !window.contains(now, candidate.updated_at) {
                report.out_of_window += 1;
                if full_scan {
                    continue;
                }
                report.stopped_early = true;
                break;
            }
            report.in_window += 1;

            match self.source.resolve(headers, &candidate).await? {
                Some(record) => {
                    let outcome = staged.store_mut().upsert(&record)?;
                    log::debug!("{} {}: {:?}", category, record.key, outcome);
                    report.record(outcome);
                }
                None => report.unresolved += 1,
            }
        }

        log::info!(
            "Crawled {}: {} scanned, {} in window, {} inserted, {} updated, {} skipped, {} unresolved",
            category,
            report.scanned,
            report.in_window,
            report.inserted,
            report.updated,
            report.skipped,
            report.unresolved
        );
        if report.truncated {
            log::warn!(
                "{} crawl ended at the enumeration limit after {} candidates; \
                 older in-window updates may have been missed",
                category,
                report.scanned
            );
        }
        Ok(report)
    }
}
