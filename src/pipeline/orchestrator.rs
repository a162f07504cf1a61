// src/pipeline/orchestrator.rs

//! Run sequencing.
//!
//! ```text
//! Idle -> Leasing -> BackingUp -> Staging -> ResolvingSecret
//!      -> Crawling(Activity) -> Crawling(Trigger) -> Publishing -> Done
//! ```
//!
//! The first failure ends the run. Publishing is the last step, so a failed
//! run never touches the remote store beyond refreshing its backup.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{RunError, RunFailure};
use crate::models::{Category, Config, RunContext, RunReport, RunStep};
use crate::pipeline::crawl::CrawlController;
use crate::pipeline::lease::{Lease, LeaseManager};
use crate::pipeline::snapshot::SnapshotManager;
use crate::secrets::{SecretResolver, SecretStore};
use crate::source::ContributionSource;
use crate::storage::ObjectStore;
use crate::utils::http::auth_headers;

pub struct PipelineOrchestrator<'a> {
    config: &'a Config,
    objects: Arc<dyn ObjectStore>,
    secrets: Arc<dyn SecretStore>,
    source: Arc<dyn ContributionSource>,
    deadline: Duration,
}

impl<'a> PipelineOrchestrator<'a> {
    pub fn new(
        config: &'a Config,
        objects: Arc<dyn ObjectStore>,
        secrets: Arc<dyn SecretStore>,
        source: Arc<dyn ContributionSource>,
    ) -> Self {
        Self {
            config,
            objects,
            secrets,
            source,
            deadline: config.run.deadline(),
        }
    }

    /// Bound the run by `deadline` instead of the configured one.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Execute one run.
    pub async fn run(&self, ctx: &RunContext) -> Result<RunReport, RunFailure> {
        log::info!("Run {} started at {}", ctx.run_id, ctx.invoked_at);

        let leases = self.config.lease.enabled.then(|| {
            LeaseManager::new(
                self.objects.clone(),
                self.config.storage.lock_key(),
                self.config.lease.ttl(),
            )
        });

        let lease = match &leases {
            Some(leases) => Some(leases.acquire(ctx).await.map_err(|e| {
                RunFailure::new(RunStep::Leasing, RunError::LeaseUnavailable(e))
            })?),
            None => None,
        };

        let mut step = RunStep::Idle;
        let result = tokio::time::timeout(self.deadline, self.execute(ctx, &mut step)).await;
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(_) => Err(RunFailure::new(
                step,
                RunError::DeadlineExceeded(self.deadline),
            )),
        };

        if let (Some(leases), Some(lease)) = (&leases, &lease) {
            release(leases, lease).await;
        }

        match &outcome {
            Ok(report) => log::info!(
                "Run {} done: {} records merged, published {}",
                ctx.run_id,
                report.merged(),
                report.publish.location
            ),
            Err(failure) => log::error!("Run {} failed: {}", ctx.run_id, failure),
        }
        outcome
    }

    async fn execute(&self, ctx: &RunContext, step: &mut RunStep) -> Result<RunReport, RunFailure> {
        let snapshots = SnapshotManager::new(self.objects.clone(), self.config.storage.clone());

        *step = RunStep::BackingUp;
        snapshots
            .backup()
            .await
            .map_err(|e| RunFailure::new(*step, RunError::BackupFailed(e)))?;

        *step = RunStep::Staging;
        let mut staged = snapshots
            .stage_local()
            .await
            .map_err(|e| RunFailure::new(*step, RunError::StageFailed(e)))?;

        *step = RunStep::ResolvingSecret;
        let secrets = &self.config.secrets;
        let headers = SecretResolver::new(self.secrets.clone())
            .fetch(&secrets.token_name, secrets.decrypt)
            .await
            .and_then(|credential| auth_headers(&credential))
            .map_err(|e| RunFailure::new(*step, RunError::SecretUnavailable(e)))?;

        let crawler = CrawlController::new(self.source.as_ref(), &self.config.crawl);
        let window = self.config.crawl.window();
        let mut crawls = Vec::with_capacity(Category::ALL.len());
        for category in Category::ALL {
            *step = RunStep::Crawling(category);
            let report = crawler
                .run(&headers, &mut staged, window, category, ctx.invoked_at)
                .await
                .map_err(|source| {
                    RunFailure::new(*step, RunError::CrawlFailed { category, source })
                })?;
            crawls.push(report);
        }

        *step = RunStep::Publishing;
        let publish = snapshots
            .publish(staged)
            .await
            .map_err(|e| RunFailure::new(*step, RunError::PublishFailed(e)))?;

        Ok(RunReport {
            run_id: ctx.run_id.clone(),
            crawls,
            publish,
        })
    }
}

async fn release(leases: &LeaseManager, lease: &Lease) {
    if let Err(e) = leases.release(lease).await {
        log::warn!("Failed to release lease of run {}: {}", lease.run_id, e);
    }
}
