// src/handler.rs

//! AWS Lambda handler.
//!
//! Invoked by a CloudWatch scheduled event. Builds the S3, SSM and GitHub
//! collaborators from the environment and runs the pipeline once.

use std::sync::Arc;
use std::time::Duration;

use aws_config::{BehaviorVersion, Region};
use chrono::{DateTime, Utc};
use lambda_runtime::{Context, Error as LambdaError, LambdaEvent};
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, instrument, warn};

use crate::config;
use crate::models::RunContext;
use crate::pipeline::PipelineOrchestrator;
use crate::secrets::SsmSecretStore;
use crate::source::GitHubSource;
use crate::storage::S3ObjectStore;
use crate::utils::http::create_async_client;

/// Time kept back from the invocation deadline to release the lease and
/// report the failure.
const DEADLINE_MARGIN: Duration = Duration::from_secs(30);

/// The parts of a CloudWatch scheduled event the run uses.
#[derive(Debug, Default, Deserialize)]
pub struct ScheduledEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
}

impl ScheduledEvent {
    /// Run context for this event, falling back to the request id and the
    /// wall clock.
    pub fn run_context(&self, request_id: &str, now: DateTime<Utc>) -> RunContext {
        let run_id = self
            .id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| request_id.to_string());
        RunContext::new(run_id, self.time.unwrap_or(now))
    }
}

/// Main Lambda handler function.
#[instrument(skip(event), fields(request_id = %event.context.request_id))]
pub async fn handler(event: LambdaEvent<Value>) -> Result<Value, LambdaError> {
    let (payload, context) = event.into_parts();

    let scheduled: ScheduledEvent = serde_json::from_value(payload).unwrap_or_else(|e| {
        warn!("Unrecognized trigger payload ({}), using defaults", e);
        ScheduledEvent::default()
    });
    let ctx = scheduled.run_context(&context.request_id, Utc::now());

    let config = config::from_env()?;
    let deadline = match remaining_time(&context, Utc::now()) {
        Some(remaining) => config.run.deadline().min(remaining),
        None => config.run.deadline(),
    };
    info!(run_id = %ctx.run_id, deadline_secs = deadline.as_secs(), "Starting run");

    let sdk = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.aws.region.clone()))
        .load()
        .await;
    let objects = Arc::new(S3ObjectStore::from_sdk_config(&sdk, &config.storage.bucket));
    let secrets = Arc::new(SsmSecretStore::from_sdk_config(&sdk));
    let client = create_async_client(&config.crawl)?;
    let source = Arc::new(GitHubSource::new(client, &config.crawl));

    let orchestrator =
        PipelineOrchestrator::new(&config, objects, secrets, source).with_deadline(deadline);

    match orchestrator.run(&ctx).await {
        Ok(report) => {
            info!(
                run_id = %report.run_id,
                merged = report.merged(),
                bytes = report.publish.bytes,
                "Run succeeded"
            );
            Ok(serde_json::json!({
                "status": "success",
                "run_id": report.run_id,
                "report": report,
            }))
        }
        Err(failure) => {
            error!(run_id = %ctx.run_id, step = %failure.step, "Run failed: {}", failure);
            Err(failure.into())
        }
    }
}

/// Invocation time left before Lambda kills the function, minus the margin.
fn remaining_time(context: &Context, now: DateTime<Utc>) -> Option<Duration> {
    let deadline = DateTime::from_timestamp_millis(i64::try_from(context.deadline).ok()?)?;
    let remaining = (deadline - now).to_std().ok()?;
    Some(remaining.saturating_sub(DEADLINE_MARGIN))
}
