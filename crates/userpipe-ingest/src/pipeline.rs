//! Run orchestration: fetch -> transform -> load
//!
//! A run is plain function composition. Each stage gets the previous stage's
//! full output and finishes before the next one starts. A stage that fails
//! is re-run from scratch according to the [`RetryPolicy`]; nothing carries
//! over from a failed attempt.

use crate::config::{PipelineConfig, RetryPolicy};
use crate::fetch::UserFetcher;
use crate::load::{LoadOutcome, Loader};
use crate::transform::transform_batch;
use chrono::{DateTime, Local};
use std::future::Future;
use tracing::{info, info_span, warn, Instrument};
use userpipe_common::Result;

/// What one pipeline run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub fetched: usize,
    pub transformed: usize,
    pub outcome: LoadOutcome,
}

/// The three stages wired to one configuration
pub struct Pipeline {
    fetcher: UserFetcher,
    loader: Loader,
    retry: RetryPolicy,
}

impl Pipeline {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            fetcher: UserFetcher::new(config.source.clone())?,
            loader: Loader::new(config.database.clone()),
            retry: config.retry,
        })
    }

    /// Execute one complete run.
    ///
    /// Fetch and transform failures propagate once retries are exhausted.
    /// A database failure in the load stage does not: it shows up as
    /// [`LoadOutcome::Failed`] in the report and is not retried.
    pub async fn run(&self) -> Result<RunReport> {
        let started_at = Local::now();
        info!(started_at = %started_at, "Pipeline run starting");

        let fetcher = &self.fetcher;
        let raw = run_stage("fetch", self.retry, move || fetcher.fetch()).await?;
        let fetched = raw.len();

        let flat = run_stage("transform", self.retry, || {
            let raw = raw.clone();
            async move { transform_batch(raw) }
        })
        .await?;
        drop(raw);
        let transformed = flat.len();

        let loader = &self.loader;
        let batch = flat.as_slice();
        let outcome = run_stage("load", self.retry, move || loader.load(batch)).await?;

        let report = RunReport {
            started_at,
            finished_at: Local::now(),
            fetched,
            transformed,
            outcome,
        };

        match &report.outcome {
            LoadOutcome::Committed { rows } => info!(rows, "Pipeline run finished"),
            LoadOutcome::Failed { reason } => {
                warn!(%reason, "Pipeline run finished without loading any rows")
            },
        }

        Ok(report)
    }
}

/// Run one stage, re-invoking it after `policy.delay` while it keeps failing
/// and retries remain.
pub async fn run_stage<T, F, Fut>(stage: &'static str, policy: RetryPolicy, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut tries = 0u32;

    loop {
        tries += 1;
        let span = info_span!("stage", stage, attempt = tries);

        match attempt().instrument(span).await {
            Ok(value) => return Ok(value),
            Err(e) if tries <= policy.retries => {
                warn!(
                    stage,
                    attempt = tries,
                    retries = policy.retries,
                    error = %e,
                    delay_secs = policy.delay.as_secs(),
                    "Stage failed, retrying"
                );
                tokio::time::sleep(policy.delay).await;
            },
            Err(e) => return Err(e),
        }
    }
}
