//! Job processor
//!
//! Drives one claimed job through its groups, strictly in order:
//! wait for rate capacity, call the extraction service (retrying with
//! backoff), persist the group's results and progress, pause, repeat.
//! The job ends `completed` when every group succeeds, or `failed` at the
//! first group that exhausts its retries; results of earlier groups stay
//! recorded either way.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use batchq_core::domain::file::{FileDescriptor, FileResult};
use batchq_core::domain::job::{Job, progress_percent};
use batchq_core::grouping::{GroupLimits, group_files};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, warn};
use uuid::Uuid;

use crate::repository::JobStore;
use crate::scheduler::backoff::BackoffPolicy;
use crate::service::extraction::{ExtractionClient, ExtractionError};
use crate::service::rate::RateTracker;

/// Error recorded when a job's token is cancelled
pub const CANCELLED_MESSAGE: &str = "Job cancelled before completion";

/// Tunables of the batch loop
#[derive(Debug, Clone, Copy)]
pub struct ProcessorSettings {
    pub group_limits: GroupLimits,
    pub max_calls_per_minute: usize,
    pub backoff: BackoffPolicy,
    pub inter_group_delay: Duration,
}

/// Terminal result of running a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed(String),
}

enum GroupFailure {
    Exhausted { attempts: u32, last_error: String },
    Cancelled,
}

/// Runs admitted jobs to a terminal status
pub struct JobProcessor {
    store: Arc<dyn JobStore>,
    extractor: Arc<dyn ExtractionClient>,
    rate: Arc<RateTracker>,
    settings: ProcessorSettings,
}

impl JobProcessor {
    pub fn new(
        store: Arc<dyn JobStore>,
        extractor: Arc<dyn ExtractionClient>,
        rate: Arc<RateTracker>,
        settings: ProcessorSettings,
    ) -> Self {
        Self {
            store,
            extractor,
            rate,
            settings,
        }
    }

    /// Processes a job that has already been claimed (status `processing`)
    pub async fn run(&self, job: Job, cancel: CancellationToken) -> JobOutcome {
        let span = tracing::info_span!("job", job_id = %job.id);
        self.process(job, cancel).instrument(span).await
    }

    /// Records a terminal failure for a job whose processing aborted
    pub async fn fail(&self, job_id: Uuid, message: &str, retry_count: u32) -> JobOutcome {
        warn!("Job {} failed: {}", job_id, message);
        if let Err(e) = self
            .store
            .mark_failed(job_id, message, retry_count, Utc::now())
            .await
        {
            error!("Failed to record failure of job {}: {}", job_id, e);
        }
        JobOutcome::Failed(message.to_string())
    }

    async fn process(&self, job: Job, cancel: CancellationToken) -> JobOutcome {
        let groups = group_files(&job.files, self.settings.group_limits);
        let total_files = job.files.len();
        let total_groups = groups.len();

        info!(
            "Processing {} file(s) in {} group(s), priority {}",
            total_files, total_groups, job.priority
        );

        let mut processed_files = 0;
        let mut retries = job.retry_count;

        for (index, group) in groups.iter().enumerate() {
            let group_number = index + 1;

            let capacity = self
                .rate
                .wait_for_capacity(self.settings.max_calls_per_minute);
            if until_cancelled(&cancel, capacity).await.is_none() {
                return self.fail(job.id, CANCELLED_MESSAGE, retries).await;
            }

            let results = match self
                .extract_group(group, job.max_retries, &mut retries, &cancel)
                .await
            {
                Ok(results) => results,
                Err(GroupFailure::Exhausted {
                    attempts,
                    last_error,
                }) => {
                    let message = format!(
                        "Group {}/{} failed after {} attempt(s): {}",
                        group_number, total_groups, attempts, last_error
                    );
                    return self.fail(job.id, &message, retries).await;
                }
                Err(GroupFailure::Cancelled) => {
                    return self.fail(job.id, CANCELLED_MESSAGE, retries).await;
                }
            };

            self.rate.record_call();
            processed_files += group.len();
            let progress = progress_percent(processed_files, total_files);

            if let Err(e) = self
                .store
                .record_progress(job.id, &results, progress, retries)
                .await
            {
                let message = format!(
                    "Failed to persist results of group {}/{}: {}",
                    group_number, total_groups, e
                );
                return self.fail(job.id, &message, retries).await;
            }

            debug!(
                "Group {}/{} done ({} file(s)), progress {}%",
                group_number,
                total_groups,
                group.len(),
                progress
            );

            if group_number < total_groups {
                let pause = tokio::time::sleep(self.settings.inter_group_delay);
                if until_cancelled(&cancel, pause).await.is_none() {
                    return self.fail(job.id, CANCELLED_MESSAGE, retries).await;
                }
            }
        }

        match self.store.mark_completed(job.id, retries, Utc::now()).await {
            Ok(()) => {
                info!("Job completed: {} file(s) extracted", total_files);
                JobOutcome::Completed
            }
            Err(e) => {
                let message = format!("Failed to record completion: {}", e);
                self.fail(job.id, &message, retries).await
            }
        }
    }

    /// Calls the extraction service for one group, retrying with backoff
    ///
    /// `retries` accumulates the job-wide retry count.
    async fn extract_group(
        &self,
        group: &[&FileDescriptor],
        max_retries: u32,
        retries: &mut u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<FileResult>, GroupFailure> {
        let mut attempt: u32 = 0;

        loop {
            let call = self.extractor.extract(group);
            let outcome = until_cancelled(cancel, call)
                .await
                .ok_or(GroupFailure::Cancelled)?;

            let error = match outcome.and_then(|results| check_result_count(group, results)) {
                Ok(results) => return Ok(results),
                Err(e) => e,
            };

            if attempt >= max_retries {
                return Err(GroupFailure::Exhausted {
                    attempts: attempt + 1,
                    last_error: error.to_string(),
                });
            }

            let delay = self.settings.backoff.delay(attempt);
            warn!(
                "Extraction attempt {}/{} failed: {}; retrying in {:?}",
                attempt + 1,
                max_retries + 1,
                error,
                delay
            );

            attempt += 1;
            *retries += 1;

            until_cancelled(cancel, tokio::time::sleep(delay))
                .await
                .ok_or(GroupFailure::Cancelled)?;
        }
    }
}

/// A response must carry exactly one result per file sent
fn check_result_count(
    group: &[&FileDescriptor],
    results: Vec<FileResult>,
) -> Result<Vec<FileResult>, ExtractionError> {
    if results.len() != group.len() {
        return Err(ExtractionError::Malformed(format!(
            "expected {} result(s), got {}",
            group.len(),
            results.len()
        )));
    }
    Ok(results)
}

async fn until_cancelled<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        output = fut => Some(output),
    }
}
