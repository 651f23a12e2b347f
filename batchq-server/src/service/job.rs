//! Job Service
//!
//! Business logic behind the HTTP surface: submission, status lookups,
//! queue statistics, manual admission and cancellation.

use std::sync::Arc;

use batchq_core::domain::job::{Job, JobStatus};
use batchq_core::domain::stats::QueueStats;
use batchq_core::dto::job::{CancelResponse, ProcessNextResponse, SubmitJob, SubmitResponse};
use uuid::Uuid;

use crate::config::Config;
use crate::repository::{JobStore, StoreError};
use crate::scheduler::{CancellationRegistry, Scheduler};
use crate::service::rate::RateTracker;

/// Service error type
#[derive(Debug)]
pub enum JobError {
    NotFound(Uuid),
    ValidationError(String),
    InvalidState(String),
    Store(StoreError),
}

impl From<StoreError> for JobError {
    fn from(err: StoreError) -> Self {
        JobError::Store(err)
    }
}

/// Seconds until a job at `position` is expected to be admitted
///
/// Each job ahead costs at least one call of the per-minute budget.
pub fn estimate_wait(position: u64, max_calls_per_minute: usize) -> u64 {
    let per_minute = max_calls_per_minute.max(1) as u64;
    (position * 60).div_ceil(per_minute)
}

pub struct JobService {
    store: Arc<dyn JobStore>,
    scheduler: Arc<Scheduler>,
    registry: Arc<CancellationRegistry>,
    rate: Arc<RateTracker>,
    config: Config,
}

impl JobService {
    pub fn new(
        store: Arc<dyn JobStore>,
        scheduler: Arc<Scheduler>,
        registry: Arc<CancellationRegistry>,
        rate: Arc<RateTracker>,
        config: Config,
    ) -> Self {
        Self {
            store,
            scheduler,
            registry,
            rate,
            config,
        }
    }

    /// Creates a pending job and runs an admission pass
    pub async fn submit(&self, req: SubmitJob) -> Result<SubmitResponse, JobError> {
        self.validate(&req)?;

        let max_retries = req.max_retries.unwrap_or(self.config.default_max_retries);
        let job = Job::new(req.files, req.priority.unwrap_or_default(), max_retries);
        self.store.insert(&job).await?;

        tracing::info!(
            "Job submitted: {} ({} file(s), priority {})",
            job.id,
            job.files.len(),
            job.priority
        );

        // the job is stored, a failed pass only delays it to the next trigger
        if let Err(e) = self.scheduler.admit().await {
            tracing::warn!("Admission after submitting {} failed: {}", job.id, e);
        }

        // the job is already accepted, so a failed lookup must not fail the submit
        let position = match self.store.queue_position(job.id).await {
            Ok(position) => position.unwrap_or(0),
            Err(e) => {
                tracing::warn!("Failed to look up the position of job {}: {}", job.id, e);
                0
            }
        };

        Ok(SubmitResponse {
            job_id: job.id,
            position,
            estimated_wait: estimate_wait(position, self.config.max_api_calls_per_minute),
        })
    }

    /// Get a job by ID
    pub async fn status(&self, id: Uuid) -> Result<Job, JobError> {
        let job = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(JobError::NotFound(id))?;

        Ok(job)
    }

    pub async fn queue_stats(&self) -> Result<QueueStats, JobError> {
        let counts = self.store.status_counts().await?;

        Ok(QueueStats {
            total_jobs: counts.total(),
            pending_jobs: counts.pending,
            active_jobs: counts.processing,
            completed_jobs: counts.completed,
            failed_jobs: counts.failed,
            current_api_calls: self.rate.current_count(),
            max_api_calls_per_minute: self.config.max_api_calls_per_minute,
            max_concurrent_jobs: self.config.max_concurrent_jobs,
            max_files_per_group: self.config.max_files_per_group,
            max_group_bytes: self.config.max_group_bytes,
            job_retention_days: self.config.job_retention_days,
        })
    }

    /// Runs a manual admission pass
    pub async fn process_next(&self) -> Result<ProcessNextResponse, JobError> {
        let admitted = self.scheduler.admit().await?;
        let message = format!("Admitted {} job(s)", admitted.len());

        Ok(ProcessNextResponse { admitted, message })
    }

    /// Cancels a job processing in this instance
    pub async fn cancel(&self, id: Uuid) -> Result<CancelResponse, JobError> {
        let job = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(JobError::NotFound(id))?;

        if job.status != JobStatus::Processing {
            return Err(JobError::InvalidState(format!(
                "Job {} cannot be cancelled in status {}",
                id, job.status
            )));
        }

        if !self.registry.cancel(id) {
            return Err(JobError::InvalidState(format!(
                "Job {} is not running in this instance",
                id
            )));
        }

        tracing::info!("Cancellation requested for job {}", id);

        Ok(CancelResponse {
            job_id: id,
            cancelled: true,
        })
    }

    fn validate(&self, req: &SubmitJob) -> Result<(), JobError> {
        if req.files.is_empty() {
            return Err(JobError::ValidationError(
                "At least one file is required".to_string(),
            ));
        }

        if req.files.len() > self.config.max_files_per_job {
            return Err(JobError::ValidationError(format!(
                "Too many files: {} (maximum {})",
                req.files.len(),
                self.config.max_files_per_job
            )));
        }

        for (index, file) in req.files.iter().enumerate() {
            if file.name.trim().is_empty() {
                return Err(JobError::ValidationError(format!(
                    "File {} has an empty name",
                    index
                )));
            }
            if file.content.is_empty() {
                return Err(JobError::ValidationError(format!(
                    "File '{}' has no content",
                    file.name
                )));
            }
        }

        if let Some(max_retries) = req.max_retries
            && max_retries > self.config.max_retries_limit
        {
            return Err(JobError::ValidationError(format!(
                "maxRetries {} exceeds the limit of {}",
                max_retries, self.config.max_retries_limit
            )));
        }

        Ok(())
    }
}
