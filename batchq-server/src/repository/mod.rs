//! Repository Module
//!
//! Data access layer for the queue. The [`JobStore`] trait is the single
//! source of truth for job state; it is implemented over Postgres for
//! deployments and in memory for development and tests.

pub mod job;
pub mod memory;

use async_trait::async_trait;
use batchq_core::domain::file::FileResult;
use batchq_core::domain::job::Job;
use batchq_core::domain::stats::StatusCounts;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use job::PgJobStore;
pub use memory::InMemoryJobStore;

/// Store error type
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A processor write targeted a job that is not processing
    #[error("job {0} is not processing")]
    NotProcessing(Uuid),

    #[error("corrupt job record: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Durable job storage
///
/// Status transitions are guarded inside the store: `claim` only moves a
/// pending job to processing, and the processor writes only apply to
/// processing jobs.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a newly submitted job
    async fn insert(&self, job: &Job) -> StoreResult<()>;

    /// Find a job by ID
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Job>>;

    /// Count jobs in every status
    async fn status_counts(&self) -> StoreResult<StatusCounts>;

    /// Pending jobs in admission order (priority desc, arrival asc)
    async fn next_pending(&self, limit: usize) -> StoreResult<Vec<Job>>;

    /// 1-based position of a pending job in admission order
    ///
    /// Returns `None` when the job is missing or no longer pending.
    async fn queue_position(&self, id: Uuid) -> StoreResult<Option<u64>>;

    /// Atomically move a job from pending to processing
    ///
    /// Returns `false` when the job was not pending (already claimed).
    async fn claim(&self, id: Uuid, started_at: DateTime<Utc>) -> StoreResult<bool>;

    /// Append a group's results and raise the progress of a processing job
    async fn record_progress(
        &self,
        id: Uuid,
        results: &[FileResult],
        progress: u8,
        retry_count: u32,
    ) -> StoreResult<()>;

    /// Finish a processing job successfully
    async fn mark_completed(
        &self,
        id: Uuid,
        retry_count: u32,
        completed_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Finish a processing job with an error, keeping partial results
    async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
        retry_count: u32,
        completed_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Delete terminal jobs completed before `cutoff`
    async fn delete_terminal_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64>;

    /// Fail every processing job started at or before `cutoff`
    ///
    /// Partial results are kept and `error` is appended. Returns the number
    /// of jobs failed.
    async fn fail_interrupted(
        &self,
        cutoff: DateTime<Utc>,
        error: &str,
        completed_at: DateTime<Utc>,
    ) -> StoreResult<u64>;
}
