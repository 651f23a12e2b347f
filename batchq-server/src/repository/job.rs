//! Job Repository
//!
//! Postgres implementation of the [`JobStore`].

use async_trait::async_trait;
use batchq_core::domain::file::{FileDescriptor, FileResult};
use batchq_core::domain::job::{Job, JobStatus, Priority};
use batchq_core::domain::stats::StatusCounts;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use super::{JobStore, StoreError, StoreResult};

const JOB_COLUMNS: &str = r#"
    id, files, priority, status, progress, results, errors,
    created_at, started_at, completed_at, retry_count, max_retries
"#;

/// Job store backed by the `batch_jobs` table
#[derive(Debug, Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn insert(&self, job: &Job) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO batch_jobs
                (id, files, priority, status, progress, results, errors,
                 created_at, started_at, completed_at, retry_count, max_retries)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(job.id)
        .bind(Json(&job.files))
        .bind(job.priority.rank())
        .bind(job.status.as_str())
        .bind(job.progress as i16)
        .bind(Json(&job.results))
        .bind(Json(&job.errors))
        .bind(job.created_at)
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(job.retry_count as i32)
        .bind(job.max_retries as i32)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {} FROM batch_jobs WHERE id = $1",
            JOB_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Job::try_from).transpose()
    }

    async fn status_counts(&self) -> StoreResult<StatusCounts> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM batch_jobs GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut counts = StatusCounts::default();
        for (status, count) in rows {
            let status = JobStatus::parse(&status)
                .ok_or_else(|| StoreError::Corrupt(format!("unknown status '{}'", status)))?;
            counts.add(status, count as u64);
        }

        Ok(counts)
    }

    async fn next_pending(&self, limit: usize) -> StoreResult<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            SELECT {} FROM batch_jobs
            WHERE status = 'pending'
            ORDER BY priority DESC, created_at ASC, seq ASC
            LIMIT $1
            "#,
            JOB_COLUMNS
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Job::try_from).collect()
    }

    async fn queue_position(&self, id: Uuid) -> StoreResult<Option<u64>> {
        let position: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM batch_jobs ahead, batch_jobs target
            WHERE target.id = $1
              AND target.status = 'pending'
              AND ahead.status = 'pending'
              AND (ahead.priority > target.priority
                   OR (ahead.priority = target.priority
                       AND (ahead.created_at, ahead.seq) <= (target.created_at, target.seq)))
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok((position > 0).then_some(position as u64))
    }

    async fn claim(&self, id: Uuid, started_at: DateTime<Utc>) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE batch_jobs
            SET status = 'processing', started_at = $2
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(started_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_progress(
        &self,
        id: Uuid,
        results: &[FileResult],
        progress: u8,
        retry_count: u32,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE batch_jobs
            SET results = results || $2,
                progress = GREATEST(progress, $3),
                retry_count = $4
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .bind(Json(results))
        .bind(progress as i16)
        .bind(retry_count as i32)
        .execute(&self.pool)
        .await?;

        ensure_processing(id, result.rows_affected())
    }

    async fn mark_completed(
        &self,
        id: Uuid,
        retry_count: u32,
        completed_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE batch_jobs
            SET status = 'completed', progress = 100, completed_at = $2, retry_count = $3
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .bind(completed_at)
        .bind(retry_count as i32)
        .execute(&self.pool)
        .await?;

        ensure_processing(id, result.rows_affected())
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
        retry_count: u32,
        completed_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE batch_jobs
            SET status = 'failed',
                errors = errors || jsonb_build_array($2::text),
                completed_at = $3,
                retry_count = $4
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(completed_at)
        .bind(retry_count as i32)
        .execute(&self.pool)
        .await?;

        ensure_processing(id, result.rows_affected())
    }

    async fn delete_terminal_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM batch_jobs
            WHERE status IN ('completed', 'failed') AND completed_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn fail_interrupted(
        &self,
        cutoff: DateTime<Utc>,
        error: &str,
        completed_at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE batch_jobs
            SET status = 'failed',
                errors = errors || jsonb_build_array($2::text),
                completed_at = $3
            WHERE status = 'processing' AND started_at <= $1
            "#,
        )
        .bind(cutoff)
        .bind(error)
        .bind(completed_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

fn ensure_processing(id: Uuid, rows_affected: u64) -> StoreResult<()> {
    if rows_affected == 0 {
        return Err(StoreError::NotProcessing(id));
    }
    Ok(())
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    files: Json<Vec<FileDescriptor>>,
    priority: i16,
    status: String,
    progress: i16,
    results: Json<Vec<FileResult>>,
    errors: Json<Vec<String>>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    retry_count: i32,
    max_retries: i32,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status = JobStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown status '{}'", row.status)))?;
        let priority = Priority::from_rank(row.priority)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown priority {}", row.priority)))?;

        Ok(Job {
            id: row.id,
            files: row.files.0,
            priority,
            status,
            progress: row.progress.clamp(0, 100) as u8,
            results: row.results.0,
            errors: row.errors.0,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            retry_count: row.retry_count.max(0) as u32,
            max_retries: row.max_retries.max(0) as u32,
        })
    }
}
