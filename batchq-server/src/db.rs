use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // seq breaks ties between jobs created in the same instant
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS batch_jobs (
            id UUID PRIMARY KEY,
            seq BIGSERIAL NOT NULL,
            files JSONB NOT NULL,
            priority SMALLINT NOT NULL DEFAULT 1,
            status VARCHAR(20) NOT NULL,
            progress SMALLINT NOT NULL DEFAULT 0,
            results JSONB NOT NULL DEFAULT '[]',
            errors JSONB NOT NULL DEFAULT '[]',
            created_at TIMESTAMPTZ NOT NULL,
            started_at TIMESTAMPTZ,
            completed_at TIMESTAMPTZ,
            retry_count INTEGER NOT NULL DEFAULT 0,
            max_retries INTEGER NOT NULL DEFAULT 3
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Admission order scan over pending jobs
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_batch_jobs_admission
        ON batch_jobs(priority DESC, created_at ASC, seq ASC)
        WHERE status = 'pending'
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_batch_jobs_status ON batch_jobs(status)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_batch_jobs_completed_at ON batch_jobs(completed_at)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
