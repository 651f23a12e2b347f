//! Server configuration
//!
//! Defines all tunable parameters of the queue: admission ceilings, group
//! limits, retry/backoff policy, retention and background intervals.

use std::time::Duration;

use batchq_core::grouping::GroupLimits;

use crate::scheduler::backoff::BackoffPolicy;

/// Which Job Store implementation to run against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

/// Server configuration
///
/// Every field can be overridden from the environment, see
/// [`Config::from_env`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP API binds to
    pub bind_addr: String,

    /// Job Store backend
    pub store_backend: StoreBackend,

    /// Postgres connection string, required for the postgres backend
    pub database_url: Option<String>,

    /// Downstream extraction endpoint
    pub extraction_url: String,

    /// Timeout of a single extraction call
    pub extraction_timeout: Duration,

    /// Rate ceiling of downstream calls in any trailing minute
    pub max_api_calls_per_minute: usize,

    /// Admission ceiling, also the worker pool size
    pub max_concurrent_jobs: usize,

    /// Maximum number of files sent in one extraction call
    pub max_files_per_group: usize,

    /// Maximum cumulative estimated bytes sent in one extraction call
    pub max_group_bytes: u64,

    /// Maximum number of files accepted in one submission
    pub max_files_per_job: usize,

    /// Age after which terminal jobs are deleted
    pub job_retention_days: u32,

    /// Per-group retry budget when the submission does not set one
    pub default_max_retries: u32,

    /// Upper bound accepted for a submission's `maxRetries`
    pub max_retries_limit: u32,

    /// Retry backoff between failed extraction attempts
    pub backoff: BackoffPolicy,

    /// Fixed pause between two groups of the same job
    pub inter_group_delay: Duration,

    /// Interval of the background admission pass
    pub admission_interval: Duration,

    /// Interval of the cleanup sweeper
    pub cleanup_interval: Duration,

    /// Time in-flight jobs get to finish on shutdown before being cancelled
    pub shutdown_grace: Duration,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Recognised environment variables (all optional):
    /// - BATCHQ_BIND_ADDR (default: 0.0.0.0:8080)
    /// - STORE_BACKEND (postgres | memory, default: postgres if DATABASE_URL is set)
    /// - DATABASE_URL
    /// - EXTRACTION_URL (default: http://localhost:9000/extract)
    /// - EXTRACTION_TIMEOUT_SECS (default: 120)
    /// - MAX_API_CALLS_PER_MINUTE (default: 60)
    /// - MAX_CONCURRENT_JOBS (default: 3)
    /// - MAX_FILES_PER_GROUP (default: 5)
    /// - MAX_GROUP_BYTES (default: 10 MiB)
    /// - MAX_FILES_PER_JOB (default: 1000)
    /// - JOB_RETENTION_DAYS (default: 7)
    /// - DEFAULT_MAX_RETRIES (default: 3)
    /// - MAX_RETRIES_LIMIT (default: 10)
    /// - BACKOFF_INITIAL_MS / BACKOFF_MAX_MS / BACKOFF_JITTER (default: 1000 / 30000 / 0.2)
    /// - INTER_GROUP_DELAY_MS (default: 500)
    /// - ADMISSION_INTERVAL_SECS (default: 5)
    /// - CLEANUP_INTERVAL_SECS (default: 3600)
    /// - SHUTDOWN_GRACE_SECS (default: 30)
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let database_url = std::env::var("DATABASE_URL").ok();

        let store_backend = match std::env::var("STORE_BACKEND").ok().as_deref() {
            Some("postgres") => StoreBackend::Postgres,
            Some("memory") => StoreBackend::Memory,
            Some(other) => anyhow::bail!("unknown STORE_BACKEND '{}'", other),
            None if database_url.is_some() => StoreBackend::Postgres,
            None => StoreBackend::Memory,
        };

        let backoff = BackoffPolicy {
            initial: Duration::from_millis(env_or(
                "BACKOFF_INITIAL_MS",
                defaults.backoff.initial.as_millis() as u64,
            )),
            max: Duration::from_millis(env_or(
                "BACKOFF_MAX_MS",
                defaults.backoff.max.as_millis() as u64,
            )),
            jitter: env_or("BACKOFF_JITTER", defaults.backoff.jitter),
        };

        Ok(Self {
            bind_addr: std::env::var("BATCHQ_BIND_ADDR").unwrap_or(defaults.bind_addr),
            store_backend,
            database_url,
            extraction_url: std::env::var("EXTRACTION_URL").unwrap_or(defaults.extraction_url),
            extraction_timeout: Duration::from_secs(env_or(
                "EXTRACTION_TIMEOUT_SECS",
                defaults.extraction_timeout.as_secs(),
            )),
            max_api_calls_per_minute: env_or(
                "MAX_API_CALLS_PER_MINUTE",
                defaults.max_api_calls_per_minute,
            ),
            max_concurrent_jobs: env_or("MAX_CONCURRENT_JOBS", defaults.max_concurrent_jobs),
            max_files_per_group: env_or("MAX_FILES_PER_GROUP", defaults.max_files_per_group),
            max_group_bytes: env_or("MAX_GROUP_BYTES", defaults.max_group_bytes),
            max_files_per_job: env_or("MAX_FILES_PER_JOB", defaults.max_files_per_job),
            job_retention_days: env_or("JOB_RETENTION_DAYS", defaults.job_retention_days),
            default_max_retries: env_or("DEFAULT_MAX_RETRIES", defaults.default_max_retries),
            max_retries_limit: env_or("MAX_RETRIES_LIMIT", defaults.max_retries_limit),
            backoff,
            inter_group_delay: Duration::from_millis(env_or(
                "INTER_GROUP_DELAY_MS",
                defaults.inter_group_delay.as_millis() as u64,
            )),
            admission_interval: Duration::from_secs(env_or(
                "ADMISSION_INTERVAL_SECS",
                defaults.admission_interval.as_secs(),
            )),
            cleanup_interval: Duration::from_secs(env_or(
                "CLEANUP_INTERVAL_SECS",
                defaults.cleanup_interval.as_secs(),
            )),
            shutdown_grace: Duration::from_secs(env_or(
                "SHUTDOWN_GRACE_SECS",
                defaults.shutdown_grace.as_secs(),
            )),
        })
    }

    /// Group limits handed to the file grouper
    pub fn group_limits(&self) -> GroupLimits {
        GroupLimits {
            max_files: self.max_files_per_group,
            max_bytes: self.max_group_bytes,
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.store_backend == StoreBackend::Postgres && self.database_url.is_none() {
            anyhow::bail!("DATABASE_URL must be set for the postgres store backend");
        }

        if !self.extraction_url.starts_with("http://") && !self.extraction_url.starts_with("https://")
        {
            anyhow::bail!("extraction_url must start with http:// or https://");
        }

        if self.max_api_calls_per_minute == 0 {
            anyhow::bail!("max_api_calls_per_minute must be greater than 0");
        }

        if self.max_concurrent_jobs == 0 {
            anyhow::bail!("max_concurrent_jobs must be greater than 0");
        }

        if self.max_files_per_group == 0 {
            anyhow::bail!("max_files_per_group must be greater than 0");
        }

        if self.max_group_bytes == 0 {
            anyhow::bail!("max_group_bytes must be greater than 0");
        }

        if self.max_files_per_job == 0 {
            anyhow::bail!("max_files_per_job must be greater than 0");
        }

        if self.default_max_retries > self.max_retries_limit {
            anyhow::bail!("default_max_retries cannot exceed max_retries_limit");
        }

        if !(0.0..=1.0).contains(&self.backoff.jitter) {
            anyhow::bail!("backoff jitter must be between 0.0 and 1.0");
        }

        if self.backoff.initial > self.backoff.max {
            anyhow::bail!("backoff initial delay cannot exceed the maximum delay");
        }

        if self.admission_interval.is_zero() || self.cleanup_interval.is_zero() {
            anyhow::bail!("background intervals must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            store_backend: StoreBackend::Memory,
            database_url: None,
            extraction_url: "http://localhost:9000/extract".to_string(),
            extraction_timeout: Duration::from_secs(120),
            max_api_calls_per_minute: 60,
            max_concurrent_jobs: 3,
            max_files_per_group: 5,
            max_group_bytes: 10 * 1024 * 1024,
            max_files_per_job: 1000,
            job_retention_days: 7,
            default_max_retries: 3,
            max_retries_limit: 10,
            backoff: BackoffPolicy::default(),
            inter_group_delay: Duration::from_millis(500),
            admission_interval: Duration::from_secs(5),
            cleanup_interval: Duration::from_secs(3600),
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(default)
}
