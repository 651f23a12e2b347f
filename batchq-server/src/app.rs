//! Application wiring
//!
//! Builds the scheduler, worker pool and background loops around a Job
//! Store and an extraction client, and tears them down in order.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::repository::{JobStore, StoreResult};
use crate::scheduler::{
    AdmissionLimits, CancellationRegistry, JobProcessor, ProcessorSettings, Scheduler, WorkerPool,
};
use crate::service::JobService;
use crate::service::cleanup;
use crate::service::extraction::ExtractionClient;
use crate::service::rate::RateTracker;

/// A running queue
pub struct App {
    service: Arc<JobService>,
    scheduler: Arc<Scheduler>,
    workers: WorkerPool,
    background: JoinSet<()>,
    shutdown: CancellationToken,
    grace: Duration,
}

impl App {
    /// Starts the worker pool, admission loop and cleanup sweeper
    ///
    /// Jobs still processing from a previous run are failed first, so they
    /// do not hold admission slots.
    pub async fn start(
        config: Config,
        store: Arc<dyn JobStore>,
        extractor: Arc<dyn ExtractionClient>,
    ) -> StoreResult<Self> {
        cleanup::recover_interrupted(store.as_ref(), Utc::now()).await?;

        let rate = Arc::new(RateTracker::new());
        let registry = Arc::new(CancellationRegistry::new());
        let shutdown = CancellationToken::new();

        // every buffered job is already claimed, so the ceiling bounds the buffer
        let (dispatch, jobs) = mpsc::channel(config.max_concurrent_jobs.max(1));

        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&store),
            Arc::clone(&rate),
            AdmissionLimits {
                max_concurrent_jobs: config.max_concurrent_jobs,
                max_calls_per_minute: config.max_api_calls_per_minute,
            },
            dispatch,
        ));

        let processor = Arc::new(JobProcessor::new(
            Arc::clone(&store),
            extractor,
            Arc::clone(&rate),
            ProcessorSettings {
                group_limits: config.group_limits(),
                max_calls_per_minute: config.max_api_calls_per_minute,
                backoff: config.backoff,
                inter_group_delay: config.inter_group_delay,
            },
        ));

        let workers = WorkerPool::spawn(
            config.max_concurrent_jobs,
            jobs,
            processor,
            Arc::clone(&registry),
            scheduler.wake_handle(),
        );

        let mut background = JoinSet::new();
        background.spawn(
            Arc::clone(&scheduler).run(config.admission_interval, shutdown.clone()),
        );
        background.spawn(cleanup::run_sweeper(
            Arc::clone(&store),
            config.job_retention_days,
            config.cleanup_interval,
            shutdown.clone(),
        ));

        let grace = config.shutdown_grace;
        let service = Arc::new(JobService::new(
            store,
            Arc::clone(&scheduler),
            registry,
            rate,
            config,
        ));

        Ok(Self {
            service,
            scheduler,
            workers,
            background,
            shutdown,
            grace,
        })
    }

    pub fn service(&self) -> Arc<JobService> {
        Arc::clone(&self.service)
    }

    /// Stops admitting, then drains the workers within the grace period
    pub async fn shutdown(mut self) {
        tracing::info!("Shutting down queue...");

        self.shutdown.cancel();
        while let Some(result) = self.background.join_next().await {
            if let Err(e) = result {
                tracing::error!("Background task panicked: {}", e);
            }
        }

        self.scheduler.close().await;
        self.workers.shutdown(self.grace).await;

        tracing::info!("Queue stopped");
    }
}
