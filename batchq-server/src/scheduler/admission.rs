//! Admission control
//!
//! Moves pending jobs into processing, highest priority first, without
//! exceeding the concurrency ceiling or the outbound call budget.

use std::sync::Arc;
use std::time::Duration;

use batchq_core::domain::job::{Job, JobStatus};
use chrono::Utc;
use tokio::sync::{Mutex, Notify, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::repository::{JobStore, StoreResult};
use crate::service::rate::RateTracker;

/// Error recorded for a job claimed while the pool was shutting down
const CHANNEL_CLOSED_MESSAGE: &str = "Queue shut down before the job could start";

#[derive(Debug, Clone, Copy)]
pub struct AdmissionLimits {
    pub max_concurrent_jobs: usize,
    pub max_calls_per_minute: usize,
}

/// Admits pending jobs to the worker pool
pub struct Scheduler {
    store: Arc<dyn JobStore>,
    rate: Arc<RateTracker>,
    limits: AdmissionLimits,
    dispatch: std::sync::Mutex<Option<mpsc::Sender<Job>>>,
    // serializes admission passes
    pass: Mutex<()>,
    wake: Arc<Notify>,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn JobStore>,
        rate: Arc<RateTracker>,
        limits: AdmissionLimits,
        dispatch: mpsc::Sender<Job>,
    ) -> Self {
        Self {
            store,
            rate,
            limits,
            dispatch: std::sync::Mutex::new(Some(dispatch)),
            pass: Mutex::new(()),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Handle the worker pool notifies when a slot frees up
    pub fn wake_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.wake)
    }

    /// Runs one admission pass, returning the ids of the admitted jobs
    pub async fn admit(&self) -> StoreResult<Vec<Uuid>> {
        let _pass = self.pass.lock().await;

        let Some(dispatch) = self.sender() else {
            debug!("Scheduler closed, skipping admission");
            return Ok(Vec::new());
        };

        let counts = self.store.status_counts().await?;
        let free = self
            .limits
            .max_concurrent_jobs
            .saturating_sub(counts.processing as usize);
        if free == 0 {
            debug!(
                "Concurrency ceiling reached ({} processing)",
                counts.processing
            );
            return Ok(Vec::new());
        }

        if self.rate_exhausted() {
            debug!("Rate budget exhausted, deferring admission");
            return Ok(Vec::new());
        }

        let candidates = self.store.next_pending(free).await?;
        let mut admitted = Vec::with_capacity(candidates.len());

        for mut job in candidates {
            if self.rate_exhausted() {
                break;
            }

            let started_at = Utc::now();
            match self.store.claim(job.id, started_at).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!("Job {} was claimed elsewhere, skipping", job.id);
                    continue;
                }
                Err(e) => {
                    warn!("Failed to claim job {}: {}", job.id, e);
                    continue;
                }
            }

            job.status = JobStatus::Processing;
            job.started_at = Some(started_at);
            let id = job.id;

            if dispatch.send(job).await.is_err() {
                warn!("Worker pool is gone, failing job {}", id);
                if let Err(e) = self
                    .store
                    .mark_failed(id, CHANNEL_CLOSED_MESSAGE, 0, Utc::now())
                    .await
                {
                    error!("Failed to record failure of job {}: {}", id, e);
                }
                continue;
            }

            self.rate.record_call();
            admitted.push(id);
        }

        if !admitted.is_empty() {
            info!("Admitted {} job(s)", admitted.len());
        }
        Ok(admitted)
    }

    /// Stops admitting and closes the work channel
    pub async fn close(&self) {
        // wait out an in-flight pass so no claimed job is stranded
        let _pass = self.pass.lock().await;
        self.dispatch
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        info!("Scheduler closed");
    }

    /// Admits on every tick and whenever a worker frees a slot
    pub async fn run(self: Arc<Self>, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
                _ = self.wake.notified() => {}
            }

            if let Err(e) = self.admit().await {
                error!("Admission pass failed: {}", e);
            }
        }

        debug!("Admission loop stopped");
    }

    fn sender(&self) -> Option<mpsc::Sender<Job>> {
        self.dispatch
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn rate_exhausted(&self) -> bool {
        self.rate.current_count() >= self.limits.max_calls_per_minute
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryJobStore;
    use crate::repository::memory::testing::FaultyStore;
    use batchq_core::domain::file::FileDescriptor;
    use batchq_core::domain::job::Priority;

    fn job(priority: Priority) -> Job {
        let files = vec![FileDescriptor {
            name: "a.pdf".to_string(),
            content: "ref://a".to_string(),
            size: Some(10),
            mime_type: None,
        }];
        Job::new(files, priority, 3)
    }

    fn scheduler(
        store: Arc<dyn JobStore>,
        rate: Arc<RateTracker>,
        max_concurrent_jobs: usize,
        max_calls_per_minute: usize,
    ) -> (Arc<Scheduler>, mpsc::Receiver<Job>) {
        let (tx, rx) = mpsc::channel(16);
        let limits = AdmissionLimits {
            max_concurrent_jobs,
            max_calls_per_minute,
        };
        (Arc::new(Scheduler::new(store, rate, limits, tx)), rx)
    }

    #[tokio::test]
    async fn test_admits_highest_priority_first() {
        let store = Arc::new(InMemoryJobStore::new());
        let low = job(Priority::Low);
        let urgent = job(Priority::Urgent);
        store.insert(&low).await.unwrap();
        store.insert(&urgent).await.unwrap();

        let (scheduler, mut rx) = scheduler(store.clone(), Arc::new(RateTracker::new()), 1, 60);

        let admitted = scheduler.admit().await.unwrap();
        assert_eq!(admitted, vec![urgent.id]);

        let dispatched = rx.recv().await.unwrap();
        assert_eq!(dispatched.id, urgent.id);
        assert_eq!(dispatched.status, JobStatus::Processing);

        let low = store.find_by_id(low.id).await.unwrap().unwrap();
        assert_eq!(low.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_concurrency_ceiling() {
        let store = Arc::new(InMemoryJobStore::new());
        for _ in 0..5 {
            store.insert(&job(Priority::Normal)).await.unwrap();
        }

        let (scheduler, _rx) = scheduler(store.clone(), Arc::new(RateTracker::new()), 3, 60);

        assert_eq!(scheduler.admit().await.unwrap().len(), 3);
        assert!(scheduler.admit().await.unwrap().is_empty());

        let counts = store.status_counts().await.unwrap();
        assert_eq!(counts.processing, 3);
        assert_eq!(counts.pending, 2);
    }

    #[tokio::test]
    async fn test_concurrent_passes_admit_each_job_once() {
        let store = Arc::new(InMemoryJobStore::new());
        for _ in 0..4 {
            store.insert(&job(Priority::Normal)).await.unwrap();
        }

        let (scheduler, mut rx) = scheduler(store.clone(), Arc::new(RateTracker::new()), 10, 60);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let scheduler = Arc::clone(&scheduler);
            handles.push(tokio::spawn(async move { scheduler.admit().await.unwrap() }));
        }

        let mut admitted = Vec::new();
        for handle in handles {
            admitted.extend(handle.await.unwrap());
        }
        admitted.sort();
        admitted.dedup();
        assert_eq!(admitted.len(), 4);

        let mut dispatched = 0;
        while rx.try_recv().is_ok() {
            dispatched += 1;
        }
        assert_eq!(dispatched, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_budget_blocks_admission() {
        let store = Arc::new(InMemoryJobStore::new());
        let queued = job(Priority::High);
        store.insert(&queued).await.unwrap();

        let rate = Arc::new(RateTracker::new());
        rate.record_call();
        rate.record_call();

        let (scheduler, _rx) = scheduler(store.clone(), rate.clone(), 3, 2);
        assert!(scheduler.admit().await.unwrap().is_empty());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(scheduler.admit().await.unwrap(), vec![queued.id]);
        assert_eq!(rate.current_count(), 1);
    }

    #[tokio::test]
    async fn test_closed_scheduler_admits_nothing() {
        let store = Arc::new(InMemoryJobStore::new());
        let queued = job(Priority::Normal);
        store.insert(&queued).await.unwrap();

        let (scheduler, mut rx) = scheduler(store.clone(), Arc::new(RateTracker::new()), 3, 60);
        scheduler.close().await;

        assert!(scheduler.admit().await.unwrap().is_empty());
        assert!(rx.recv().await.is_none());

        let stored = store.find_by_id(queued.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_claim_error_skips_only_that_job() {
        let store = Arc::new(FaultyStore::default());
        let first = job(Priority::High);
        let second = job(Priority::Normal);
        store.insert(&first).await.unwrap();
        store.insert(&second).await.unwrap();
        store.fail_next_claim(first.id);

        let (scheduler, mut rx) = scheduler(store.clone(), Arc::new(RateTracker::new()), 2, 60);

        assert_eq!(scheduler.admit().await.unwrap(), vec![second.id]);
        assert_eq!(rx.recv().await.unwrap().id, second.id);

        let stored = store.find_by_id(first.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Pending);

        assert_eq!(scheduler.admit().await.unwrap(), vec![first.id]);
        assert_eq!(rx.recv().await.unwrap().id, first.id);
    }
}
