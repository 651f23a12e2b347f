//! Worker pool
//!
//! A fixed set of workers pulling admitted jobs off a shared channel.
//! The channel closes when the scheduler shuts down; workers then finish
//! what they hold and exit.

use std::sync::Arc;
use std::time::Duration;

use batchq_core::domain::job::Job;
use tokio::sync::{Mutex, Notify, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::scheduler::cancellation::CancellationRegistry;
use crate::scheduler::processor::{CANCELLED_MESSAGE, JobProcessor};

/// Running workers and the token that aborts their jobs
pub struct WorkerPool {
    workers: JoinSet<()>,
    abort: CancellationToken,
}

impl WorkerPool {
    /// Spawns `size` workers reading from `jobs`
    ///
    /// `wake` is notified each time a worker finishes a job so that the
    /// scheduler can admit the next one.
    pub fn spawn(
        size: usize,
        jobs: mpsc::Receiver<Job>,
        processor: Arc<JobProcessor>,
        registry: Arc<CancellationRegistry>,
        wake: Arc<Notify>,
    ) -> Self {
        let jobs = Arc::new(Mutex::new(jobs));
        let abort = CancellationToken::new();
        let mut workers = JoinSet::new();

        for worker in 0..size.max(1) {
            workers.spawn(run_worker(
                worker,
                Arc::clone(&jobs),
                Arc::clone(&processor),
                Arc::clone(&registry),
                Arc::clone(&wake),
                abort.clone(),
            ));
        }

        info!("Started worker pool with {} worker(s)", size.max(1));
        Self { workers, abort }
    }

    /// Waits for the workers to drain, cancelling their jobs after `grace`
    ///
    /// The job channel must be closed first or the workers never exit.
    pub async fn shutdown(mut self, grace: Duration) {
        if tokio::time::timeout(grace, drain(&mut self.workers))
            .await
            .is_err()
        {
            warn!(
                "Workers still busy after {:?}, cancelling running jobs",
                grace
            );
            self.abort.cancel();
            drain(&mut self.workers).await;
        }
        info!("Worker pool stopped");
    }
}

async fn drain(workers: &mut JoinSet<()>) {
    while let Some(result) = workers.join_next().await {
        if let Err(e) = result {
            error!("Worker task panicked: {}", e);
        }
    }
}

async fn run_worker(
    worker: usize,
    jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
    processor: Arc<JobProcessor>,
    registry: Arc<CancellationRegistry>,
    wake: Arc<Notify>,
    abort: CancellationToken,
) {
    loop {
        let next = jobs.lock().await.recv().await;
        let Some(job) = next else {
            debug!("Worker {} exiting, job channel closed", worker);
            return;
        };

        let job_id = job.id;
        let retry_count = job.retry_count;
        let token = abort.child_token();
        registry.register(job_id, token.clone());

        debug!("Worker {} picked up job {}", worker, job_id);

        // a panicking job must not take the worker down with it
        let run = {
            let processor = Arc::clone(&processor);
            tokio::spawn(async move { processor.run(job, token).await })
        };

        if let Err(e) = run.await {
            error!("Job {} panicked: {}", job_id, e);
            let message = if e.is_cancelled() {
                CANCELLED_MESSAGE.to_string()
            } else {
                format!("Job processing panicked: {}", e)
            };
            processor.fail(job_id, &message, retry_count).await;
        }

        registry.remove(job_id);
        wake.notify_one();
    }
}
