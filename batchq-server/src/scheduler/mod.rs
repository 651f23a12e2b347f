//! Scheduler layer
//!
//! Admission control, the worker pool that runs admitted jobs, and the
//! per-job batch processor. Jobs flow:
//! - `admission::Scheduler` claims pending jobs and sends them to the pool
//! - `pool::WorkerPool` runs each job on one of its workers
//! - `processor::JobProcessor` drives a job group by group to a terminal status

pub mod admission;
pub mod backoff;
pub mod cancellation;
pub mod pool;
pub mod processor;

pub use admission::{AdmissionLimits, Scheduler};
pub use cancellation::CancellationRegistry;
pub use pool::WorkerPool;
pub use processor::{JobOutcome, JobProcessor, ProcessorSettings};
