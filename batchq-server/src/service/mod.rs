//! Service Module
//!
//! Business logic layer of the queue server.
//! Services orchestrate between the Job Store, the scheduler and the
//! downstream extraction service.

pub mod cleanup;
pub mod extraction;
pub mod job;
pub mod rate;

pub use job::{JobError, JobService};
