//! Queue statistics types

use serde::{Deserialize, Serialize};

use crate::domain::job::JobStatus;

/// Number of stored jobs in each status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

impl StatusCounts {
    pub fn total(&self) -> u64 {
        self.pending + self.processing + self.completed + self.failed
    }

    pub fn get(&self, status: JobStatus) -> u64 {
        match status {
            JobStatus::Pending => self.pending,
            JobStatus::Processing => self.processing,
            JobStatus::Completed => self.completed,
            JobStatus::Failed => self.failed,
        }
    }

    pub fn add(&mut self, status: JobStatus, count: u64) {
        match status {
            JobStatus::Pending => self.pending += count,
            JobStatus::Processing => self.processing += count,
            JobStatus::Completed => self.completed += count,
            JobStatus::Failed => self.failed += count,
        }
    }
}

/// Operational snapshot returned by `GET /queue-stats`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub total_jobs: u64,
    pub pending_jobs: u64,
    pub active_jobs: u64,
    pub completed_jobs: u64,
    pub failed_jobs: u64,
    pub current_api_calls: usize,
    pub max_api_calls_per_minute: usize,
    pub max_concurrent_jobs: usize,
    pub max_files_per_group: usize,
    pub max_group_bytes: u64,
    pub job_retention_days: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_counts_total() {
        let mut counts = StatusCounts::default();
        counts.add(JobStatus::Pending, 3);
        counts.add(JobStatus::Failed, 1);
        counts.add(JobStatus::Pending, 1);
        assert_eq!(counts.get(JobStatus::Pending), 4);
        assert_eq!(counts.total(), 5);
    }
}
