//! In-memory Job Store
//!
//! Process-local store used for development (`STORE_BACKEND=memory`) and
//! tests. Every operation runs under one lock, which makes `claim` a
//! compare-and-set just like the conditional UPDATE of the Postgres store.

use std::collections::HashMap;

use async_trait::async_trait;
use batchq_core::domain::file::FileResult;
use batchq_core::domain::job::{Job, JobStatus};
use batchq_core::domain::stats::StatusCounts;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{JobStore, StoreError, StoreResult};

#[derive(Default)]
struct Inner {
    jobs: HashMap<Uuid, Entry>,
    next_seq: u64,
}

struct Entry {
    seq: u64,
    job: Job,
}

/// Job store held in process memory
#[derive(Default)]
pub struct InMemoryJobStore {
    inner: RwLock<Inner>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Admission order key: priority desc, arrival asc, insertion asc
fn admission_key(entry: &Entry) -> (std::cmp::Reverse<i16>, DateTime<Utc>, u64) {
    (
        std::cmp::Reverse(entry.job.priority.rank()),
        entry.job.created_at,
        entry.seq,
    )
}

fn processing_job(inner: &mut Inner, id: Uuid) -> StoreResult<&mut Job> {
    match inner.jobs.get_mut(&id) {
        Some(entry) if entry.job.status == JobStatus::Processing => Ok(&mut entry.job),
        _ => Err(StoreError::NotProcessing(id)),
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: &Job) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.jobs.insert(
            job.id,
            Entry {
                seq,
                job: job.clone(),
            },
        );
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Job>> {
        let inner = self.inner.read().await;
        Ok(inner.jobs.get(&id).map(|entry| entry.job.clone()))
    }

    async fn status_counts(&self) -> StoreResult<StatusCounts> {
        let inner = self.inner.read().await;
        let mut counts = StatusCounts::default();
        for entry in inner.jobs.values() {
            counts.add(entry.job.status, 1);
        }
        Ok(counts)
    }

    async fn next_pending(&self, limit: usize) -> StoreResult<Vec<Job>> {
        let inner = self.inner.read().await;
        let mut pending: Vec<&Entry> = inner
            .jobs
            .values()
            .filter(|entry| entry.job.status == JobStatus::Pending)
            .collect();
        pending.sort_by_key(|entry| admission_key(entry));

        Ok(pending
            .into_iter()
            .take(limit)
            .map(|entry| entry.job.clone())
            .collect())
    }

    async fn queue_position(&self, id: Uuid) -> StoreResult<Option<u64>> {
        let inner = self.inner.read().await;
        let Some(target) = inner.jobs.get(&id) else {
            return Ok(None);
        };
        if target.job.status != JobStatus::Pending {
            return Ok(None);
        }

        let target_key = admission_key(target);
        let position = inner
            .jobs
            .values()
            .filter(|entry| entry.job.status == JobStatus::Pending)
            .filter(|entry| admission_key(entry) <= target_key)
            .count();

        Ok(Some(position as u64))
    }

    async fn claim(&self, id: Uuid, started_at: DateTime<Utc>) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.jobs.get_mut(&id) {
            Some(entry) if entry.job.status == JobStatus::Pending => {
                entry.job.status = JobStatus::Processing;
                entry.job.started_at = Some(started_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_progress(
        &self,
        id: Uuid,
        results: &[FileResult],
        progress: u8,
        retry_count: u32,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let job = processing_job(&mut inner, id)?;
        job.results.extend_from_slice(results);
        job.progress = job.progress.max(progress);
        job.retry_count = retry_count;
        Ok(())
    }

    async fn mark_completed(
        &self,
        id: Uuid,
        retry_count: u32,
        completed_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let job = processing_job(&mut inner, id)?;
        job.status = JobStatus::Completed;
        job.progress = 100;
        job.retry_count = retry_count;
        job.completed_at = Some(completed_at);
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
        retry_count: u32,
        completed_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let job = processing_job(&mut inner, id)?;
        job.status = JobStatus::Failed;
        job.errors.push(error.to_string());
        job.retry_count = retry_count;
        job.completed_at = Some(completed_at);
        Ok(())
    }

    async fn delete_terminal_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let mut inner = self.inner.write().await;
        let before = inner.jobs.len();
        inner.jobs.retain(|_, entry| {
            let expired = entry.job.status.is_terminal()
                && entry.job.completed_at.is_some_and(|at| at < cutoff);
            !expired
        });
        Ok((before - inner.jobs.len()) as u64)
    }

    async fn fail_interrupted(
        &self,
        cutoff: DateTime<Utc>,
        error: &str,
        completed_at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut inner = self.inner.write().await;
        let mut failed = 0;
        for entry in inner.jobs.values_mut() {
            let job = &mut entry.job;
            if job.status == JobStatus::Processing && job.started_at.is_some_and(|at| at <= cutoff)
            {
                job.status = JobStatus::Failed;
                job.errors.push(error.to_string());
                job.completed_at = Some(completed_at);
                failed += 1;
            }
        }
        Ok(failed)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use batchq_core::domain::file::FileDescriptor;
    use batchq_core::domain::job::Priority;
    use std::sync::Arc;

    fn job(priority: Priority) -> Job {
        let files = vec![FileDescriptor {
            name: "a.pdf".to_string(),
            content: "ref://a".to_string(),
            size: Some(1),
            mime_type: None,
        }];
        Job::new(files, priority, 3)
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = InMemoryJobStore::new();
        let job = job(Priority::Normal);
        store.insert(&job).await.unwrap();

        let found = store.find_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(found.id, job.id);
        assert_eq!(found.status, JobStatus::Pending);
        assert!(store.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_next_pending_priority_then_arrival() {
        let store = InMemoryJobStore::new();
        let normal_first = job(Priority::Normal);
        let urgent_second = job(Priority::Urgent);
        let normal_third = job(Priority::Normal);
        for j in [&normal_first, &urgent_second, &normal_third] {
            store.insert(j).await.unwrap();
        }

        let ids: Vec<Uuid> = store
            .next_pending(10)
            .await
            .unwrap()
            .into_iter()
            .map(|j| j.id)
            .collect();
        assert_eq!(ids, vec![urgent_second.id, normal_first.id, normal_third.id]);

        assert_eq!(store.next_pending(1).await.unwrap()[0].id, urgent_second.id);
        assert_eq!(store.queue_position(normal_third.id).await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_claim_is_compare_and_set() {
        let store = Arc::new(InMemoryJobStore::new());
        let job = job(Priority::Normal);
        store.insert(&job).await.unwrap();

        let id = job.id;
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.claim(id, Utc::now()).await.unwrap()
            }));
        }

        let mut claimed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                claimed += 1;
            }
        }
        assert_eq!(claimed, 1);

        let stored = store.find_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Processing);
        assert!(stored.started_at.is_some());
        assert_eq!(store.queue_position(job.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_writes_require_processing() {
        let store = InMemoryJobStore::new();
        let job = job(Priority::Low);
        store.insert(&job).await.unwrap();

        let err = store.record_progress(job.id, &[], 10, 0).await.unwrap_err();
        assert!(matches!(err, StoreError::NotProcessing(id) if id == job.id));

        store.claim(job.id, Utc::now()).await.unwrap();
        store.mark_completed(job.id, 0, Utc::now()).await.unwrap();

        let err = store
            .mark_failed(job.id, "late failure", 0, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotProcessing(_)));
    }

    #[tokio::test]
    async fn test_progress_never_decreases() {
        let store = InMemoryJobStore::new();
        let job = job(Priority::Normal);
        store.insert(&job).await.unwrap();
        store.claim(job.id, Utc::now()).await.unwrap();

        store.record_progress(job.id, &[], 60, 0).await.unwrap();
        store.record_progress(job.id, &[], 30, 1).await.unwrap();

        let stored = store.find_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(stored.progress, 60);
        assert_eq!(stored.retry_count, 1);
    }

    #[tokio::test]
    async fn test_fail_interrupted_keeps_partial_results() {
        let store = InMemoryJobStore::new();
        let stale = job(Priority::Normal);
        let queued = job(Priority::Normal);
        store.insert(&stale).await.unwrap();
        store.insert(&queued).await.unwrap();

        let started_at = Utc::now() - chrono::Duration::minutes(5);
        store.claim(stale.id, started_at).await.unwrap();
        let partial = FileResult {
            name: "a.pdf".to_string(),
            text: Some("partial".to_string()),
            error: None,
            metadata: serde_json::Value::Null,
        };
        store.record_progress(stale.id, &[partial], 50, 1).await.unwrap();

        let failed = store
            .fail_interrupted(Utc::now(), "interrupted", Utc::now())
            .await
            .unwrap();
        assert_eq!(failed, 1);

        let stale = store.find_by_id(stale.id).await.unwrap().unwrap();
        assert_eq!(stale.status, JobStatus::Failed);
        assert_eq!(stale.errors, vec!["interrupted".to_string()]);
        assert_eq!(stale.results.len(), 1);
        assert_eq!(stale.progress, 50);
        assert!(stale.completed_at.is_some());

        let queued = store.find_by_id(queued.id).await.unwrap().unwrap();
        assert_eq!(queued.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_fail_interrupted_ignores_later_claims() {
        let store = InMemoryJobStore::new();
        let fresh = job(Priority::Normal);
        store.insert(&fresh).await.unwrap();

        let cutoff = Utc::now() - chrono::Duration::minutes(1);
        store.claim(fresh.id, Utc::now()).await.unwrap();

        assert_eq!(
            store.fail_interrupted(cutoff, "interrupted", Utc::now()).await.unwrap(),
            0
        );
        let fresh = store.find_by_id(fresh.id).await.unwrap().unwrap();
        assert_eq!(fresh.status, JobStatus::Processing);
    }

    #[tokio::test]
    async fn test_status_counts() {
        let store = InMemoryJobStore::new();
        let a = job(Priority::Normal);
        let b = job(Priority::Normal);
        store.insert(&a).await.unwrap();
        store.insert(&b).await.unwrap();
        store.claim(a.id, Utc::now()).await.unwrap();

        let counts = store.status_counts().await.unwrap();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.processing, 1);
        assert_eq!(counts.total(), 2);
    }
}
