//! Job record storage.
//!
//! The store is the only owner of job records. Handlers and the runner
//! receive snapshots from `get` and change records only through `update`,
//! which applies a mutator atomically per job.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::job::{JobStatus, TransitionError, TranslationJob};

/// Mutation applied to one job under the store's per-entry lock.
pub type JobMutator = Box<dyn FnOnce(&mut TranslationJob) -> Result<(), TransitionError> + Send>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("job {0} not found")]
    NotFound(Uuid),

    #[error("job {id} is still {status}")]
    Busy { id: Uuid, status: JobStatus },

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new `pending` job and return its identifier.
    async fn create(&self, source_filename: &str, target_language: &str) -> Uuid;

    /// Snapshot of a job, or `None` for unknown and evicted ids.
    async fn get(&self, id: Uuid) -> Option<TranslationJob>;

    /// Apply `mutator` atomically. Readers observe either the old or the new
    /// record, never a partially mutated one. Returns the updated snapshot.
    async fn update(&self, id: Uuid, mutator: JobMutator) -> Result<TranslationJob, StoreError>;

    /// Remove a job unconditionally.
    async fn delete(&self, id: Uuid) -> Option<TranslationJob>;

    /// Remove a job only if it reached a terminal status.
    async fn delete_terminal(&self, id: Uuid) -> Result<TranslationJob, StoreError>;

    /// Remove terminal jobs last touched before `older_than`. Returns how many were evicted.
    async fn sweep(&self, older_than: DateTime<Utc>) -> usize;

    async fn len(&self) -> usize;
}

/// In-process store backed by a sharded concurrent map.
///
/// Each entry is guarded by its shard's lock, so unrelated jobs never
/// serialize behind one global mutex.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: DashMap<Uuid, TranslationJob>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, source_filename: &str, target_language: &str) -> Uuid {
        let job = TranslationJob::new(source_filename, target_language);
        let id = job.id;
        self.jobs.insert(id, job);
        id
    }

    async fn get(&self, id: Uuid) -> Option<TranslationJob> {
        self.jobs.get(&id).map(|entry| entry.value().clone())
    }

    async fn update(&self, id: Uuid, mutator: JobMutator) -> Result<TranslationJob, StoreError> {
        let mut entry = self.jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        // Mutate a copy so a rejected transition leaves the record untouched.
        let mut next = entry.value().clone();
        mutator(&mut next)?;
        next.updated_at = Utc::now();
        *entry = next.clone();

        Ok(next)
    }

    async fn delete(&self, id: Uuid) -> Option<TranslationJob> {
        self.jobs.remove(&id).map(|(_, job)| job)
    }

    async fn delete_terminal(&self, id: Uuid) -> Result<TranslationJob, StoreError> {
        if let Some((_, job)) = self.jobs.remove_if(&id, |_, job| job.is_terminal()) {
            return Ok(job);
        }
        match self.jobs.get(&id) {
            Some(job) => Err(StoreError::Busy {
                id,
                status: job.status,
            }),
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn sweep(&self, older_than: DateTime<Utc>) -> usize {
        let before = self.jobs.len();
        self.jobs
            .retain(|_, job| !(job.is_terminal() && job.updated_at < older_than));
        before.saturating_sub(self.jobs.len())
    }

    async fn len(&self) -> usize {
        self.jobs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::JobResult;
    use bytes::Bytes;
    use std::sync::Arc;

    fn finished(bytes: &'static [u8]) -> JobResult {
        JobResult {
            bytes: Bytes::from_static(bytes),
            filename: "translated_notes.docx".to_string(),
            mime_type: "application/octet-stream".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemoryJobStore::new();
        let id = store.create("notes.txt", "Spanish").await;

        let job = store.get(id).await.expect("job should exist");
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.source_filename, "notes.txt");
        assert_eq!(job.target_language, "Spanish");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_id_is_none() {
        let store = InMemoryJobStore::new();
        assert!(store.get(Uuid::new_v4()).await.is_none());
        let err = store
            .update(Uuid::new_v4(), Box::new(|job| job.start()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rejected_mutation_leaves_record_untouched() {
        let store = InMemoryJobStore::new();
        let id = store.create("notes.txt", "Spanish").await;

        let err = store
            .update(
                id,
                Box::new(|job| {
                    job.target_language = "garbage".to_string();
                    job.complete(finished(b"x"))
                }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Transition(_)));

        let job = store.get(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.target_language, "Spanish");
    }

    #[tokio::test]
    async fn test_delete_makes_id_permanently_invalid() {
        let store = InMemoryJobStore::new();
        let id = store.create("notes.txt", "Spanish").await;
        assert!(store.delete(id).await.is_some());
        assert!(store.get(id).await.is_none());
        assert!(store.delete(id).await.is_none());
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_delete_terminal_refuses_running_job() {
        let store = InMemoryJobStore::new();
        let id = store.create("notes.txt", "Spanish").await;
        store.update(id, Box::new(|job| job.start())).await.unwrap();

        let err = store.delete_terminal(id).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Busy {
                status: JobStatus::Processing,
                ..
            }
        ));

        store
            .update(id, Box::new(|job| job.complete(finished(b"done"))))
            .await
            .unwrap();
        let removed = store.delete_terminal(id).await.unwrap();
        assert_eq!(removed.status, JobStatus::Complete);
        assert!(matches!(
            store.delete_terminal(id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_sweep_only_evicts_old_terminal_jobs() {
        let store = InMemoryJobStore::new();
        let running = store.create("a.txt", "French").await;
        let done = store.create("b.txt", "French").await;
        let failed = store.create("c.txt", "French").await;

        store.update(running, Box::new(|job| job.start())).await.unwrap();
        for id in [done, failed] {
            store.update(id, Box::new(|job| job.start())).await.unwrap();
        }
        store
            .update(done, Box::new(|job| job.complete(finished(b"ok"))))
            .await
            .unwrap();
        store
            .update(failed, Box::new(|job| job.fail("boom")))
            .await
            .unwrap();

        // Nothing is old enough yet.
        let cutoff = Utc::now() - chrono::Duration::hours(1);
        assert_eq!(store.sweep(cutoff).await, 0);

        let cutoff = Utc::now() + chrono::Duration::seconds(1);
        assert_eq!(store.sweep(cutoff).await, 2);
        assert!(store.get(running).await.is_some());
        assert!(store.get(done).await.is_none());
        assert!(store.get(failed).await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_complete_never_visible_without_result() {
        let store = Arc::new(InMemoryJobStore::new());
        let id = store.create("big.docx", "Arabic").await;
        store.update(id, Box::new(|job| job.start())).await.unwrap();

        let reader = {
            let store = store.clone();
            tokio::spawn(async move {
                loop {
                    let job = store.get(id).await.unwrap();
                    match job.status {
                        JobStatus::Complete => {
                            assert!(job.result.is_some());
                            return;
                        }
                        _ => assert!(job.result.is_none()),
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        tokio::task::yield_now().await;
        store
            .update(id, Box::new(|job| job.complete(finished(b"payload"))))
            .await
            .unwrap();
        reader.await.unwrap();
    }
}
