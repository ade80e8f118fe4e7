//! Job Repository
//!
//! Every mutation goes through `transition`, which validates the change
//! against the current record while holding the write lock.

use async_trait::async_trait;
use masumi_core::domain::job::{Job, JobTransition, TransitionError};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Store error type
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job {0} not found")]
    NotFound(Uuid),

    #[error("job {0} already exists")]
    DuplicateId(Uuid),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
}

/// Storage for job records
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Inserts a new job
    async fn create(&self, job: Job) -> Result<Job, StoreError>;

    /// Finds a job by ID
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Job>, StoreError>;

    /// Applies a transition atomically and returns the updated job
    ///
    /// Fails with `InvalidTransition` and leaves the record untouched when
    /// the job's current status does not allow the transition.
    async fn transition(&self, id: Uuid, transition: JobTransition) -> Result<Job, StoreError>;

    /// Number of jobs that are awaiting payment or running
    async fn count_active(&self) -> Result<usize, StoreError>;
}

/// Process-lifetime job store
#[derive(Debug, Default)]
pub struct InMemoryJobRepository {
    jobs: RwLock<HashMap<Uuid, Job>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn create(&self, job: Job) -> Result<Job, StoreError> {
        let mut jobs = self.jobs.write().await;

        if jobs.contains_key(&job.id) {
            return Err(StoreError::DuplicateId(job.id));
        }

        jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn transition(&self, id: Uuid, transition: JobTransition) -> Result<Job, StoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        job.apply(transition)?;
        Ok(job.clone())
    }

    async fn count_active(&self) -> Result<usize, StoreError> {
        Ok(self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| !job.status.is_terminal())
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use masumi_core::domain::job::JobStatus;
    use masumi_core::domain::payment::PaymentStatus;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn new_job() -> Job {
        Job::new(
            "p1".to_string(),
            BTreeMap::new(),
            "bc-1".to_string(),
            "hash".to_string(),
        )
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let repo = InMemoryJobRepository::new();
        let job = repo.create(new_job()).await.unwrap();

        let found = repo.find_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(found.id, job.id);
        assert_eq!(found.status, JobStatus::AwaitingPayment);
        assert!(repo.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let repo = InMemoryJobRepository::new();
        let job = repo.create(new_job()).await.unwrap();
        assert!(matches!(
            repo.create(job).await,
            Err(StoreError::DuplicateId(_))
        ));
    }

    #[tokio::test]
    async fn test_transition_unknown_job() {
        let repo = InMemoryJobRepository::new();
        let result = repo
            .transition(Uuid::new_v4(), JobTransition::StartRunning)
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_invalid_transition_leaves_record() {
        let repo = InMemoryJobRepository::new();
        let job = repo.create(new_job()).await.unwrap();

        let result = repo
            .transition(
                job.id,
                JobTransition::Complete {
                    result: serde_json::json!("x"),
                },
            )
            .await;
        assert!(matches!(result, Err(StoreError::InvalidTransition(_))));

        let stored = repo.find_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::AwaitingPayment);
        assert!(stored.result.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_start_running_applies_once() {
        let repo = Arc::new(InMemoryJobRepository::new());
        let job = repo.create(new_job()).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.transition(job.id, JobTransition::StartRunning)
                    .await
                    .is_ok()
            }));
        }

        let mut applied = 0;
        for handle in handles {
            if handle.await.unwrap() {
                applied += 1;
            }
        }
        assert_eq!(applied, 1);
    }

    #[tokio::test]
    async fn test_count_active() {
        let repo = InMemoryJobRepository::new();
        let a = repo.create(new_job()).await.unwrap();
        repo.create(new_job()).await.unwrap();
        assert_eq!(repo.count_active().await.unwrap(), 2);

        repo.transition(
            a.id,
            JobTransition::Fail {
                error: "expired".to_string(),
            },
        )
        .await
        .unwrap();
        assert_eq!(repo.count_active().await.unwrap(), 1);

        let updated = repo
            .transition(a.id, JobTransition::RecordPaymentStatus(PaymentStatus::Error))
            .await
            .unwrap();
        assert_eq!(updated.payment_status, PaymentStatus::Pending);
    }
}
