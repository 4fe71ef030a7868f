//! In-memory repositories
//!
//! Mutex-guarded maps with the same semantics as the Postgres
//! implementations, including compare-and-set status transitions.

use async_trait::async_trait;
use cloakx_core::domain::cursor::{Cursor, EventId};
use cloakx_core::domain::job::{Job, JobId, JobStatus, NewJob};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

use super::job::to_i64;
use super::{CursorRepository, JobRepository, StoreError};

/// In-memory implementation of CursorRepository
#[derive(Default)]
pub struct InMemoryCursorRepository {
    cursors: Mutex<HashMap<String, Cursor>>,
}

impl InMemoryCursorRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CursorRepository for InMemoryCursorRepository {
    async fn get(&self, event_type: &str) -> Result<Option<EventId>, StoreError> {
        let cursors = self.cursors.lock().await;
        Ok(cursors.get(event_type).map(|c| c.position.clone()))
    }

    async fn set(&self, event_type: &str, position: &EventId) -> Result<(), StoreError> {
        let mut cursors = self.cursors.lock().await;
        cursors.insert(
            event_type.to_string(),
            Cursor {
                event_type: event_type.to_string(),
                position: position.clone(),
                updated_at: chrono::Utc::now(),
            },
        );
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Cursor>, StoreError> {
        let cursors = self.cursors.lock().await;
        let mut all: Vec<Cursor> = cursors.values().cloned().collect();
        all.sort_by(|a, b| a.event_type.cmp(&b.event_type));
        Ok(all)
    }

    async fn reset_all(&self) -> Result<u64, StoreError> {
        let mut cursors = self.cursors.lock().await;
        let count = cursors.len() as u64;
        cursors.clear();
        Ok(count)
    }
}

/// In-memory implementation of JobRepository
#[derive(Default)]
pub struct InMemoryJobRepository {
    jobs: Mutex<BTreeMap<JobId, Job>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    async fn transition(
        &self,
        id: JobId,
        from: JobStatus,
        to: JobStatus,
        apply: impl FnOnce(&mut Job) + Send,
    ) -> Result<bool, StoreError> {
        let mut jobs = self.jobs.lock().await;
        match jobs.get_mut(&id) {
            Some(job) if job.status == from && from.can_transition_to(to) => {
                job.status = to;
                job.updated_at = chrono::Utc::now();
                apply(job);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn insert_if_absent(&self, job: NewJob) -> Result<Option<Job>, StoreError> {
        // Same column bounds as Postgres
        to_i64("id", job.id)?;
        to_i64("pool_id", job.pool_id)?;
        to_i64("price", job.price)?;
        to_i64("epochs", job.epochs)?;
        to_i64("learning_rate", job.learning_rate)?;

        let mut jobs = self.jobs.lock().await;
        if jobs.contains_key(&job.id) {
            return Ok(None);
        }

        let stored = job.into_job(chrono::Utc::now());
        jobs.insert(stored.id, stored.clone());
        Ok(Some(stored))
    }

    async fn find_by_id(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.lock().await.get(&id).cloned())
    }

    async fn list(&self, status: Option<JobStatus>) -> Result<Vec<Job>, StoreError> {
        let jobs = self.jobs.lock().await;
        Ok(jobs
            .values()
            .filter(|job| status.is_none_or(|s| job.status == s))
            .cloned()
            .collect())
    }

    async fn start(&self, id: JobId) -> Result<bool, StoreError> {
        self.transition(id, JobStatus::Pending, JobStatus::InProgress, |_| {})
            .await
    }

    async fn set_model_config_blob_id(&self, id: JobId, blob_id: &str) -> Result<(), StoreError> {
        if let Some(job) = self.jobs.lock().await.get_mut(&id) {
            job.model_config_blob_id = Some(blob_id.to_string());
            job.updated_at = chrono::Utc::now();
        }
        Ok(())
    }

    async fn complete(&self, id: JobId, digest: &str) -> Result<bool, StoreError> {
        let digest = digest.to_string();
        self.transition(id, JobStatus::InProgress, JobStatus::Completed, |job| {
            job.completion_digest = Some(digest);
        })
        .await
    }

    async fn fail(&self, id: JobId, reason: &str) -> Result<bool, StoreError> {
        let reason = reason.to_string();
        self.transition(id, JobStatus::InProgress, JobStatus::Failed, |job| {
            job.failure_reason = Some(reason);
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_values_beyond_column_range_are_rejected() {
        let repo = InMemoryJobRepository::new();
        let job = NewJob {
            id: 7,
            creator: "0xA".to_string(),
            pool_id: 3,
            price: 1,
            buyer_public_key: vec![],
            epochs: u64::MAX,
            learning_rate: 1,
        };

        assert!(matches!(
            repo.insert_if_absent(job).await,
            Err(StoreError::OutOfRange { column: "epochs", .. })
        ));
        assert!(repo.list(None).await.unwrap().is_empty());
    }
}
