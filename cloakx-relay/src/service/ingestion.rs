//! Job Ingestion
//!
//! Turns `JobCreated` events into job records and hands newly inserted jobs
//! to the pipeline. Inserts are idempotent by job id, so a page delivered
//! twice neither duplicates a job nor starts its pipeline again.

use anyhow::{Context, Result};
use async_trait::async_trait;
use cloakx_core::domain::event::{LedgerEvent, decode_job_created};
use cloakx_core::domain::job::{Job, JobStatus};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::repository::JobRepository;
use crate::scheduler::dispatcher::{DispatchError, PipelineDispatcher};
use crate::scheduler::EventHandler;

/// Event handler for the registry's `JobCreated` events
pub struct JobCreatedHandler {
    jobs: Arc<dyn JobRepository>,
    dispatcher: PipelineDispatcher,
}

impl JobCreatedHandler {
    pub fn new(jobs: Arc<dyn JobRepository>, dispatcher: PipelineDispatcher) -> Self {
        Self { jobs, dispatcher }
    }

    /// Dispatches jobs left `PENDING` by a previous run
    ///
    /// A job stored right before a shutdown is never dispatched by the
    /// redelivered event, since its id is already known.
    ///
    /// # Returns
    /// The number of resumed jobs
    pub async fn resume_pending(&self) -> Result<usize> {
        let pending = self
            .jobs
            .list(Some(JobStatus::Pending))
            .await
            .context("Failed to list pending jobs")?;

        if pending.is_empty() {
            return Ok(0);
        }

        info!("Resuming {} pending job(s)", pending.len());
        let count = pending.len();
        for job in pending {
            self.run_pipeline(job).await?;
        }

        Ok(count)
    }

    async fn run_pipeline(&self, job: Job) -> Result<()> {
        let job_id = job.id;
        match self.dispatcher.dispatch(job).await {
            Ok(receipt) => {
                info!("Job {} submitted in {}", job_id, receipt.digest);
                Ok(())
            }
            // Already recorded on the job; the batch carries on
            Err(DispatchError::Pipeline(e)) => {
                error!("Pipeline for job {} failed: {}", job_id, e);
                Ok(())
            }
            Err(e @ DispatchError::Closed) => {
                Err(e).with_context(|| format!("Failed to dispatch job {}", job_id))
            }
        }
    }
}

#[async_trait]
impl EventHandler for JobCreatedHandler {
    async fn handle(&self, events: &[LedgerEvent]) -> Result<()> {
        for event in events {
            if !event.is_job_created() {
                debug!("Skipping {} event {}", event.type_name(), event.id);
                continue;
            }

            let new_job = match decode_job_created(event) {
                Ok(job) => job,
                Err(e) => {
                    warn!("Skipping malformed JobCreated event {}: {}", event.id, e);
                    continue;
                }
            };

            let job_id = new_job.id;
            let inserted = self
                .jobs
                .insert_if_absent(new_job)
                .await
                .with_context(|| format!("Failed to store job {}", job_id))?;

            let Some(job) = inserted else {
                debug!("Job {} already known, not dispatching", job_id);
                continue;
            };

            info!(
                "Ingested job {} (pool {}, creator {}, price {})",
                job.id, job.pool_id, job.creator, job.price
            );
            self.run_pipeline(job).await?;
        }

        Ok(())
    }
}
