//! Training Pipeline
//!
//! Drives one job from `PENDING` to `COMPLETED` or `FAILED`:
//! - Marks the job in progress before any external call
//! - Resolves the model config and the pool's data blobs from the ledger
//! - Runs the training request on the compute enclave
//! - Submits the signed result with `complete_job`
//!
//! The job is only marked completed once the ledger accepted the
//! transaction. Any error after the job was started marks it failed and is
//! returned to the caller.

use cloakx_core::domain::job::{Job, JobId, JobStatus};
use cloakx_core::domain::training::{OnChainJobStatus, TrainingRequest};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::encoding::{self, EncodingError};
use crate::repository::{
    ComputeError, ComputeRepository, JobRepository, LedgerError, LedgerRepository, StoreError,
    SubmissionReceipt,
};

/// Errors that end a pipeline run
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("job {id} is not {expected}")]
    InvalidTransition { id: JobId, expected: JobStatus },

    #[error("job {0} not found on the ledger")]
    JobNotOnChain(JobId),

    #[error("job {id} is {status:?} on the ledger")]
    NotPendingOnChain { id: JobId, status: OnChainJobStatus },

    #[error("job {0} has no model config blob")]
    MissingModelConfig(JobId),

    #[error("pool {pool_id} has no data blobs")]
    NoDataBlobs { pool_id: u64 },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Compute(#[from] ComputeError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

/// Runs jobs through the ledger and compute gateways
pub struct TrainingPipeline {
    jobs: Arc<dyn JobRepository>,
    ledger: Arc<dyn LedgerRepository>,
    compute: Arc<dyn ComputeRepository>,
}

impl TrainingPipeline {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        ledger: Arc<dyn LedgerRepository>,
        compute: Arc<dyn ComputeRepository>,
    ) -> Self {
        Self {
            jobs,
            ledger,
            compute,
        }
    }

    /// Runs the full pipeline for a pending job
    ///
    /// # Returns
    /// The receipt of the accepted `complete_job` transaction
    pub async fn run(&self, job: &Job) -> Result<SubmissionReceipt, PipelineError> {
        if !self.jobs.start(job.id).await? {
            return Err(PipelineError::InvalidTransition {
                id: job.id,
                expected: JobStatus::Pending,
            });
        }
        info!("Job {} moved to IN_PROGRESS", job.id);

        let receipt = match self.execute(job).await {
            Ok(receipt) => receipt,
            Err(e) => {
                self.record_failure(job.id, &e).await;
                return Err(e);
            }
        };

        if !self.jobs.complete(job.id, &receipt.digest).await? {
            error!(
                "Job {} completed on-chain ({}) but was no longer IN_PROGRESS locally",
                job.id, receipt.digest
            );
            return Err(PipelineError::InvalidTransition {
                id: job.id,
                expected: JobStatus::InProgress,
            });
        }

        info!("Job {} COMPLETED in transaction {}", job.id, receipt.digest);
        Ok(receipt)
    }

    async fn execute(&self, job: &Job) -> Result<SubmissionReceipt, PipelineError> {
        let on_chain = self
            .ledger
            .get_job(job.id)
            .await?
            .ok_or(PipelineError::JobNotOnChain(job.id))?;

        if on_chain.status != OnChainJobStatus::Pending {
            return Err(PipelineError::NotPendingOnChain {
                id: job.id,
                status: on_chain.status,
            });
        }

        let model_config_blob_id = on_chain
            .model_config_blob_id
            .filter(|id| !id.trim().is_empty())
            .ok_or(PipelineError::MissingModelConfig(job.id))?;
        self.jobs
            .set_model_config_blob_id(job.id, &model_config_blob_id)
            .await?;

        let contributors = self.ledger.pool_contributors(job.pool_id).await?;
        let data_blob_ids = self.ledger.pool_data_blob_ids(job.pool_id).await?;
        info!(
            "Job {}: pool {} has {} contributor(s) and {} data blob(s)",
            job.id,
            job.pool_id,
            contributors.len(),
            data_blob_ids.len()
        );

        if data_blob_ids.is_empty() {
            return Err(PipelineError::NoDataBlobs {
                pool_id: job.pool_id,
            });
        }

        let request = TrainingRequest {
            data_blob_ids,
            model_config_blob_id,
            key_id: job.creator.clone(),
            learning_rate: job.learning_rate,
            epochs: job.epochs,
        };

        let signed = self.compute.train(&request).await?;
        info!(
            "Job {}: enclave returned model {} (timestamp {})",
            job.id, signed.response.payload.model_blob_id, signed.response.timestamp_ms
        );

        let call = encoding::build_completion_call(job.id, &signed)?;
        let receipt = self.ledger.complete_job(call).await?;
        Ok(receipt)
    }

    async fn record_failure(&self, id: JobId, cause: &PipelineError) {
        match self.jobs.fail(id, &cause.to_string()).await {
            Ok(true) => warn!("Job {} FAILED: {}", id, cause),
            Ok(false) => warn!("Job {} failed ({}) but was no longer IN_PROGRESS", id, cause),
            Err(e) => error!("Failed to record failure of job {}: {}", id, e),
        }
    }
}
