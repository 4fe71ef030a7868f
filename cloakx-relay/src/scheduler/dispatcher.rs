//! Pipeline dispatcher
//!
//! Hands jobs from the ingestion handler to the pipeline worker over a
//! bounded queue. The caller awaits the outcome, so a poller loop still has
//! one job in flight at a time; more workers can drain the same queue later
//! without changing the ingestion side.

use cloakx_core::domain::job::Job;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::repository::SubmissionReceipt;
use crate::service::{PipelineError, TrainingPipeline};

/// A job queued for the pipeline, with the channel its outcome is sent on
pub struct PipelineTask {
    job: Job,
    reply: oneshot::Sender<Result<SubmissionReceipt, PipelineError>>,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("pipeline worker is not running")]
    Closed,
}

/// Sending half of the pipeline queue
#[derive(Clone)]
pub struct PipelineDispatcher {
    tx: mpsc::Sender<PipelineTask>,
}

impl PipelineDispatcher {
    /// Creates a dispatcher and the receiver its worker drains
    pub fn new(depth: usize) -> (Self, mpsc::Receiver<PipelineTask>) {
        let (tx, rx) = mpsc::channel(depth.max(1));
        (Self { tx }, rx)
    }

    /// Queues `job` and waits for its pipeline outcome
    pub async fn dispatch(&self, job: Job) -> Result<SubmissionReceipt, DispatchError> {
        let (reply, outcome) = oneshot::channel();

        self.tx
            .send(PipelineTask { job, reply })
            .await
            .map_err(|_| DispatchError::Closed)?;

        let result = outcome.await.map_err(|_| DispatchError::Closed)?;
        Ok(result?)
    }
}

/// Runs queued jobs through the pipeline, one at a time
pub struct PipelineWorker {
    pipeline: Arc<TrainingPipeline>,
    rx: mpsc::Receiver<PipelineTask>,
}

impl PipelineWorker {
    pub fn new(pipeline: Arc<TrainingPipeline>, rx: mpsc::Receiver<PipelineTask>) -> Self {
        Self { pipeline, rx }
    }

    /// Drains the queue until every dispatcher is dropped
    pub async fn run(mut self) {
        info!("Pipeline worker started");

        while let Some(task) = self.rx.recv().await {
            let job_id = task.job.id;
            let result = self.pipeline.run(&task.job).await;

            if task.reply.send(result).is_err() {
                warn!("Outcome of job {} dropped: dispatcher went away", job_id);
            }
        }

        info!("Pipeline worker stopped");
    }
}
