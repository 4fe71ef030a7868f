//! Scripted ledger and compute gateways for tests

use async_trait::async_trait;
use cloakx_core::domain::cursor::EventId;
use cloakx_core::domain::event::{EventFilter, EventPage, LedgerEvent};
use cloakx_core::domain::job::JobId;
use cloakx_core::domain::training::{
    OnChainJob, OnChainJobStatus, SignedTrainingResponse, TimestampedPayload, TrainingPayload,
    TrainingRequest,
};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::{
    CompleteJobCall, ComputeError, ComputeRepository, LedgerError, LedgerRepository,
    SubmissionReceipt,
};

/// Ledger whose reads are fixed up front and whose writes are recorded
#[derive(Default)]
pub struct ScriptedLedger {
    pub pages: Mutex<VecDeque<Result<EventPage, LedgerError>>>,
    pub queried_from: Mutex<Vec<Option<EventId>>>,
    pub jobs: Mutex<HashMap<JobId, OnChainJob>>,
    pub contributors: Mutex<HashMap<u64, Vec<String>>>,
    pub blobs: Mutex<HashMap<u64, Vec<String>>>,
    pub reject_submissions: Mutex<bool>,
    pub submissions: Mutex<Vec<CompleteJobCall>>,
}

impl ScriptedLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers job `id` in pool `pool_id` with the given data blobs
    pub fn with_job(self, id: JobId, pool_id: u64, blobs: &[&str]) -> Self {
        self.jobs.lock().unwrap().insert(id, on_chain_job(id, pool_id));
        self.contributors
            .lock()
            .unwrap()
            .insert(pool_id, vec!["0xC1".to_string()]);
        self.blobs
            .lock()
            .unwrap()
            .insert(pool_id, blobs.iter().map(|b| b.to_string()).collect());
        self
    }

    pub fn push_page(&self, page: Result<EventPage, LedgerError>) {
        self.pages.lock().unwrap().push_back(page);
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }
}

#[async_trait]
impl LedgerRepository for ScriptedLedger {
    async fn query_events(
        &self,
        _filter: &EventFilter,
        cursor: Option<&EventId>,
        _limit: usize,
    ) -> Result<EventPage, LedgerError> {
        self.queried_from.lock().unwrap().push(cursor.cloned());
        self.pages.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(EventPage {
                data: Vec::new(),
                next_cursor: None,
                has_next_page: false,
            })
        })
    }

    async fn get_job(&self, job_id: JobId) -> Result<Option<OnChainJob>, LedgerError> {
        Ok(self.jobs.lock().unwrap().get(&job_id).cloned())
    }

    async fn pool_contributors(&self, pool_id: u64) -> Result<Vec<String>, LedgerError> {
        Ok(self
            .contributors
            .lock()
            .unwrap()
            .get(&pool_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn pool_data_blob_ids(&self, pool_id: u64) -> Result<Vec<String>, LedgerError> {
        Ok(self
            .blobs
            .lock()
            .unwrap()
            .get(&pool_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn complete_job(&self, call: CompleteJobCall) -> Result<SubmissionReceipt, LedgerError> {
        let digest = format!("tx-{}", call.job_id);
        self.submissions.lock().unwrap().push(call);
        if *self.reject_submissions.lock().unwrap() {
            return Err(LedgerError::Rejected {
                digest,
                reason: "MoveAbort".to_string(),
            });
        }
        Ok(SubmissionReceipt { digest })
    }
}

/// Compute service returning a fixed result, or failing when `fail` is set
#[derive(Default)]
pub struct ScriptedCompute {
    pub fail: Mutex<bool>,
    pub requests: Mutex<Vec<TrainingRequest>>,
}

impl ScriptedCompute {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ComputeRepository for ScriptedCompute {
    async fn train(&self, request: &TrainingRequest) -> Result<SignedTrainingResponse, ComputeError> {
        self.requests.lock().unwrap().push(request.clone());
        if *self.fail.lock().unwrap() {
            return Err(ComputeError::Api {
                status: 503,
                message: "enclave unavailable".to_string(),
            });
        }
        Ok(signed_response())
    }
}

pub fn on_chain_job(id: JobId, pool_id: u64) -> OnChainJob {
    OnChainJob {
        id,
        creator: "0xA".to_string(),
        pool_id,
        model_config_blob_id: Some("cfg".to_string()),
        epochs: 10,
        learning_rate: 100,
        price: 1_000_000,
        status: OnChainJobStatus::Pending,
    }
}

pub fn signed_response() -> SignedTrainingResponse {
    SignedTrainingResponse {
        response: TimestampedPayload {
            payload: TrainingPayload {
                model_blob_id: "ab".to_string(),
                accuracy: 91.7,
                final_loss: 0.42,
                num_samples: 1200,
                model_hash: vec![0xde, 0xad],
            },
            timestamp_ms: 1_700_000_000_000,
        },
        signature: "0102".to_string(),
    }
}

/// `JobCreated` event for job `job_id` at position `seq`
pub fn job_created_event(job_id: u64, seq: u64) -> LedgerEvent {
    LedgerEvent {
        id: event_id(seq),
        event_type: "0x4ed3::jobs::JobCreated".to_string(),
        parsed_json: json!({
            "job_id": job_id.to_string(),
            "creator": "0xA",
            "pool_id": "3",
            "price": "1000000",
            "buyer_public_key": [1, 2, 3],
            "epochs": "10",
            "learning_rate": "100"
        }),
        timestamp_ms: None,
    }
}

pub fn event_id(seq: u64) -> EventId {
    EventId {
        tx_digest: format!("digest-{}", seq),
        event_seq: "0".to_string(),
    }
}
