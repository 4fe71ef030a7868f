//! Training request/response types exchanged with the secure compute service

use serde::{Deserialize, Serialize};

use crate::domain::job::JobId;

/// Request body sent to the compute enclave
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRequest {
    pub data_blob_ids: Vec<String>,
    pub model_config_blob_id: String,
    /// Key material identifier; the job creator's account
    pub key_id: String,
    pub learning_rate: u64,
    pub epochs: u64,
}

/// Result computed by the enclave
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingPayload {
    pub model_blob_id: String,
    pub accuracy: f64,
    pub final_loss: f64,
    pub num_samples: u64,
    pub model_hash: Vec<u8>,
}

/// Payload and the enclave timestamp covered by the signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampedPayload {
    pub payload: TrainingPayload,
    pub timestamp_ms: u64,
}

/// Full enclave response; forwarded to the ledger without verification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedTrainingResponse {
    pub response: TimestampedPayload,
    /// Hex encoded signature over `response`
    pub signature: String,
}

/// On-chain job status as stored by the registry contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnChainJobStatus {
    Pending,
    Cancelled,
    Completed,
}

/// Job object read back from the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnChainJob {
    pub id: JobId,
    pub creator: String,
    pub pool_id: u64,
    /// `None` when the contract has no config blob recorded yet
    pub model_config_blob_id: Option<String>,
    pub epochs: u64,
    pub learning_rate: u64,
    pub price: u64,
    pub status: OnChainJobStatus,
}
