//! Job domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ledger-assigned job identifier
pub type JobId = u64;

/// Largest value accepted for the numeric job fields (ids, price,
/// hyperparameters); they are stored in signed 64-bit columns.
pub const MAX_JOB_FIELD: u64 = i64::MAX as u64;

/// Compute job observed on-chain and tracked locally until completion
///
/// Rows are never deleted; `status` is the only field the relay mutates
/// after insertion (plus the audit columns written alongside it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub creator: String,
    pub pool_id: u64,
    /// Price in the smallest currency unit (MIST)
    pub price: u64,
    /// Key the requester wants results encrypted for; opaque here
    pub buyer_public_key: Vec<u8>,
    pub epochs: u64,
    pub learning_rate: u64,
    pub status: JobStatus,
    /// Resolved lazily from the on-chain job object
    pub model_config_blob_id: Option<String>,
    /// Digest of the accepted `complete_job` transaction
    pub completion_digest: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Job fields decoded from a `JobCreated` event, before persistence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    pub id: JobId,
    pub creator: String,
    pub pool_id: u64,
    pub price: u64,
    pub buyer_public_key: Vec<u8>,
    pub epochs: u64,
    pub learning_rate: u64,
}

impl NewJob {
    /// Builds the stored record for a freshly inserted job
    pub fn into_job(self, now: chrono::DateTime<chrono::Utc>) -> Job {
        Job {
            id: self.id,
            creator: self.creator,
            pool_id: self.pool_id,
            price: self.price,
            buyer_public_key: self.buyer_public_key,
            epochs: self.epochs,
            learning_rate: self.learning_rate,
            status: JobStatus::Pending,
            model_config_blob_id: None,
            completion_digest: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Job lifecycle status
///
/// `Pending -> InProgress -> Completed | Failed`. `Cancelled` only mirrors an
/// external ledger action and is never produced by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }

    /// Whether the relay may move a job from `self` to `next`
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::InProgress)
                | (JobStatus::InProgress, JobStatus::Completed)
                | (JobStatus::InProgress, JobStatus::Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown job status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(JobStatus::Pending),
            "IN_PROGRESS" => Ok(JobStatus::InProgress),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            "CANCELLED" => Ok(JobStatus::Cancelled),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}
