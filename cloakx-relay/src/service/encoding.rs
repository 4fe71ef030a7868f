//! Result Encoding
//!
//! Converts the enclave's signed response into the arguments of the
//! registry's `complete_job` call. The result struct is serialised with BCS
//! in the field order the contract deserialises it in.

use cloakx_core::domain::job::JobId;
use cloakx_core::domain::training::{SignedTrainingResponse, TrainingPayload};
use serde::Serialize;

use crate::repository::CompleteJobCall;

/// Errors raised while encoding a training result
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    #[error("failed to serialise training result: {0}")]
    Bcs(#[from] bcs::Error),

    #[error("enclave signature is not valid hex: {0}")]
    Signature(String),
}

/// On-chain layout of a training result
#[derive(Debug, Serialize)]
struct TrainingResultBcs {
    model_blob_id: Vec<u8>,
    accuracy: u64,
    final_loss: u64,
    num_samples: u64,
    model_hash: Vec<u8>,
}

impl From<&TrainingPayload> for TrainingResultBcs {
    fn from(payload: &TrainingPayload) -> Self {
        Self {
            model_blob_id: payload.model_blob_id.as_bytes().to_vec(),
            accuracy: truncate_to_u64(payload.accuracy),
            final_loss: truncate_to_u64(payload.final_loss),
            num_samples: payload.num_samples,
            model_hash: payload.model_hash.clone(),
        }
    }
}

/// Drops the fractional part. Negative values and NaN become 0, values past
/// the range saturate.
pub fn truncate_to_u64(value: f64) -> u64 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    value.trunc() as u64
}

/// Encodes a training payload in the registry's binary layout
pub fn encode_training_result(payload: &TrainingPayload) -> Result<Vec<u8>, EncodingError> {
    Ok(bcs::to_bytes(&TrainingResultBcs::from(payload))?)
}

/// Decodes the enclave's hex signature, with or without a `0x` prefix
pub fn decode_signature(signature: &str) -> Result<Vec<u8>, EncodingError> {
    let trimmed = signature.trim();
    let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    hex::decode(hex_part).map_err(|e| EncodingError::Signature(e.to_string()))
}

/// Builds the `complete_job` arguments for a signed enclave response
pub fn build_completion_call(
    job_id: JobId,
    signed: &SignedTrainingResponse,
) -> Result<CompleteJobCall, EncodingError> {
    Ok(CompleteJobCall {
        job_id,
        timestamp_ms: signed.response.timestamp_ms,
        encoded_result: encode_training_result(&signed.response.payload)?,
        signature: decode_signature(&signed.signature)?,
    })
}
