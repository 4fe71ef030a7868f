//! Compute repository
//!
//! Client of the secure compute enclave. The enclave trains the model and
//! signs the result; the relay only transports the signed response.

use async_trait::async_trait;
use cloakx_core::domain::training::{SignedTrainingResponse, TrainingRequest};
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

/// Errors raised by the compute enclave client
#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    #[error("compute request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("compute service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid compute response: {0}")]
    Parse(String),
}

/// Repository trait for the secure compute service
#[async_trait]
pub trait ComputeRepository: Send + Sync {
    /// Runs a training request and returns the signed result
    async fn train(&self, request: &TrainingRequest) -> Result<SignedTrainingResponse, ComputeError>;
}

/// HTTP implementation of ComputeRepository
pub struct HttpComputeRepository {
    client: Client,
    base_url: String,
}

impl HttpComputeRepository {
    /// Creates a new compute repository
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the enclave (e.g., "http://localhost:3000")
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Serialize)]
struct ProcessDataRequest<'a> {
    payload: &'a TrainingRequest,
}

#[async_trait]
impl ComputeRepository for HttpComputeRepository {
    async fn train(&self, request: &TrainingRequest) -> Result<SignedTrainingResponse, ComputeError> {
        let url = format!("{}/process_data", self.base_url);
        debug!(
            "Submitting training request with {} data blob(s) to {}",
            request.data_blob_ids.len(),
            url
        );

        let response = self
            .client
            .post(&url)
            .json(&ProcessDataRequest { payload: request })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ComputeError::Api { status, message });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ComputeError::Parse(e.to_string()))
    }
}
