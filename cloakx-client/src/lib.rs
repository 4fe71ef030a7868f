//! CloakX Relay HTTP Client
//!
//! A small, type-safe client for the relay's operator API: job inspection
//! and cursor management.
//!
//! # Example
//!
//! ```no_run
//! use cloakx_client::RelayClient;
//! use cloakx_core::domain::job::JobStatus;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = RelayClient::new("http://localhost:8080");
//!
//!     let failed = client.list_jobs(Some(JobStatus::Failed)).await?;
//!     println!("{} failed job(s)", failed.len());
//!     Ok(())
//! }
//! ```

pub mod error;
mod cursors;
mod jobs;

// Re-export commonly used types
pub use error::{ClientError, Result};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the relay operator API
#[derive(Debug, Clone)]
pub struct RelayClient {
    /// Base URL of the relay (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl RelayClient {
    /// Create a new relay client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the relay API (e.g., "http://localhost:8080")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new relay client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the relay
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Check the status code and deserialize the JSON body
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_message(&error_text)));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}

/// Extracts `error` from the relay's `{ "error": ... }` bodies, falling back
/// to the raw text
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}
