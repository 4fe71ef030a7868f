//! Health Check API Handlers
//!
//! Liveness of the relay: healthy once every poller loop has started.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use crate::api::AppState;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Liveness {
    Starting,
    Healthy,
    Unhealthy(String),
}

/// Shared liveness flag, flipped by `main` once the pollers are running
#[derive(Clone)]
pub struct HealthState {
    liveness: Arc<RwLock<Liveness>>,
    started_at: Instant,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            liveness: Arc::new(RwLock::new(Liveness::Starting)),
            started_at: Instant::now(),
        }
    }

    pub fn mark_healthy(&self) {
        self.set(Liveness::Healthy);
    }

    pub fn mark_unhealthy(&self, reason: impl Into<String>) {
        self.set(Liveness::Unhealthy(reason.into()));
    }

    fn set(&self, liveness: Liveness) {
        match self.liveness.write() {
            Ok(mut guard) => *guard = liveness,
            Err(poisoned) => *poisoned.into_inner() = liveness,
        }
    }

    fn current(&self) -> Liveness {
        match self.liveness.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// GET /health, GET /healthz
pub async fn health_check(State(state): State<AppState>) -> Response {
    match state.health.current() {
        Liveness::Healthy => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "uptime_secs": state.health.started_at.elapsed().as_secs(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            })),
        )
            .into_response(),
        Liveness::Starting => unavailable("pollers not started"),
        Liveness::Unhealthy(reason) => unavailable(&reason),
    }
}

/// GET /
pub async fn banner() -> impl IntoResponse {
    (StatusCode::OK, "cloakx relay")
}

fn unavailable(error: &str) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "status": "error", "error": error })),
    )
        .into_response()
}
