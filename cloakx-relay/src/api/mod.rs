//! API Module
//!
//! Health and operator endpoints of the relay.
//! Each submodule handles endpoints for a specific domain.

pub mod cursor;
pub mod error;
pub mod health;
pub mod job;

use axum::{Router, routing::get};
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use crate::repository::{CursorRepository, JobRepository};
pub use health::HealthState;

/// Shared state of the API handlers
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<dyn JobRepository>,
    pub cursors: Arc<dyn CursorRepository>,
    pub health: HealthState,
    /// Bumped on every cursor reset so running pollers drop their cursor
    pub cursor_reset: Arc<watch::Sender<u64>>,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/", get(health::banner))
        .route("/health", get(health::health_check))
        .route("/healthz", get(health::health_check))
        // Job endpoints
        .route("/jobs", get(job::list_jobs))
        .route("/jobs/{id}", get(job::get_job))
        // Cursor endpoints
        .route(
            "/cursors",
            get(cursor::list_cursors).delete(cursor::reset_cursors),
        )
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{InMemoryCursorRepository, InMemoryJobRepository};
    use axum::extract::{Path, Query, State};
    use cloakx_core::domain::cursor::EventId;
    use cloakx_core::domain::job::{JobStatus, NewJob};
    use cloakx_core::dto::job::JobListQuery;

    fn state() -> (AppState, watch::Receiver<u64>) {
        let (reset_tx, reset_rx) = watch::channel(0);
        (
            AppState {
                jobs: Arc::new(InMemoryJobRepository::new()),
                cursors: Arc::new(InMemoryCursorRepository::new()),
                health: HealthState::new(),
                cursor_reset: Arc::new(reset_tx),
            },
            reset_rx,
        )
    }

    fn new_job(id: u64) -> NewJob {
        NewJob {
            id,
            creator: "0xA".to_string(),
            pool_id: 3,
            price: 1,
            buyer_public_key: vec![1],
            epochs: 1,
            learning_rate: 1,
        }
    }

    #[tokio::test]
    async fn test_job_endpoints() {
        let (state, _reset) = state();
        state.jobs.insert_if_absent(new_job(1)).await.unwrap();
        state.jobs.insert_if_absent(new_job(2)).await.unwrap();
        state.jobs.start(2).await.unwrap();
        state.jobs.fail(2, "no blobs").await.unwrap();

        let failed = job::list_jobs(
            State(state.clone()),
            Query(JobListQuery {
                status: Some(JobStatus::Failed),
            }),
        )
        .await
        .unwrap();
        assert_eq!(failed.0.len(), 1);
        assert_eq!(failed.0[0].id, 2);

        let found = job::get_job(State(state.clone()), Path(1)).await.unwrap();
        assert_eq!(found.0.status, JobStatus::Pending);

        assert!(matches!(
            job::get_job(State(state), Path(99)).await,
            Err(error::ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reset_cursors_signals_pollers() {
        let (state, mut reset) = state();
        state
            .cursors
            .set(
                "JobCreated",
                &EventId {
                    tx_digest: "d".to_string(),
                    event_seq: "0".to_string(),
                },
            )
            .await
            .unwrap();

        let response = cursor::reset_cursors(State(state.clone())).await.unwrap();
        assert_eq!(response.0.deleted, 1);
        assert!(reset.has_changed().unwrap());
        assert_eq!(*reset.borrow_and_update(), 1);

        let listed = cursor::list_cursors(State(state)).await.unwrap();
        assert!(listed.0.is_empty());
    }
}
