//! Job API Handlers
//!
//! Read-only views of the job store for operators.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use cloakx_core::domain::job::{Job, JobId};
use cloakx_core::dto::job::JobListQuery;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};

/// GET /jobs[?status=FAILED]
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobListQuery>,
) -> ApiResult<Json<Vec<Job>>> {
    tracing::debug!("Listing jobs (status: {:?})", query.status);

    let jobs = state.jobs.list(query.status).await?;
    Ok(Json(jobs))
}

/// GET /jobs/{id}
pub async fn get_job(State(state): State<AppState>, Path(id): Path<JobId>) -> ApiResult<Json<Job>> {
    tracing::debug!("Getting job: {}", id);

    let job = state
        .jobs
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Job {} not found", id)))?;

    Ok(Json(job))
}
