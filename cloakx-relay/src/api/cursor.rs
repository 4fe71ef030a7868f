//! Cursor API Handlers

use axum::{Json, extract::State};
use cloakx_core::domain::cursor::Cursor;
use cloakx_core::dto::cursor::ResetCursorsResponse;

use crate::api::AppState;
use crate::api::error::ApiResult;

/// GET /cursors
pub async fn list_cursors(State(state): State<AppState>) -> ApiResult<Json<Vec<Cursor>>> {
    let cursors = state.cursors.list().await?;
    Ok(Json(cursors))
}

/// DELETE /cursors
/// Drops every cursor; running pollers replay from genesis on their next tick
pub async fn reset_cursors(State(state): State<AppState>) -> ApiResult<Json<ResetCursorsResponse>> {
    let deleted = state.cursors.reset_all().await?;
    state.cursor_reset.send_modify(|generation| *generation += 1);
    tracing::warn!("Operator reset {} cursor(s)", deleted);

    Ok(Json(ResetCursorsResponse { deleted }))
}
