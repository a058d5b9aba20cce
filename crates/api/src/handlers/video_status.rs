//! Direct status checks against a provider, outside any run.

use std::str::FromStr;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use trendreel_core::types::Provider;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/video-status/{provider}/{job_id}
///
/// Poll one job once and return its normalized snapshot. Unknown
/// provider labels are rejected rather than routed to a default.
pub async fn video_status(
    State(state): State<AppState>,
    Path((provider, job_id)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let provider = Provider::from_str(&provider)?;
    if job_id.trim().is_empty() {
        return Err(AppError::BadRequest("job_id must not be empty".into()));
    }

    let snapshot = state.providers.poll(provider, &job_id).await?;
    tracing::debug!(
        provider = %provider,
        job_id = %job_id,
        status = ?snapshot.status,
        "Direct status check",
    );
    Ok(Json(DataResponse { data: snapshot }))
}
