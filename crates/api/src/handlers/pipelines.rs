//! Handlers for the `/pipelines` resource.
//!
//! Each run is a [`PipelineOrchestrator`] held in the in-memory
//! [`RunRegistry`](crate::state::RunRegistry). Actions answer with the
//! run's snapshot, or with the accepted job handle for submissions.

use std::str::FromStr;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use trendreel_core::analysis::{Analysis, BackgroundCandidate};
use trendreel_core::types::{BackgroundModel, Platform, Slot, Stage};
use trendreel_pipeline::{PipelineOrchestrator, PipelineSnapshot};
use uuid::Uuid;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreatePipeline {
    pub analysis: Analysis,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub platform: Platform,
}

#[derive(Debug, Deserialize)]
pub struct SetScript {
    pub script: String,
}

#[derive(Debug, Deserialize)]
pub struct SetCandidates {
    pub candidates: Vec<BackgroundCandidate>,
}

#[derive(Debug, Deserialize)]
pub struct SelectMusic {
    pub track_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitAvatar {
    pub avatar_id: String,
    pub voice_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignSlot {
    pub candidate_index: usize,
}

#[derive(Debug, Deserialize)]
pub struct SubmitBackgrounds {
    pub model: BackgroundModel,
}

/// Response body for a newly created run.
#[derive(Debug, Serialize)]
pub struct PipelineCreated {
    pub id: Uuid,
    pub pipeline: PipelineSnapshot,
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// POST /api/v1/pipelines
///
/// Start a run on an analysis. Returns 201 with the run id and snapshot.
pub async fn create_pipeline(
    State(state): State<AppState>,
    Json(input): Json<CreatePipeline>,
) -> AppResult<impl IntoResponse> {
    let orchestrator = PipelineOrchestrator::new(
        input.analysis,
        input.hashtags,
        input.platform,
        state.providers.clone(),
        state.pipeline_config(),
    );
    let pipeline = orchestrator.snapshot().await;
    let id = state.runs.insert(orchestrator).await;

    tracing::info!(pipeline_id = %id, platform = pipeline.platform.label(), "Pipeline created");

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: PipelineCreated { id, pipeline },
        }),
    ))
}

/// GET /api/v1/pipelines/{id}
pub async fn get_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let run = state.runs.get(id).await?;
    Ok(Json(DataResponse {
        data: run.snapshot().await,
    }))
}

/// DELETE /api/v1/pipelines/{id}
///
/// Drop the run and cancel its pollers. Returns 204.
pub async fn delete_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.runs.remove(id).await?;
    tracing::info!(pipeline_id = %id, "Pipeline deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Selections
// ---------------------------------------------------------------------------

/// PUT /api/v1/pipelines/{id}/script
pub async fn set_script(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<SetScript>,
) -> AppResult<impl IntoResponse> {
    let run = state.runs.get(id).await?;
    run.set_script(input.script).await;
    Ok(Json(DataResponse {
        data: run.snapshot().await,
    }))
}

/// PUT /api/v1/pipelines/{id}/candidates
///
/// Replace the background candidates; clears slot assignments.
pub async fn set_candidates(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<SetCandidates>,
) -> AppResult<impl IntoResponse> {
    let run = state.runs.get(id).await?;
    run.set_candidates(input.candidates).await?;
    Ok(Json(DataResponse {
        data: run.snapshot().await,
    }))
}

/// PUT /api/v1/pipelines/{id}/music
pub async fn select_music(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<SelectMusic>,
) -> AppResult<impl IntoResponse> {
    let run = state.runs.get(id).await?;
    run.select_music(&input.track_id).await?;
    Ok(Json(DataResponse {
        data: run.snapshot().await,
    }))
}

/// POST /api/v1/pipelines/{id}/slots/{slot}
pub async fn assign_slot(
    State(state): State<AppState>,
    Path((id, slot)): Path<(Uuid, String)>,
    Json(input): Json<AssignSlot>,
) -> AppResult<impl IntoResponse> {
    let slot = Slot::from_str(&slot)?;
    let run = state.runs.get(id).await?;
    run.assign_slot(slot, input.candidate_index).await?;
    Ok(Json(DataResponse {
        data: run.snapshot().await,
    }))
}

// ---------------------------------------------------------------------------
// Submissions
// ---------------------------------------------------------------------------

/// POST /api/v1/pipelines/{id}/avatar
///
/// Submit the avatar render with the run's current script. Returns 202
/// with the job handle; progress is read from the snapshot.
pub async fn submit_avatar(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<SubmitAvatar>,
) -> AppResult<impl IntoResponse> {
    let run = state.runs.get(id).await?;
    let handle = run.submit_avatar(&input.avatar_id, &input.voice_id).await?;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: handle })))
}

/// POST /api/v1/pipelines/{id}/backgrounds
///
/// Submit both slot backgrounds to one model. Returns 202 with the
/// accepted handles (one or two).
pub async fn submit_backgrounds(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<SubmitBackgrounds>,
) -> AppResult<impl IntoResponse> {
    let run = state.runs.get(id).await?;
    let handles = run.submit_backgrounds(input.model).await?;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: handles })))
}

/// POST /api/v1/pipelines/{id}/composites/{slot}
pub async fn composite(
    State(state): State<AppState>,
    Path((id, slot)): Path<(Uuid, String)>,
) -> AppResult<impl IntoResponse> {
    let slot = Slot::from_str(&slot)?;
    let run = state.runs.get(id).await?;
    let handle = run.composite(slot).await?;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: handle })))
}

/// POST /api/v1/pipelines/{id}/stages/{stage}/reset
pub async fn reset_stage(
    State(state): State<AppState>,
    Path((id, stage)): Path<(Uuid, String)>,
) -> AppResult<impl IntoResponse> {
    let stage = Stage::from_str(&stage)?;
    let run = state.runs.get(id).await?;
    run.reset_stage(stage).await;
    Ok(Json(DataResponse {
        data: run.snapshot().await,
    }))
}
