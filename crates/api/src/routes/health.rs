use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Number of live pipeline runs.
    pub pipelines: usize,
    /// Provider keys that are not set.
    pub missing_provider_keys: Vec<&'static str>,
}

/// GET /health -- returns service health and provider configuration gaps.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let missing_provider_keys = state.config.providers.missing_keys();
    let status = if missing_provider_keys.is_empty() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        pipelines: state.runs.len().await,
        missing_provider_keys,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
