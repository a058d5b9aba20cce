use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use trendreel_core::error::CoreError;
use trendreel_pipeline::PipelineError;
use trendreel_providers::ProviderError;

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain, pipeline and provider errors and implements
/// [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `trendreel_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An orchestrator action was refused or failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// A direct provider call (status poll, catalog fetch) failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core_error(core),

            // --- Orchestrator errors ---
            AppError::Pipeline(err) => match err {
                PipelineError::Precondition(msg) => (
                    StatusCode::BAD_REQUEST,
                    "PRECONDITION_FAILED",
                    msg.clone(),
                ),
                PipelineError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                PipelineError::Superseded { .. } => {
                    (StatusCode::CONFLICT, "SUPERSEDED", err.to_string())
                }
                PipelineError::Submission { .. } => {
                    (StatusCode::BAD_GATEWAY, "SUBMISSION_FAILED", err.to_string())
                }
                PipelineError::Collaborator(_) => {
                    (StatusCode::BAD_GATEWAY, "COLLABORATOR_FAILED", err.to_string())
                }
                PipelineError::Core(core) => classify_core_error(core),
            },

            // --- Provider errors ---
            AppError::Provider(err) => match err {
                ProviderError::UnknownProvider(_) => {
                    (StatusCode::NOT_FOUND, "UNKNOWN_PROVIDER", err.to_string())
                }
                _ => {
                    tracing::warn!(error = %err, "Provider call failed");
                    (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR", err.to_string())
                }
            },

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn classify_core_error(core: &CoreError) -> (StatusCode, &'static str, String) {
    match core {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}
