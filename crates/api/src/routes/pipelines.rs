//! Route definitions for the `/pipelines` resource.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::pipelines;
use crate::state::AppState;

/// Routes mounted at `/pipelines`.
///
/// ```text
/// POST   /                            -> create_pipeline
/// GET    /{id}                        -> get_pipeline
/// DELETE /{id}                        -> delete_pipeline
/// PUT    /{id}/script                 -> set_script
/// PUT    /{id}/candidates             -> set_candidates
/// PUT    /{id}/music                  -> select_music
/// POST   /{id}/slots/{slot}           -> assign_slot
/// POST   /{id}/avatar                 -> submit_avatar
/// POST   /{id}/backgrounds            -> submit_backgrounds
/// POST   /{id}/composites/{slot}      -> composite
/// POST   /{id}/stages/{stage}/reset   -> reset_stage
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(pipelines::create_pipeline))
        .route(
            "/{id}",
            get(pipelines::get_pipeline).delete(pipelines::delete_pipeline),
        )
        .route("/{id}/script", put(pipelines::set_script))
        .route("/{id}/candidates", put(pipelines::set_candidates))
        .route("/{id}/music", put(pipelines::select_music))
        .route("/{id}/slots/{slot}", post(pipelines::assign_slot))
        .route("/{id}/avatar", post(pipelines::submit_avatar))
        .route("/{id}/backgrounds", post(pipelines::submit_backgrounds))
        .route("/{id}/composites/{slot}", post(pipelines::composite))
        .route("/{id}/stages/{stage}/reset", post(pipelines::reset_stage))
}
