pub mod catalog;
pub mod health;
pub mod pipelines;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /catalog/music-tracks                         static music table
/// /catalog/avatars                              avatar/voice catalog (cached)
///
/// /pipelines                                    create run
/// /pipelines/{id}                               snapshot, delete
/// /pipelines/{id}/script                        edit script (PUT)
/// /pipelines/{id}/candidates                    replace candidates (PUT)
/// /pipelines/{id}/music                         select track (PUT)
/// /pipelines/{id}/slots/{slot}                  assign candidate to A/B
/// /pipelines/{id}/avatar                        submit avatar render
/// /pipelines/{id}/backgrounds                   submit both backgrounds
/// /pipelines/{id}/composites/{slot}             submit composite for A/B
/// /pipelines/{id}/stages/{stage}/reset          reset one stage
///
/// /video-status/{provider}/{job_id}             direct normalized poll
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/catalog", catalog::router())
        .nest("/pipelines", pipelines::router())
        .route(
            "/video-status/{provider}/{job_id}",
            get(handlers::video_status::video_status),
        )
}
