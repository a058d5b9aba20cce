use axum::routing::get;
use axum::Router;

use crate::handlers::catalog;
use crate::state::AppState;

/// Routes mounted at `/catalog`.
///
/// ```text
/// GET    /music-tracks    -> list_tracks
/// GET    /avatars         -> avatar_catalog (?refresh=true to reload)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/music-tracks", get(catalog::list_tracks))
        .route("/avatars", get(catalog::avatar_catalog))
}
