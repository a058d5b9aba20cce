//! Handlers for the `/catalog` resource: music tracks and the avatar/voice
//! catalog.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use trendreel_providers::music::list_music_tracks;
use trendreel_providers::{AvatarCatalog, ProviderError};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CatalogQuery {
    /// Drop the cached catalog and fetch it again.
    #[serde(default)]
    pub refresh: bool,
}

/// GET /api/v1/catalog/music-tracks
pub async fn list_tracks() -> impl IntoResponse {
    Json(DataResponse {
        data: list_music_tracks(),
    })
}

/// GET /api/v1/catalog/avatars
///
/// Fetched from the avatar provider on first access and cached for the
/// life of the process. A failed fetch is not cached.
pub async fn avatar_catalog(
    State(state): State<AppState>,
    Query(params): Query<CatalogQuery>,
) -> AppResult<impl IntoResponse> {
    if params.refresh {
        state.catalog.invalidate().await;
    }

    let source = Arc::clone(state.providers.catalog()?);
    let catalog: Arc<AvatarCatalog> = state
        .catalog
        .get_or_load(|| async move {
            let catalog = source.fetch_avatar_catalog().await?;
            tracing::info!(
                avatars = catalog.avatars.len(),
                voices = catalog.voices.len(),
                "Avatar catalog loaded",
            );
            Ok::<_, ProviderError>(catalog)
        })
        .await?;

    Ok(Json(DataResponse { data: catalog }))
}
