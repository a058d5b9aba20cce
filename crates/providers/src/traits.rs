//! Submit/poll contracts the orchestrator depends on.
//!
//! Every provider client implements [`RenderProvider`] for polling plus
//! the submission trait for the stage it serves. Test doubles implement
//! the same traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use trendreel_core::job::JobSnapshot;
use trendreel_core::types::{Platform, Provider, Slot};

use crate::error::ProviderError;

/// Opaque identifier returned by a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: String,
    pub provider: Provider,
}

/// Parameters for a talking-head avatar render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvatarRequest {
    pub avatar_id: String,
    pub voice_id: String,
    pub script: String,
    pub platform: Platform,
}

/// Everything needed to composite one slot's final video.
///
/// Built only once the slot's background job has succeeded and the
/// avatar render is done; values are frozen at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompositeRequest {
    pub slot: Slot,
    pub avatar_result_url: String,
    pub background_result_url: String,
    pub hook_text: String,
    pub music_track_id: String,
    pub duration_seconds: u32,
}

/// Status polling, shared by every provider.
#[async_trait]
pub trait RenderProvider: Send + Sync {
    /// Which provider this client talks to.
    fn provider(&self) -> Provider;

    /// Check a job once and return its normalized status.
    ///
    /// An `Err` is a transport failure; job failures come back as an
    /// `Ok` snapshot with a terminal failure status.
    async fn poll(&self, job_id: &str) -> Result<JobSnapshot, ProviderError>;
}

#[async_trait]
pub trait AvatarRenderer: RenderProvider {
    async fn submit_avatar(&self, request: &AvatarRequest) -> Result<JobHandle, ProviderError>;
}

#[async_trait]
pub trait BackgroundRenderer: RenderProvider {
    async fn submit_background(&self, prompt: &str) -> Result<JobHandle, ProviderError>;
}

#[async_trait]
pub trait CompositeRenderer: RenderProvider {
    async fn submit_composite(
        &self,
        request: &CompositeRequest,
    ) -> Result<JobHandle, ProviderError>;
}

// ---------------------------------------------------------------------------
// Avatar catalog
// ---------------------------------------------------------------------------

/// An avatar identity offered by the avatar provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarOption {
    pub avatar_id: String,
    pub name: String,
    pub thumbnail: Option<String>,
    pub gender: String,
    pub is_avatar_iv: bool,
}

/// A voice offered by the avatar provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceOption {
    pub voice_id: String,
    pub name: String,
    pub language: String,
    pub gender: String,
}

/// Avatars and voices available for the avatar stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarCatalog {
    pub avatars: Vec<AvatarOption>,
    pub voices: Vec<VoiceOption>,
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_avatar_catalog(&self) -> Result<AvatarCatalog, ProviderError>;
}
