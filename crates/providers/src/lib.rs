//! Render provider clients.
//!
//! One HTTP client per provider family (HeyGen avatars, fal.ai Kling and
//! RunwayML backgrounds, Shotstack composites), each normalizing its own
//! status vocabulary onto [`trendreel_core::types::JobStatus`]. The
//! [`registry::ProviderSet`] is the explicit provider mapping table the
//! orchestrator submits and polls through.

pub mod config;
pub mod error;
pub mod fal;
pub mod heygen;
mod http;
pub mod music;
pub mod registry;
pub mod runway;
pub mod shotstack;
pub mod traits;

pub use error::ProviderError;
pub use http::REQUEST_TIMEOUT;
pub use registry::ProviderSet;
pub use traits::{
    AvatarCatalog, AvatarRenderer, AvatarRequest, BackgroundRenderer, CatalogSource,
    CompositeRenderer, CompositeRequest, JobHandle, RenderProvider,
};
