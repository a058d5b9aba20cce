//! Explicit mapping from stages and models to provider clients.

use std::collections::HashMap;
use std::sync::Arc;

use trendreel_core::job::JobSnapshot;
use trendreel_core::types::{BackgroundModel, Provider};

use crate::config::ProviderSettings;
use crate::error::ProviderError;
use crate::fal::FalKlingApi;
use crate::heygen::HeyGenApi;
use crate::runway::RunwayApi;
use crate::shotstack::ShotstackApi;
use crate::traits::{
    AvatarRenderer, BackgroundRenderer, CatalogSource, CompositeRenderer, RenderProvider,
};

/// The set of provider clients a pipeline run submits and polls through.
///
/// Built with the `with_*` methods; each registered client is also
/// recorded as the poller for its [`Provider`], so a job is always
/// polled by the client that accepted it.
#[derive(Clone, Default)]
pub struct ProviderSet {
    avatar: Option<Arc<dyn AvatarRenderer>>,
    backgrounds: HashMap<BackgroundModel, Arc<dyn BackgroundRenderer>>,
    composite: Option<Arc<dyn CompositeRenderer>>,
    catalog: Option<Arc<dyn CatalogSource>>,
    pollers: HashMap<Provider, Arc<dyn RenderProvider>>,
}

impl ProviderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The production wiring: HeyGen, fal.ai Kling, RunwayML, Shotstack.
    pub fn from_settings(settings: &ProviderSettings) -> Self {
        let client = reqwest::Client::new();
        let heygen = Arc::new(HeyGenApi::with_client(
            client.clone(),
            crate::heygen::HEYGEN_BASE_URL.to_string(),
            settings.heygen_api_key.clone(),
        ));

        Self::new()
            .with_avatar(Arc::clone(&heygen))
            .with_catalog(heygen)
            .with_background(
                BackgroundModel::Kling,
                Arc::new(FalKlingApi::with_client(
                    client.clone(),
                    crate::fal::FAL_QUEUE_URL.to_string(),
                    settings.fal_key.clone(),
                    crate::fal::KLING_MODEL.to_string(),
                )),
            )
            .with_background(
                BackgroundModel::Runway,
                Arc::new(RunwayApi::with_client(
                    client.clone(),
                    crate::runway::RUNWAY_BASE_URL.to_string(),
                    settings.runway_api_key.clone(),
                )),
            )
            .with_composite(Arc::new(ShotstackApi::with_client(
                client,
                settings
                    .shotstack_base_url
                    .clone()
                    .unwrap_or_else(|| crate::shotstack::SHOTSTACK_BASE_URL.to_string()),
                settings.shotstack_api_key.clone(),
            )))
    }

    pub fn with_avatar<T: AvatarRenderer + 'static>(mut self, client: Arc<T>) -> Self {
        self.pollers.insert(client.provider(), client.clone());
        self.avatar = Some(client);
        self
    }

    pub fn with_background<T: BackgroundRenderer + 'static>(
        mut self,
        model: BackgroundModel,
        client: Arc<T>,
    ) -> Self {
        self.pollers.insert(client.provider(), client.clone());
        self.backgrounds.insert(model, client);
        self
    }

    pub fn with_composite<T: CompositeRenderer + 'static>(mut self, client: Arc<T>) -> Self {
        self.pollers.insert(client.provider(), client.clone());
        self.composite = Some(client);
        self
    }

    pub fn with_catalog<T: CatalogSource + 'static>(mut self, source: Arc<T>) -> Self {
        self.catalog = Some(source);
        self
    }

    pub fn avatar(&self) -> Result<&Arc<dyn AvatarRenderer>, ProviderError> {
        self.avatar
            .as_ref()
            .ok_or_else(|| ProviderError::UnknownProvider("avatar".into()))
    }

    pub fn background(
        &self,
        model: BackgroundModel,
    ) -> Result<&Arc<dyn BackgroundRenderer>, ProviderError> {
        self.backgrounds
            .get(&model)
            .ok_or_else(|| ProviderError::UnknownProvider(model.as_str().into()))
    }

    pub fn composite(&self) -> Result<&Arc<dyn CompositeRenderer>, ProviderError> {
        self.composite
            .as_ref()
            .ok_or_else(|| ProviderError::UnknownProvider("composite".into()))
    }

    pub fn catalog(&self) -> Result<&Arc<dyn CatalogSource>, ProviderError> {
        self.catalog
            .as_ref()
            .ok_or_else(|| ProviderError::UnknownProvider("catalog".into()))
    }

    /// Poll `job_id` on the client registered for `provider`.
    pub async fn poll(&self, provider: Provider, job_id: &str) -> Result<JobSnapshot, ProviderError> {
        let client = self
            .pollers
            .get(&provider)
            .ok_or_else(|| ProviderError::UnknownProvider(provider.as_str().into()))?;
        client.poll(job_id).await
    }
}
