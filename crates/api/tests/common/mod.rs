#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use trendreel_api::config::ServerConfig;
use trendreel_api::router::build_app_router;
use trendreel_api::state::AppState;
use trendreel_core::job::JobSnapshot;
use trendreel_core::types::{BackgroundModel, Provider};
use trendreel_pipeline::PipelineConfig;
use trendreel_providers::config::ProviderSettings;
use trendreel_providers::traits::{AvatarOption, VoiceOption};
use trendreel_providers::{
    AvatarCatalog, AvatarRenderer, AvatarRequest, BackgroundRenderer, CatalogSource,
    CompositeRenderer, CompositeRequest, JobHandle, ProviderError, ProviderSet, RenderProvider,
};

/// Build a test `ServerConfig` with safe defaults.
///
/// Polling is manual: tests advance runs with `poll_tick`.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        providers: ProviderSettings {
            heygen_api_key: "test".into(),
            fal_key: "test".into(),
            runway_api_key: "test".into(),
            shotstack_api_key: "test".into(),
            shotstack_base_url: None,
        },
        pipeline: PipelineConfig::manual(),
    }
}

// ---------------------------------------------------------------------------
// Fake providers
// ---------------------------------------------------------------------------

/// Accepts every submission unless told otherwise; polls answer from a
/// per-job table, `pending` by default.
pub struct FakeProvider {
    provider: Provider,
    next_id: AtomicUsize,
    rejections: Mutex<VecDeque<String>>,
    answers: Mutex<HashMap<String, JobSnapshot>>,
    catalog_loads: AtomicUsize,
}

impl FakeProvider {
    pub fn new(provider: Provider) -> Arc<Self> {
        Arc::new(Self {
            provider,
            next_id: AtomicUsize::new(1),
            rejections: Mutex::new(VecDeque::new()),
            answers: Mutex::new(HashMap::new()),
            catalog_loads: AtomicUsize::new(0),
        })
    }

    pub fn reject_next(&self, message: &str) {
        self.rejections
            .lock()
            .unwrap()
            .push_back(message.to_string());
    }

    pub fn answer(&self, job_id: &str, snapshot: JobSnapshot) {
        self.answers
            .lock()
            .unwrap()
            .insert(job_id.to_string(), snapshot);
    }

    pub fn catalog_loads(&self) -> usize {
        self.catalog_loads.load(Ordering::SeqCst)
    }

    fn submit(&self) -> Result<JobHandle, ProviderError> {
        if let Some(body) = self.rejections.lock().unwrap().pop_front() {
            return Err(ProviderError::ApiError { status: 400, body });
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(JobHandle {
            job_id: format!("{}-{n}", self.provider),
            provider: self.provider,
        })
    }
}

#[async_trait]
impl RenderProvider for FakeProvider {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn poll(&self, job_id: &str) -> Result<JobSnapshot, ProviderError> {
        Ok(self
            .answers
            .lock()
            .unwrap()
            .get(job_id)
            .cloned()
            .unwrap_or_else(JobSnapshot::pending))
    }
}

#[async_trait]
impl AvatarRenderer for FakeProvider {
    async fn submit_avatar(&self, _request: &AvatarRequest) -> Result<JobHandle, ProviderError> {
        self.submit()
    }
}

#[async_trait]
impl BackgroundRenderer for FakeProvider {
    async fn submit_background(&self, _prompt: &str) -> Result<JobHandle, ProviderError> {
        self.submit()
    }
}

#[async_trait]
impl CompositeRenderer for FakeProvider {
    async fn submit_composite(
        &self,
        _request: &CompositeRequest,
    ) -> Result<JobHandle, ProviderError> {
        self.submit()
    }
}

#[async_trait]
impl CatalogSource for FakeProvider {
    async fn fetch_avatar_catalog(&self) -> Result<AvatarCatalog, ProviderError> {
        self.catalog_loads.fetch_add(1, Ordering::SeqCst);
        Ok(AvatarCatalog {
            avatars: vec![AvatarOption {
                avatar_id: "a1".into(),
                name: "Ava".into(),
                thumbnail: None,
                gender: "female".into(),
                is_avatar_iv: true,
            }],
            voices: vec![VoiceOption {
                voice_id: "v1".into(),
                name: "Warm".into(),
                language: "English".into(),
                gender: "female".into(),
            }],
        })
    }
}

pub struct Fakes {
    pub heygen: Arc<FakeProvider>,
    pub kling: Arc<FakeProvider>,
    pub runway: Arc<FakeProvider>,
    pub shotstack: Arc<FakeProvider>,
}

impl Fakes {
    pub fn new() -> Self {
        Self {
            heygen: FakeProvider::new(Provider::HeyGen),
            kling: FakeProvider::new(Provider::Kling),
            runway: FakeProvider::new(Provider::Runway),
            shotstack: FakeProvider::new(Provider::Shotstack),
        }
    }

    pub fn provider_set(&self) -> ProviderSet {
        ProviderSet::new()
            .with_avatar(Arc::clone(&self.heygen))
            .with_catalog(Arc::clone(&self.heygen))
            .with_background(BackgroundModel::Kling, Arc::clone(&self.kling))
            .with_background(BackgroundModel::Runway, Arc::clone(&self.runway))
            .with_composite(Arc::clone(&self.shotstack))
    }
}

/// The full application with fake providers, plus its state so tests can
/// drive poll ticks on a run.
pub fn build_test_app(fakes: &Fakes) -> (Router, AppState) {
    let state = AppState::new(test_config(), fakes.provider_set());
    (build_app_router(state.clone()), state)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Response<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None).await
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn put_json(app: &Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::PUT, uri, Some(body)).await
}

pub async fn delete(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, None).await
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
