//! fal.ai queue client for Kling text-to-video backgrounds.

use async_trait::async_trait;
use serde::Deserialize;
use trendreel_core::job::JobSnapshot;
use trendreel_core::types::{JobStatus, Provider};

use crate::error::ProviderError;
use crate::http::{parse_response, require_key, REQUEST_TIMEOUT};
use crate::traits::{BackgroundRenderer, JobHandle, RenderProvider};

pub const FAL_QUEUE_URL: &str = "https://queue.fal.run";
pub const KLING_MODEL: &str = "fal-ai/kling-video/v2.6/pro/text-to-video";

/// HTTP client for the fal.ai request queue.
pub struct FalKlingApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct QueueSubmit {
    request_id: Option<String>,
}

/// Body of `GET .../requests/{id}/status`.
#[derive(Debug, Default, Deserialize)]
pub struct QueueStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoFile {
    url: Option<String>,
}

/// Body of `GET .../requests/{id}` once the request has completed.
#[derive(Debug, Default, Deserialize)]
pub struct QueueResult {
    #[serde(default)]
    video: Option<VideoFile>,
    #[serde(default)]
    videos: Vec<VideoFile>,
}

impl QueueResult {
    pub fn video_url(&self) -> Option<&str> {
        self.video
            .as_ref()
            .and_then(|v| v.url.as_deref())
            .or_else(|| self.videos.first().and_then(|v| v.url.as_deref()))
    }
}

/// The queue serves status and results under the app root, which is
/// the first two path segments of the model id.
pub fn app_root(model: &str) -> String {
    model.split('/').take(2).collect::<Vec<_>>().join("/")
}

impl FalKlingApi {
    pub fn new(api_key: String) -> Self {
        Self::with_client(
            reqwest::Client::new(),
            FAL_QUEUE_URL.to_string(),
            api_key,
            KLING_MODEL.to_string(),
        )
    }

    pub fn with_client(
        client: reqwest::Client,
        base_url: String,
        api_key: String,
        model: String,
    ) -> Self {
        Self {
            client,
            base_url,
            api_key,
            model,
        }
    }

    fn auth(&self) -> Result<String, ProviderError> {
        Ok(format!("Key {}", require_key(&self.api_key, "FAL_KEY")?))
    }

    fn request_url(&self, request_id: &str) -> String {
        format!(
            "{}/{}/requests/{}",
            self.base_url,
            app_root(&self.model),
            request_id
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T, ProviderError> {
        let response = self
            .client
            .get(url)
            .header("Authorization", self.auth()?)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        parse_response(response).await
    }

    /// Build the submission body for a 10 second vertical clip.
    pub fn submit_body(prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "prompt": prompt,
            "aspect_ratio": "9:16",
            "duration": "10",
        })
    }
}

/// Map a queue status onto the shared vocabulary. A `COMPLETED` status
/// alone is not terminal; the result body decides success.
pub fn normalize_status(status: &QueueStatus) -> Option<JobSnapshot> {
    match status.status.as_deref() {
        Some("COMPLETED") => None,
        Some("FAILED") | Some("ERROR") => Some(JobSnapshot::failed(
            JobStatus::Failed,
            status.error.clone().unwrap_or_else(|| "Generation failed".into()),
        )),
        _ => Some(JobSnapshot::pending()),
    }
}

pub fn normalize_result(result: &QueueResult) -> JobSnapshot {
    match result.video_url() {
        Some(url) => JobSnapshot::succeeded(url),
        None => JobSnapshot::failed(JobStatus::Error, "Completed without a video URL"),
    }
}

#[async_trait]
impl RenderProvider for FalKlingApi {
    fn provider(&self) -> Provider {
        Provider::Kling
    }

    async fn poll(&self, job_id: &str) -> Result<JobSnapshot, ProviderError> {
        let status: QueueStatus = self
            .get_json(format!("{}/status", self.request_url(job_id)))
            .await?;
        if let Some(snapshot) = normalize_status(&status) {
            return Ok(snapshot);
        }

        let result: QueueResult = self.get_json(self.request_url(job_id)).await?;
        Ok(normalize_result(&result))
    }
}

#[async_trait]
impl BackgroundRenderer for FalKlingApi {
    async fn submit_background(&self, prompt: &str) -> Result<JobHandle, ProviderError> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, self.model))
            .header("Authorization", self.auth()?)
            .json(&Self::submit_body(prompt))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let body: QueueSubmit = parse_response(response).await?;
        let request_id = body
            .request_id
            .ok_or_else(|| ProviderError::MalformedResponse("missing request_id".into()))?;

        tracing::info!(request_id = %request_id, model = %self.model, "Kling render queued");

        Ok(JobHandle {
            job_id: request_id,
            provider: Provider::Kling,
        })
    }
}
