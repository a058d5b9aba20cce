//! RunwayML text-to-video client.

use async_trait::async_trait;
use serde::Deserialize;
use trendreel_core::job::JobSnapshot;
use trendreel_core::types::{JobStatus, Provider};

use crate::error::ProviderError;
use crate::http::{parse_response, require_key, REQUEST_TIMEOUT};
use crate::traits::{BackgroundRenderer, JobHandle, RenderProvider};

pub const RUNWAY_BASE_URL: &str = "https://api.dev.runwayml.com";
const RUNWAY_API_VERSION: &str = "2024-11-06";
const RUNWAY_MODEL: &str = "gen4.5";

pub struct RunwayApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct TaskCreated {
    id: Option<String>,
}

/// Body of `GET /v1/tasks/{id}`.
#[derive(Debug, Default, Deserialize)]
pub struct TaskStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub output: Vec<String>,
    #[serde(default)]
    pub failure: Option<String>,
}

impl RunwayApi {
    pub fn new(api_key: String) -> Self {
        Self::with_client(reqwest::Client::new(), RUNWAY_BASE_URL.to_string(), api_key)
    }

    pub fn with_client(client: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> Result<reqwest::RequestBuilder, ProviderError> {
        let key = require_key(&self.api_key, "RUNWAYML_API_KEY")?;
        Ok(self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(key)
            .header("X-Runway-Version", RUNWAY_API_VERSION)
            .timeout(REQUEST_TIMEOUT))
    }

    pub fn submit_body(prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "model": RUNWAY_MODEL,
            "promptText": prompt,
            "ratio": "720:1280",
            "duration": 10,
        })
    }
}

pub fn normalize_status(task: &TaskStatus) -> JobSnapshot {
    match task.status.as_deref() {
        Some("SUCCEEDED") => match task.output.first() {
            Some(url) => JobSnapshot::succeeded(url.clone()),
            None => JobSnapshot::failed(JobStatus::Error, "Task succeeded without output"),
        },
        Some("FAILED") => JobSnapshot::failed(
            JobStatus::Failed,
            task.failure.clone().unwrap_or_else(|| "Generation failed".into()),
        ),
        Some("CANCELLED") => JobSnapshot::failed(JobStatus::Cancelled, "Task was cancelled"),
        _ => JobSnapshot::pending(),
    }
}

#[async_trait]
impl RenderProvider for RunwayApi {
    fn provider(&self) -> Provider {
        Provider::Runway
    }

    async fn poll(&self, job_id: &str) -> Result<JobSnapshot, ProviderError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/v1/tasks/{job_id}"))?
            .send()
            .await?;
        let task: TaskStatus = parse_response(response).await?;
        Ok(normalize_status(&task))
    }
}

#[async_trait]
impl BackgroundRenderer for RunwayApi {
    async fn submit_background(&self, prompt: &str) -> Result<JobHandle, ProviderError> {
        let response = self
            .request(reqwest::Method::POST, "/v1/text_to_video")?
            .json(&Self::submit_body(prompt))
            .send()
            .await?;

        let created: TaskCreated = parse_response(response).await?;
        let id = created
            .id
            .ok_or_else(|| ProviderError::MalformedResponse("missing task id".into()))?;

        tracing::info!(task_id = %id, "Runway render submitted");

        Ok(JobHandle {
            job_id: id,
            provider: Provider::Runway,
        })
    }
}
