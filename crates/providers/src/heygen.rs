//! REST client for the HeyGen avatar video API.
//!
//! Submits talking-head renders on a solid green background (keyed out
//! later by the composite), polls render status, and lists the avatars
//! and voices the account can use.

use async_trait::async_trait;
use serde::Deserialize;
use trendreel_core::job::JobSnapshot;
use trendreel_core::types::{JobStatus, Provider};

use crate::error::ProviderError;
use crate::http::{parse_response, require_key, REQUEST_TIMEOUT};
use crate::traits::{
    AvatarCatalog, AvatarOption, AvatarRenderer, AvatarRequest, CatalogSource, JobHandle,
    RenderProvider, VoiceOption,
};

pub const HEYGEN_BASE_URL: &str = "https://api.heygen.com";

/// Chroma-key colour painted behind the avatar.
pub const GREEN_SCREEN: &str = "#00FF00";

/// Vertical 9:16 output.
const RENDER_WIDTH: u32 = 720;
const RENDER_HEIGHT: u32 = 1280;

/// HTTP client for the HeyGen API.
pub struct HeyGenApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

// ---- wire types ----

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct GenerateData {
    video_id: Option<String>,
}

/// Body of `GET /v1/video_status.get`.
#[derive(Debug, Default, Deserialize)]
pub struct VideoStatusData {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    /// HeyGen reports errors either as a string or as an object.
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct AvatarList {
    #[serde(default)]
    avatars: Vec<RawAvatar>,
}

#[derive(Debug, Deserialize)]
struct RawAvatar {
    avatar_id: Option<String>,
    avatar_name: Option<String>,
    name: Option<String>,
    preview_image_url: Option<String>,
    preview_url: Option<String>,
    #[serde(default)]
    gender: Option<String>,
    avatar_style: Option<String>,
    style: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VoiceList {
    #[serde(default)]
    voices: Vec<RawVoice>,
}

#[derive(Debug, Deserialize)]
struct RawVoice {
    voice_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    gender: Option<String>,
}

impl HeyGenApi {
    /// * `api_key` - value for the `x-api-key` header.
    pub fn new(api_key: String) -> Self {
        Self::with_client(reqwest::Client::new(), HEYGEN_BASE_URL.to_string(), api_key)
    }

    /// Reuse an existing [`reqwest::Client`] and target a custom base URL.
    pub fn with_client(client: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }

    fn key(&self) -> Result<&str, ProviderError> {
        require_key(&self.api_key, "HEYGEN_API_KEY")
    }

    /// Build the `POST /v2/video/generate` body.
    pub fn generate_body(request: &AvatarRequest) -> serde_json::Value {
        serde_json::json!({
            "video_inputs": [{
                "character": {
                    "type": "avatar",
                    "avatar_id": request.avatar_id,
                    "avatar_style": "normal",
                },
                "voice": {
                    "type": "text",
                    "input_text": request.script,
                    "voice_id": request.voice_id,
                },
                "background": {
                    "type": "color",
                    "value": GREEN_SCREEN,
                },
            }],
            "dimension": {"width": RENDER_WIDTH, "height": RENDER_HEIGHT},
        })
    }

    async fn get_data<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("x-api-key", self.key()?)
            .header("accept", "application/json")
            .query(query)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let envelope: Envelope<T> = parse_response(response).await?;
        envelope
            .data
            .ok_or_else(|| ProviderError::MalformedResponse(format!("{path}: missing `data`")))
    }
}

/// Map a HeyGen status payload onto the shared vocabulary.
///
/// `completed` succeeds, `failed` fails, everything else
/// (`pending`, `processing`, `waiting`) stays pending.
pub fn normalize_status(data: &VideoStatusData) -> JobSnapshot {
    match data.status.as_deref() {
        Some("completed") => match &data.video_url {
            Some(url) => JobSnapshot::succeeded(url.clone()),
            None => JobSnapshot::failed(JobStatus::Error, "Render completed without a video URL"),
        },
        Some("failed") => JobSnapshot::failed(JobStatus::Failed, error_text(data.error.as_ref())),
        _ => JobSnapshot::pending(),
    }
}

fn error_text(error: Option<&serde_json::Value>) -> String {
    match error {
        Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
        Some(serde_json::Value::Object(map)) => map
            .get("message")
            .or_else(|| map.get("msg"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| serde_json::Value::Object(map.clone()).to_string()),
        _ => "Generation failed".to_string(),
    }
}

fn is_avatar_iv(raw: &RawAvatar) -> bool {
    let style = raw
        .avatar_style
        .as_deref()
        .or(raw.style.as_deref())
        .or(raw.kind.as_deref())
        .unwrap_or_default();
    style.to_uppercase().contains("IV") || style.contains('4')
}

#[async_trait]
impl RenderProvider for HeyGenApi {
    fn provider(&self) -> Provider {
        Provider::HeyGen
    }

    async fn poll(&self, job_id: &str) -> Result<JobSnapshot, ProviderError> {
        let data: VideoStatusData = self
            .get_data("/v1/video_status.get", &[("video_id", job_id)])
            .await?;
        Ok(normalize_status(&data))
    }
}

#[async_trait]
impl AvatarRenderer for HeyGenApi {
    async fn submit_avatar(&self, request: &AvatarRequest) -> Result<JobHandle, ProviderError> {
        let response = self
            .client
            .post(format!("{}/v2/video/generate", self.base_url))
            .header("x-api-key", self.key()?)
            .header("accept", "application/json")
            .json(&Self::generate_body(request))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let envelope: Envelope<GenerateData> = parse_response(response).await?;
        let video_id = envelope
            .data
            .and_then(|d| d.video_id)
            .ok_or_else(|| ProviderError::MalformedResponse("missing video_id".into()))?;

        tracing::info!(
            video_id = %video_id,
            avatar_id = %request.avatar_id,
            "Avatar render submitted to HeyGen",
        );

        Ok(JobHandle {
            job_id: video_id,
            provider: Provider::HeyGen,
        })
    }
}

#[async_trait]
impl CatalogSource for HeyGenApi {
    async fn fetch_avatar_catalog(&self) -> Result<AvatarCatalog, ProviderError> {
        let avatar_list: AvatarList = self.get_data("/v2/avatars", &[]).await?;
        let voice_list: VoiceList = self.get_data("/v2/voices", &[]).await?;

        let avatars = avatar_list
            .avatars
            .into_iter()
            .filter_map(|a| {
                let is_iv = is_avatar_iv(&a);
                Some(AvatarOption {
                    avatar_id: a.avatar_id?,
                    name: a.avatar_name.or(a.name).unwrap_or_default(),
                    thumbnail: a.preview_image_url.or(a.preview_url),
                    gender: a.gender.unwrap_or_default(),
                    is_avatar_iv: is_iv,
                })
            })
            .collect();

        let voices = voice_list
            .voices
            .into_iter()
            .filter(|v| {
                v.language
                    .as_deref()
                    .unwrap_or_default()
                    .to_lowercase()
                    .starts_with("en")
            })
            .filter_map(|v| {
                Some(VoiceOption {
                    voice_id: v.voice_id?,
                    name: v.name.unwrap_or_default(),
                    language: v.language.unwrap_or_default(),
                    gender: v.gender.unwrap_or_default(),
                })
            })
            .collect();

        Ok(AvatarCatalog { avatars, voices })
    }
}
