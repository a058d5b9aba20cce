//! Shotstack render client and timeline builder.
//!
//! A composite layers four tracks onto a 720x1280 canvas: the looped,
//! muted background clip; the chroma-keyed avatar; a short hook caption;
//! and low-volume music.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use trendreel_core::job::JobSnapshot;
use trendreel_core::types::{JobStatus, Provider};

use crate::error::ProviderError;
use crate::heygen::GREEN_SCREEN;
use crate::http::{parse_response, require_key, REQUEST_TIMEOUT};
use crate::music::track_url;
use crate::traits::{CompositeRenderer, CompositeRequest, JobHandle, RenderProvider};

/// Sandbox tier.
pub const SHOTSTACK_BASE_URL: &str = "https://api.shotstack.io/edit/stage";

/// Background renders are 10 second clips.
const BACKGROUND_CLIP_SECS: u32 = 10;
const CAPTION_SECS: f64 = 3.5;
const MUSIC_VOLUME: f64 = 0.12;

const CAPTION_CSS: &str = "p { font-family: 'Open Sans', sans-serif; \
color: #ffffff; font-size: 38px; font-weight: 800; \
text-shadow: 2px 2px 6px rgba(0,0,0,0.9); \
text-align: center; padding: 12px 20px; line-height: 1.3; }";

pub struct ShotstackApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    response: Option<T>,
}

#[derive(Debug, Deserialize)]
struct RenderQueued {
    id: Option<String>,
}

/// `response` object of `GET /render/{id}`.
#[derive(Debug, Default, Deserialize)]
pub struct RenderStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ShotstackApi {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self::with_client(
            reqwest::Client::new(),
            base_url.unwrap_or_else(|| SHOTSTACK_BASE_URL.to_string()),
            api_key,
        )
    }

    pub fn with_client(client: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn key(&self) -> Result<&str, ProviderError> {
        require_key(&self.api_key, "SHOTSTACK_API_KEY")
    }
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

/// Split `duration` seconds into consecutive `(start, length)` pieces of
/// at most one background clip each.
pub fn background_loop(duration: u32) -> Vec<(u32, u32)> {
    let mut pieces = Vec::new();
    let mut start = 0;
    while start < duration {
        let len = BACKGROUND_CLIP_SECS.min(duration - start);
        pieces.push((start, len));
        start += len;
    }
    pieces
}

/// Escape text for embedding in the caption's HTML asset.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Build the `POST /render` body for one composite.
pub fn build_render(request: &CompositeRequest, music_url: &str) -> Value {
    let duration = request.duration_seconds;

    let background_clips: Vec<Value> = background_loop(duration)
        .into_iter()
        .map(|(start, length)| {
            json!({
                "asset": {
                    "type": "video",
                    "src": request.background_result_url,
                    "volume": 0,
                },
                "start": start,
                "length": length,
                "fit": "cover",
            })
        })
        .collect();

    let avatar = json!({
        "asset": {
            "type": "video",
            "src": request.avatar_result_url,
            "volume": 1.0,
            "chromaKey": {
                "color": GREEN_SCREEN,
                "threshold": 0.3,
                "feather": 0.02,
            },
        },
        "start": 0,
        "length": duration,
        "fit": "contain",
        "position": "center",
    });

    let caption = json!({
        "asset": {
            "type": "html",
            "html": format!("<p>{}</p>", escape_html(&request.hook_text)),
            "css": CAPTION_CSS,
            "width": 640,
            "height": 220,
        },
        "start": 0,
        "length": CAPTION_SECS,
        "position": "bottom",
        "offset": {"y": 0.15},
        "transition": {"out": "fade"},
    });

    let music = json!({
        "asset": {
            "type": "audio",
            "src": music_url,
            "volume": MUSIC_VOLUME,
        },
        "start": 0,
        "length": duration,
    });

    json!({
        "timeline": {
            "background": "#000000",
            "tracks": [
                {"clips": background_clips},
                {"clips": [avatar]},
                {"clips": [caption]},
                {"clips": [music]},
            ],
        },
        "output": {
            "format": "mp4",
            "resolution": "hd",
            "aspectRatio": "9:16",
            "fps": 30,
            "size": {"width": 720, "height": 1280},
        },
    })
}

/// `done` succeeds; `failed`/`cancelled` fail; `queued`, `fetching`,
/// `rendering` and `saving` stay pending.
pub fn normalize_status(status: &RenderStatus) -> JobSnapshot {
    match status.status.as_deref() {
        Some("done") => match &status.url {
            Some(url) => JobSnapshot::succeeded(url.clone()),
            None => JobSnapshot::failed(JobStatus::Error, "Render finished without a URL"),
        },
        Some("failed") => JobSnapshot::failed(
            JobStatus::Failed,
            status.error.clone().unwrap_or_else(|| "Render failed".into()),
        ),
        Some("cancelled") => JobSnapshot::failed(JobStatus::Cancelled, "Render was cancelled"),
        _ => JobSnapshot::pending(),
    }
}

#[async_trait]
impl RenderProvider for ShotstackApi {
    fn provider(&self) -> Provider {
        Provider::Shotstack
    }

    async fn poll(&self, job_id: &str) -> Result<JobSnapshot, ProviderError> {
        let response = self
            .client
            .get(format!("{}/render/{}", self.base_url, job_id))
            .header("x-api-key", self.key()?)
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let envelope: Envelope<RenderStatus> = parse_response(response).await?;
        Ok(normalize_status(&envelope.response.unwrap_or_default()))
    }
}

#[async_trait]
impl CompositeRenderer for ShotstackApi {
    async fn submit_composite(
        &self,
        request: &CompositeRequest,
    ) -> Result<JobHandle, ProviderError> {
        let body = build_render(request, track_url(&request.music_track_id));

        let response = self
            .client
            .post(format!("{}/render", self.base_url))
            .header("x-api-key", self.key()?)
            .header("Accept", "application/json")
            .json(&body)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let envelope: Envelope<RenderQueued> = parse_response(response).await?;
        let render_id = envelope
            .response
            .and_then(|r| r.id)
            .ok_or_else(|| ProviderError::MalformedResponse("missing render id".into()))?;

        tracing::info!(
            render_id = %render_id,
            slot = %request.slot,
            duration_secs = request.duration_seconds,
            "Composite render queued",
        );

        Ok(JobHandle {
            job_id: render_id,
            provider: Provider::Shotstack,
        })
    }
}
