use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// One phase of the pipeline. Used to index stage state and to compute
/// gating and progress; it carries no behaviour of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Script,
    Avatar,
    Background,
    Composite,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Stage; 4] = [
        Stage::Script,
        Stage::Avatar,
        Stage::Background,
        Stage::Composite,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Avatar => "avatar",
            Self::Background => "background",
            Self::Composite => "composite",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "script" => Ok(Self::Script),
            "avatar" => Ok(Self::Avatar),
            "background" | "backgrounds" => Ok(Self::Background),
            "composite" => Ok(Self::Composite),
            _ => Err(CoreError::Validation(format!(
                "Unknown stage '{s}'. Must be one of: script, avatar, background, composite"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Stage status
// ---------------------------------------------------------------------------

/// Status of a stage (or of a single composite slot).
///
/// `Loading` means the local submission request is in flight; `Pending`
/// means the provider accepted the job and it is awaiting a terminal
/// status via polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    Idle,
    Loading,
    Pending,
    Done,
    Error,
}

impl StageStatus {
    /// `Loading` or `Pending`: a submission or render is outstanding.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Loading | Self::Pending)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

// ---------------------------------------------------------------------------
// Job status
// ---------------------------------------------------------------------------

/// Normalized status of a provider job.
///
/// Every provider's own vocabulary is mapped onto these values before it
/// reaches the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Succeeded,
    Failed,
    Error,
    Cancelled,
    Timeout,
}

impl JobStatus {
    /// Any status from which no further transition occurs without an
    /// explicit resubmission.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Terminal and not a success.
    pub fn is_failure(self) -> bool {
        self.is_terminal() && self != Self::Succeeded
    }
}

// ---------------------------------------------------------------------------
// Slot
// ---------------------------------------------------------------------------

/// One of the two named output positions for background candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::A, Slot::B];

    /// The sibling slot.
    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Slot {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" | "a" => Ok(Self::A),
            "B" | "b" => Ok(Self::B),
            _ => Err(CoreError::Validation(format!(
                "Unknown slot '{s}'. Must be A or B"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// Closed set of supported render providers.
///
/// Parsing is strict: unknown labels are rejected instead of being routed
/// to a default provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Talking-head avatar renders.
    #[serde(rename = "heygen")]
    HeyGen,
    /// Background scenes via the fal.ai queue.
    Kling,
    /// Background scenes via RunwayML.
    Runway,
    /// Final scene composites.
    Shotstack,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::HeyGen,
        Provider::Kling,
        Provider::Runway,
        Provider::Shotstack,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::HeyGen => "heygen",
            Self::Kling => "kling",
            Self::Runway => "runway",
            Self::Shotstack => "shotstack",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Unknown provider '{s}'. Must be one of: heygen, kling, runway, shotstack"
                ))
            })
    }
}

/// Background rendering model chosen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundModel {
    #[default]
    Kling,
    Runway,
}

impl BackgroundModel {
    /// Provider that renders jobs for this model.
    pub fn provider(self) -> Provider {
        match self {
            Self::Kling => Provider::Kling,
            Self::Runway => Provider::Runway,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Kling => "kling",
            Self::Runway => "runway",
        }
    }
}

impl FromStr for BackgroundModel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "kling" => Ok(Self::Kling),
            "runway" => Ok(Self::Runway),
            _ => Err(CoreError::Validation(format!(
                "Unknown background model '{s}'. Must be kling or runway"
            ))),
        }
    }
}

/// Social platform the analysis was produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    #[default]
    Instagram,
    Tiktok,
}

impl Platform {
    pub fn label(self) -> &'static str {
        match self {
            Self::Instagram => "Instagram",
            Self::Tiktok => "TikTok",
        }
    }
}

impl FromStr for Platform {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "instagram" => Ok(Self::Instagram),
            "tiktok" => Ok(Self::Tiktok),
            _ => Err(CoreError::Validation(format!(
                "Unknown platform '{s}'. Must be instagram or tiktok"
            ))),
        }
    }
}
