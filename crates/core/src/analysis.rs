//! Inputs the pipeline consumes from its text collaborators.
//!
//! The trend analysis is produced elsewhere and treated as an opaque,
//! immutable payload. Only the fields the pipeline reads are typed; the
//! rest is preserved verbatim in `extra`.

use serde::{Deserialize, Serialize};

/// Video concept proposed by the trend analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoProposal {
    #[serde(default)]
    pub title: Option<String>,
    /// Short attention-grabbing line used as the on-screen caption.
    #[serde(default)]
    pub hook: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Output of the trend-analysis collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(default)]
    pub key_insights: Option<String>,
    #[serde(default)]
    pub video_proposal: VideoProposal,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Analysis {
    /// Caption text for the final composite.
    pub fn hook_text(&self) -> &str {
        self.video_proposal.hook.trim()
    }
}

/// A background-scene prompt proposed by the prompt-generation
/// collaborator. Read-only once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundCandidate {
    pub index: usize,
    pub label: String,
    #[serde(default)]
    pub description: String,
    pub prompt_text: String,
}
