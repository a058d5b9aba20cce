use trendreel_core::error::CoreError;
use trendreel_core::types::Stage;

/// Errors returned by orchestrator actions.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Refused before any network call; no state changed.
    #[error("{0}")]
    Precondition(String),

    /// The stage (or slot) already has work in flight.
    #[error("{0}")]
    Conflict(String),

    /// The provider rejected the submission; the stage is now in `error`.
    #[error("{stage} submission failed: {message}")]
    Submission { stage: Stage, message: String },

    /// The stage was reset while the submission was in flight; the
    /// provider's answer was discarded.
    #[error("{stage} was reset before the submission completed")]
    Superseded { stage: Stage },

    /// A text collaborator (analysis, script, prompts) failed.
    #[error("Collaborator failed: {0}")]
    Collaborator(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl PipelineError {
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }
}
