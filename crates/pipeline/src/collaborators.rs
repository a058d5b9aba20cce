//! Text collaborators the pipeline consumes but does not implement.
//!
//! Trend analysis, spoken-script writing and background-prompt proposal
//! are produced by external services; the orchestrator only sees these
//! traits.

use async_trait::async_trait;
use trendreel_core::analysis::{Analysis, BackgroundCandidate};
use trendreel_core::types::Platform;

/// Error type returned by collaborators.
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

/// Number of background candidates a proposer is asked for.
pub const CANDIDATE_COUNT: usize = 7;

#[async_trait]
pub trait AnalysisSource: Send + Sync {
    async fn get_analysis(&self) -> Result<Analysis, CollaboratorError>;
}

#[async_trait]
pub trait ScriptWriter: Send + Sync {
    async fn generate_spoken_script(
        &self,
        analysis: &Analysis,
        hashtags: &[String],
        platform: Platform,
    ) -> Result<String, CollaboratorError>;
}

#[async_trait]
pub trait PromptProposer: Send + Sync {
    async fn propose_background_candidates(
        &self,
        analysis: &Analysis,
        hashtags: &[String],
    ) -> Result<Vec<BackgroundCandidate>, CollaboratorError>;
}
