//! Events broadcast by a pipeline run.
//!
//! Subscribers get them via
//! [`PipelineOrchestrator::subscribe`](crate::PipelineOrchestrator::subscribe).
//! Delivery is best-effort; a lagging receiver loses the oldest events.

use serde::Serialize;
use trendreel_core::types::{JobStatus, Provider, Slot, Stage, StageStatus};

/// Capacity of the per-run broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A stage (or one composite slot) changed status.
    StageStatusChanged {
        stage: Stage,
        slot: Option<Slot>,
        status: StageStatus,
    },

    /// A provider accepted a job.
    JobSubmitted {
        stage: Stage,
        slot: Option<Slot>,
        provider: Provider,
        job_id: String,
    },

    /// A job reached a terminal status.
    JobFinished {
        stage: Stage,
        slot: Option<Slot>,
        job_id: String,
        status: JobStatus,
        result_url: Option<String>,
        error_message: Option<String>,
    },

    /// An in-flight composite lost its prerequisite and was abandoned.
    CompositeOrphaned { slot: Slot, job_id: Option<String> },
}
