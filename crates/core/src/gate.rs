//! Stage gating and the 4-step progress indicator.
//!
//! Both are pure functions of stage state and are recomputed on every
//! read; nothing here holds state of its own.

use serde::{Deserialize, Serialize};

use crate::types::{JobStatus, Stage, StageStatus};

/// Whether the Composite stage's controls are available.
///
/// True iff the avatar render is done and at least one background job
/// has succeeded.
pub fn composite_unlocked<I>(avatar: StageStatus, background_jobs: I) -> bool
where
    I: IntoIterator<Item = JobStatus>,
{
    avatar == StageStatus::Done
        && background_jobs
            .into_iter()
            .any(|s| s == JobStatus::Succeeded)
}

/// Display state of one step in the progress indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Idle,
    Active,
    Done,
    Error,
    Locked,
}

/// Everything the progress indicator needs to know about a run.
#[derive(Debug, Clone, Default)]
pub struct ProgressInputs {
    pub script: StageStatus,
    pub avatar: StageStatus,
    pub background: StageStatus,
    pub background_jobs: Vec<JobStatus>,
    /// Status of each composite slot that has been touched.
    pub composite_slots: Vec<StageStatus>,
}

/// One entry of the progress indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressStep {
    pub stage: Stage,
    pub state: StepState,
}

/// Compute the 4-step indicator (Script, Avatar, Background, Composite).
pub fn progress(inputs: &ProgressInputs) -> [ProgressStep; 4] {
    let unlocked = composite_unlocked(inputs.avatar, inputs.background_jobs.iter().copied());
    let any_bg_succeeded = inputs
        .background_jobs
        .iter()
        .any(|s| *s == JobStatus::Succeeded);

    let background = if any_bg_succeeded {
        StepState::Done
    } else {
        simple_step(inputs.background)
    };

    let composite = if inputs.composite_slots.contains(&StageStatus::Done) {
        StepState::Done
    } else if inputs.composite_slots.iter().any(|s| s.is_in_flight()) {
        StepState::Active
    } else if !unlocked {
        StepState::Locked
    } else if inputs.composite_slots.contains(&StageStatus::Error) {
        StepState::Error
    } else {
        StepState::Idle
    };

    [
        ProgressStep {
            stage: Stage::Script,
            state: simple_step(inputs.script),
        },
        ProgressStep {
            stage: Stage::Avatar,
            state: simple_step(inputs.avatar),
        },
        ProgressStep {
            stage: Stage::Background,
            state: background,
        },
        ProgressStep {
            stage: Stage::Composite,
            state: composite,
        },
    ]
}

fn simple_step(status: StageStatus) -> StepState {
    match status {
        StageStatus::Idle => StepState::Idle,
        StageStatus::Loading | StageStatus::Pending => StepState::Active,
        StageStatus::Done => StepState::Done,
        StageStatus::Error => StepState::Error,
    }
}
