//! Read-only view of a run for presentation layers.

use serde::Serialize;
use trendreel_core::analysis::BackgroundCandidate;
use trendreel_core::gate::ProgressStep;
use trendreel_core::job::Job;
use trendreel_core::types::{BackgroundModel, Platform, Slot, StageStatus, Timestamp};

use crate::run::PipelineRun;
use crate::stage::{BackgroundJob, CompositeSlot, ScriptStage};

#[derive(Debug, Clone, Serialize)]
pub struct SlotsView {
    pub a: Option<usize>,
    pub b: Option<usize>,
    pub ready: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvatarView {
    pub status: StageStatus,
    pub job: Option<Job>,
    pub result_url: Option<String>,
    pub error: Option<String>,
    pub has_generated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackgroundView {
    pub status: StageStatus,
    pub model: Option<BackgroundModel>,
    pub jobs: Vec<BackgroundJob>,
    pub error: Option<String>,
    pub has_generated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompositeView {
    pub a: CompositeSlot,
    pub b: CompositeSlot,
}

impl CompositeView {
    pub fn slot(&self, slot: Slot) -> &CompositeSlot {
        match slot {
            Slot::A => &self.a,
            Slot::B => &self.b,
        }
    }
}

/// Per-stage status, jobs, results and errors, plus the gate and the
/// 4-step progress indicator.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSnapshot {
    pub created_at: Timestamp,
    pub platform: Platform,
    pub hashtags: Vec<String>,
    pub hook_text: String,
    pub script: ScriptStage,
    pub candidates: Vec<BackgroundCandidate>,
    pub slots: SlotsView,
    pub music_track_id: String,
    pub avatar: AvatarView,
    pub background: BackgroundView,
    pub composite: CompositeView,
    pub composite_unlocked: bool,
    pub progress: [ProgressStep; 4],
}

impl From<&PipelineRun> for PipelineSnapshot {
    fn from(run: &PipelineRun) -> Self {
        Self {
            created_at: run.created_at,
            platform: run.platform,
            hashtags: run.hashtags.clone(),
            hook_text: run.analysis.hook_text().to_string(),
            script: run.script.clone(),
            candidates: run.candidates.clone(),
            slots: SlotsView {
                a: run.slots.occupant(Slot::A),
                b: run.slots.occupant(Slot::B),
                ready: run.slots.is_ready(),
            },
            music_track_id: run.music_track_id.clone(),
            avatar: AvatarView {
                status: run.avatar.status,
                job: run.avatar.job.clone(),
                result_url: run.avatar.result_url().map(str::to_string),
                error: run.avatar.error.clone(),
                has_generated: run.avatar.has_generated,
            },
            background: BackgroundView {
                status: run.background.status,
                model: run.background.model,
                jobs: run.background.jobs.clone(),
                error: run.background.error.clone(),
                has_generated: run.background.has_generated,
            },
            composite: CompositeView {
                a: run.composite.a.clone(),
                b: run.composite.b.clone(),
            },
            composite_unlocked: run.composite_unlocked(),
            progress: run.progress(),
        }
    }
}
