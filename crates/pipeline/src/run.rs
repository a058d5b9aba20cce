//! The pipeline run aggregate.

use trendreel_core::analysis::{Analysis, BackgroundCandidate};
use trendreel_core::duration::estimate_script_duration;
use trendreel_core::gate::{self, ProgressInputs, ProgressStep};
use trendreel_core::slots::SlotAssignment;
use trendreel_core::types::{JobStatus, Platform, Slot, Stage, Timestamp};
use trendreel_providers::music::{find_track, DEFAULT_MUSIC_TRACK};
use trendreel_providers::{AvatarRequest, CompositeRequest};

use crate::error::PipelineError;
use crate::poller::{JobUpdate, Poller};
use crate::stage::{AvatarStage, BackgroundStage, CompositeStage, ScriptStage};

/// A candidate picked for one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotPick {
    pub slot: Slot,
    pub candidate_index: usize,
    pub prompt_text: String,
}

/// Everything one trend-to-video run holds.
///
/// Created when an analysis is available. Each stage resets on its own;
/// resetting Avatar or Background also orphans the composites built on
/// them.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub analysis: Analysis,
    pub hashtags: Vec<String>,
    pub platform: Platform,
    pub script: ScriptStage,
    pub candidates: Vec<BackgroundCandidate>,
    pub slots: SlotAssignment,
    pub music_track_id: String,
    pub avatar: AvatarStage,
    pub background: BackgroundStage,
    pub composite: CompositeStage,
    pub created_at: Timestamp,
}

impl PipelineRun {
    pub fn new(analysis: Analysis, hashtags: Vec<String>, platform: Platform) -> Self {
        Self {
            analysis,
            hashtags,
            platform,
            script: ScriptStage::default(),
            candidates: Vec::new(),
            slots: SlotAssignment::new(),
            music_track_id: DEFAULT_MUSIC_TRACK.to_string(),
            avatar: AvatarStage::default(),
            background: BackgroundStage::default(),
            composite: CompositeStage::default(),
            created_at: chrono::Utc::now(),
        }
    }

    // ---- user selections ----

    /// Replace the candidate list. Slot assignments refer to the old list
    /// and are cleared.
    pub fn set_candidates(&mut self, candidates: Vec<BackgroundCandidate>) -> Result<(), PipelineError> {
        let mut seen = std::collections::HashSet::new();
        for c in &candidates {
            if !seen.insert(c.index) {
                return Err(PipelineError::precondition(format!(
                    "Duplicate candidate index {}",
                    c.index
                )));
            }
            if c.prompt_text.trim().is_empty() {
                return Err(PipelineError::precondition(format!(
                    "Candidate {} has an empty prompt",
                    c.index
                )));
            }
        }
        self.candidates = candidates;
        self.slots.clear();
        Ok(())
    }

    pub fn candidate(&self, index: usize) -> Option<&BackgroundCandidate> {
        self.candidates.iter().find(|c| c.index == index)
    }

    pub fn assign_slot(&mut self, slot: Slot, index: usize) -> Result<(), PipelineError> {
        if self.candidate(index).is_none() {
            return Err(PipelineError::precondition(format!(
                "No background candidate with index {index}"
            )));
        }
        self.slots.assign(slot, index);
        Ok(())
    }

    pub fn select_music(&mut self, track_id: &str) -> Result<(), PipelineError> {
        let track = find_track(track_id).ok_or_else(|| {
            PipelineError::precondition(format!("Unknown music track '{track_id}'"))
        })?;
        self.music_track_id = track.id.to_string();
        Ok(())
    }

    // ---- submission inputs ----

    pub fn avatar_request(&self, avatar_id: &str, voice_id: &str) -> Result<AvatarRequest, PipelineError> {
        if avatar_id.trim().is_empty() {
            return Err(PipelineError::precondition("Choose an avatar first"));
        }
        if voice_id.trim().is_empty() {
            return Err(PipelineError::precondition("Choose a voice first"));
        }
        if self.script.text.trim().is_empty() {
            return Err(PipelineError::precondition("The script is empty"));
        }
        Ok(AvatarRequest {
            avatar_id: avatar_id.trim().to_string(),
            voice_id: voice_id.trim().to_string(),
            script: self.script.text.clone(),
            platform: self.platform,
        })
    }

    /// The two assigned candidates, in slot order.
    pub fn background_picks(&self) -> Result<[SlotPick; 2], PipelineError> {
        let (a, b) = self.slots.pair().ok_or_else(|| {
            PipelineError::precondition("Assign two different candidates to slots A and B")
        })?;
        let pick = |slot: Slot, index: usize| -> Result<SlotPick, PipelineError> {
            let candidate = self.candidate(index).ok_or_else(|| {
                PipelineError::precondition(format!("No background candidate with index {index}"))
            })?;
            Ok(SlotPick {
                slot,
                candidate_index: index,
                prompt_text: candidate.prompt_text.clone(),
            })
        };
        Ok([pick(Slot::A, a)?, pick(Slot::B, b)?])
    }

    /// Freeze the inputs for compositing `slot`.
    pub fn composite_request(&self, slot: Slot) -> Result<CompositeRequest, PipelineError> {
        let avatar_url = self
            .avatar
            .result_url()
            .ok_or_else(|| PipelineError::precondition("The avatar render is not done"))?;

        let background_url = self
            .background
            .job(slot)
            .filter(|j| j.status() == JobStatus::Succeeded)
            .and_then(|j| j.result_url())
            .ok_or_else(|| {
                PipelineError::precondition(format!("The slot {slot} background has not succeeded"))
            })?;

        Ok(CompositeRequest {
            slot,
            avatar_result_url: avatar_url.to_string(),
            background_result_url: background_url.to_string(),
            hook_text: self.analysis.hook_text().to_string(),
            music_track_id: self.music_track_id.clone(),
            duration_seconds: estimate_script_duration(&self.script.text),
        })
    }

    // ---- polling ----

    /// The poller of a polled stage; the script stage has none.
    pub fn poller(&self, stage: Stage) -> Option<&Poller> {
        match stage {
            Stage::Script => None,
            Stage::Avatar => Some(self.avatar.poller()),
            Stage::Background => Some(self.background.poller()),
            Stage::Composite => Some(self.composite.poller()),
        }
    }

    pub fn poller_mut(&mut self, stage: Stage) -> Option<&mut Poller> {
        match stage {
            Stage::Script => None,
            Stage::Avatar => Some(self.avatar.poller_mut()),
            Stage::Background => Some(self.background.poller_mut()),
            Stage::Composite => Some(self.composite.poller_mut()),
        }
    }

    /// Apply one terminal poll result to the owning stage.
    pub fn apply_update(&mut self, stage: Stage, update: &JobUpdate) -> bool {
        match stage {
            Stage::Script => false,
            Stage::Avatar => self.avatar.apply(update),
            Stage::Background => self.background.apply(update),
            Stage::Composite => self.composite.apply(update),
        }
    }

    // ---- derived views ----

    pub fn composite_unlocked(&self) -> bool {
        gate::composite_unlocked(self.avatar.status, self.background.job_statuses())
    }

    pub fn progress(&self) -> [ProgressStep; 4] {
        gate::progress(&ProgressInputs {
            script: self.script.status,
            avatar: self.avatar.status,
            background: self.background.status,
            background_jobs: self.background.job_statuses(),
            composite_slots: self.composite.slot_statuses(),
        })
    }
}
