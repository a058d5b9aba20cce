//! Per-stage state machines.
//!
//! Each stage owns its job records and its [`Poller`] exclusively. All
//! transitions are synchronous; the orchestrator performs the provider
//! calls and feeds the outcomes back in. Submissions are stamped with a
//! generation number so an answer that arrives after a reset is rejected
//! with [`PipelineError::Superseded`].

use serde::Serialize;
use trendreel_core::job::Job;
use trendreel_core::types::{BackgroundModel, JobStatus, Provider, Slot, Stage, StageStatus};
use trendreel_providers::{CompositeRequest, JobHandle};

use crate::error::PipelineError;
use crate::poller::{JobUpdate, Poller, TrackedJob};

/// Message recorded on a composite slot whose inputs were reset.
pub const PREREQUISITE_CHANGED: &str = "prerequisite changed";

/// Message recorded when a submission ends without an answer.
pub const SUBMISSION_INTERRUPTED: &str = "submission interrupted";

fn refuse_in_flight(status: StageStatus, what: &str) -> Result<(), PipelineError> {
    if status.is_in_flight() {
        return Err(PipelineError::Conflict(format!(
            "{what} is already {}",
            match status {
                StageStatus::Loading => "submitting",
                _ => "rendering",
            }
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Script
// ---------------------------------------------------------------------------

/// The spoken script. Informational for progress; the avatar stage reads
/// its text.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScriptStage {
    pub status: StageStatus,
    pub text: String,
    pub error: Option<String>,
    pub has_generated: bool,
    #[serde(skip)]
    generation: u64,
}

impl ScriptStage {
    /// Replace the script with user-edited text.
    pub fn set_text(&mut self, text: String) {
        self.status = if text.trim().is_empty() {
            StageStatus::Idle
        } else {
            StageStatus::Done
        };
        self.text = text;
        self.error = None;
        self.generation += 1;
    }

    pub fn begin_generate(&mut self) -> Result<u64, PipelineError> {
        refuse_in_flight(self.status, "Script")?;
        self.status = StageStatus::Loading;
        self.error = None;
        self.generation += 1;
        Ok(self.generation)
    }

    pub fn finish_generate(
        &mut self,
        generation: u64,
        outcome: Result<String, String>,
    ) -> Result<(), PipelineError> {
        if generation != self.generation {
            return Err(PipelineError::Superseded {
                stage: Stage::Script,
            });
        }
        self.has_generated = true;
        match outcome {
            Ok(text) => {
                self.text = text;
                self.status = StageStatus::Done;
            }
            Err(message) => {
                self.status = StageStatus::Error;
                self.error = Some(message);
            }
        }
        Ok(())
    }

    /// The generation request ended without an outcome. Only a stage still
    /// `loading` for `generation` moves to `error`; returns whether it did.
    pub fn interrupt(&mut self, generation: u64, message: String) -> bool {
        if generation != self.generation || self.status != StageStatus::Loading {
            return false;
        }
        self.status = StageStatus::Error;
        self.error = Some(message);
        true
    }

    pub fn reset(&mut self) {
        self.status = StageStatus::Idle;
        self.text.clear();
        self.error = None;
        self.generation += 1;
    }
}

// ---------------------------------------------------------------------------
// Avatar
// ---------------------------------------------------------------------------

/// One talking-head render.
#[derive(Debug, Clone)]
pub struct AvatarStage {
    pub status: StageStatus,
    pub job: Option<Job>,
    pub error: Option<String>,
    /// Survives resets; distinguishes a first run from a regeneration.
    pub has_generated: bool,
    generation: u64,
    poller: Poller,
}

impl Default for AvatarStage {
    fn default() -> Self {
        Self {
            status: StageStatus::Idle,
            job: None,
            error: None,
            has_generated: false,
            generation: 0,
            poller: Poller::new(Stage::Avatar),
        }
    }
}

impl AvatarStage {
    /// Move to `loading`, discarding any previous job.
    pub fn begin_submit(&mut self) -> Result<u64, PipelineError> {
        refuse_in_flight(self.status, "Avatar")?;
        self.discard();
        self.status = StageStatus::Loading;
        Ok(self.generation)
    }

    /// The provider accepted the job; start tracking it.
    pub fn accept(&mut self, generation: u64, handle: JobHandle) -> Result<(), PipelineError> {
        self.check_generation(generation)?;
        self.poller.track(TrackedJob {
            job_id: handle.job_id.clone(),
            provider: handle.provider,
            slot: None,
        });
        self.job = Some(Job::submitted(handle.job_id, handle.provider));
        self.status = StageStatus::Pending;
        self.has_generated = true;
        Ok(())
    }

    /// The provider refused the job.
    pub fn reject(&mut self, generation: u64, message: String) -> Result<(), PipelineError> {
        self.check_generation(generation)?;
        self.status = StageStatus::Error;
        self.error = Some(message);
        self.has_generated = true;
        Ok(())
    }

    /// The submission ended without an answer from the provider.
    pub fn interrupt(&mut self, generation: u64, message: String) -> bool {
        if generation != self.generation || self.status != StageStatus::Loading {
            return false;
        }
        self.status = StageStatus::Error;
        self.error = Some(message);
        self.has_generated = true;
        true
    }

    /// Apply a terminal poll result. Returns `true` if it changed the stage.
    pub fn apply(&mut self, update: &JobUpdate) -> bool {
        let Some(job) = self.job.as_mut().filter(|j| j.job_id == update.job_id) else {
            return false;
        };
        if !job.apply(&update.snapshot) {
            return false;
        }
        if job.status == JobStatus::Succeeded {
            self.status = StageStatus::Done;
        } else {
            self.status = StageStatus::Error;
            self.error = job.error_message.clone();
        }
        true
    }

    pub fn reset(&mut self) {
        self.discard();
        self.status = StageStatus::Idle;
    }

    pub fn result_url(&self) -> Option<&str> {
        self.job
            .as_ref()
            .filter(|j| j.status == JobStatus::Succeeded)
            .and_then(|j| j.result_url.as_deref())
    }

    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    pub fn poller_mut(&mut self) -> &mut Poller {
        &mut self.poller
    }

    fn discard(&mut self) {
        self.job = None;
        self.error = None;
        self.generation += 1;
        self.poller.clear();
    }

    fn check_generation(&self, generation: u64) -> Result<(), PipelineError> {
        if generation == self.generation {
            Ok(())
        } else {
            Err(PipelineError::Superseded {
                stage: Stage::Avatar,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Background
// ---------------------------------------------------------------------------

/// One of the two background renders, tagged with its slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackgroundJob {
    pub slot: Slot,
    pub candidate_index: usize,
    pub prompt_text: String,
    pub provider: Provider,
    /// `None` when the provider refused the submission.
    pub job: Option<Job>,
    pub submit_error: Option<String>,
}

impl BackgroundJob {
    /// A refused submission counts as an `error` job.
    pub fn status(&self) -> JobStatus {
        self.job.as_ref().map_or(JobStatus::Error, |j| j.status)
    }

    pub fn result_url(&self) -> Option<&str> {
        self.job
            .as_ref()
            .filter(|j| j.status == JobStatus::Succeeded)
            .and_then(|j| j.result_url.as_deref())
    }

    pub fn error_message(&self) -> Option<&str> {
        self.submit_error
            .as_deref()
            .or_else(|| self.job.as_ref().and_then(|j| j.error_message.as_deref()))
    }
}

/// What one slot asked the provider for, and what it answered.
#[derive(Debug, Clone)]
pub struct BackgroundOutcome {
    pub slot: Slot,
    pub candidate_index: usize,
    pub prompt_text: String,
    pub result: Result<JobHandle, String>,
}

/// Two background renders, one per slot, from a single model.
#[derive(Debug, Clone)]
pub struct BackgroundStage {
    pub status: StageStatus,
    pub jobs: Vec<BackgroundJob>,
    pub error: Option<String>,
    pub has_generated: bool,
    pub model: Option<BackgroundModel>,
    generation: u64,
    poller: Poller,
}

impl Default for BackgroundStage {
    fn default() -> Self {
        Self {
            status: StageStatus::Idle,
            jobs: Vec::new(),
            error: None,
            has_generated: false,
            model: None,
            generation: 0,
            poller: Poller::new(Stage::Background),
        }
    }
}

impl BackgroundStage {
    pub fn begin_submit(&mut self, model: BackgroundModel) -> Result<u64, PipelineError> {
        refuse_in_flight(self.status, "Background")?;
        self.discard();
        self.model = Some(model);
        self.status = StageStatus::Loading;
        Ok(self.generation)
    }

    /// Record both submission outcomes.
    ///
    /// The stage fails only if no submission was accepted; a refused slot
    /// is kept as an `error` job next to its accepted sibling.
    pub fn finish_submit(
        &mut self,
        generation: u64,
        provider: Provider,
        outcomes: Vec<BackgroundOutcome>,
    ) -> Result<(), PipelineError> {
        if generation != self.generation {
            return Err(PipelineError::Superseded {
                stage: Stage::Background,
            });
        }
        self.has_generated = true;

        let mut failures = Vec::new();
        for outcome in outcomes {
            let (job, submit_error) = match outcome.result {
                Ok(handle) => {
                    self.poller.track(TrackedJob {
                        job_id: handle.job_id.clone(),
                        provider: handle.provider,
                        slot: Some(outcome.slot),
                    });
                    (Some(Job::submitted(handle.job_id, handle.provider)), None)
                }
                Err(message) => {
                    failures.push(format!("Slot {}: {message}", outcome.slot));
                    (None, Some(message))
                }
            };
            self.jobs.push(BackgroundJob {
                slot: outcome.slot,
                candidate_index: outcome.candidate_index,
                prompt_text: outcome.prompt_text,
                provider,
                job,
                submit_error,
            });
        }

        if !failures.is_empty() {
            self.error = Some(failures.join("; "));
        }
        self.recompute();
        Ok(())
    }

    pub fn interrupt(&mut self, generation: u64, message: String) -> bool {
        if generation != self.generation || self.status != StageStatus::Loading {
            return false;
        }
        self.status = StageStatus::Error;
        self.error = Some(message);
        self.has_generated = true;
        true
    }

    pub fn apply(&mut self, update: &JobUpdate) -> bool {
        let changed = self
            .jobs
            .iter_mut()
            .filter_map(|bg| bg.job.as_mut())
            .find(|j| j.job_id == update.job_id)
            .is_some_and(|j| j.apply(&update.snapshot));
        if changed {
            self.recompute();
        }
        changed
    }

    pub fn reset(&mut self) {
        self.discard();
        self.model = None;
        self.status = StageStatus::Idle;
    }

    /// `pending` while any job is unresolved, then `done` if any job
    /// succeeded, otherwise `error`.
    fn recompute(&mut self) {
        let statuses: Vec<JobStatus> = self.jobs.iter().map(BackgroundJob::status).collect();
        self.status = if statuses.iter().any(|s| !s.is_terminal()) {
            StageStatus::Pending
        } else if statuses.contains(&JobStatus::Succeeded) {
            StageStatus::Done
        } else {
            if self.error.is_none() {
                self.error = Some(
                    self.jobs
                        .iter()
                        .filter_map(|j| j.error_message())
                        .collect::<Vec<_>>()
                        .join("; "),
                );
            }
            StageStatus::Error
        };
    }

    pub fn job_statuses(&self) -> Vec<JobStatus> {
        self.jobs.iter().map(BackgroundJob::status).collect()
    }

    pub fn job(&self, slot: Slot) -> Option<&BackgroundJob> {
        self.jobs.iter().find(|j| j.slot == slot)
    }

    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    pub fn poller_mut(&mut self) -> &mut Poller {
        &mut self.poller
    }

    fn discard(&mut self) {
        self.jobs.clear();
        self.error = None;
        self.generation += 1;
        self.poller.clear();
    }
}

// ---------------------------------------------------------------------------
// Composite
// ---------------------------------------------------------------------------

/// The composite render for one slot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompositeSlot {
    pub status: StageStatus,
    pub job: Option<Job>,
    pub error: Option<String>,
    /// Inputs frozen at submission time.
    pub request: Option<CompositeRequest>,
    #[serde(skip)]
    generation: u64,
}

impl CompositeSlot {
    pub fn result_url(&self) -> Option<&str> {
        self.job
            .as_ref()
            .filter(|j| j.status == JobStatus::Succeeded)
            .and_then(|j| j.result_url.as_deref())
    }

    fn clear(&mut self) {
        self.status = StageStatus::Idle;
        self.job = None;
        self.error = None;
        self.request = None;
        self.generation += 1;
    }
}

/// A composite slot abandoned because its inputs changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Orphaned {
    pub slot: Slot,
    pub job_id: Option<String>,
}

/// Two independent composite renders, one per slot.
#[derive(Debug, Clone)]
pub struct CompositeStage {
    pub a: CompositeSlot,
    pub b: CompositeSlot,
    poller: Poller,
}

impl Default for CompositeStage {
    fn default() -> Self {
        Self {
            a: CompositeSlot::default(),
            b: CompositeSlot::default(),
            poller: Poller::new(Stage::Composite),
        }
    }
}

impl CompositeStage {
    pub fn slot(&self, slot: Slot) -> &CompositeSlot {
        match slot {
            Slot::A => &self.a,
            Slot::B => &self.b,
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut CompositeSlot {
        match slot {
            Slot::A => &mut self.a,
            Slot::B => &mut self.b,
        }
    }

    /// Move `slot` to `loading`, discarding its previous job and result.
    pub fn begin_submit(&mut self, slot: Slot) -> Result<u64, PipelineError> {
        refuse_in_flight(self.slot(slot).status, &format!("Composite {slot}"))?;
        if let Some(job) = &self.slot(slot).job {
            let job_id = job.job_id.clone();
            self.poller.untrack(&job_id);
        }
        let s = self.slot_mut(slot);
        s.clear();
        s.status = StageStatus::Loading;
        Ok(s.generation)
    }

    pub fn accept(
        &mut self,
        slot: Slot,
        generation: u64,
        handle: JobHandle,
        request: CompositeRequest,
    ) -> Result<(), PipelineError> {
        self.check_generation(slot, generation)?;
        self.poller.track(TrackedJob {
            job_id: handle.job_id.clone(),
            provider: handle.provider,
            slot: Some(slot),
        });
        let s = self.slot_mut(slot);
        s.job = Some(Job::submitted(handle.job_id, handle.provider));
        s.request = Some(request);
        s.status = StageStatus::Pending;
        Ok(())
    }

    pub fn reject(&mut self, slot: Slot, generation: u64, message: String) -> Result<(), PipelineError> {
        self.check_generation(slot, generation)?;
        let s = self.slot_mut(slot);
        s.status = StageStatus::Error;
        s.error = Some(message);
        Ok(())
    }

    pub fn interrupt(&mut self, slot: Slot, generation: u64, message: String) -> bool {
        let s = self.slot_mut(slot);
        if generation != s.generation || s.status != StageStatus::Loading {
            return false;
        }
        s.status = StageStatus::Error;
        s.error = Some(message);
        true
    }

    pub fn apply(&mut self, update: &JobUpdate) -> bool {
        let Some(slot) = update.slot else {
            return false;
        };
        let s = self.slot_mut(slot);
        let Some(job) = s.job.as_mut().filter(|j| j.job_id == update.job_id) else {
            return false;
        };
        if !job.apply(&update.snapshot) {
            return false;
        }
        if job.status == JobStatus::Succeeded {
            s.status = StageStatus::Done;
        } else {
            s.error = job.error_message.clone();
            s.status = StageStatus::Error;
        }
        true
    }

    /// A prerequisite was reset: abandon in-flight slots with an error and
    /// clear settled ones back to `idle`. Returns the abandoned slots.
    pub fn orphan(&mut self) -> Vec<Orphaned> {
        let mut orphaned = Vec::new();
        for slot in Slot::ALL {
            let status = self.slot(slot).status;
            let job_id = self.slot(slot).job.as_ref().map(|j| j.job_id.clone());
            if let Some(id) = &job_id {
                self.poller.untrack(id);
            }
            let s = self.slot_mut(slot);
            if status.is_in_flight() {
                s.status = StageStatus::Error;
                s.error = Some(PREREQUISITE_CHANGED.to_string());
                s.generation += 1;
                orphaned.push(Orphaned { slot, job_id });
            } else if status != StageStatus::Idle {
                s.clear();
            }
        }
        orphaned
    }

    pub fn reset(&mut self) {
        self.a.clear();
        self.b.clear();
        self.poller.clear();
    }

    pub fn slot_statuses(&self) -> Vec<StageStatus> {
        vec![self.a.status, self.b.status]
    }

    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    pub fn poller_mut(&mut self) -> &mut Poller {
        &mut self.poller
    }

    fn check_generation(&self, slot: Slot, generation: u64) -> Result<(), PipelineError> {
        if self.slot(slot).generation == generation {
            Ok(())
        } else {
            Err(PipelineError::Superseded {
                stage: Stage::Composite,
            })
        }
    }
}
