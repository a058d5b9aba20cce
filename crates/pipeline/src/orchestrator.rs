//! The pipeline orchestrator.
//!
//! Owns one [`PipelineRun`], submits jobs through the [`ProviderSet`],
//! and runs one poll task per stage while that stage has jobs in
//! flight. A stage's task starts when a submission adds a job, stops on
//! its own once every job is terminal, and is cancelled on reset.
//!
//! The run sits behind a `tokio::sync::RwLock`. No lock is held across a
//! provider call: each action validates and moves the stage to `loading`
//! under the lock, releases it for the network call, then re-locks to
//! record the outcome. The network half of a render submission runs in
//! its own task, so a caller that goes away (HTTP timeout, client
//! disconnect) never leaves a stage stuck in `loading`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use trendreel_core::analysis::{Analysis, BackgroundCandidate};
use trendreel_core::types::{BackgroundModel, Platform, Slot, Stage, StageStatus};
use trendreel_providers::{
    AvatarRenderer, AvatarRequest, BackgroundRenderer, CompositeRenderer, CompositeRequest,
    JobHandle, ProviderSet,
};

use crate::collaborators::{AnalysisSource, PromptProposer, ScriptWriter};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::events::{PipelineEvent, EVENT_CHANNEL_CAPACITY};
use crate::run::{PipelineRun, SlotPick};
use crate::snapshot::PipelineSnapshot;
use crate::stage::{BackgroundOutcome, Orphaned, SUBMISSION_INTERRUPTED};

struct PollTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Inner {
    run: RwLock<PipelineRun>,
    providers: ProviderSet,
    config: PipelineConfig,
    events: broadcast::Sender<PipelineEvent>,
    tasks: Mutex<HashMap<Stage, PollTask>>,
    shutdown: CancellationToken,
}

/// Drives one pipeline run.
///
/// Dropping the orchestrator cancels its poll tasks.
pub struct PipelineOrchestrator {
    inner: Arc<Inner>,
}

impl PipelineOrchestrator {
    pub fn new(
        analysis: Analysis,
        hashtags: Vec<String>,
        platform: Platform,
        providers: ProviderSet,
        config: PipelineConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                run: RwLock::new(PipelineRun::new(analysis, hashtags, platform)),
                providers,
                config,
                events,
                tasks: Mutex::new(HashMap::new()),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Fetch the analysis from `source` and start a run on it.
    pub async fn start_from(
        source: &dyn AnalysisSource,
        hashtags: Vec<String>,
        platform: Platform,
        providers: ProviderSet,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        let analysis = source
            .get_analysis()
            .await
            .map_err(|e| PipelineError::Collaborator(e.to_string()))?;
        Ok(Self::new(analysis, hashtags, platform, providers, config))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.inner.events.subscribe()
    }

    pub async fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot::from(&*self.inner.run.read().await)
    }

    // -----------------------------------------------------------------------
    // Script and candidates
    // -----------------------------------------------------------------------

    pub async fn set_script(&self, text: String) {
        let status = {
            let mut run = self.inner.run.write().await;
            run.script.set_text(text);
            run.script.status
        };
        self.inner.stage_changed(Stage::Script, None, status);
    }

    /// Ask `writer` for a spoken script and store it.
    ///
    /// If this future is dropped before the writer answers, the stage moves
    /// to `error` so the script can be generated again.
    pub async fn generate_script(&self, writer: &dyn ScriptWriter) -> Result<String, PipelineError> {
        let (generation, analysis, hashtags, platform) = {
            let mut run = self.inner.run.write().await;
            let generation = run.script.begin_generate()?;
            (generation, run.analysis.clone(), run.hashtags.clone(), run.platform)
        };
        self.inner.stage_changed(Stage::Script, None, StageStatus::Loading);

        let guard = InterruptGuard::new(&self.inner, Stage::Script, None, generation);
        let outcome = self
            .inner
            .bounded(writer.generate_spoken_script(&analysis, &hashtags, platform))
            .await;

        let status = {
            let mut run = self.inner.run.write().await;
            run.script.finish_generate(generation, outcome.clone())?;
            run.script.status
        };
        guard.disarm();
        self.inner.stage_changed(Stage::Script, None, status);

        outcome.map_err(|message| {
            tracing::warn!(error = %message, "Script generation failed");
            PipelineError::Submission {
                stage: Stage::Script,
                message,
            }
        })
    }

    /// Replace the background candidates. Clears slot assignments.
    pub async fn set_candidates(&self, candidates: Vec<BackgroundCandidate>) -> Result<(), PipelineError> {
        self.inner.run.write().await.set_candidates(candidates)
    }

    /// Ask `proposer` for background candidates and store them.
    pub async fn propose_candidates(
        &self,
        proposer: &dyn PromptProposer,
    ) -> Result<Vec<BackgroundCandidate>, PipelineError> {
        let (analysis, hashtags) = {
            let run = self.inner.run.read().await;
            (run.analysis.clone(), run.hashtags.clone())
        };
        let candidates = proposer
            .propose_background_candidates(&analysis, &hashtags)
            .await
            .map_err(|e| PipelineError::Collaborator(e.to_string()))?;
        self.set_candidates(candidates.clone()).await?;
        tracing::debug!(count = candidates.len(), "Background candidates proposed");
        Ok(candidates)
    }

    pub async fn select_music(&self, track_id: &str) -> Result<(), PipelineError> {
        self.inner.run.write().await.select_music(track_id)
    }

    pub async fn assign_slot(&self, slot: Slot, candidate_index: usize) -> Result<(), PipelineError> {
        self.inner
            .run
            .write()
            .await
            .assign_slot(slot, candidate_index)
    }

    // -----------------------------------------------------------------------
    // Submissions
    // -----------------------------------------------------------------------

    /// Submit the avatar render with the current script.
    pub async fn submit_avatar(&self, avatar_id: &str, voice_id: &str) -> Result<JobHandle, PipelineError> {
        let client = Arc::clone(
            self.inner
                .providers
                .avatar()
                .map_err(|e| PipelineError::precondition(e.to_string()))?,
        );

        let (generation, request, orphaned) = {
            let mut run = self.inner.run.write().await;
            let request = run.avatar_request(avatar_id, voice_id)?;
            let generation = run.avatar.begin_submit()?;
            (generation, request, run.composite.orphan())
        };
        self.inner.stage_changed(Stage::Avatar, None, StageStatus::Loading);

        let task = tokio::spawn(Arc::clone(&self.inner).finish_avatar(
            client, generation, request, orphaned,
        ));
        self.inner
            .join_submission(task, Stage::Avatar, None, generation)
            .await
    }

    /// Submit both slot backgrounds to `model`, concurrently.
    ///
    /// Returns the accepted handles. Fails only when neither submission
    /// was accepted.
    pub async fn submit_backgrounds(&self, model: BackgroundModel) -> Result<Vec<JobHandle>, PipelineError> {
        let client = Arc::clone(
            self.inner
                .providers
                .background(model)
                .map_err(|e| PipelineError::precondition(e.to_string()))?,
        );

        let (generation, picks, orphaned) = {
            let mut run = self.inner.run.write().await;
            let picks = run.background_picks()?;
            let generation = run.background.begin_submit(model)?;
            (generation, picks, run.composite.orphan())
        };
        self.inner.stage_changed(Stage::Background, None, StageStatus::Loading);

        let task = tokio::spawn(Arc::clone(&self.inner).finish_backgrounds(
            client, model, generation, picks, orphaned,
        ));
        self.inner
            .join_submission(task, Stage::Background, None, generation)
            .await
    }

    /// Composite `slot` from the avatar render and that slot's background.
    pub async fn composite(&self, slot: Slot) -> Result<JobHandle, PipelineError> {
        let client = Arc::clone(
            self.inner
                .providers
                .composite()
                .map_err(|e| PipelineError::precondition(e.to_string()))?,
        );

        let (generation, request) = {
            let mut run = self.inner.run.write().await;
            let request = run.composite_request(slot)?;
            (run.composite.begin_submit(slot)?, request)
        };
        self.inner
            .stage_changed(Stage::Composite, Some(slot), StageStatus::Loading);

        let task = tokio::spawn(Arc::clone(&self.inner).finish_composite(
            client, slot, generation, request,
        ));
        self.inner
            .join_submission(task, Stage::Composite, Some(slot), generation)
            .await
    }

    // -----------------------------------------------------------------------
    // Reset and polling
    // -----------------------------------------------------------------------

    /// Discard a stage's jobs and stop polling it.
    ///
    /// Resetting Avatar or Background orphans the composites built on it.
    pub async fn reset_stage(&self, stage: Stage) {
        self.inner.stop_polling(stage).await;

        let orphaned = {
            let mut run = self.inner.run.write().await;
            match stage {
                Stage::Script => {
                    run.script.reset();
                    Vec::new()
                }
                Stage::Avatar => {
                    run.avatar.reset();
                    run.composite.orphan()
                }
                Stage::Background => {
                    run.background.reset();
                    run.composite.orphan()
                }
                Stage::Composite => {
                    run.composite.reset();
                    Vec::new()
                }
            }
        };

        tracing::info!(stage = %stage, "Stage reset");
        if stage == Stage::Composite {
            for slot in Slot::ALL {
                self.inner
                    .stage_changed(Stage::Composite, Some(slot), StageStatus::Idle);
            }
        } else {
            self.inner.stage_changed(stage, None, StageStatus::Idle);
        }
        self.inner.composites_orphaned(orphaned).await;
    }

    /// Run one poll tick for `stage` and return how many of its jobs are
    /// still in flight.
    pub async fn poll_tick(&self, stage: Stage) -> usize {
        self.inner.poll_tick(stage).await
    }

    /// Whether a poll task is currently scheduled for `stage`.
    pub async fn is_polling(&self, stage: Stage) -> bool {
        self.inner
            .tasks
            .lock()
            .await
            .get(&stage)
            .is_some_and(|t| !t.handle.is_finished())
    }

    /// Cancel every poll task. Actions still work; polling must then be
    /// driven with [`poll_tick`](Self::poll_tick).
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.tasks.lock().await.clear();
        tracing::debug!("Pipeline pollers stopped");
    }
}

impl Drop for PipelineOrchestrator {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
    }
}

impl Inner {
    fn emit(&self, event: PipelineEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn stage_changed(&self, stage: Stage, slot: Option<Slot>, status: StageStatus) {
        self.emit(PipelineEvent::StageStatusChanged {
            stage,
            slot,
            status,
        });
    }

    fn job_submitted(&self, stage: Stage, slot: Option<Slot>, handle: &JobHandle) {
        tracing::info!(
            stage = %stage,
            slot = slot.map(Slot::as_str),
            provider = %handle.provider,
            job_id = %handle.job_id,
            "Job submitted",
        );
        self.emit(PipelineEvent::JobSubmitted {
            stage,
            slot,
            provider: handle.provider,
            job_id: handle.job_id.clone(),
        });
    }

    /// Run a submission call under the configured time limit.
    async fn bounded<T, E, F>(&self, call: F) -> Result<T, String>
    where
        E: std::fmt::Display,
        F: Future<Output = Result<T, E>>,
    {
        match tokio::time::timeout(self.config.submit_timeout, call).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(_) => Err(format!(
                "submission timed out after {}s",
                self.config.submit_timeout.as_secs()
            )),
        }
    }

    /// Wait for a spawned submission. The task owns the provider call and
    /// records its outcome, so dropping this future does not lose it.
    async fn join_submission<T>(
        &self,
        task: JoinHandle<Result<T, PipelineError>>,
        stage: Stage,
        slot: Option<Slot>,
        generation: u64,
    ) -> Result<T, PipelineError> {
        match task.await {
            Ok(result) => result,
            Err(e) => {
                let message = format!("{SUBMISSION_INTERRUPTED}: {e}");
                tracing::error!(stage = %stage, error = %message, "Submission task failed");
                self.interrupt(stage, slot, generation, message.clone()).await;
                Err(PipelineError::Submission { stage, message })
            }
        }
    }

    /// Move a stage still `loading` for `generation` to `error`.
    async fn interrupt(&self, stage: Stage, slot: Option<Slot>, generation: u64, message: String) {
        let changed = {
            let mut run = self.run.write().await;
            match (stage, slot) {
                (Stage::Script, _) => run.script.interrupt(generation, message),
                (Stage::Avatar, _) => run.avatar.interrupt(generation, message),
                (Stage::Background, _) => run.background.interrupt(generation, message),
                (Stage::Composite, Some(slot)) => run.composite.interrupt(slot, generation, message),
                (Stage::Composite, None) => false,
            }
        };
        if changed {
            tracing::warn!(stage = %stage, slot = slot.map(Slot::as_str), "Submission interrupted");
            self.stage_changed(stage, slot, StageStatus::Error);
        }
    }

    async fn finish_avatar(
        self: Arc<Self>,
        client: Arc<dyn AvatarRenderer>,
        generation: u64,
        request: AvatarRequest,
        orphaned: Vec<Orphaned>,
    ) -> Result<JobHandle, PipelineError> {
        self.composites_orphaned(orphaned).await;
        let result = self.bounded(client.submit_avatar(&request)).await;

        match result {
            Ok(handle) => {
                self.run
                    .write()
                    .await
                    .avatar
                    .accept(generation, handle.clone())?;
                self.job_submitted(Stage::Avatar, None, &handle);
                self.stage_changed(Stage::Avatar, None, StageStatus::Pending);
                self.start_polling(Stage::Avatar).await;
                Ok(handle)
            }
            Err(message) => {
                self.run
                    .write()
                    .await
                    .avatar
                    .reject(generation, message.clone())?;
                tracing::warn!(error = %message, "Avatar submission rejected");
                self.stage_changed(Stage::Avatar, None, StageStatus::Error);
                Err(PipelineError::Submission {
                    stage: Stage::Avatar,
                    message,
                })
            }
        }
    }

    async fn finish_backgrounds(
        self: Arc<Self>,
        client: Arc<dyn BackgroundRenderer>,
        model: BackgroundModel,
        generation: u64,
        picks: [SlotPick; 2],
        orphaned: Vec<Orphaned>,
    ) -> Result<Vec<JobHandle>, PipelineError> {
        self.composites_orphaned(orphaned).await;
        let [a, b] = picks;
        let (result_a, result_b) = futures::future::join(
            self.bounded(client.submit_background(&a.prompt_text)),
            self.bounded(client.submit_background(&b.prompt_text)),
        )
        .await;

        let handles: Vec<(Slot, JobHandle)> = [(&a, &result_a), (&b, &result_b)]
            .into_iter()
            .filter_map(|(pick, r)| r.as_ref().ok().map(|h| (pick.slot, h.clone())))
            .collect();
        let outcomes = [(a, result_a), (b, result_b)]
            .into_iter()
            .map(|(pick, result)| BackgroundOutcome {
                slot: pick.slot,
                candidate_index: pick.candidate_index,
                prompt_text: pick.prompt_text,
                result,
            })
            .collect();

        let (status, error) = {
            let mut run = self.run.write().await;
            run.background
                .finish_submit(generation, model.provider(), outcomes)?;
            (run.background.status, run.background.error.clone())
        };

        for (slot, handle) in &handles {
            self.job_submitted(Stage::Background, Some(*slot), handle);
        }
        self.stage_changed(Stage::Background, None, status);

        if handles.is_empty() {
            let message = error.unwrap_or_else(|| "Background submission failed".into());
            tracing::warn!(model = model.as_str(), error = %message, "Background submissions rejected");
            return Err(PipelineError::Submission {
                stage: Stage::Background,
                message,
            });
        }
        if let Some(message) = error {
            tracing::warn!(model = model.as_str(), error = %message, "One background submission rejected");
        }

        self.start_polling(Stage::Background).await;
        Ok(handles.into_iter().map(|(_, h)| h).collect())
    }

    async fn finish_composite(
        self: Arc<Self>,
        client: Arc<dyn CompositeRenderer>,
        slot: Slot,
        generation: u64,
        request: CompositeRequest,
    ) -> Result<JobHandle, PipelineError> {
        let result = self.bounded(client.submit_composite(&request)).await;

        match result {
            Ok(handle) => {
                self.run
                    .write()
                    .await
                    .composite
                    .accept(slot, generation, handle.clone(), request)?;
                self.job_submitted(Stage::Composite, Some(slot), &handle);
                self.stage_changed(Stage::Composite, Some(slot), StageStatus::Pending);
                self.start_polling(Stage::Composite).await;
                Ok(handle)
            }
            Err(message) => {
                self.run
                    .write()
                    .await
                    .composite
                    .reject(slot, generation, message.clone())?;
                tracing::warn!(slot = %slot, error = %message, "Composite submission rejected");
                self.stage_changed(Stage::Composite, Some(slot), StageStatus::Error);
                Err(PipelineError::Submission {
                    stage: Stage::Composite,
                    message,
                })
            }
        }
    }

    async fn composites_orphaned(&self, orphaned: Vec<Orphaned>) {
        if orphaned.is_empty() {
            return;
        }
        let idle = {
            let run = self.run.read().await;
            run.composite.poller().is_idle()
        };
        if idle {
            self.stop_polling(Stage::Composite).await;
        }
        for o in orphaned {
            tracing::warn!(
                slot = %o.slot,
                job_id = o.job_id.as_deref(),
                "Composite orphaned by a prerequisite change",
            );
            self.stage_changed(Stage::Composite, Some(o.slot), StageStatus::Error);
            self.emit(PipelineEvent::CompositeOrphaned {
                slot: o.slot,
                job_id: o.job_id,
            });
        }
    }

    async fn poll_tick(&self, stage: Stage) -> usize {
        let round = {
            let run = self.run.read().await;
            match run.poller(stage) {
                Some(poller) if !poller.is_idle() => poller.round(),
                _ => return 0,
            }
        };

        let updates = round.run(&self.providers).await;

        let mut run = self.run.write().await;
        let Some(poller) = run.poller_mut(stage) else {
            return 0;
        };
        let accepted = poller.settle(round.generation, updates);
        let remaining = poller.in_flight().len();

        let mut changes = Vec::new();
        for update in &accepted {
            if run.apply_update(stage, update) {
                let status = match (stage, update.slot) {
                    (Stage::Composite, Some(slot)) => run.composite.slot(slot).status,
                    (Stage::Avatar, _) => run.avatar.status,
                    _ => run.background.status,
                };
                changes.push((update.clone(), status));
            }
        }
        drop(run);

        for (update, status) in changes {
            let snapshot = update.snapshot;
            if snapshot.status.is_failure() {
                tracing::warn!(
                    stage = %stage,
                    job_id = %update.job_id,
                    status = ?snapshot.status,
                    error = snapshot.error_message.as_deref(),
                    "Job failed",
                );
            } else {
                tracing::info!(stage = %stage, job_id = %update.job_id, "Job succeeded");
            }
            let slot = if stage == Stage::Avatar { None } else { update.slot };
            self.emit(PipelineEvent::JobFinished {
                stage,
                slot,
                job_id: update.job_id,
                status: snapshot.status,
                result_url: snapshot.result_url,
                error_message: snapshot.error_message,
            });
            let status_slot = if stage == Stage::Composite { slot } else { None };
            self.stage_changed(stage, status_slot, status);
        }

        remaining
    }

    /// (Re)start the poll task for `stage`.
    async fn start_polling(self: &Arc<Self>, stage: Stage) {
        if !self.config.auto_poll || self.shutdown.is_cancelled() {
            return;
        }
        let cancel = self.shutdown.child_token();
        let handle = tokio::spawn(poll_loop(
            Arc::downgrade(self),
            stage,
            self.config.poll_interval,
            cancel.clone(),
        ));
        if let Some(previous) = self
            .tasks
            .lock()
            .await
            .insert(stage, PollTask { cancel, handle })
        {
            previous.cancel.cancel();
        }
    }

    async fn stop_polling(&self, stage: Stage) {
        if let Some(task) = self.tasks.lock().await.remove(&stage) {
            task.cancel.cancel();
        }
    }
}

async fn poll_loop(inner: Weak<Inner>, stage: Stage, period: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::debug!(stage = %stage, period_ms = period.as_millis() as u64, "Poll task started");

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                tracing::debug!(stage = %stage, "Poll task cancelled");
                break;
            }
            _ = ticker.tick() => {
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                if inner.poll_tick(stage).await == 0 {
                    tracing::debug!(stage = %stage, "All jobs settled, poll task stopping");
                    break;
                }
            }
        }
    }
}

/// Moves a stage to `error` if the request it guards is dropped before
/// the outcome is recorded.
struct InterruptGuard {
    inner: Option<Arc<Inner>>,
    stage: Stage,
    slot: Option<Slot>,
    generation: u64,
}

impl InterruptGuard {
    fn new(inner: &Arc<Inner>, stage: Stage, slot: Option<Slot>, generation: u64) -> Self {
        Self {
            inner: Some(Arc::clone(inner)),
            stage,
            slot,
            generation,
        }
    }

    fn disarm(mut self) {
        self.inner = None;
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        let Some(inner) = self.inner.take() else {
            return;
        };
        let (stage, slot, generation) = (self.stage, self.slot, self.generation);
        // Drop cannot await the run lock; record the interruption on the runtime.
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                inner
                    .interrupt(stage, slot, generation, SUBMISSION_INTERRUPTED.to_string())
                    .await;
            });
        }
    }
}
