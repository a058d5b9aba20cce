//! Scripted fake providers and collaborators for orchestrator tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use trendreel_core::analysis::{Analysis, BackgroundCandidate};
use trendreel_core::job::JobSnapshot;
use trendreel_core::types::{BackgroundModel, Platform, Provider};
use trendreel_pipeline::collaborators::{
    AnalysisSource, CollaboratorError, PromptProposer, ScriptWriter,
};
use trendreel_pipeline::{PipelineConfig, PipelineOrchestrator};
use trendreel_providers::{
    AvatarRenderer, AvatarRequest, BackgroundRenderer, CompositeRenderer, CompositeRequest,
    JobHandle, ProviderError, ProviderSet, RenderProvider,
};

/// A provider whose submissions and poll answers are scripted per test.
///
/// Unscripted submissions are accepted with a generated id; unscripted
/// polls answer `pending`.
pub struct FakeProvider {
    provider: Provider,
    next_id: AtomicUsize,
    submit_script: Mutex<VecDeque<Result<(), String>>>,
    poll_script: Mutex<HashMap<String, VecDeque<JobSnapshot>>>,
    poll_failures: Mutex<HashMap<String, usize>>,
    submit_delay: Mutex<Option<Duration>>,
    poll_calls: Mutex<Vec<String>>,
    pub prompts: Mutex<Vec<String>>,
    pub avatar_requests: Mutex<Vec<AvatarRequest>>,
    pub composite_requests: Mutex<Vec<CompositeRequest>>,
}

impl FakeProvider {
    pub fn new(provider: Provider) -> Arc<Self> {
        Arc::new(Self {
            provider,
            next_id: AtomicUsize::new(1),
            submit_script: Mutex::new(VecDeque::new()),
            poll_script: Mutex::new(HashMap::new()),
            poll_failures: Mutex::new(HashMap::new()),
            submit_delay: Mutex::new(None),
            poll_calls: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
            avatar_requests: Mutex::new(Vec::new()),
            composite_requests: Mutex::new(Vec::new()),
        })
    }

    /// Refuse the next submission with `message`.
    pub fn reject_next(&self, message: &str) {
        self.submit_script
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    /// Accept the next submission (used to order a reject after it).
    pub fn accept_next(&self) {
        self.submit_script.lock().unwrap().push_back(Ok(()));
    }

    /// Answers for successive polls of `job_id`.
    pub fn script_polls(&self, job_id: &str, answers: Vec<JobSnapshot>) {
        self.poll_script
            .lock()
            .unwrap()
            .insert(job_id.to_string(), answers.into());
    }

    /// The next `times` polls of `job_id` fail at the transport level.
    pub fn fail_polls(&self, job_id: &str, times: usize) {
        self.poll_failures
            .lock()
            .unwrap()
            .insert(job_id.to_string(), times);
    }

    /// Every submission waits `delay` before answering; `None` answers at once.
    pub fn delay_submissions(&self, delay: Option<Duration>) {
        *self.submit_delay.lock().unwrap() = delay;
    }

    pub fn poll_count(&self, job_id: &str) -> usize {
        self.poll_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|id| *id == job_id)
            .count()
    }

    pub fn total_polls(&self) -> usize {
        self.poll_calls.lock().unwrap().len()
    }

    /// Submissions that were accepted.
    pub fn accepted(&self) -> usize {
        self.next_id.load(Ordering::SeqCst) - 1
    }

    async fn submit(&self) -> Result<JobHandle, ProviderError> {
        let delay = *self.submit_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.submit_script.lock().unwrap().pop_front();
        if let Some(Err(body)) = scripted {
            return Err(ProviderError::ApiError { status: 400, body });
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(JobHandle {
            job_id: format!("{}-{n}", self.provider),
            provider: self.provider,
        })
    }
}

#[async_trait]
impl RenderProvider for FakeProvider {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn poll(&self, job_id: &str) -> Result<JobSnapshot, ProviderError> {
        self.poll_calls.lock().unwrap().push(job_id.to_string());
        if let Some(left) = self.poll_failures.lock().unwrap().get_mut(job_id) {
            if *left > 0 {
                *left -= 1;
                return Err(ProviderError::ApiError {
                    status: 503,
                    body: "upstream unavailable".into(),
                });
            }
        }
        Ok(self
            .poll_script
            .lock()
            .unwrap()
            .get_mut(job_id)
            .and_then(|q| q.pop_front())
            .unwrap_or_else(JobSnapshot::pending))
    }
}

#[async_trait]
impl AvatarRenderer for FakeProvider {
    async fn submit_avatar(&self, request: &AvatarRequest) -> Result<JobHandle, ProviderError> {
        self.avatar_requests.lock().unwrap().push(request.clone());
        self.submit().await
    }
}

#[async_trait]
impl BackgroundRenderer for FakeProvider {
    async fn submit_background(&self, prompt: &str) -> Result<JobHandle, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.submit().await
    }
}

#[async_trait]
impl CompositeRenderer for FakeProvider {
    async fn submit_composite(
        &self,
        request: &CompositeRequest,
    ) -> Result<JobHandle, ProviderError> {
        self.composite_requests.lock().unwrap().push(request.clone());
        self.submit().await
    }
}

/// Every fake, plus the set they are registered in.
pub struct Fakes {
    pub heygen: Arc<FakeProvider>,
    pub kling: Arc<FakeProvider>,
    pub runway: Arc<FakeProvider>,
    pub shotstack: Arc<FakeProvider>,
}

impl Fakes {
    pub fn new() -> Self {
        Self {
            heygen: FakeProvider::new(Provider::HeyGen),
            kling: FakeProvider::new(Provider::Kling),
            runway: FakeProvider::new(Provider::Runway),
            shotstack: FakeProvider::new(Provider::Shotstack),
        }
    }

    pub fn provider_set(&self) -> ProviderSet {
        ProviderSet::new()
            .with_avatar(Arc::clone(&self.heygen))
            .with_background(BackgroundModel::Kling, Arc::clone(&self.kling))
            .with_background(BackgroundModel::Runway, Arc::clone(&self.runway))
            .with_composite(Arc::clone(&self.shotstack))
    }
}

pub fn analysis() -> Analysis {
    let mut analysis = Analysis::default();
    analysis.video_proposal.hook = "Stop scrolling".into();
    analysis.key_insights = Some("Short loops win".into());
    analysis
}

pub fn candidates(n: usize) -> Vec<BackgroundCandidate> {
    (0..n)
        .map(|i| BackgroundCandidate {
            index: i,
            label: format!("Scene {i}"),
            description: format!("Description {i}"),
            prompt_text: format!("prompt {i}"),
        })
        .collect()
}

/// An orchestrator driven by explicit `poll_tick` calls.
pub fn manual_orchestrator(fakes: &Fakes) -> PipelineOrchestrator {
    orchestrator_with(fakes, PipelineConfig::manual())
}

pub fn orchestrator_with(fakes: &Fakes, config: PipelineConfig) -> PipelineOrchestrator {
    PipelineOrchestrator::new(
        analysis(),
        vec!["#fyp".into(), "#coffee".into()],
        Platform::Tiktok,
        fakes.provider_set(),
        config,
    )
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

pub struct FixedAnalysis(pub Result<Analysis, String>);

#[async_trait]
impl AnalysisSource for FixedAnalysis {
    async fn get_analysis(&self) -> Result<Analysis, CollaboratorError> {
        self.0.clone().map_err(Into::into)
    }
}

pub struct FixedScript(pub Result<String, String>);

#[async_trait]
impl ScriptWriter for FixedScript {
    async fn generate_spoken_script(
        &self,
        _analysis: &Analysis,
        _hashtags: &[String],
        _platform: Platform,
    ) -> Result<String, CollaboratorError> {
        self.0.clone().map_err(Into::into)
    }
}

/// A script writer that answers only after `0`.
pub struct SlowScript(pub Duration);

#[async_trait]
impl ScriptWriter for SlowScript {
    async fn generate_spoken_script(
        &self,
        _analysis: &Analysis,
        _hashtags: &[String],
        _platform: Platform,
    ) -> Result<String, CollaboratorError> {
        tokio::time::sleep(self.0).await;
        Ok("Slow but steady".into())
    }
}

pub struct FixedCandidates(pub usize);

#[async_trait]
impl PromptProposer for FixedCandidates {
    async fn propose_background_candidates(
        &self,
        _analysis: &Analysis,
        _hashtags: &[String],
    ) -> Result<Vec<BackgroundCandidate>, CollaboratorError> {
        Ok(candidates(self.0))
    }
}
