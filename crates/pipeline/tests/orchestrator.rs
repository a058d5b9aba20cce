mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use common::*;
use trendreel_core::gate::StepState;
use trendreel_core::job::JobSnapshot;
use trendreel_core::types::{BackgroundModel, JobStatus, Platform, Slot, Stage, StageStatus};
use trendreel_pipeline::stage::{PREREQUISITE_CHANGED, SUBMISSION_INTERRUPTED};
use trendreel_pipeline::{PipelineConfig, PipelineError, PipelineEvent, PipelineOrchestrator};

/// Drive `stage` until it has nothing in flight; returns the tick count.
async fn poll_until_settled(orch: &PipelineOrchestrator, stage: Stage) -> usize {
    for tick in 1..=20 {
        if orch.poll_tick(stage).await == 0 {
            return tick;
        }
    }
    panic!("{stage} did not settle");
}

/// Avatar done with `https://x/a.mp4`, backgrounds A (2) succeeded and
/// B (5) failed.
async fn avatar_and_backgrounds_ready(fakes: &Fakes, orch: &PipelineOrchestrator) {
    orch.set_script("Hello world".into()).await;
    let avatar = orch.submit_avatar("a1", "v1").await.unwrap();
    fakes
        .heygen
        .script_polls(&avatar.job_id, vec![JobSnapshot::succeeded("https://x/a.mp4")]);
    poll_until_settled(orch, Stage::Avatar).await;

    orch.set_candidates(candidates(7)).await.unwrap();
    orch.assign_slot(Slot::A, 2).await.unwrap();
    orch.assign_slot(Slot::B, 5).await.unwrap();
    let handles = orch.submit_backgrounds(BackgroundModel::Kling).await.unwrap();
    fakes
        .kling
        .script_polls(&handles[0].job_id, vec![JobSnapshot::succeeded("https://k/a.mp4")]);
    fakes.kling.script_polls(
        &handles[1].job_id,
        vec![JobSnapshot::failed(JobStatus::Failed, "content policy")],
    );
    poll_until_settled(orch, Stage::Background).await;
}

// ---------------------------------------------------------------------------
// Avatar
// ---------------------------------------------------------------------------

#[tokio::test]
async fn avatar_resolves_after_three_polls() {
    let fakes = Fakes::new();
    let orch = manual_orchestrator(&fakes);
    orch.set_script("Hello world".into()).await;

    let handle = orch.submit_avatar("a1", "v1").await.unwrap();
    fakes.heygen.script_polls(
        &handle.job_id,
        vec![
            JobSnapshot::pending(),
            JobSnapshot::pending(),
            JobSnapshot::succeeded("https://x/a.mp4"),
        ],
    );
    assert_eq!(orch.snapshot().await.avatar.status, StageStatus::Pending);

    assert_eq!(poll_until_settled(&orch, Stage::Avatar).await, 3);

    let snap = orch.snapshot().await;
    assert_eq!(snap.avatar.status, StageStatus::Done);
    assert_eq!(snap.avatar.result_url.as_deref(), Some("https://x/a.mp4"));
    assert_eq!(fakes.heygen.poll_count(&handle.job_id), 3);

    let sent = fakes.heygen.avatar_requests.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].avatar_id, "a1");
    assert_eq!(sent[0].voice_id, "v1");
    assert_eq!(sent[0].script, "Hello world");
    assert_eq!(sent[0].platform, Platform::Tiktok);
}

#[tokio::test]
async fn terminal_avatar_is_never_polled_again() {
    let fakes = Fakes::new();
    let orch = manual_orchestrator(&fakes);
    orch.set_script("Hello world".into()).await;
    let handle = orch.submit_avatar("a1", "v1").await.unwrap();
    fakes.heygen.script_polls(
        &handle.job_id,
        vec![JobSnapshot::failed(JobStatus::Failed, "Avatar not found")],
    );

    for _ in 0..5 {
        orch.poll_tick(Stage::Avatar).await;
    }
    assert_eq!(fakes.heygen.poll_count(&handle.job_id), 1);

    let snap = orch.snapshot().await;
    assert_eq!(snap.avatar.status, StageStatus::Error);
    assert_eq!(snap.avatar.error.as_deref(), Some("Avatar not found"));
}

#[tokio::test]
async fn avatar_preconditions_make_no_network_call() {
    let fakes = Fakes::new();
    let orch = manual_orchestrator(&fakes);

    assert_matches!(
        orch.submit_avatar("a1", "v1").await,
        Err(PipelineError::Precondition(_))
    );
    orch.set_script("Hello world".into()).await;
    assert_matches!(
        orch.submit_avatar("", "v1").await,
        Err(PipelineError::Precondition(_))
    );

    assert!(fakes.heygen.avatar_requests.lock().unwrap().is_empty());
    let snap = orch.snapshot().await;
    assert_eq!(snap.avatar.status, StageStatus::Idle);
    assert!(!snap.avatar.has_generated);
}

#[tokio::test]
async fn avatar_resubmit_while_pending_conflicts() {
    let fakes = Fakes::new();
    let orch = manual_orchestrator(&fakes);
    orch.set_script("Hello world".into()).await;
    orch.submit_avatar("a1", "v1").await.unwrap();

    assert_matches!(
        orch.submit_avatar("a1", "v1").await,
        Err(PipelineError::Conflict(_))
    );
    assert_eq!(fakes.heygen.accepted(), 1);
}

#[tokio::test]
async fn rejected_avatar_submission_moves_stage_to_error_and_allows_retry() {
    let fakes = Fakes::new();
    let orch = manual_orchestrator(&fakes);
    orch.set_script("Hello world".into()).await;
    fakes.heygen.reject_next("insufficient credits");

    let err = orch.submit_avatar("a1", "v1").await.unwrap_err();
    assert_matches!(err, PipelineError::Submission { stage: Stage::Avatar, ref message } if message.contains("insufficient credits"));
    let snap = orch.snapshot().await;
    assert_eq!(snap.avatar.status, StageStatus::Error);
    assert!(snap.avatar.has_generated);

    orch.submit_avatar("a1", "v1").await.unwrap();
    assert_eq!(orch.snapshot().await.avatar.status, StageStatus::Pending);
}

#[tokio::test]
async fn reset_clears_jobs_and_stops_polling() {
    let fakes = Fakes::new();
    let orch = manual_orchestrator(&fakes);
    orch.set_script("Hello world".into()).await;
    orch.submit_avatar("a1", "v1").await.unwrap();

    orch.reset_stage(Stage::Avatar).await;

    assert_eq!(orch.poll_tick(Stage::Avatar).await, 0);
    assert_eq!(fakes.heygen.total_polls(), 0);

    let snap = orch.snapshot().await;
    assert_eq!(snap.avatar.status, StageStatus::Idle);
    assert!(snap.avatar.job.is_none());
    assert!(snap.avatar.has_generated);
}

// ---------------------------------------------------------------------------
// Backgrounds and slots
// ---------------------------------------------------------------------------

#[tokio::test]
async fn slot_scenario_composites_only_the_succeeded_slot() {
    let fakes = Fakes::new();
    let orch = manual_orchestrator(&fakes);
    avatar_and_backgrounds_ready(&fakes, &orch).await;

    let prompts = fakes.kling.prompts.lock().unwrap().clone();
    assert_eq!(prompts.len(), 2);
    assert!(prompts.contains(&"prompt 2".to_string()));
    assert!(prompts.contains(&"prompt 5".to_string()));

    let snap = orch.snapshot().await;
    assert_eq!(snap.background.jobs.len(), 2);
    let a = snap.background.jobs.iter().find(|j| j.slot == Slot::A).unwrap();
    let b = snap.background.jobs.iter().find(|j| j.slot == Slot::B).unwrap();
    assert_eq!((a.candidate_index, a.status()), (2, JobStatus::Succeeded));
    assert_eq!((b.candidate_index, b.status()), (5, JobStatus::Failed));
    assert_eq!(snap.background.status, StageStatus::Done);
    assert!(snap.composite_unlocked);

    assert_matches!(
        orch.composite(Slot::B).await,
        Err(PipelineError::Precondition(_))
    );
    let handle = orch.composite(Slot::A).await.unwrap();

    let requests = fakes.shotstack.composite_requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].slot, Slot::A);
    assert_eq!(requests[0].avatar_result_url, "https://x/a.mp4");
    assert_eq!(requests[0].background_result_url, "https://k/a.mp4");
    assert_eq!(requests[0].hook_text, "Stop scrolling");
    assert_eq!(requests[0].duration_seconds, 15);

    let snap = orch.snapshot().await;
    assert_eq!(snap.composite.a.status, StageStatus::Pending);
    assert_eq!(snap.composite.b.status, StageStatus::Idle);
    assert_eq!(
        snap.composite.a.job.as_ref().map(|j| j.job_id.as_str()),
        Some(handle.job_id.as_str())
    );
}

#[tokio::test]
async fn background_requires_two_distinct_slots() {
    let fakes = Fakes::new();
    let orch = manual_orchestrator(&fakes);
    orch.set_candidates(candidates(7)).await.unwrap();
    orch.assign_slot(Slot::A, 3).await.unwrap();
    orch.assign_slot(Slot::B, 3).await.unwrap();

    let snap = orch.snapshot().await;
    assert_eq!(snap.slots.a, None);
    assert_eq!(snap.slots.b, Some(3));
    assert_matches!(
        orch.submit_backgrounds(BackgroundModel::Kling).await,
        Err(PipelineError::Precondition(_))
    );
    assert!(fakes.kling.prompts.lock().unwrap().is_empty());
    assert_eq!(orch.snapshot().await.background.status, StageStatus::Idle);
}

#[tokio::test]
async fn one_rejected_background_keeps_the_other() {
    let fakes = Fakes::new();
    let orch = manual_orchestrator(&fakes);
    orch.set_candidates(candidates(7)).await.unwrap();
    orch.assign_slot(Slot::A, 0).await.unwrap();
    orch.assign_slot(Slot::B, 1).await.unwrap();
    fakes.runway.accept_next();
    fakes.runway.reject_next("rate limited");

    let handles = orch.submit_backgrounds(BackgroundModel::Runway).await.unwrap();
    assert_eq!(handles.len(), 1);

    let snap = orch.snapshot().await;
    assert_eq!(snap.background.status, StageStatus::Pending);
    assert_eq!(snap.background.model, Some(BackgroundModel::Runway));
    let rejected = snap
        .background
        .jobs
        .iter()
        .find(|j| j.job.is_none())
        .unwrap();
    assert_eq!(rejected.status(), JobStatus::Error);
    assert!(rejected.error_message().unwrap().contains("rate limited"));
}

#[tokio::test]
async fn both_rejected_backgrounds_fail_the_stage() {
    let fakes = Fakes::new();
    let orch = manual_orchestrator(&fakes);
    orch.set_candidates(candidates(7)).await.unwrap();
    orch.assign_slot(Slot::A, 0).await.unwrap();
    orch.assign_slot(Slot::B, 1).await.unwrap();
    fakes.kling.reject_next("down");
    fakes.kling.reject_next("down");

    assert_matches!(
        orch.submit_backgrounds(BackgroundModel::Kling).await,
        Err(PipelineError::Submission {
            stage: Stage::Background,
            ..
        })
    );
    let snap = orch.snapshot().await;
    assert_eq!(snap.background.status, StageStatus::Error);
    assert_eq!(orch.poll_tick(Stage::Background).await, 0);
    assert_eq!(fakes.kling.total_polls(), 0);
}

#[tokio::test]
async fn background_jobs_poll_independently() {
    let fakes = Fakes::new();
    let orch = manual_orchestrator(&fakes);
    orch.set_candidates(candidates(7)).await.unwrap();
    orch.assign_slot(Slot::A, 0).await.unwrap();
    orch.assign_slot(Slot::B, 1).await.unwrap();
    let handles = orch.submit_backgrounds(BackgroundModel::Kling).await.unwrap();
    fakes
        .kling
        .script_polls(&handles[0].job_id, vec![JobSnapshot::succeeded("https://k/a.mp4")]);

    assert_eq!(orch.poll_tick(Stage::Background).await, 1);
    let snap = orch.snapshot().await;
    assert_eq!(snap.background.status, StageStatus::Pending);
    assert!(!snap.composite_unlocked);

    assert_eq!(orch.poll_tick(Stage::Background).await, 1);
    assert_eq!(fakes.kling.poll_count(&handles[0].job_id), 1);
    assert_eq!(fakes.kling.poll_count(&handles[1].job_id), 2);
}

// ---------------------------------------------------------------------------
// Composite
// ---------------------------------------------------------------------------

#[tokio::test]
async fn composite_is_refused_until_avatar_is_done() {
    let fakes = Fakes::new();
    let orch = manual_orchestrator(&fakes);
    orch.set_candidates(candidates(7)).await.unwrap();
    orch.assign_slot(Slot::A, 0).await.unwrap();
    orch.assign_slot(Slot::B, 1).await.unwrap();
    let handles = orch.submit_backgrounds(BackgroundModel::Kling).await.unwrap();
    fakes
        .kling
        .script_polls(&handles[0].job_id, vec![JobSnapshot::succeeded("https://k/a.mp4")]);
    orch.poll_tick(Stage::Background).await;

    let snap = orch.snapshot().await;
    assert!(!snap.composite_unlocked);
    assert_eq!(snap.progress[3].state, StepState::Locked);
    assert_matches!(
        orch.composite(Slot::A).await,
        Err(PipelineError::Precondition(_))
    );
    assert!(fakes.shotstack.composite_requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn music_is_frozen_at_submission() {
    let fakes = Fakes::new();
    let orch = manual_orchestrator(&fakes);
    avatar_and_backgrounds_ready(&fakes, &orch).await;

    orch.select_music("chill").await.unwrap();
    orch.composite(Slot::A).await.unwrap();
    orch.select_music("dramatic").await.unwrap();

    let snap = orch.snapshot().await;
    assert_eq!(snap.music_track_id, "dramatic");
    assert_eq!(
        snap.composite.a.request.as_ref().map(|r| r.music_track_id.as_str()),
        Some("chill")
    );
    assert_matches!(
        orch.select_music("polka").await,
        Err(PipelineError::Precondition(_))
    );
}

#[tokio::test]
async fn composite_finishes_and_progress_is_done() {
    let fakes = Fakes::new();
    let orch = manual_orchestrator(&fakes);
    avatar_and_backgrounds_ready(&fakes, &orch).await;

    let handle = orch.composite(Slot::A).await.unwrap();
    fakes.shotstack.script_polls(
        &handle.job_id,
        vec![JobSnapshot::pending(), JobSnapshot::succeeded("https://s/final.mp4")],
    );
    assert_eq!(poll_until_settled(&orch, Stage::Composite).await, 2);

    let snap = orch.snapshot().await;
    assert_eq!(snap.composite.a.status, StageStatus::Done);
    assert_eq!(snap.composite.a.result_url(), Some("https://s/final.mp4"));
    let states: Vec<StepState> = snap.progress.iter().map(|p| p.state).collect();
    assert_eq!(
        states,
        vec![StepState::Done, StepState::Done, StepState::Done, StepState::Done]
    );
}

#[tokio::test]
async fn resetting_background_orphans_inflight_composite() {
    let fakes = Fakes::new();
    let orch = manual_orchestrator(&fakes);
    avatar_and_backgrounds_ready(&fakes, &orch).await;
    let mut events = orch.subscribe();

    let handle = orch.composite(Slot::A).await.unwrap();
    orch.reset_stage(Stage::Background).await;

    let snap = orch.snapshot().await;
    assert_eq!(snap.composite.a.status, StageStatus::Error);
    assert_eq!(snap.composite.a.error.as_deref(), Some(PREREQUISITE_CHANGED));
    assert!(!snap.composite_unlocked);
    assert!(snap.background.jobs.is_empty());
    assert_eq!(snap.avatar.status, StageStatus::Done);

    assert_eq!(orch.poll_tick(Stage::Composite).await, 0);
    assert_eq!(fakes.shotstack.poll_count(&handle.job_id), 0);

    let mut saw_orphan = false;
    while let Ok(event) = events.try_recv() {
        if let PipelineEvent::CompositeOrphaned { slot, job_id } = event {
            assert_eq!(slot, Slot::A);
            assert_eq!(job_id.as_deref(), Some(handle.job_id.as_str()));
            saw_orphan = true;
        }
    }
    assert!(saw_orphan);
}

#[tokio::test]
async fn resubmitting_avatar_clears_settled_composites() {
    let fakes = Fakes::new();
    let orch = manual_orchestrator(&fakes);
    avatar_and_backgrounds_ready(&fakes, &orch).await;
    let handle = orch.composite(Slot::A).await.unwrap();
    fakes
        .shotstack
        .script_polls(&handle.job_id, vec![JobSnapshot::succeeded("https://s/final.mp4")]);
    poll_until_settled(&orch, Stage::Composite).await;

    orch.submit_avatar("a2", "v2").await.unwrap();

    let snap = orch.snapshot().await;
    assert_eq!(snap.composite.a.status, StageStatus::Idle);
    assert!(snap.composite.a.job.is_none());
    assert_eq!(snap.avatar.status, StageStatus::Pending);
}

#[tokio::test]
async fn resetting_composite_leaves_prerequisites_alone() {
    let fakes = Fakes::new();
    let orch = manual_orchestrator(&fakes);
    avatar_and_backgrounds_ready(&fakes, &orch).await;
    orch.composite(Slot::A).await.unwrap();

    orch.reset_stage(Stage::Composite).await;

    let snap = orch.snapshot().await;
    assert_eq!(snap.composite.a.status, StageStatus::Idle);
    assert_eq!(snap.avatar.status, StageStatus::Done);
    assert_eq!(snap.background.status, StageStatus::Done);
    assert!(snap.composite_unlocked);
}

// ---------------------------------------------------------------------------
// Collaborators and events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn script_and_candidates_come_from_collaborators() {
    let fakes = Fakes::new();
    let orch = manual_orchestrator(&fakes);

    let text = orch
        .generate_script(&FixedScript(Ok("Coffee hack you need".into())))
        .await
        .unwrap();
    assert_eq!(text, "Coffee hack you need");

    let proposed = orch.propose_candidates(&FixedCandidates(7)).await.unwrap();
    assert_eq!(proposed.len(), 7);

    let snap = orch.snapshot().await;
    assert_eq!(snap.script.status, StageStatus::Done);
    assert!(snap.script.has_generated);
    assert_eq!(snap.candidates.len(), 7);
    assert_eq!(snap.progress[0].state, StepState::Done);
}

#[tokio::test]
async fn failed_script_generation_marks_stage_error() {
    let fakes = Fakes::new();
    let orch = manual_orchestrator(&fakes);
    let err = orch
        .generate_script(&FixedScript(Err("model overloaded".into())))
        .await
        .unwrap_err();
    assert_matches!(err, PipelineError::Submission { stage: Stage::Script, .. });
    let snap = orch.snapshot().await;
    assert_eq!(snap.script.status, StageStatus::Error);
    assert_eq!(snap.script.error.as_deref(), Some("model overloaded"));
}

#[tokio::test]
async fn start_from_reports_analysis_failure() {
    let fakes = Fakes::new();
    let result = PipelineOrchestrator::start_from(
        &FixedAnalysis(Err("scrape failed".into())),
        vec![],
        Platform::Instagram,
        fakes.provider_set(),
        PipelineConfig::manual(),
    )
    .await;
    match result {
        Err(PipelineError::Collaborator(msg)) => assert_eq!(msg, "scrape failed"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("run started without an analysis"),
    }

    let orch = PipelineOrchestrator::start_from(
        &FixedAnalysis(Ok(analysis())),
        vec!["#fyp".into()],
        Platform::Instagram,
        fakes.provider_set(),
        PipelineConfig::manual(),
    )
    .await
    .unwrap();
    assert_eq!(orch.snapshot().await.hook_text, "Stop scrolling");
}

#[tokio::test]
async fn submission_emits_loading_submitted_pending() {
    let fakes = Fakes::new();
    let orch = manual_orchestrator(&fakes);
    orch.set_script("Hello world".into()).await;
    let mut events = orch.subscribe();

    let handle = orch.submit_avatar("a1", "v1").await.unwrap();

    let received: Vec<PipelineEvent> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    assert_eq!(
        received,
        vec![
            PipelineEvent::StageStatusChanged {
                stage: Stage::Avatar,
                slot: None,
                status: StageStatus::Loading,
            },
            PipelineEvent::JobSubmitted {
                stage: Stage::Avatar,
                slot: None,
                provider: trendreel_core::types::Provider::HeyGen,
                job_id: handle.job_id.clone(),
            },
            PipelineEvent::StageStatusChanged {
                stage: Stage::Avatar,
                slot: None,
                status: StageStatus::Pending,
            },
        ]
    );
}

// ---------------------------------------------------------------------------
// Interrupted submissions
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn avatar_outcome_is_recorded_after_the_caller_goes_away() {
    let fakes = Fakes::new();
    let orch = manual_orchestrator(&fakes);
    orch.set_script("Hello world".into()).await;
    fakes.heygen.delay_submissions(Some(Duration::from_secs(20)));

    let dropped = tokio::time::timeout(Duration::from_secs(5), orch.submit_avatar("a1", "v1")).await;
    assert!(dropped.is_err());
    assert_eq!(orch.snapshot().await.avatar.status, StageStatus::Loading);

    tokio::time::sleep(Duration::from_secs(20)).await;

    let snap = orch.snapshot().await;
    assert_eq!(snap.avatar.status, StageStatus::Pending);
    assert_eq!(fakes.heygen.accepted(), 1);
    let job_id = snap.avatar.job.expect("accepted job").job_id;

    fakes
        .heygen
        .script_polls(&job_id, vec![JobSnapshot::succeeded("https://x/a.mp4")]);
    assert_eq!(poll_until_settled(&orch, Stage::Avatar).await, 1);
    assert_eq!(orch.snapshot().await.avatar.status, StageStatus::Done);
}

#[tokio::test(start_paused = true)]
async fn hung_avatar_submission_times_out_and_can_be_retried() {
    let fakes = Fakes::new();
    let orch = manual_orchestrator(&fakes);
    orch.set_script("Hello world".into()).await;
    fakes.heygen.delay_submissions(Some(Duration::from_secs(3600)));

    let dropped = tokio::time::timeout(Duration::from_secs(30), orch.submit_avatar("a1", "v1")).await;
    assert!(dropped.is_err());
    assert_eq!(orch.snapshot().await.avatar.status, StageStatus::Loading);
    assert_matches!(
        orch.submit_avatar("a1", "v1").await,
        Err(PipelineError::Conflict(_))
    );

    tokio::time::sleep(Duration::from_secs(10)).await;

    let snap = orch.snapshot().await;
    assert_eq!(snap.avatar.status, StageStatus::Error);
    assert!(snap.avatar.error.unwrap().contains("timed out"));

    fakes.heygen.delay_submissions(None);
    orch.submit_avatar("a1", "v1").await.unwrap();
    assert_eq!(orch.snapshot().await.avatar.status, StageStatus::Pending);
}

#[tokio::test(start_paused = true)]
async fn background_outcomes_are_recorded_after_the_caller_goes_away() {
    let fakes = Fakes::new();
    let orch = manual_orchestrator(&fakes);
    orch.set_candidates(candidates(7)).await.unwrap();
    orch.assign_slot(Slot::A, 2).await.unwrap();
    orch.assign_slot(Slot::B, 5).await.unwrap();
    fakes.runway.delay_submissions(Some(Duration::from_secs(10)));

    let dropped = tokio::time::timeout(
        Duration::from_secs(1),
        orch.submit_backgrounds(BackgroundModel::Runway),
    )
    .await;
    assert!(dropped.is_err());

    tokio::time::sleep(Duration::from_secs(10)).await;

    let snap = orch.snapshot().await;
    assert_eq!(snap.background.status, StageStatus::Pending);
    assert_eq!(snap.background.jobs.len(), 2);
    assert_eq!(fakes.runway.accepted(), 2);
    assert_eq!(orch.poll_tick(Stage::Background).await, 2);
}

#[tokio::test(start_paused = true)]
async fn dropped_script_generation_moves_stage_to_error() {
    let fakes = Fakes::new();
    let orch = manual_orchestrator(&fakes);

    let dropped = tokio::time::timeout(
        Duration::from_secs(5),
        orch.generate_script(&SlowScript(Duration::from_secs(60))),
    )
    .await;
    assert!(dropped.is_err());
    tokio::time::sleep(Duration::from_millis(1)).await;

    let snap = orch.snapshot().await;
    assert_eq!(snap.script.status, StageStatus::Error);
    assert_eq!(snap.script.error.as_deref(), Some(SUBMISSION_INTERRUPTED));

    let text = orch
        .generate_script(&FixedScript(Ok("Second try".into())))
        .await
        .unwrap();
    assert_eq!(text, "Second try");
    assert_eq!(orch.snapshot().await.script.status, StageStatus::Done);
}

// ---------------------------------------------------------------------------
// Transport failures while polling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transport_failures_leave_avatar_pending_until_a_terminal_answer() {
    let fakes = Fakes::new();
    let orch = manual_orchestrator(&fakes);
    orch.set_script("Hello world".into()).await;
    let handle = orch.submit_avatar("a1", "v1").await.unwrap();
    fakes.heygen.fail_polls(&handle.job_id, 2);
    fakes
        .heygen
        .script_polls(&handle.job_id, vec![JobSnapshot::succeeded("https://x/a.mp4")]);
    let mut events = orch.subscribe();

    for _ in 0..2 {
        assert_eq!(orch.poll_tick(Stage::Avatar).await, 1);
        let snap = orch.snapshot().await;
        assert_eq!(snap.avatar.status, StageStatus::Pending);
        assert_eq!(snap.avatar.job.unwrap().status, JobStatus::Pending);
        assert!(snap.avatar.error.is_none());
    }
    assert!(events.try_recv().is_err());

    assert_eq!(orch.poll_tick(Stage::Avatar).await, 0);
    let snap = orch.snapshot().await;
    assert_eq!(snap.avatar.status, StageStatus::Done);
    assert_eq!(snap.avatar.result_url.as_deref(), Some("https://x/a.mp4"));
    assert_eq!(fakes.heygen.poll_count(&handle.job_id), 3);
}

#[tokio::test]
async fn background_stays_pending_while_one_slot_cannot_be_reached() {
    let fakes = Fakes::new();
    let orch = manual_orchestrator(&fakes);
    orch.set_candidates(candidates(7)).await.unwrap();
    orch.assign_slot(Slot::A, 0).await.unwrap();
    orch.assign_slot(Slot::B, 1).await.unwrap();
    let handles = orch.submit_backgrounds(BackgroundModel::Kling).await.unwrap();
    fakes.kling.fail_polls(&handles[0].job_id, 3);
    fakes
        .kling
        .script_polls(&handles[0].job_id, vec![JobSnapshot::succeeded("https://k/a.mp4")]);
    fakes
        .kling
        .script_polls(&handles[1].job_id, vec![JobSnapshot::succeeded("https://k/b.mp4")]);

    assert_eq!(orch.poll_tick(Stage::Background).await, 1);
    assert_eq!(orch.poll_tick(Stage::Background).await, 1);
    let snap = orch.snapshot().await;
    assert_eq!(snap.background.status, StageStatus::Pending);
    assert!(snap.background.error.is_none());
    assert!(!snap.composite_unlocked);

    assert_eq!(poll_until_settled(&orch, Stage::Background).await, 2);
    assert_eq!(orch.snapshot().await.background.status, StageStatus::Done);
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

fn auto_config() -> PipelineConfig {
    PipelineConfig {
        poll_interval: Duration::from_secs(5),
        auto_poll: true,
        ..PipelineConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn scheduler_polls_until_terminal_then_stops() {
    let fakes = Fakes::new();
    let orch = orchestrator_with(&fakes, auto_config());
    orch.set_script("Hello world".into()).await;

    let handle = orch.submit_avatar("a1", "v1").await.unwrap();
    fakes.heygen.script_polls(
        &handle.job_id,
        vec![JobSnapshot::pending(), JobSnapshot::succeeded("https://x/a.mp4")],
    );
    assert!(orch.is_polling(Stage::Avatar).await);

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(fakes.heygen.poll_count(&handle.job_id), 0);

    tokio::time::sleep(Duration::from_secs(7)).await;
    assert_eq!(fakes.heygen.poll_count(&handle.job_id), 2);
    assert_eq!(orch.snapshot().await.avatar.status, StageStatus::Done);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(fakes.heygen.poll_count(&handle.job_id), 2);
    assert!(!orch.is_polling(Stage::Avatar).await);
}

#[tokio::test(start_paused = true)]
async fn scheduler_stops_on_reset() {
    let fakes = Fakes::new();
    let orch = orchestrator_with(&fakes, auto_config());
    orch.set_script("Hello world".into()).await;
    orch.submit_avatar("a1", "v1").await.unwrap();

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(fakes.heygen.total_polls(), 1);

    orch.reset_stage(Stage::Avatar).await;
    assert!(!orch.is_polling(Stage::Avatar).await);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(fakes.heygen.total_polls(), 1);
}

#[tokio::test(start_paused = true)]
async fn stages_poll_independently() {
    let fakes = Fakes::new();
    let orch = orchestrator_with(&fakes, auto_config());
    orch.set_script("Hello world".into()).await;
    let avatar = orch.submit_avatar("a1", "v1").await.unwrap();
    fakes
        .heygen
        .script_polls(&avatar.job_id, vec![JobSnapshot::succeeded("https://x/a.mp4")]);

    orch.set_candidates(candidates(7)).await.unwrap();
    orch.assign_slot(Slot::A, 0).await.unwrap();
    orch.assign_slot(Slot::B, 1).await.unwrap();
    orch.submit_backgrounds(BackgroundModel::Kling).await.unwrap();

    tokio::time::sleep(Duration::from_secs(16)).await;

    assert!(!orch.is_polling(Stage::Avatar).await);
    assert!(orch.is_polling(Stage::Background).await);
    assert_eq!(fakes.heygen.total_polls(), 1);
    assert_eq!(fakes.kling.total_polls(), 6);

    orch.shutdown().await;
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(fakes.kling.total_polls(), 6);
}

#[tokio::test(start_paused = true)]
async fn scheduler_keeps_polling_through_transport_failures() {
    let fakes = Fakes::new();
    let orch = orchestrator_with(&fakes, auto_config());
    orch.set_script("Hello world".into()).await;
    let handle = orch.submit_avatar("a1", "v1").await.unwrap();
    fakes.heygen.fail_polls(&handle.job_id, 2);
    fakes
        .heygen
        .script_polls(&handle.job_id, vec![JobSnapshot::succeeded("https://x/a.mp4")]);

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(orch.snapshot().await.avatar.status, StageStatus::Pending);
    assert!(orch.is_polling(Stage::Avatar).await);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(fakes.heygen.poll_count(&handle.job_id), 3);
    assert_eq!(orch.snapshot().await.avatar.status, StageStatus::Done);
    assert!(!orch.is_polling(Stage::Avatar).await);
}

#[tokio::test(start_paused = true)]
async fn a_second_composite_replaces_the_running_poll_task() {
    let fakes = Fakes::new();
    let orch = orchestrator_with(&fakes, auto_config());
    orch.set_script("Hello world".into()).await;
    let avatar = orch.submit_avatar("a1", "v1").await.unwrap();
    fakes
        .heygen
        .script_polls(&avatar.job_id, vec![JobSnapshot::succeeded("https://x/a.mp4")]);
    orch.poll_tick(Stage::Avatar).await;

    orch.set_candidates(candidates(7)).await.unwrap();
    orch.assign_slot(Slot::A, 0).await.unwrap();
    orch.assign_slot(Slot::B, 1).await.unwrap();
    let backgrounds = orch.submit_backgrounds(BackgroundModel::Kling).await.unwrap();
    for (handle, url) in backgrounds.iter().zip(["https://k/a.mp4", "https://k/b.mp4"]) {
        fakes
            .kling
            .script_polls(&handle.job_id, vec![JobSnapshot::succeeded(url)]);
    }
    orch.poll_tick(Stage::Background).await;

    orch.composite(Slot::A).await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;
    orch.composite(Slot::B).await.unwrap();

    // Only the task started with slot B ticks, at t = 8.
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(fakes.shotstack.total_polls(), 2);
    assert!(orch.is_polling(Stage::Composite).await);
}
