//! Per-stage job polling.
//!
//! A [`Poller`] holds the set of in-flight jobs for one stage. Each tick
//! checks every tracked job once, concurrently, and drops a job from the
//! set as soon as its provider reports a terminal status. Transport
//! failures leave the job tracked for the next tick.

use futures::future::join_all;
use trendreel_core::job::JobSnapshot;
use trendreel_core::types::{Provider, Slot, Stage};
use trendreel_providers::ProviderSet;

/// A job the poller is still waiting on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedJob {
    pub job_id: String,
    pub provider: Provider,
    /// Background and composite jobs belong to a slot.
    pub slot: Option<Slot>,
}

/// A terminal result for one tracked job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobUpdate {
    pub job_id: String,
    pub slot: Option<Slot>,
    pub snapshot: JobSnapshot,
}

/// The jobs to check in one tick, detached from the poller so the
/// checks can run without holding any lock on it.
#[derive(Debug, Clone)]
pub struct PollRound {
    pub stage: Stage,
    pub generation: u64,
    pub jobs: Vec<TrackedJob>,
}

#[derive(Debug, Clone)]
pub struct Poller {
    stage: Stage,
    generation: u64,
    in_flight: Vec<TrackedJob>,
}

impl Poller {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            generation: 0,
            in_flight: Vec::new(),
        }
    }

    pub fn track(&mut self, job: TrackedJob) {
        if !self.in_flight.iter().any(|j| j.job_id == job.job_id) {
            self.in_flight.push(job);
        }
    }

    /// Stop polling one job.
    pub fn untrack(&mut self, job_id: &str) {
        self.in_flight.retain(|j| j.job_id != job_id);
    }

    /// Stop polling everything. Rounds started before this are discarded
    /// when they settle.
    pub fn clear(&mut self) {
        self.in_flight.clear();
        self.generation += 1;
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
    }

    pub fn in_flight(&self) -> &[TrackedJob] {
        &self.in_flight
    }

    pub fn round(&self) -> PollRound {
        PollRound {
            stage: self.stage,
            generation: self.generation,
            jobs: self.in_flight.clone(),
        }
    }

    /// Apply a finished round: drop every job that reached a terminal
    /// status and return the updates that still belong to this poller.
    ///
    /// Updates from a round that predates a [`clear`](Self::clear), or for
    /// jobs untracked since, are discarded.
    pub fn settle(&mut self, generation: u64, updates: Vec<JobUpdate>) -> Vec<JobUpdate> {
        if generation != self.generation {
            tracing::debug!(
                stage = %self.stage,
                stale_generation = generation,
                generation = self.generation,
                "Discarding poll results from a reset stage",
            );
            return Vec::new();
        }
        updates
            .into_iter()
            .filter(|u| {
                let tracked = self.in_flight.iter().any(|j| j.job_id == u.job_id);
                if tracked {
                    self.untrack(&u.job_id);
                }
                tracked
            })
            .collect()
    }

    /// Run one full tick in place.
    pub async fn tick(&mut self, providers: &ProviderSet) -> Vec<JobUpdate> {
        let round = self.round();
        let updates = round.run(providers).await;
        self.settle(round.generation, updates)
    }
}

impl PollRound {
    /// Check every job once, concurrently. Only terminal results are
    /// returned; pending jobs and transport failures produce nothing.
    pub async fn run(&self, providers: &ProviderSet) -> Vec<JobUpdate> {
        let checks = self.jobs.iter().map(|job| async move {
            match providers.poll(job.provider, &job.job_id).await {
                Ok(snapshot) if snapshot.status.is_terminal() => Some(JobUpdate {
                    job_id: job.job_id.clone(),
                    slot: job.slot,
                    snapshot,
                }),
                Ok(_) => {
                    tracing::debug!(
                        stage = %self.stage,
                        provider = %job.provider,
                        job_id = %job.job_id,
                        "Job still pending",
                    );
                    None
                }
                Err(e) => {
                    tracing::warn!(
                        stage = %self.stage,
                        provider = %job.provider,
                        job_id = %job.job_id,
                        transient = e.is_transient(),
                        error = %e,
                        "Poll failed, retrying next tick",
                    );
                    None
                }
            }
        });

        join_all(checks).await.into_iter().flatten().collect()
    }
}
