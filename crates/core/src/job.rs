//! Provider job records and normalized poll snapshots.

use serde::{Deserialize, Serialize};

use crate::types::{JobStatus, Provider, Timestamp};

/// Normalized result of a single status check against a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub status: JobStatus,
    pub result_url: Option<String>,
    pub error_message: Option<String>,
}

impl JobSnapshot {
    pub fn pending() -> Self {
        Self {
            status: JobStatus::Pending,
            result_url: None,
            error_message: None,
        }
    }

    pub fn succeeded(result_url: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Succeeded,
            result_url: Some(result_url.into()),
            error_message: None,
        }
    }

    /// A terminal failure carrying the provider's error text.
    pub fn failed(status: JobStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            result_url: None,
            error_message: Some(message.into()),
        }
    }
}

/// One unit of work accepted by a render provider.
///
/// Created on successful submission and owned by exactly one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub provider: Provider,
    pub status: JobStatus,
    pub result_url: Option<String>,
    pub error_message: Option<String>,
    pub submitted_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}

impl Job {
    /// A freshly accepted job, awaiting its first poll.
    pub fn submitted(job_id: impl Into<String>, provider: Provider) -> Self {
        Self {
            job_id: job_id.into(),
            provider,
            status: JobStatus::Pending,
            result_url: None,
            error_message: None,
            submitted_at: chrono::Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a poll snapshot.
    ///
    /// Non-terminal snapshots and snapshots for an already-terminal job
    /// are ignored. Returns `true` when the job transitioned to terminal.
    pub fn apply(&mut self, snapshot: &JobSnapshot) -> bool {
        if self.is_terminal() || !snapshot.status.is_terminal() {
            return false;
        }
        self.status = snapshot.status;
        self.result_url = snapshot.result_url.clone();
        self.error_message = match snapshot.status {
            JobStatus::Succeeded => None,
            _ => Some(
                snapshot
                    .error_message
                    .clone()
                    .unwrap_or_else(|| default_failure_message(snapshot.status)),
            ),
        };
        self.finished_at = Some(chrono::Utc::now());
        true
    }
}

fn default_failure_message(status: JobStatus) -> String {
    match status {
        JobStatus::Cancelled => "Render was cancelled".to_string(),
        JobStatus::Timeout => "Render timed out".to_string(),
        _ => "Render failed".to_string(),
    }
}
