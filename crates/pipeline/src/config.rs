use std::time::Duration;

/// Default interval between poll ticks for a stage.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Upper bound on one submission, including the collaborator call for a
/// generated script. Sits just above the providers' own request timeout so
/// the HTTP client normally reports first.
pub const DEFAULT_SUBMIT_TIMEOUT: Duration =
    Duration::from_secs(trendreel_providers::REQUEST_TIMEOUT.as_secs() + 5);

/// Orchestrator tuning.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Delay between poll ticks of one stage (default: 5 s).
    pub poll_interval: Duration,
    /// Run the orchestrator's own poll scheduler (default: `true`).
    ///
    /// When `false`, callers drive polling with
    /// [`PipelineOrchestrator::poll_tick`](crate::PipelineOrchestrator::poll_tick).
    pub auto_poll: bool,
    /// A submission still unanswered after this long is recorded as a
    /// failure (default: 35 s).
    pub submit_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            auto_poll: true,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
        }
    }
}

impl PipelineConfig {
    /// | Env Var              | Default |
    /// |----------------------|---------|
    /// | `POLL_INTERVAL_SECS` | `5`     |
    pub fn from_env() -> Self {
        let poll_interval_secs: u64 = std::env::var("POLL_INTERVAL_SECS")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("POLL_INTERVAL_SECS must be a valid u64");

        Self {
            poll_interval: Duration::from_secs(poll_interval_secs.max(1)),
            ..Self::default()
        }
    }

    /// Manual polling only; used by tests and one-shot drivers.
    pub fn manual() -> Self {
        Self {
            auto_poll: false,
            ..Self::default()
        }
    }
}
