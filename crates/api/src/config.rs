use std::time::Duration;

use trendreel_pipeline::PipelineConfig;
use trendreel_providers::config::ProviderSettings;

/// Margin the HTTP timeout keeps above the pipeline's submission limit.
pub const RESPONSE_HEADROOM: Duration = Duration::from_secs(10);

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development. Provider keys
/// may be left unset; calls to an unconfigured provider fail at
/// submission time, not at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `45`). See
    /// [`request_timeout`](Self::request_timeout) for the effective value.
    pub request_timeout_secs: u64,
    /// Render provider credentials.
    pub providers: ProviderSettings,
    /// Poll interval and scheduler switch for every run.
    pub pipeline: PipelineConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `8000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `45`                       |
    /// | `POLL_INTERVAL_SECS`   | `5`                        |
    ///
    /// Provider keys are read by [`ProviderSettings::from_env`].
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins = parse_origins(
            &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:5173".into()),
        );

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "45".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            providers: ProviderSettings::from_env(),
            pipeline: PipelineConfig::from_env(),
        }
    }
}

impl ServerConfig {
    /// Timeout for one HTTP request. Never shorter than a pipeline
    /// submission plus [`RESPONSE_HEADROOM`], so submit handlers answer
    /// with the submission's own outcome instead of a bare 408.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
            .max(self.pipeline.submit_timeout + RESPONSE_HEADROOM)
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
