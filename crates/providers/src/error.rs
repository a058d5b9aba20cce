/// Errors from the provider HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider returned a non-2xx status code.
    #[error("Provider API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// No API key is configured for the provider.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// The provider answered 2xx but the body lacked a required field.
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    /// No client is registered for the requested provider.
    #[error("No client registered for provider '{0}'")]
    UnknownProvider(String),
}

impl ProviderError {
    /// Transport-level failures that say nothing about the job itself.
    ///
    /// A poll that fails this way is retried on the next tick.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(_) => true,
            Self::ApiError { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
