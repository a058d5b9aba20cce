//! Response helpers shared by every provider client.

use crate::error::ProviderError;

/// Per-request timeout applied to every provider call.
pub const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Ensure the response has a success status code. Returns the response
/// unchanged on success, or a [`ProviderError::ApiError`] containing the
/// status and body text on failure.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(ProviderError::ApiError {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

/// Parse a successful JSON response body into the expected type.
pub(crate) async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ProviderError> {
    let response = ensure_success(response).await?;
    Ok(response.json::<T>().await?)
}

/// Return the key, or `NotConfigured` when it is empty.
pub(crate) fn require_key<'a>(key: &'a str, name: &'static str) -> Result<&'a str, ProviderError> {
    if key.trim().is_empty() {
        Err(ProviderError::NotConfigured(name))
    } else {
        Ok(key)
    }
}
