//! Shared HTTP client construction for consistent timeout and TLS configuration.

use std::time::Duration;

use crate::error::LlmError;

/// Create an HTTP client for embedding backends.
///
/// Config: 10s connect timeout, caller-supplied request timeout, rustls TLS,
/// `forklift/{version}` user-agent, redirect limit 10.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn client_with_timeout(timeout: Duration) -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(timeout)
        .user_agent(concat!("forklift/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(LlmError::Http)
}
