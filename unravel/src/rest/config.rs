//! Configuration for the REST client.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

use super::error::RestError;

/// Configuration for the REST client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestConfig {
    /// Base URL every endpoint path is appended to.
    pub base_url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: f64,
    /// Whether to verify TLS certificates.
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
    /// User agent string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Additional headers sent with every request.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Timeout applied when the configured seconds cannot form a [`Duration`].
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

fn default_timeout() -> f64 {
    DEFAULT_TIMEOUT.as_secs_f64()
}

fn default_verify_tls() -> bool {
    true
}

fn default_user_agent() -> String {
    "unravel/0.1".to_string()
}

impl RestConfig {
    /// Creates a configuration for the given base URL with defaults.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_seconds: default_timeout(),
            verify_tls: default_verify_tls(),
            user_agent: default_user_agent(),
            headers: HashMap::new(),
        }
    }

    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Disables TLS certificate verification.
    ///
    /// Only for environments serving self-signed certificates; verification
    /// stays on unless explicitly relaxed here.
    #[must_use]
    pub fn without_tls_verification(mut self) -> Self {
        self.verify_tls = false;
        self
    }

    /// Gets timeout as Duration.
    ///
    /// Falls back to the default when the configured seconds are negative,
    /// non-finite, or too large to represent.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        match Duration::try_from_secs_f64(self.timeout_seconds) {
            Ok(timeout) => timeout,
            Err(_) => {
                warn!(
                    timeout_seconds = self.timeout_seconds,
                    "configured timeout is not representable, using the default"
                );
                DEFAULT_TIMEOUT
            }
        }
    }

    /// Builds the underlying HTTP client from this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::Http`] when the client cannot be constructed.
    pub fn build_client(&self) -> Result<reqwest::Client, RestError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(&self.user_agent)
            .timeout(self.timeout());

        if !self.verify_tls {
            warn!("TLS certificate verification is disabled for all REST calls");
            builder = builder.danger_accept_invalid_certs(true);
        }

        if !self.headers.is_empty() {
            let mut headers = reqwest::header::HeaderMap::new();
            for (key, value) in &self.headers {
                match (
                    reqwest::header::HeaderName::from_bytes(key.as_bytes()),
                    reqwest::header::HeaderValue::from_str(value),
                ) {
                    (Ok(name), Ok(value)) => {
                        headers.insert(name, value);
                    }
                    _ => {
                        warn!(header = key.as_str(), "skipping invalid header");
                    }
                }
            }
            builder = builder.default_headers(headers);
        }

        Ok(builder.build()?)
    }
}
