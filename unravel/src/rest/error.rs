//! Error taxonomy for the REST adapter.

use thiserror::Error;

/// Response status outside the accepted window.
///
/// Anything in `200..400` passes; redirects are treated as success because
/// the underlying client has already followed them by the time the status
/// is observed here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport error: HTTP {status} {message}")]
pub struct TransportError {
    /// The rejected HTTP status code.
    pub status: u16,
    /// Canonical reason phrase, empty when unknown.
    pub message: String,
}

impl TransportError {
    /// Creates a transport error from a status code.
    #[must_use]
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        Self {
            status: status.as_u16(),
            message: status.canonical_reason().unwrap_or("").to_string(),
        }
    }

    /// Whether `status` falls inside the accepted window.
    #[must_use]
    pub fn is_success_status(status: u16) -> bool {
        (200..400).contains(&status)
    }
}

/// Errors produced by REST operations.
#[derive(Debug, Error)]
pub enum RestError {
    /// The request never produced a response (connect, TLS, timeout).
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The response status fell outside the accepted window.
    #[error(transparent)]
    Status(#[from] TransportError),

    /// The response parsed but its envelope reported failure.
    #[error("envelope rejected: {reason}")]
    Envelope {
        /// Why the envelope was rejected.
        reason: String,
        /// The offending payload, kept for diagnostics.
        payload: serde_json::Value,
    },

    /// The response body was not the JSON the caller asked for.
    #[error("invalid json body: {0}")]
    Json(#[from] serde_json::Error),

    /// The download sink refused a write.
    #[error("download sink error: {0}")]
    Io(#[from] std::io::Error),
}
