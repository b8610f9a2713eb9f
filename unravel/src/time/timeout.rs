//! External deadline wrapper for futures without built-in timeouts.

use std::future::Future;
use std::time::Duration;

/// Outcome of racing a future against a deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimedResult<T> {
    /// The future produced a value before the deadline.
    Completed(T),
    /// The deadline elapsed first; the future was dropped mid-flight.
    TimedOut,
}

impl<T> TimedResult<T> {
    /// Converts the outcome into an `Option`, discarding timeout detail.
    #[must_use]
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::TimedOut => None,
        }
    }

    /// Returns `true` if the deadline elapsed before completion.
    #[must_use]
    pub const fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut)
    }

    /// Returns `true` if the future completed in time.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Awaits `future`, abandoning it once `limit` has elapsed.
///
/// The wrapped future is dropped on timeout, so any cleanup it owns runs
/// through its destructors. Operations that must survive a timeout should
/// be spawned instead of wrapped.
pub async fn run_with_timeout<T>(
    limit: Duration,
    future: impl Future<Output = T>,
) -> TimedResult<T> {
    match tokio::time::timeout(limit, future).await {
        Ok(value) => TimedResult::Completed(value),
        Err(_) => TimedResult::TimedOut,
    }
}
