//! Error types for cleanup execution.
//!
//! An unwind pass never stops at the first failing action; it keeps draining
//! the registry and reports everything that went wrong afterwards as a single
//! [`UnwindError`].

use thiserror::Error;

/// A single cleanup action that failed while the registry was unwinding.
#[derive(Debug)]
pub struct ActionFailure {
    /// Zero-based position in execution order (0 = most recently registered).
    pub index: usize,
    /// The underlying failure: either the `Err` returned by a fallible
    /// action or the captured payload of a panicking one.
    pub error: anyhow::Error,
}

impl ActionFailure {
    /// Creates a failure record for the action at `index`.
    #[must_use]
    pub fn new(index: usize, error: anyhow::Error) -> Self {
        Self { index, error }
    }

    /// Creates a failure record from a captured panic payload.
    pub(crate) fn from_panic(index: usize, payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self::new(index, anyhow::anyhow!("cleanup action panicked: {}", message))
    }
}

impl std::fmt::Display for ActionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "action #{}: {}", self.index, self.error)
    }
}

/// Aggregate failure produced by a completed unwind pass.
///
/// By the time this error exists, every registered action has been invoked;
/// the failures appear in execution order (most recently registered first).
#[derive(Debug, Error)]
#[error("unwind completed with {} failed cleanup action(s)", .failures.len())]
pub struct UnwindError {
    /// The failed actions, in execution order.
    pub failures: Vec<ActionFailure>,
}

impl UnwindError {
    /// Wraps a non-empty set of failures.
    #[must_use]
    pub fn new(failures: Vec<ActionFailure>) -> Self {
        Self { failures }
    }

    /// Number of actions that failed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// True when no failure was recorded.
    ///
    /// An `UnwindError` returned from an unwind is never empty; this exists
    /// for symmetry with [`len`](Self::len).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// The first failure in execution order.
    #[must_use]
    pub fn first(&self) -> Option<&ActionFailure> {
        self.failures.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_reports_count() {
        let err = UnwindError::new(vec![
            ActionFailure::new(0, anyhow::anyhow!("socket already closed")),
            ActionFailure::new(2, anyhow::anyhow!("lock poisoned")),
        ]);

        assert_eq!(err.len(), 2);
        assert!(err.to_string().contains("2 failed cleanup action(s)"));
    }

    #[test]
    fn test_action_failure_display_includes_index() {
        let failure = ActionFailure::new(3, anyhow::anyhow!("boom"));
        assert_eq!(failure.to_string(), "action #3: boom");
    }

    #[test]
    fn test_first_follows_execution_order() {
        let err = UnwindError::new(vec![
            ActionFailure::new(1, anyhow::anyhow!("a")),
            ActionFailure::new(4, anyhow::anyhow!("b")),
        ]);

        let first = err.first().map(|f| f.index);
        assert_eq!(first, Some(1));
    }
}
