//! Scoped execution helpers guaranteeing cleanup on every exit path.
//!
//! The unwinders themselves never decide when to run; these helpers supply
//! the guaranteed-cleanup construct around them. Whether the guarded
//! operation returns normally, bails early, fails, or panics, the unwind
//! happens before control leaves the scope, unless the operation explicitly
//! opted out with `reset`.

use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::warn;

use super::{AsyncUnwinder, Unwinder};
use crate::errors::UnwindError;

/// Runs `op` with a fresh [`Unwinder`] and unwinds on every exit path.
///
/// The operation registers cleanup actions as it acquires resources; once it
/// returns (`Ok` or `Err`) the unwinder drains. A panic in the operation is
/// not caught, but the registered actions still run while it propagates,
/// with their failures logged. An operation that wants to keep its resources
/// calls [`Unwinder::reset`] before returning.
///
/// # Errors
///
/// The operation's own error dominates: it is returned as-is, and any
/// cleanup failure that happened while handling it is only logged. A cleanup
/// failure after a *successful* operation is returned instead.
pub fn run_with_unwinder<T, F>(op: F) -> anyhow::Result<T>
where
    F: FnOnce(&mut Unwinder) -> anyhow::Result<T>,
{
    // The guard covers the panic path; a normal return disarms it and
    // reports cleanup failures through `conclude` instead.
    let mut guard = UnwindGuard::new();
    let result = op(&mut guard);
    conclude(result, guard.into_inner().unwind())
}

/// Asynchronous twin of [`run_with_unwinder`] over an [`AsyncUnwinder`].
///
/// The operation receives a mutable borrow of the unwinder and returns a
/// boxed future tied to it:
///
/// ```rust,ignore
/// let value = run_with_async_unwinder(|unwinder| {
///     async move {
///         let session = connect().await?;
///         unwinder.add(move || session.close());
///         Ok(42)
///     }
///     .boxed()
/// })
/// .await?;
/// ```
///
/// A panicking operation does not skip the unwind either: the panic resumes
/// only after every registered action has settled.
///
/// # Errors
///
/// Same precedence as the synchronous helper.
pub async fn run_with_async_unwinder<T, F>(op: F) -> anyhow::Result<T>
where
    F: for<'a> FnOnce(&'a mut AsyncUnwinder) -> BoxFuture<'a, anyhow::Result<T>>,
{
    let mut unwinder = AsyncUnwinder::new();
    // Both panic points are caught here: the closure producing the future
    // and the future itself. Drop cannot await, so the panic is held until
    // the unwind completes and then resumed.
    let outcome = match catch_unwind(AssertUnwindSafe(|| op(&mut unwinder))) {
        Ok(future) => AssertUnwindSafe(future).catch_unwind().await,
        Err(payload) => Err(payload),
    };
    let unwound = unwinder.unwind().await;
    match outcome {
        Ok(result) => conclude(result, unwound),
        Err(payload) => {
            if let Err(unwind_err) = unwound {
                warn!(error = %unwind_err, "cleanup failed while handling a panic");
            }
            resume_unwind(payload)
        }
    }
}

fn conclude<T>(result: anyhow::Result<T>, unwound: Result<(), UnwindError>) -> anyhow::Result<T> {
    match (result, unwound) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(unwind_err)) => Err(unwind_err.into()),
        (Err(op_err), Ok(())) => Err(op_err),
        (Err(op_err), Err(unwind_err)) => {
            warn!(error = %unwind_err, "cleanup failed while handling an earlier error");
            Err(op_err)
        }
    }
}

/// Block-scoped wrapper around an [`Unwinder`] that unwinds when dropped.
///
/// For callers preferring drop-based finalization over the closure helpers:
/// the guard dereferences to its unwinder for registration and drains it on
/// drop. `Drop` cannot report failures, so they are logged at warn level;
/// use [`into_inner`](Self::into_inner) and unwind manually when failures
/// must be observed.
pub struct UnwindGuard {
    inner: Unwinder,
    armed: bool,
}

impl Default for UnwindGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl UnwindGuard {
    /// Creates a guard around an empty unwinder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Unwinder::new(),
            armed: true,
        }
    }

    /// Consumes the guard without running any registered action.
    ///
    /// The ownership-transfer escape hatch: equivalent to calling `reset`
    /// and letting the guard fall out of scope.
    pub fn disarm(mut self) {
        self.armed = false;
    }

    /// Releases the underlying unwinder for manual handling.
    ///
    /// The guard no longer unwinds on drop; the caller decides when (and
    /// whether) the registered actions run.
    #[must_use]
    pub fn into_inner(mut self) -> Unwinder {
        self.armed = false;
        std::mem::take(&mut self.inner)
    }
}

impl Drop for UnwindGuard {
    fn drop(&mut self) {
        if self.armed {
            if let Err(err) = self.inner.unwind() {
                warn!(error = %err, "cleanup failed during scope exit");
            }
        }
    }
}

impl std::ops::Deref for UnwindGuard {
    type Target = Unwinder;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl std::ops::DerefMut for UnwindGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl std::fmt::Debug for UnwindGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnwindGuard")
            .field("pending_count", &self.inner.pending_count())
            .field("armed", &self.armed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_unwinds_after_success() {
        let released = Arc::new(AtomicBool::new(false));

        let released_clone = released.clone();
        let value = run_with_unwinder(move |unwinder| {
            unwinder.add(move || released_clone.store(true, Ordering::SeqCst));
            Ok(7)
        })
        .unwrap();

        assert_eq!(value, 7);
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_unwinds_after_failure_in_reverse_order() {
        let log = Arc::new(Mutex::new(Vec::new()));

        let log_clone = log.clone();
        let result: anyhow::Result<()> = run_with_unwinder(move |unwinder| {
            let first = log_clone.clone();
            unwinder.add(move || first.lock().push(0));
            let second = log_clone.clone();
            unwinder.add(move || second.lock().push(1));
            anyhow::bail!("acquisition failed")
        });

        assert!(result.is_err());
        assert_eq!(*log.lock(), vec![1, 0]);
    }

    #[test]
    fn test_reset_keeps_resources_alive() {
        let released = Arc::new(AtomicBool::new(false));

        let released_clone = released.clone();
        run_with_unwinder(move |unwinder| {
            unwinder.add(move || released_clone.store(true, Ordering::SeqCst));
            // Ownership moved out; skip the registered cleanup.
            unwinder.reset();
            Ok(())
        })
        .unwrap();

        assert!(!released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_cleanup_failure_after_success_surfaces() {
        let result: anyhow::Result<()> = run_with_unwinder(|unwinder| {
            unwinder.add_fallible(|| anyhow::bail!("release refused"));
            Ok(())
        });

        let err = result.unwrap_err();
        let unwind_err = err.downcast_ref::<UnwindError>();
        assert_eq!(unwind_err.map(UnwindError::len), Some(1));
    }

    #[test]
    fn test_operation_error_dominates_cleanup_error() {
        let result: anyhow::Result<()> = run_with_unwinder(|unwinder| {
            unwinder.add_fallible(|| anyhow::bail!("cleanup failed too"));
            anyhow::bail!("operation failed")
        });

        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "operation failed");
    }

    #[test]
    fn test_panicking_operation_still_unwinds() {
        let released = Arc::new(AtomicBool::new(false));

        let released_clone = released.clone();
        let outcome = catch_unwind(AssertUnwindSafe(move || {
            let _: anyhow::Result<()> = run_with_unwinder(move |unwinder| {
                unwinder.add(move || released_clone.store(true, Ordering::SeqCst));
                panic!("guarded work exploded")
            });
        }));

        assert!(outcome.is_err());
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_async_scope_unwinds_after_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));

        let log_clone = log.clone();
        let result: anyhow::Result<()> = run_with_async_unwinder(move |unwinder| {
            async move {
                let first = log_clone.clone();
                unwinder.add(move || async move { first.lock().push(0) });
                let second = log_clone.clone();
                unwinder.add(move || async move { second.lock().push(1) });
                anyhow::bail!("early exit")
            }
            .boxed()
        })
        .await;

        assert!(result.is_err());
        assert_eq!(*log.lock(), vec![1, 0]);
    }

    #[tokio::test]
    async fn test_async_scope_returns_value() {
        let released = Arc::new(AtomicBool::new(false));

        let released_clone = released.clone();
        let value = run_with_async_unwinder(move |unwinder| {
            async move {
                unwinder.add(move || async move { released_clone.store(true, Ordering::SeqCst) });
                Ok("done")
            }
            .boxed()
        })
        .await
        .unwrap();

        assert_eq!(value, "done");
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_async_panicking_operation_still_unwinds() {
        let released = Arc::new(AtomicBool::new(false));

        let released_clone = released.clone();
        let scope = run_with_async_unwinder(move |unwinder| {
            async move {
                unwinder.add(move || async move { released_clone.store(true, Ordering::SeqCst) });
                panic!("guarded work exploded")
            }
            .boxed()
        });

        let outcome: Result<anyhow::Result<()>, _> = AssertUnwindSafe(scope).catch_unwind().await;

        assert!(outcome.is_err());
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_guard_unwinds_on_drop() {
        let released = Arc::new(AtomicBool::new(false));

        {
            let mut guard = UnwindGuard::new();
            let released_clone = released.clone();
            guard.add(move || released_clone.store(true, Ordering::SeqCst));
            assert_eq!(guard.pending_count(), 1);
        }

        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_disarmed_guard_skips_cleanup() {
        let released = Arc::new(AtomicBool::new(false));

        let mut guard = UnwindGuard::new();
        let released_clone = released.clone();
        guard.add(move || released_clone.store(true, Ordering::SeqCst));
        guard.disarm();

        assert!(!released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_into_inner_hands_failures_to_caller() {
        let mut guard = UnwindGuard::new();
        guard.add_fallible(|| anyhow::bail!("close failed"));

        let mut unwinder = guard.into_inner();
        let err = unwinder.unwind().unwrap_err();
        assert_eq!(err.len(), 1);
    }
}
