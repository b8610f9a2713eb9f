//! Asynchronous cleanup registry with concurrent unwinding.

use std::collections::VecDeque;
use std::future::Future;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use tracing::warn;

use crate::errors::{ActionFailure, UnwindError};

/// A registered asynchronous cleanup step. The thunk is invoked at unwind
/// time to initiate the action; no work starts at registration.
type DeferredAction = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

/// The asynchronous counterpart of [`Unwinder`](crate::unwind::Unwinder).
///
/// Registration and [`reset`](Self::reset) behave identically to the
/// synchronous variant, but registered actions produce futures and
/// [`unwind`](Self::unwind) awaits them *concurrently*: actions are
/// initiated front-to-back (most recently registered first) and then awaited
/// together, so total teardown latency is bounded by the slowest action
/// rather than the sum. Completion order between actions is unconstrained.
///
/// There is no partial cancellation (once an unwind starts, every
/// registered action is initiated) and no built-in deadline; wrap the call
/// with [`run_with_timeout`](crate::time::run_with_timeout) when teardown
/// must be bounded.
#[derive(Default)]
pub struct AsyncUnwinder {
    /// Registered action thunks, most recently added at the front.
    actions: VecDeque<DeferredAction>,
}

impl AsyncUnwinder {
    /// Creates an empty unwinder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an asynchronous cleanup action.
    ///
    /// The closure runs when unwinding starts; the future it returns is
    /// awaited concurrently with every other registered action.
    pub fn add<F, Fut>(&mut self, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.actions
            .push_front(Box::new(move || action().map(|()| Ok(())).boxed()));
    }

    /// Registers an asynchronous cleanup action with an error channel.
    ///
    /// An `Err` resolution is collected and surfaced by
    /// [`unwind`](Self::unwind) once every action has settled.
    pub fn add_fallible<F, Fut>(&mut self, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.actions.push_front(Box::new(move || action().boxed()));
    }

    /// Discards all registered actions without initiating any of them.
    pub fn reset(&mut self) {
        self.actions.clear();
    }

    /// Initiates every registered action, awaits them all concurrently, and
    /// clears the registry.
    ///
    /// The caller is suspended until the slowest action settles; a failing
    /// or panicking action never short-circuits its siblings. Failures are
    /// reported in initiation order (reverse-registration order, the same
    /// ordering the synchronous variant executes in) regardless of when
    /// each action actually completed.
    ///
    /// # Errors
    ///
    /// Returns [`UnwindError`] listing every failed action once all actions
    /// have settled.
    pub async fn unwind(&mut self) -> Result<(), UnwindError> {
        let actions = std::mem::take(&mut self.actions);

        // Invoke the thunks front-to-back so initiation follows LIFO order,
        // then hand the whole batch to join_all for concurrent completion.
        // A thunk that panics before handing back its future is re-raised
        // inside a ready future so it settles with the batch instead of
        // short-circuiting the siblings.
        let mut initiated = Vec::with_capacity(actions.len());
        for action in actions {
            let future = match catch_unwind(AssertUnwindSafe(action)) {
                Ok(future) => future,
                Err(payload) => async move { resume_unwind(payload) }.boxed(),
            };
            initiated.push(AssertUnwindSafe(future).catch_unwind());
        }

        let settled = join_all(initiated).await;

        let mut failures = Vec::new();
        for (index, outcome) in settled.into_iter().enumerate() {
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    warn!(action.index = index, error = %error, "async cleanup action failed");
                    failures.push(ActionFailure::new(index, error));
                }
                Err(payload) => {
                    let failure = ActionFailure::from_panic(index, payload.as_ref());
                    warn!(action.index = index, error = %failure.error, "async cleanup action panicked");
                    failures.push(failure);
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(UnwindError::new(failures))
        }
    }

    /// Returns the number of pending cleanup actions.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.actions.len()
    }

    /// True when no actions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl std::fmt::Debug for AsyncUnwinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncUnwinder")
            .field("pending_count", &self.pending_count())
            .finish()
    }
}
