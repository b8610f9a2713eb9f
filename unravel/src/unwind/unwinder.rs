//! Synchronous cleanup registry with LIFO execution.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::warn;

use crate::errors::{ActionFailure, UnwindError};

/// A registered cleanup step, consumed when it runs.
type UnwindAction = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

/// An ordered registry of zero-argument cleanup actions, executed in
/// reverse-registration order on demand.
///
/// The unwinder mirrors a manual defer stack: a unit of work registers one
/// cleanup step per resource or side effect as it is acquired, and
/// [`unwind`](Self::unwind) releases them in the opposite order: acquire
/// A, B, C; release C, B, A. The registry owns only the action callables;
/// the resources they reference stay with the caller.
///
/// The unwinder never decides *when* cleanup happens. Callers invoke
/// [`unwind`](Self::unwind) from their own guaranteed-cleanup construct (see
/// [`run_with_unwinder`](crate::unwind::run_with_unwinder) and
/// [`UnwindGuard`](crate::unwind::UnwindGuard)), or skip cleanup entirely
/// with [`reset`](Self::reset) when ownership of the resources moved out.
///
/// After an unwind or a reset the registry is empty and ready for reuse;
/// the object is not single-use.
#[derive(Default)]
pub struct Unwinder {
    /// Registered actions, most recently added at the front.
    actions: VecDeque<UnwindAction>,
}

impl Unwinder {
    /// Creates an empty unwinder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a cleanup action.
    ///
    /// The action is inserted at the head of the sequence, so it will run
    /// *first* among the currently registered actions when unwinding. It is
    /// not invoked at registration time.
    pub fn add<F>(&mut self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.actions.push_front(Box::new(move || {
            action();
            Ok(())
        }));
    }

    /// Registers a cleanup action with an error channel.
    ///
    /// Ordering and clearing behave exactly like [`add`](Self::add); an
    /// `Err` return is collected and surfaced by [`unwind`](Self::unwind)
    /// after every other action has run.
    pub fn add_fallible<F>(&mut self, action: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.actions.push_front(Box::new(action));
    }

    /// Discards all registered actions without invoking any of them.
    ///
    /// Used when the unit of work completed and cleanup should be skipped,
    /// e.g. because ownership of the guarded resources was transferred out.
    pub fn reset(&mut self) {
        self.actions.clear();
    }

    /// Invokes every registered action, most recently added first, then
    /// clears the registry.
    ///
    /// A failing action never prevents the remaining actions from running:
    /// `Err` returns and panics are caught per action, logged, and collected
    /// into one aggregate [`UnwindError`] returned after the drain. Runs
    /// synchronously to completion.
    ///
    /// # Errors
    ///
    /// Returns [`UnwindError`] listing every failed action in execution
    /// order.
    pub fn unwind(&mut self) -> Result<(), UnwindError> {
        let actions = std::mem::take(&mut self.actions);
        let mut failures = Vec::new();

        for (index, action) in actions.into_iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(action)) {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    warn!(action.index = index, error = %error, "cleanup action failed");
                    failures.push(ActionFailure::new(index, error));
                }
                Err(payload) => {
                    let failure = ActionFailure::from_panic(index, payload.as_ref());
                    warn!(action.index = index, error = %failure.error, "cleanup action panicked");
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

impl std::fmt::Debug for Unwinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unwinder")
            .field("pending_count", &self.pending_count())
            .finish()
    }
}
