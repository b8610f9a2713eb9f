//! LIFO cleanup registries for multi-step resource acquisition.
//!
//! This module provides:
//! - Unwinder for synchronous reverse-order cleanup
//! - AsyncUnwinder for concurrent asynchronous cleanup
//! - Scoped helpers and UnwindGuard for guaranteed execution on exit

mod async_unwinder;
mod scope;
mod unwinder;

pub use async_unwinder::AsyncUnwinder;
pub use scope::{run_with_async_unwinder, run_with_unwinder, UnwindGuard};
pub use unwinder::Unwinder;
