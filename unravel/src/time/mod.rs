//! Timer utilities shared by the rest of the crate.
//!
//! This module provides:
//! - sleep_for for tokio-timer pauses
//! - run_with_timeout and TimedResult for external deadlines

mod sleep;
mod timeout;

pub use sleep::sleep_for;
pub use timeout::{run_with_timeout, TimedResult};
