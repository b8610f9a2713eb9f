//! # Unravel
//!
//! A Rust port of the unravel client support library.
//!
//! Unravel packages the session plumbing shared by device-facing clients:
//!
//! - **Reverse-order cleanup**: Register release actions as resources are
//!   acquired and run them last-in-first-out, on every exit path
//! - **Concurrent async cleanup**: The asynchronous variant initiates all
//!   actions and waits for every one to settle
//! - **REST adapter**: Authenticated JSON/binary verbs, envelope validation,
//!   and awaiting named events on a session stream
//! - **Timer utilities**: Sleeps and external deadlines over the tokio timer
//! - **Magnitude formatting**: Compact SI-suffixed value rendering
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use unravel::prelude::*;
//!
//! let value = run_with_unwinder(|unwinder| {
//!     let session = connect()?;
//!     unwinder.add(move || session.close());
//!
//!     let stream = session.open_stream()?;
//!     unwinder.add(move || stream.release());
//!
//!     stream.read_state()
//! })?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod errors;
pub mod time;
pub mod units;
pub mod unwind;

#[cfg(feature = "rest")]
pub mod rest;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::errors::{ActionFailure, UnwindError};
    pub use crate::time::{run_with_timeout, sleep_for, TimedResult};
    pub use crate::units::{format_value, value_and_unit};
    pub use crate::unwind::{
        run_with_async_unwinder, run_with_unwinder, AsyncUnwinder, UnwindGuard, Unwinder,
    };

    #[cfg(feature = "rest")]
    pub use crate::rest::{
        await_event, ChannelEventSource, EventSource, FormEntry, RestClient, RestConfig,
        RestError, StaticTokenProvider, TokenProvider, Transport, TransportError, WsMessage,
    };
}
