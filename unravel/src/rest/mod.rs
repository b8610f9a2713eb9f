//! REST adapter over a device-style HTTP API.
//!
//! This module provides:
//! - Configuration for the underlying HTTP client
//! - An authenticated client with the JSON/binary verb set
//! - Response envelope validation
//! - An event-stream seam and awaiter for named events
//! - A transport facade pairing both

mod client;
mod config;
mod error;
mod events;
mod transport;

pub use client::{
    validate_envelope, FormEntry, RestClient, StaticTokenProvider, TokenProvider,
    UnauthorizedHook, UploadProgress, UploadProgressCallback,
};
pub use config::RestConfig;
pub use error::{RestError, TransportError};
pub use events::{await_event, ChannelEventSource, EventSource, WsMessage};
pub use transport::Transport;
