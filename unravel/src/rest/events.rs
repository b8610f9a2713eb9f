//! Named-event stream seam and the event awaiter.
//!
//! The library does not own a socket. It defines the boundary an
//! application-owned stream plugs into, plus the awaiter that resolves once
//! a matching event arrives.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::debug;

use crate::time::run_with_timeout;

/// Message delivered by an event source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WsMessage {
    /// Event name used for routing.
    pub event: String,
    /// Event payload.
    pub data: Value,
}

impl WsMessage {
    /// Creates a message.
    #[must_use]
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// Boundary to whatever message stream the application owns.
pub trait EventSource: Send + Sync {
    /// Opens a new subscription to the message stream.
    ///
    /// Each receiver observes messages published after the subscription,
    /// never before it.
    fn subscribe(&self) -> broadcast::Receiver<WsMessage>;
}

/// In-memory event source over a broadcast channel.
///
/// Serves both as the default plumbing for application-fed streams and as
/// the test double for [`await_event`]. `capacity` bounds how many
/// unconsumed messages a subscriber may fall behind; capacity must be at
/// least 1.
pub struct ChannelEventSource {
    sender: broadcast::Sender<WsMessage>,
}

impl ChannelEventSource {
    /// Creates a source retaining up to `capacity` unconsumed messages.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes a message to every current subscriber.
    ///
    /// Messages published while nobody is subscribed are dropped.
    pub fn publish(&self, message: WsMessage) {
        let _ = self.sender.send(message);
    }
}

impl EventSource for ChannelEventSource {
    fn subscribe(&self) -> broadcast::Receiver<WsMessage> {
        self.sender.subscribe()
    }
}

impl std::fmt::Debug for ChannelEventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelEventSource")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

/// Waits for the first event named `event_name` whose payload `condition`
/// accepts.
///
/// `condition` returns `Some` to accept a payload and `None` to keep
/// waiting; events with other names are skipped without consulting it.
/// Resolves to `None` when `timeout` elapses or the stream closes; a lagged
/// subscription skips the missed messages and keeps waiting.
pub async fn await_event<T, C>(
    source: &dyn EventSource,
    event_name: &str,
    condition: C,
    timeout: Duration,
) -> Option<T>
where
    C: Fn(Value) -> Option<T>,
{
    let mut receiver = source.subscribe();

    let wait = async move {
        loop {
            match receiver.recv().await {
                Ok(message) => {
                    if message.event != event_name {
                        continue;
                    }
                    if let Some(accepted) = condition(message.data) {
                        return Some(accepted);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, event = event_name, "event receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    };

    run_with_timeout(timeout, wait).await.into_option().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::sleep_for;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_resolves_on_accepted_event() {
        let source = Arc::new(ChannelEventSource::new(16));

        let publisher = source.clone();
        tokio::spawn(async move {
            sleep_for(Duration::from_millis(5)).await;
            publisher.publish(WsMessage::new("job", json!({"id": 7, "done": false})));
            publisher.publish(WsMessage::new("job", json!({"id": 7, "done": true})));
        });

        let accepted = await_event(
            source.as_ref(),
            "job",
            |data| {
                if data["done"] == json!(true) {
                    Some(data["id"].clone())
                } else {
                    None
                }
            },
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(accepted, Some(json!(7)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_event_names_are_skipped() {
        let source = Arc::new(ChannelEventSource::new(16));

        let publisher = source.clone();
        tokio::spawn(async move {
            sleep_for(Duration::from_millis(5)).await;
            publisher.publish(WsMessage::new("progress", json!({"value": 10})));
            publisher.publish(WsMessage::new("finished", json!({"value": 99})));
        });

        let accepted = await_event(
            source.as_ref(),
            "finished",
            |data| data.get("value").cloned(),
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(accepted, Some(json!(99)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_resolves_to_none() {
        let source = ChannelEventSource::new(4);

        let accepted: Option<Value> =
            await_event(&source, "never", Some, Duration::from_millis(50)).await;

        assert_eq!(accepted, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_stream_resolves_to_none() {
        struct DeadSource;

        impl EventSource for DeadSource {
            fn subscribe(&self) -> broadcast::Receiver<WsMessage> {
                let (sender, receiver) = broadcast::channel(1);
                drop(sender);
                receiver
            }
        }

        let started = tokio::time::Instant::now();
        let accepted: Option<()> =
            await_event(&DeadSource, "job", |_| Some(()), Duration::from_secs(60)).await;

        assert_eq!(accepted, None);
        // Resolved by closure, not by the timeout firing.
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lagged_receiver_keeps_waiting() {
        let source = Arc::new(ChannelEventSource::new(1));

        let publisher = source.clone();
        tokio::spawn(async move {
            sleep_for(Duration::from_millis(5)).await;
            // Overflow the single-slot buffer before the waiter is polled
            // again, then deliver the real event.
            publisher.publish(WsMessage::new("noise", json!(1)));
            publisher.publish(WsMessage::new("noise", json!(2)));
            publisher.publish(WsMessage::new("noise", json!(3)));
            sleep_for(Duration::from_millis(5)).await;
            publisher.publish(WsMessage::new("job", json!({"done": true})));
        });

        let accepted = await_event(
            source.as_ref(),
            "job",
            |data| {
                if data["done"] == json!(true) {
                    Some(())
                } else {
                    None
                }
            },
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(accepted, Some(()));
    }
}
