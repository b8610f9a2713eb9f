//! Sleep primitives over the tokio timer.

use std::time::Duration;

/// Completes after `duration` has elapsed.
///
/// A cancellation-safe pause on the tokio timer; dropping the returned
/// future cancels the sleep. Durations are plain [`std::time::Duration`]
/// values, so callers build them with `Duration::from_millis` or
/// `Duration::from_secs` as needed.
pub async fn sleep_for(duration: Duration) {
    tokio::time::sleep(duration).await;
}
