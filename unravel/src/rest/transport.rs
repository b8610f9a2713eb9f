//! Facade pairing the REST client with an event source.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncWrite;

use super::client::{FormEntry, RestClient, UploadProgressCallback};
use super::error::RestError;
use super::events::{await_event, EventSource};

/// One handle for everything a device session needs: REST verbs plus
/// awaiting events on the session's own stream.
pub struct Transport {
    rest: RestClient,
    events: Arc<dyn EventSource>,
}

impl Transport {
    /// Creates a transport over a client and an event source.
    #[must_use]
    pub fn new(rest: RestClient, events: Arc<dyn EventSource>) -> Self {
        Self { rest, events }
    }

    /// The underlying REST client, for operations not forwarded here.
    #[must_use]
    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    /// Forwards to [`RestClient::get`].
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] as the underlying client does.
    pub async fn get(&self, endpoint: &str) -> Result<Value, RestError> {
        self.rest.get(endpoint).await
    }

    /// Forwards to [`RestClient::get_text`].
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] as the underlying client does.
    pub async fn get_text(&self, endpoint: &str) -> Result<String, RestError> {
        self.rest.get_text(endpoint).await
    }

    /// Forwards to [`RestClient::post`].
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] as the underlying client does.
    pub async fn post<B>(&self, endpoint: &str, body: &B) -> Result<Value, RestError>
    where
        B: Serialize + ?Sized,
    {
        self.rest.post(endpoint, body).await
    }

    /// Forwards to [`RestClient::put`].
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] as the underlying client does.
    pub async fn put<B>(&self, endpoint: &str, body: &B) -> Result<Value, RestError>
    where
        B: Serialize + ?Sized,
    {
        self.rest.put(endpoint, body).await
    }

    /// Forwards to [`RestClient::patch`].
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] as the underlying client does.
    pub async fn patch<B>(&self, endpoint: &str, body: &B) -> Result<Value, RestError>
    where
        B: Serialize + ?Sized,
    {
        self.rest.patch(endpoint, body).await
    }

    /// Forwards to [`RestClient::delete`].
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] as the underlying client does.
    pub async fn delete(&self, endpoint: &str) -> Result<Value, RestError> {
        self.rest.delete(endpoint).await
    }

    /// Forwards to [`RestClient::download`].
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] as the underlying client does.
    pub async fn download(&self, endpoint: &str) -> Result<Bytes, RestError> {
        self.rest.download(endpoint).await
    }

    /// Forwards to [`RestClient::download_file`].
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] as the underlying client does.
    pub async fn download_file<W>(&self, endpoint: &str, sink: &mut W) -> Result<(), RestError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        self.rest.download_file(endpoint, sink).await
    }

    /// Forwards to [`RestClient::put_form`].
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] as the underlying client does.
    pub async fn put_form(
        &self,
        endpoint: &str,
        entries: Vec<FormEntry>,
        progress: Option<UploadProgressCallback>,
    ) -> Result<Value, RestError> {
        self.rest.put_form(endpoint, entries, progress).await
    }

    /// Forwards to [`RestClient::auth_url`].
    #[must_use]
    pub fn auth_url(&self, path: &str) -> String {
        self.rest.auth_url(path)
    }

    /// Waits on this transport's own event stream.
    ///
    /// See [`await_event`] for resolution semantics.
    pub async fn await_event<T, C>(
        &self,
        event_name: &str,
        condition: C,
        timeout: Duration,
    ) -> Option<T>
    where
        C: Fn(Value) -> Option<T>,
    {
        await_event(&*self.events, event_name, condition, timeout).await
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport").field("rest", &self.rest).finish()
    }
}
