//! Authenticated REST verbs over a shared HTTP client.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use parking_lot::RwLock;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};
use uuid::Uuid;

use super::config::RestConfig;
use super::error::{RestError, TransportError};

/// Upload chunk granularity for streamed form parts.
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Supplies the bearer token attached to every request.
///
/// Tokens are re-read per request, so rotation by the owner takes effect on
/// the next call without rebuilding the client.
pub trait TokenProvider: Send + Sync {
    /// Returns the current token.
    fn token(&self) -> String;
}

/// Token provider holding a replaceable token behind a lock.
#[derive(Debug, Default)]
pub struct StaticTokenProvider {
    token: RwLock<String>,
}

impl StaticTokenProvider {
    /// Creates a provider with an initial token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(token.into()),
        }
    }

    /// Replaces the stored token.
    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.write() = token.into();
    }
}

impl TokenProvider for StaticTokenProvider {
    fn token(&self) -> String {
        self.token.read().clone()
    }
}

/// Observer invoked with the status code of a 401 or 403 response.
pub type UnauthorizedHook = Arc<dyn Fn(u16) + Send + Sync>;

/// Cumulative upload progress for a multipart request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    /// Percentage of the byte payload handed to the transport, `0..=100`.
    pub percentage: u8,
}

impl UploadProgress {
    fn from_counts(sent: u64, total: u64) -> Self {
        let percentage = if total == 0 {
            100
        } else {
            ((sent * 100) / total).min(100) as u8
        };
        Self { percentage }
    }
}

/// Callback observing [`UploadProgress`] during `put_form`.
pub type UploadProgressCallback = Arc<dyn Fn(UploadProgress) + Send + Sync>;

/// One field of a multipart upload.
#[derive(Debug, Clone)]
pub enum FormEntry {
    /// Plain text field.
    Text {
        /// Field name.
        name: String,
        /// Field value.
        value: String,
    },
    /// Binary file field, streamed in chunks.
    Bytes {
        /// Field name.
        name: String,
        /// File name reported to the server.
        filename: String,
        /// MIME type, omitted when `None`.
        content_type: Option<String>,
        /// File contents.
        data: Bytes,
    },
}

impl FormEntry {
    /// Creates a text field.
    #[must_use]
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Creates a binary file field without an explicit MIME type.
    #[must_use]
    pub fn bytes(
        name: impl Into<String>,
        filename: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self::Bytes {
            name: name.into(),
            filename: filename.into(),
            content_type: None,
            data: data.into(),
        }
    }
}

/// Authenticated JSON/binary client bound to one base URL.
///
/// Every verb resolves `endpoint` against the configured base URL, attaches
/// `Authorization: Bearer <token>` from the token provider, and rejects
/// responses with a status outside `200..400`.
pub struct RestClient {
    client: reqwest::Client,
    config: RestConfig,
    token_provider: Arc<dyn TokenProvider>,
    on_unauthorized: Option<UnauthorizedHook>,
}

impl RestClient {
    /// Creates a client from a configuration and token provider.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::Http`] when the HTTP client cannot be built.
    pub fn new(
        config: RestConfig,
        token_provider: Arc<dyn TokenProvider>,
    ) -> Result<Self, RestError> {
        let client = config.build_client()?;
        Ok(Self {
            client,
            config,
            token_provider,
            on_unauthorized: None,
        })
    }

    /// Installs an observer for 401/403 responses.
    ///
    /// The hook sees the status code before the error propagates; it cannot
    /// suppress the error.
    #[must_use]
    pub fn with_unauthorized_hook(mut self, hook: impl Fn(u16) + Send + Sync + 'static) -> Self {
        self.on_unauthorized = Some(Arc::new(hook));
        self
    }

    /// The configuration this client was built from.
    #[must_use]
    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    /// Fetches `endpoint` as JSON; an empty body becomes `{}`.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] on transport failure, rejected status, or a
    /// non-JSON body.
    pub async fn get(&self, endpoint: &str) -> Result<Value, RestError> {
        let response = self
            .complete(self.request(Method::GET, endpoint), "GET", endpoint)
            .await?;
        Self::json_body(response).await
    }

    /// Fetches `endpoint` and deserializes the JSON body into `T`.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get), plus [`RestError::Json`] when the body
    /// does not match `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, RestError> {
        let value = self.get(endpoint).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Fetches `endpoint` as raw text.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] on transport failure or rejected status.
    pub async fn get_text(&self, endpoint: &str) -> Result<String, RestError> {
        let response = self
            .complete(self.request(Method::GET, endpoint), "GET", endpoint)
            .await?;
        Ok(response.text().await?)
    }

    /// Posts `body` as JSON and returns the JSON response.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] on transport failure, rejected status, or a
    /// non-JSON body.
    pub async fn post<B>(&self, endpoint: &str, body: &B) -> Result<Value, RestError>
    where
        B: Serialize + ?Sized,
    {
        let request = self.request(Method::POST, endpoint).json(body);
        let response = self.complete(request, "POST", endpoint).await?;
        Self::json_body(response).await
    }

    /// Puts `body` as JSON.
    ///
    /// An HTTP 200 response returns the body as-is; any other success status
    /// is validated as a response envelope and unwrapped to its `content`.
    /// List-settings endpoints answer 200 with the raw payload, which is why
    /// that status bypasses validation.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] on transport failure, rejected status, non-JSON
    /// body, or a rejected envelope.
    pub async fn put<B>(&self, endpoint: &str, body: &B) -> Result<Value, RestError>
    where
        B: Serialize + ?Sized,
    {
        let request = self.request(Method::PUT, endpoint).json(body);
        let response = self.complete(request, "PUT", endpoint).await?;
        let status = response.status();
        let value = Self::json_body(response).await?;

        if status == StatusCode::OK {
            return Ok(value);
        }
        validate_envelope(value)
    }

    /// Patches `endpoint` with `body` as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] on transport failure, rejected status, or a
    /// non-JSON body.
    pub async fn patch<B>(&self, endpoint: &str, body: &B) -> Result<Value, RestError>
    where
        B: Serialize + ?Sized,
    {
        let request = self.request(Method::PATCH, endpoint).json(body);
        let response = self.complete(request, "PATCH", endpoint).await?;
        Self::json_body(response).await
    }

    /// Deletes `endpoint` and returns the JSON response.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] on transport failure, rejected status, or a
    /// non-JSON body.
    pub async fn delete(&self, endpoint: &str) -> Result<Value, RestError> {
        let response = self
            .complete(self.request(Method::DELETE, endpoint), "DELETE", endpoint)
            .await?;
        Self::json_body(response).await
    }

    /// Downloads `endpoint` into memory.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] on transport failure or rejected status.
    pub async fn download(&self, endpoint: &str) -> Result<Bytes, RestError> {
        let response = self
            .complete(self.request(Method::GET, endpoint), "GET", endpoint)
            .await?;
        Ok(response.bytes().await?)
    }

    /// Streams `endpoint` into `sink`, completing when the body is fully
    /// written and flushed.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] on transport failure, rejected status, or when
    /// the sink refuses a write.
    pub async fn download_file<W>(&self, endpoint: &str, sink: &mut W) -> Result<(), RestError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let response = self
            .complete(self.request(Method::GET, endpoint), "GET", endpoint)
            .await?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            sink.write_all(&chunk).await?;
        }
        sink.flush().await?;
        Ok(())
    }

    /// Uploads `entries` as a multipart form via PUT.
    ///
    /// Byte entries are streamed in chunks; `progress`, when present,
    /// observes the cumulative percentage as chunks are handed to the
    /// transport.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] on transport failure, rejected status, or a
    /// non-JSON body.
    pub async fn put_form(
        &self,
        endpoint: &str,
        entries: Vec<FormEntry>,
        progress: Option<UploadProgressCallback>,
    ) -> Result<Value, RestError> {
        let total: u64 = entries
            .iter()
            .map(|entry| match entry {
                FormEntry::Text { .. } => 0,
                FormEntry::Bytes { data, .. } => data.len() as u64,
            })
            .sum();
        let sent = Arc::new(AtomicU64::new(0));

        let mut form = reqwest::multipart::Form::new();
        for entry in entries {
            match entry {
                FormEntry::Text { name, value } => {
                    form = form.text(name, value);
                }
                FormEntry::Bytes {
                    name,
                    filename,
                    content_type,
                    data,
                } => {
                    let mut part = byte_part(data, total, sent.clone(), progress.clone())
                        .file_name(filename);
                    if let Some(mime) = content_type {
                        part = part.mime_str(&mime)?;
                    }
                    form = form.part(name, part);
                }
            }
        }

        let request = self.request(Method::PUT, endpoint).multipart(form);
        let response = self.complete(request, "PUT", endpoint).await?;
        Self::json_body(response).await
    }

    /// Builds an authenticated URL for endpoints consumed outside this
    /// client, appending the token as a query parameter.
    #[must_use]
    pub fn auth_url(&self, path: &str) -> String {
        let token = self.token_provider.token();
        if path.contains('?') {
            format!("{}&token=Bearer {}", path, token)
        } else {
            format!("{}?token=Bearer {}", path, token)
        }
    }

    fn request(&self, method: Method, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url, endpoint);
        self.client
            .request(method, url)
            .bearer_auth(self.token_provider.token())
    }

    async fn complete(
        &self,
        request: reqwest::RequestBuilder,
        method: &str,
        endpoint: &str,
    ) -> Result<reqwest::Response, RestError> {
        let request_id = Uuid::new_v4();
        debug!(
            request_id = %request_id,
            method = method,
            endpoint = endpoint,
            "dispatching request"
        );

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(
                    request_id = %request_id,
                    method = method,
                    endpoint = endpoint,
                    error = %err,
                    "request failed"
                );
                return Err(err.into());
            }
        };

        let status = response.status();

        if matches!(status.as_u16(), 401 | 403) {
            if let Some(hook) = &self.on_unauthorized {
                hook(status.as_u16());
            }
        }

        if TransportError::is_success_status(status.as_u16()) {
            Ok(response)
        } else {
            warn!(
                request_id = %request_id,
                method = method,
                endpoint = endpoint,
                status = status.as_u16(),
                "response status rejected"
            );
            Err(TransportError::from_status(status).into())
        }
    }

    async fn json_body(response: reqwest::Response) -> Result<Value, RestError> {
        let body = response.text().await?;
        if body.is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        Ok(serde_json::from_str(&body)?)
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.config.base_url)
            .field("has_unauthorized_hook", &self.on_unauthorized.is_some())
            .finish()
    }
}

fn byte_part(
    data: Bytes,
    total: u64,
    sent: Arc<AtomicU64>,
    progress: Option<UploadProgressCallback>,
) -> reqwest::multipart::Part {
    let length = data.len() as u64;
    let chunk_starts = (0..data.len()).step_by(UPLOAD_CHUNK_SIZE);
    let stream = futures::stream::iter(chunk_starts.map(move |start| {
        let end = (start + UPLOAD_CHUNK_SIZE).min(data.len());
        let chunk = data.slice(start..end);
        let done = sent.fetch_add(chunk.len() as u64, Ordering::SeqCst) + chunk.len() as u64;
        if let Some(callback) = &progress {
            callback(UploadProgress::from_counts(done, total));
        }
        Ok::<Bytes, std::io::Error>(chunk)
    }));

    reqwest::multipart::Part::stream_with_length(reqwest::Body::wrap_stream(stream), length)
}

/// Unwraps a response envelope to its `content` field.
///
/// A payload passes when it is an object carrying `result == 0` (any numeric
/// zero) or `success == true`; everything else is rejected with the payload
/// kept for diagnostics. Absent `content` yields `Value::Null`.
///
/// # Errors
///
/// Returns [`RestError::Envelope`] when the payload is not an accepted
/// envelope.
pub fn validate_envelope(payload: Value) -> Result<Value, RestError> {
    if !payload.is_object() {
        return Err(envelope_error("payload is not an object", payload));
    }

    if payload.get("result").is_none() && payload.get("success").is_none() {
        return Err(envelope_error(
            "payload carries neither result nor success",
            payload,
        ));
    }

    let result_ok = payload.get("result").and_then(Value::as_f64) == Some(0.0);
    let success_ok = payload.get("success").and_then(Value::as_bool) == Some(true);
    if !result_ok && !success_ok {
        return Err(envelope_error("server reported failure", payload));
    }

    Ok(payload.get("content").cloned().unwrap_or(Value::Null))
}

fn envelope_error(reason: &str, payload: Value) -> RestError {
    RestError::Envelope {
        reason: reason.to_string(),
        payload,
    }
}
