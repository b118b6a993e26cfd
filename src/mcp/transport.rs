//! HTTP+SSE transport for MCP.
//!
//! The client opens one long-lived `GET` on the server URL. The first event
//! on that stream (`endpoint`) names the URL to `POST` JSON-RPC messages to;
//! responses come back as `message` events on the stream, matched to the
//! waiting request by id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::{StatusCode, Url};
use serde::Serialize;
use rmcp::model::{ErrorCode, JsonObject};
use serde_json::{json, Value};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use super::protocol::{self, Incoming};
use super::sse::{SseEvent, SseParser};
use crate::constants::MCP_ENDPOINT_TIMEOUT_SECS;
use crate::tools::ToolSourceError;

type ResponseSender = oneshot::Sender<Result<Value, ToolSourceError>>;
type Pending = Arc<Mutex<HashMap<i64, ResponseSender>>>;

/// Sends JSON-RPC bodies to the message endpoint.
#[derive(Clone)]
struct Poster {
    http: reqwest::Client,
    auth_token: Option<String>,
}

impl Poster {
    async fn post(&self, url: &Url, body: &impl Serialize) -> Result<(), ToolSourceError> {
        let mut request = self.http.post(url.clone()).json(body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ToolSourceError::Connection(format!("POST {url}: {e}")))?;
        check_status(response.status(), url)
    }
}

/// Maps an HTTP status to the error the caller should see.
fn check_status(status: StatusCode, url: &Url) -> Result<(), ToolSourceError> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ToolSourceError::Authentication(format!(
            "{url} answered {status}"
        )));
    }
    if !status.is_success() {
        return Err(ToolSourceError::Connection(format!("{url} answered {status}")));
    }
    Ok(())
}

/// A connected SSE session.
pub struct SseTransport {
    poster: Poster,
    endpoint: Url,
    pending: Pending,
    /// Set by the reader once the event stream has ended.
    closed: Arc<AtomicBool>,
    next_id: AtomicI64,
    request_timeout: Duration,
    reader: JoinHandle<()>,
}

impl SseTransport {
    /// Opens the event stream and waits for the server to announce its
    /// message endpoint.
    pub async fn connect(
        server_url: &str,
        auth_token: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, ToolSourceError> {
        let url = Url::parse(server_url)
            .map_err(|e| ToolSourceError::Connection(format!("invalid server url {server_url}: {e}")))?;
        let poster = Poster {
            http: reqwest::Client::new(),
            auth_token,
        };

        let mut request = poster
            .http
            .get(url.clone())
            .header(ACCEPT, "text/event-stream");
        if let Some(token) = &poster.auth_token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ToolSourceError::Connection(format!("GET {url}: {e}")))?;
        check_status(response.status(), &url)?;

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let (endpoint_tx, endpoint_rx) = oneshot::channel();
        let reader = EventReader {
            base: url.clone(),
            endpoint: None,
            endpoint_tx: Some(endpoint_tx),
            pending: pending.clone(),
            closed: closed.clone(),
            poster: poster.clone(),
        };
        let reader = tokio::spawn(reader.run(Box::pin(response.bytes_stream())));

        let endpoint = match tokio::time::timeout(
            Duration::from_secs(MCP_ENDPOINT_TIMEOUT_SECS),
            endpoint_rx,
        )
        .await
        {
            Ok(Ok(endpoint)) => endpoint,
            Ok(Err(_)) => {
                return Err(ToolSourceError::Connection(format!(
                    "{url} closed the event stream before announcing an endpoint"
                )))
            }
            Err(_) => {
                reader.abort();
                return Err(ToolSourceError::Connection(format!(
                    "{url} sent no endpoint event within {MCP_ENDPOINT_TIMEOUT_SECS}s"
                )));
            }
        };
        tracing::debug!(%endpoint, "mcp message endpoint");

        Ok(Self {
            poster,
            endpoint,
            pending,
            closed,
            next_id: AtomicI64::new(1),
            request_timeout,
            reader,
        })
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Sends a request and waits for its response.
    ///
    /// Fails with [`ToolSourceError::Closed`] without sending anything once
    /// the event stream has ended.
    pub async fn request(&self, method: &str, params: JsonObject) -> Result<Value, ToolSourceError> {
        if self.is_closed() {
            return Err(ToolSourceError::Closed);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            // Checked under the lock the reader drains with
            if self.is_closed() {
                return Err(ToolSourceError::Closed);
            }
            pending.insert(id, tx);
        }

        tracing::debug!(id, method, "mcp request");
        let body = protocol::request(id, method, params);
        if let Err(e) = self.poster.post(&self.endpoint, &body).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ToolSourceError::Closed),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                if self.is_closed() {
                    return Err(ToolSourceError::Closed);
                }
                Err(ToolSourceError::Timeout {
                    method: method.to_string(),
                    secs: self.request_timeout.as_secs(),
                })
            }
        }
    }

    /// Sends a notification; the server sends nothing back.
    pub async fn notify(&self, method: &str, params: JsonObject) -> Result<(), ToolSourceError> {
        if self.is_closed() {
            return Err(ToolSourceError::Closed);
        }
        tracing::debug!(method, "mcp notification");
        self.poster
            .post(&self.endpoint, &protocol::notification(method, params))
            .await
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Background task draining the event stream.
struct EventReader {
    base: Url,
    endpoint: Option<Url>,
    endpoint_tx: Option<oneshot::Sender<Url>>,
    pending: Pending,
    closed: Arc<AtomicBool>,
    poster: Poster,
}

impl EventReader {
    async fn run<S, B>(mut self, mut stream: S)
    where
        S: futures::Stream<Item = Result<B, reqwest::Error>> + Unpin,
        B: AsRef<[u8]>,
    {
        let mut parser = SseParser::new();
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    tracing::warn!("mcp event stream failed: {e}");
                    break;
                }
            };
            for event in parser.feed(chunk.as_ref()) {
                self.handle_event(event).await;
            }
        }
        tracing::debug!("mcp event stream ended");

        // Dropping the senders fails every waiting request with `Closed`
        let mut pending = self.pending.lock().await;
        self.closed.store(true, Ordering::Release);
        pending.clear();
    }

    async fn handle_event(&mut self, event: SseEvent) {
        match event.event.as_str() {
            "endpoint" => match self.base.join(event.data.trim()) {
                Ok(url) => {
                    self.endpoint = Some(url.clone());
                    if let Some(tx) = self.endpoint_tx.take() {
                        let _ = tx.send(url);
                    }
                }
                Err(e) => tracing::warn!("ignoring bad endpoint {:?}: {e}", event.data),
            },
            "message" => match serde_json::from_str::<Value>(&event.data) {
                Ok(Value::Array(batch)) => {
                    for message in batch {
                        self.handle_message(message).await;
                    }
                }
                Ok(message) => self.handle_message(message).await,
                Err(e) => tracing::warn!("ignoring undecodable message: {e}"),
            },
            other => tracing::debug!(event = other, "ignoring sse event"),
        }
    }

    async fn handle_message(&mut self, message: Value) {
        match Incoming::parse(message) {
            Ok(Incoming::Response { id, result }) => {
                let waiter = self.pending.lock().await.remove(&id);
                match waiter {
                    Some(tx) => {
                        let result = result.map_err(|e| ToolSourceError::Rpc {
                            code: i64::from(e.code.0),
                            message: e.message.into_owned(),
                        });
                        let _ = tx.send(result);
                    }
                    None => tracing::debug!(id, "response for unknown request"),
                }
            }
            Ok(Incoming::Request { id, method }) => {
                let reply = if method == "ping" {
                    json!({"jsonrpc": "2.0", "id": id, "result": {}})
                } else {
                    json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "error": {
                            "code": ErrorCode::METHOD_NOT_FOUND.0,
                            "message": format!("method not found: {method}")
                        }
                    })
                };
                let Some(endpoint) = self.endpoint.clone() else {
                    tracing::warn!(method, "server request before endpoint; dropped");
                    return;
                };
                let poster = self.poster.clone();
                tokio::spawn(async move {
                    if let Err(e) = poster.post(&endpoint, &reply).await {
                        tracing::warn!("failed to answer server request: {e}");
                    }
                });
            }
            Ok(Incoming::Notification { method }) => {
                tracing::debug!(method, "mcp server notification");
            }
            Err(e) => tracing::warn!("ignoring malformed message: {e}"),
        }
    }
}
