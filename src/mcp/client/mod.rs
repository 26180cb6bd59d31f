//! JSON-RPC client over the MCP HTTP+SSE transport.
//!
//! The client opens a long-lived `GET` on the SSE URL and waits for the
//! server's `endpoint` event. Every outgoing message is then `POST`ed to that
//! endpoint, and responses come back as `message` events on the stream,
//! matched to their callers by request id. A background reader owns the
//! stream; when it ends, every waiter is released with
//! [`SessionError::Disconnected`].

use crate::mcp::transport::sse::{is_event_stream_content_type, SseEvent, SseEventBuffer};
use crate::mcp::transport::{SessionError, MCP_JSON_CONTENT_TYPE, MCP_SSE_ACCEPT};
use futures_util::{Stream, StreamExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Url;
use rust_mcp_schema::schema_utils::{
    ClientMessage, FromMessage, MessageFromClient, NotificationFromClient, RequestFromClient,
};
use rust_mcp_schema::{RequestId, RpcError};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub(crate) mod protocol;

pub use protocol::{ServerHandshake, ServerInfo};
use protocol::{format_rpc_error, parse_inbound, server_request_reply, Inbound};

type PendingMap = Arc<Mutex<HashMap<RequestId, oneshot::Sender<Result<Value, RpcError>>>>>;

/// Where and how to POST. Shared with the reader so it can answer pings.
#[derive(Clone)]
struct PostTarget {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl PostTarget {
    async fn post(&self, payload: String) -> Result<(), SessionError> {
        let response = self
            .http
            .post(&self.endpoint)
            .timeout(self.timeout)
            .header(CONTENT_TYPE, MCP_JSON_CONTENT_TYPE)
            .body(payload)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    SessionError::Timeout("the MCP server to accept a message".to_string())
                } else {
                    SessionError::Protocol(err.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = body.trim();
            return Err(SessionError::Protocol(if body.is_empty() {
                format!("MCP server rejected message: HTTP {status}")
            } else {
                format!("MCP server rejected message: HTTP {status}: {body}")
            }));
        }
        Ok(())
    }
}

pub struct SseClient {
    target: PostTarget,
    response_timeout: Duration,
    next_request_id: AtomicI64,
    pending: PendingMap,
    connected: Arc<AtomicBool>,
    closed: AtomicBool,
    cancel: CancellationToken,
    reader: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl SseClient {
    /// Opens the SSE stream at `url` and waits for the message endpoint.
    ///
    /// `timeout` bounds the connect phase and every later POST;
    /// `read_timeout` bounds how long the stream may stay silent and how long
    /// a request waits for its response.
    pub async fn connect(
        url: &str,
        timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, SessionError> {
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|err| SessionError::Connect(err.to_string()))?;

        debug!(url = %url, "Opening MCP SSE stream");
        let request = http.get(url).header(ACCEPT, MCP_SSE_ACCEPT).send();
        let response = tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| SessionError::Connect(format!("timed out connecting to {url}")))?
            .map_err(|err| SessionError::Connect(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::Connect(format!("HTTP {status} from {url}")));
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !is_event_stream_content_type(&content_type) {
            return Err(SessionError::Connect(format!(
                "expected text/event-stream from {url}, got '{content_type}'"
            )));
        }

        let mut stream = response.bytes_stream().boxed();
        let mut buffer = SseEventBuffer::default();
        let endpoint = tokio::time::timeout(timeout, wait_for_endpoint(&mut stream, &mut buffer))
            .await
            .map_err(|_| SessionError::Connect("no endpoint event from MCP server".to_string()))??;
        let endpoint = resolve_endpoint(url, &endpoint)?;
        debug!(endpoint = %endpoint, "MCP message endpoint announced");

        let target = PostTarget {
            http,
            endpoint,
            timeout,
        };
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let connected = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();

        let reader = tokio::spawn(read_events(
            stream,
            buffer,
            ReaderContext {
                pending: pending.clone(),
                connected: connected.clone(),
                cancel: cancel.clone(),
                idle_timeout: read_timeout,
                target: target.clone(),
            },
        ));

        Ok(Self {
            target,
            response_timeout: read_timeout,
            next_request_id: AtomicI64::new(0),
            pending,
            connected,
            closed: AtomicBool::new(false),
            cancel,
            reader: std::sync::Mutex::new(Some(reader)),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.target.endpoint
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn next_request_id(&self) -> RequestId {
        let id = self.next_request_id.fetch_add(1, Ordering::SeqCst);
        RequestId::Integer(id)
    }

    /// Sends `request` and waits for the matching response on the stream.
    pub async fn send_request(
        &self,
        method: &str,
        request: RequestFromClient,
    ) -> Result<Value, SessionError> {
        let request_id = self.next_request_id();
        let message = ClientMessage::from_message(
            MessageFromClient::RequestFromClient(request),
            Some(request_id.clone()),
        )
        .map_err(|err| SessionError::Protocol(err.to_string()))?;
        let payload =
            serde_json::to_string(&message).map_err(|err| SessionError::Protocol(err.to_string()))?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(request_id.clone(), tx);
        // The reader flips `connected` before draining the map, so a request
        // registered after the drain is caught here.
        if !self.is_connected() {
            self.pending.lock().await.remove(&request_id);
            return Err(SessionError::Disconnected);
        }

        debug!(request_id = ?request_id, method = %method, "Sending MCP request");
        if let Err(err) = self.target.post(payload).await {
            self.pending.lock().await.remove(&request_id);
            return Err(err);
        }

        match tokio::time::timeout(self.response_timeout, rx).await {
            Err(_) => {
                self.pending.lock().await.remove(&request_id);
                debug!(request_id = ?request_id, method = %method, "MCP request timed out");
                Err(SessionError::Timeout(format!("{method} response")))
            }
            Ok(Err(_)) => Err(SessionError::Disconnected),
            Ok(Ok(Ok(result))) => {
                debug!(request_id = ?request_id, "MCP response received");
                Ok(result)
            }
            Ok(Ok(Err(error))) => {
                debug!(request_id = ?request_id, code = error.code, "MCP error received");
                Err(SessionError::Rpc(format_rpc_error(&error)))
            }
        }
    }

    pub async fn send_notification(
        &self,
        notification: NotificationFromClient,
    ) -> Result<(), SessionError> {
        if !self.is_connected() {
            return Err(SessionError::Disconnected);
        }
        let message = ClientMessage::from_message(
            MessageFromClient::NotificationFromClient(notification),
            None,
        )
        .map_err(|err| SessionError::Protocol(err.to_string()))?;
        let payload =
            serde_json::to_string(&message).map_err(|err| SessionError::Protocol(err.to_string()))?;
        self.target.post(payload).await
    }

    /// Stops the reader and drops the SSE stream. Returns false when the
    /// client was already closed.
    pub async fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        debug!(endpoint = %self.target.endpoint, "Closing MCP SSE stream");
        self.cancel.cancel();
        let reader = match self.reader.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(reader) = reader {
            let _ = reader.await;
        }
        self.connected.store(false, Ordering::SeqCst);
        self.pending.lock().await.clear();
        true
    }
}

impl Drop for SseClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn wait_for_endpoint<S, B, E>(
    stream: &mut S,
    buffer: &mut SseEventBuffer,
) -> Result<String, SessionError>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
{
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| SessionError::Connect(err.to_string()))?;
        for event in buffer.push(chunk.as_ref()) {
            if event.is_endpoint() {
                return Ok(event.data.trim().to_string());
            }
            debug!(event = ?event.event, "Ignoring SSE event before endpoint");
        }
    }
    Err(SessionError::Connect(
        "MCP server closed the stream before announcing an endpoint".to_string(),
    ))
}

/// Joins the announced endpoint against the SSE URL and refuses endpoints on
/// another origin.
pub(crate) fn resolve_endpoint(sse_url: &str, announced: &str) -> Result<String, SessionError> {
    let base = Url::parse(sse_url).map_err(|err| SessionError::Connect(err.to_string()))?;
    let endpoint = base
        .join(announced)
        .map_err(|err| SessionError::Connect(format!("invalid endpoint '{announced}': {err}")))?;
    if endpoint.origin() != base.origin() {
        return Err(SessionError::Connect(format!(
            "endpoint origin does not match connection origin: {endpoint}"
        )));
    }
    Ok(endpoint.to_string())
}

struct ReaderContext {
    pending: PendingMap,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
    idle_timeout: Duration,
    target: PostTarget,
}

async fn read_events<S, B, E>(mut stream: S, mut buffer: SseEventBuffer, context: ReaderContext)
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
{
    loop {
        let next = tokio::select! {
            _ = context.cancel.cancelled() => break,
            next = tokio::time::timeout(context.idle_timeout, stream.next()) => next,
        };
        match next {
            Err(_) => {
                warn!(
                    idle_secs = context.idle_timeout.as_secs(),
                    "MCP SSE stream idle past read timeout"
                );
                break;
            }
            Ok(None) => {
                if let Some(event) = buffer.finish() {
                    dispatch_event(&context, event).await;
                }
                debug!("MCP SSE stream ended");
                break;
            }
            Ok(Some(Err(err))) => {
                warn!(error = %err, "MCP SSE stream failed");
                break;
            }
            Ok(Some(Ok(chunk))) => {
                for event in buffer.push(chunk.as_ref()) {
                    dispatch_event(&context, event).await;
                }
            }
        }
    }

    context.connected.store(false, Ordering::SeqCst);
    context.pending.lock().await.clear();
}

async fn dispatch_event(context: &ReaderContext, event: SseEvent) {
    if !event.is_message() {
        debug!(event = ?event.event, "Ignoring SSE event");
        return;
    }
    let messages = match parse_inbound(&event.data) {
        Ok(messages) => messages,
        Err(err) => {
            warn!(error = %err, "Discarding undecodable MCP message");
            return;
        }
    };

    for message in messages {
        match message.classify() {
            Inbound::Response { id, outcome } => {
                match context.pending.lock().await.remove(&id) {
                    Some(tx) => {
                        let _ = tx.send(outcome);
                    }
                    None => debug!(response_id = ?id, "Dropping response with no waiter"),
                }
            }
            Inbound::ServerRequest { id, method } => {
                debug!(request_id = ?id, method = %method, "Received MCP server request");
                let reply = server_request_reply(&id, &method).to_string();
                let target = context.target.clone();
                tokio::spawn(async move {
                    if let Err(err) = target.post(reply).await {
                        debug!(error = %err, "Failed to answer MCP server request");
                    }
                });
            }
            Inbound::Notification { method } => {
                debug!(method = %method, "Received MCP notification");
            }
            Inbound::Unroutable => debug!("Dropping MCP message without id or method"),
        }
    }
}
