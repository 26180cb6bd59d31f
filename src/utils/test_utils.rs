//! Shared helpers for tests that talk to throwaway local HTTP servers.

use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

/// One request as seen by the mock server.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json_body(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("request body should be JSON")
    }
}

/// Keeps reqwest from routing loopback traffic through a proxy configured in
/// the test environment.
pub fn disable_proxies() {
    for var in [
        "HTTP_PROXY",
        "http_proxy",
        "HTTPS_PROXY",
        "https_proxy",
        "ALL_PROXY",
        "all_proxy",
    ] {
        std::env::remove_var(var);
    }
    std::env::set_var("NO_PROXY", "*");
    std::env::set_var("no_proxy", "*");
}

pub async fn read_http_request(stream: &mut TcpStream) -> Result<CapturedRequest, String> {
    let mut buffer = Vec::new();
    let mut header_end = None;
    while header_end.is_none() {
        let mut chunk = [0_u8; 1024];
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP headers".to_string());
        }
        buffer.extend_from_slice(&chunk[..read]);
        header_end = buffer
            .windows(4)
            .position(|window| window == b"\r\n\r\n")
            .map(|index| index + 4);
    }

    let header_end = header_end.expect("header end should exist");
    let header_text =
        std::str::from_utf8(&buffer[..header_end]).map_err(|err| err.to_string())?;
    let mut lines = header_text.split("\r\n").filter(|line| !line.is_empty());
    let request_line = lines
        .next()
        .ok_or_else(|| "Missing HTTP request line".to_string())?
        .to_string();

    let mut headers = Vec::new();
    let mut content_length = 0_usize;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().to_string();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse::<usize>().map_err(|err| err.to_string())?;
        }
        headers.push((name.to_string(), value));
    }

    let mut body = buffer[header_end..].to_vec();
    while body.len() < content_length {
        let mut chunk = vec![0_u8; content_length - body.len()];
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP body".to_string());
        }
        body.extend_from_slice(&chunk[..read]);
    }
    body.truncate(content_length);

    Ok(CapturedRequest {
        request_line,
        headers,
        body,
    })
}

/// Formats a complete HTTP/1.1 response that closes the connection.
pub fn http_response(status: &str, content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\ncontent-type: {content_type}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    )
}

/// Serves exactly one request with a canned response and hands back what the
/// client sent.
pub async fn serve_once(response: String) -> (SocketAddr, JoinHandle<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("local addr should resolve");
    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("client should connect");
        let request = read_http_request(&mut stream)
            .await
            .expect("request should parse");
        stream
            .write_all(response.as_bytes())
            .await
            .expect("response should write");
        let _ = stream.shutdown().await;
        request
    });
    (addr, handle)
}

enum SseCommand {
    Event(String),
    HangUp,
}

/// Replies the mock tool server pushes onto the SSE stream for one POSTed
/// message.
pub type McpResponder = Arc<dyn Fn(&Value) -> Vec<Value> + Send + Sync>;

/// Minimal MCP HTTP+SSE server: one event stream plus a message endpoint.
pub struct MockMcpServer {
    pub addr: SocketAddr,
    received: Arc<Mutex<Vec<Value>>>,
    events: mpsc::UnboundedSender<SseCommand>,
    stream_closed: Option<oneshot::Receiver<()>>,
}

impl MockMcpServer {
    pub async fn start(responder: McpResponder) -> Self {
        Self::start_with_endpoint(responder, "/messages/?session_id=test").await
    }

    pub async fn start_with_endpoint(responder: McpResponder, endpoint: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let addr = listener.local_addr().expect("local addr should resolve");
        let received = Arc::new(Mutex::new(Vec::new()));
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = oneshot::channel();

        let endpoint = endpoint.to_string();
        let received_for_server = received.clone();
        let events_for_server = events_tx.clone();
        tokio::spawn(async move {
            let mut events_rx = Some(events_rx);
            let mut closed_tx = Some(closed_tx);
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                let Ok(request) = read_http_request(&mut stream).await else {
                    continue;
                };
                if request.request_line.starts_with("GET ") {
                    if let (Some(rx), Some(closed)) = (events_rx.take(), closed_tx.take()) {
                        tokio::spawn(serve_event_stream(stream, endpoint.clone(), rx, closed));
                    }
                    continue;
                }

                let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
                received_for_server.lock().await.push(body.clone());
                let _ = stream
                    .write_all(http_response("202 Accepted", "text/plain", "Accepted").as_bytes())
                    .await;
                let _ = stream.shutdown().await;
                for reply in responder(&body) {
                    let _ = events_for_server.send(SseCommand::Event(format!(
                        "event: message\ndata: {reply}\n\n"
                    )));
                }
            }
        });

        Self {
            addr,
            received,
            events: events_tx,
            stream_closed: Some(closed_rx),
        }
    }

    pub fn sse_url(&self) -> String {
        format!("http://{}/sse", self.addr)
    }

    /// Every JSON-RPC message the client has POSTed so far.
    pub async fn received(&self) -> Vec<Value> {
        self.received.lock().await.clone()
    }

    pub async fn received_methods(&self) -> Vec<String> {
        self.received()
            .await
            .iter()
            .filter_map(|message| message["method"].as_str().map(str::to_string))
            .collect()
    }

    /// Pushes a raw SSE frame to the client.
    pub fn push_raw(&self, frame: &str) {
        let _ = self.events.send(SseCommand::Event(frame.to_string()));
    }

    /// Ends the event stream from the server side.
    pub fn hang_up(&self) {
        let _ = self.events.send(SseCommand::HangUp);
    }

    /// Resolves once the client has dropped the event stream.
    pub async fn wait_for_stream_close(&mut self) -> bool {
        let Some(closed) = self.stream_closed.take() else {
            return true;
        };
        tokio::time::timeout(Duration::from_secs(5), closed)
            .await
            .is_ok()
    }
}

async fn serve_event_stream(
    mut stream: TcpStream,
    endpoint: String,
    mut events: mpsc::UnboundedReceiver<SseCommand>,
    closed: oneshot::Sender<()>,
) {
    let head = "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ncache-control: no-cache\r\nconnection: close\r\n\r\n";
    let announce = format!("event: endpoint\ndata: {endpoint}\n\n");
    if stream.write_all(head.as_bytes()).await.is_ok()
        && stream.write_all(announce.as_bytes()).await.is_ok()
    {
        let mut probe = [0_u8; 256];
        loop {
            tokio::select! {
                command = events.recv() => match command {
                    Some(SseCommand::Event(frame)) => {
                        if stream.write_all(frame.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                    Some(SseCommand::HangUp) | None => break,
                },
                read = stream.read(&mut probe) => match read {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                },
            }
        }
    }
    let _ = stream.shutdown().await;
    let _ = closed.send(());
}

pub fn jsonrpc_result(request: &Value, result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": request["id"].clone(), "result": result})
}

pub fn jsonrpc_error(request: &Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": request["id"].clone(),
        "error": {"code": code, "message": message}
    })
}

pub fn initialize_result() -> Value {
    json!({
        "protocolVersion": "2024-11-05",
        "capabilities": {"tools": {"listChanged": false}},
        "serverInfo": {"name": "MetasploitMCP", "version": "1.0.0"}
    })
}

/// Responder covering the handshake, one page of `tools`, and a `tools/call`
/// that echoes its arguments back as a text block.
pub fn standard_responder(tools: Value) -> McpResponder {
    Arc::new(move |request: &Value| match request["method"].as_str() {
        Some("initialize") => vec![jsonrpc_result(request, initialize_result())],
        Some("tools/list") => vec![jsonrpc_result(request, json!({"tools": tools.clone()}))],
        Some("tools/call") => {
            let params = &request["params"];
            let text = format!(
                "{} {}",
                params["name"].as_str().unwrap_or_default(),
                params["arguments"]
            );
            vec![jsonrpc_result(
                request,
                json!({"content": [{"type": "text", "text": text}], "isError": false}),
            )]
        }
        _ => Vec::new(),
    })
}
