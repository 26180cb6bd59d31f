//! Scoped tool-server session: connect, handshake, hand off, tear down.

use crate::core::config::BridgeConfig;
use crate::mcp::client::protocol::{client_details, parse_handshake};
use crate::mcp::client::{ServerHandshake, SseClient};
use crate::mcp::tools::{
    ToolArguments, ToolCallResult, ToolDescriptor, ToolPage, ToolSession, MAX_TOOL_LIST,
};
use crate::mcp::transport::SessionError;
use async_trait::async_trait;
use rust_mcp_schema::schema_utils::{NotificationFromClient, RequestFromClient};
use rust_mcp_schema::{CallToolRequestParams, PaginatedRequestParams};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

/// A handshake-initialized connection to the tool server.
pub struct McpSession {
    client: SseClient,
    handshake: ServerHandshake,
    url: String,
}

impl McpSession {
    pub async fn open(config: &BridgeConfig) -> Result<Self, SessionError> {
        let client =
            SseClient::connect(&config.mcp_url, config.mcp_timeout, config.mcp_sse_timeout)
                .await?;
        match initialize(&client).await {
            Ok(handshake) => {
                info!(
                    url = %config.mcp_url,
                    endpoint = %client.endpoint(),
                    protocol_version = %handshake.protocol_version,
                    server = ?handshake.server_info.as_ref().map(|info| info.name.as_str()),
                    "MCP session ready"
                );
                Ok(Self {
                    client,
                    handshake,
                    url: config.mcp_url.clone(),
                })
            }
            Err(err) => {
                client.close().await;
                Err(err)
            }
        }
    }

    pub fn handshake(&self) -> &ServerHandshake {
        &self.handshake
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    /// Tears the transport down. Only the first call does anything.
    pub async fn close(&self) -> bool {
        let closed = self.client.close().await;
        if closed {
            debug!(url = %self.url, "MCP session closed");
        }
        closed
    }
}

async fn initialize(client: &SseClient) -> Result<ServerHandshake, SessionError> {
    let result = client
        .send_request(
            "initialize",
            RequestFromClient::InitializeRequest(client_details()),
        )
        .await
        .map_err(handshake_error)?;
    let handshake = parse_handshake(result).map_err(SessionError::Handshake)?;
    client
        .send_notification(NotificationFromClient::InitializedNotification(None))
        .await
        .map_err(handshake_error)?;
    Ok(handshake)
}

fn handshake_error(err: SessionError) -> SessionError {
    match err {
        SessionError::Disconnected => SessionError::Disconnected,
        SessionError::Handshake(message) => SessionError::Handshake(message),
        other => SessionError::Handshake(other.to_string()),
    }
}

#[async_trait]
impl ToolSession for McpSession {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, SessionError> {
        let mut tools: Vec<ToolDescriptor> = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = cursor.take().map(|cursor| PaginatedRequestParams {
                cursor: Some(cursor),
                meta: None,
            });
            let result = self
                .client
                .send_request("tools/list", RequestFromClient::ListToolsRequest(params))
                .await?;
            let page: ToolPage = serde_json::from_value(result).map_err(|err| {
                SessionError::Protocol(format!("Invalid tools/list response: {err}"))
            })?;

            let page_was_empty = page.tools.is_empty();
            tools.extend(page.tools);
            if tools.len() >= MAX_TOOL_LIST {
                tools.truncate(MAX_TOOL_LIST);
                break;
            }
            match page.next_cursor {
                Some(next) if !next.is_empty() && !page_was_empty => cursor = Some(next),
                _ => break,
            }
        }
        debug!(count = tools.len(), "Listed MCP tools");
        Ok(tools)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: ToolArguments,
    ) -> Result<ToolCallResult, SessionError> {
        let params = CallToolRequestParams::new(name).with_arguments(arguments);
        let result = self
            .client
            .send_request("tools/call", RequestFromClient::CallToolRequest(params))
            .await?;
        serde_json::from_value(result)
            .map_err(|err| SessionError::Protocol(format!("Invalid tools/call response: {err}")))
    }
}

/// Opens a session, runs `handler` with it, and closes the transport before
/// returning whatever the handler produced.
///
/// If the returned future is dropped mid-handler, dropping the session stops
/// the stream reader, so the connection is still released.
pub async fn with_session<T, F, Fut>(config: &BridgeConfig, handler: F) -> Result<T, SessionError>
where
    F: FnOnce(Arc<McpSession>) -> Fut,
    Fut: Future<Output = T>,
{
    let session = Arc::new(McpSession::open(config).await?);
    let output = handler(session.clone()).await;
    session.close().await;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ConfigOverrides;
    use crate::utils::test_utils::{
        disable_proxies, initialize_result, jsonrpc_error, jsonrpc_result, standard_responder,
        MockMcpServer,
    };
    use serde_json::{json, Value};
    use std::time::Duration;

    fn config_for(server: &MockMcpServer) -> BridgeConfig {
        let overrides = ConfigOverrides {
            mcp_url: Some(server.sse_url()),
            mcp_timeout: Some(5.0),
            mcp_sse_timeout: Some(5.0),
            ..ConfigOverrides::default()
        };
        BridgeConfig::resolve_with(&overrides, |_| None).expect("config should resolve")
    }

    #[tokio::test]
    async fn with_session_handshakes_then_closes() {
        disable_proxies();
        let mut server = MockMcpServer::start(standard_responder(json!([
            {"name": "list_exploits", "description": "Search exploits"},
            {"name": "run_exploit"}
        ])))
        .await;
        let config = config_for(&server);

        let tools = with_session(&config, |session| async move {
            assert!(session.is_connected());
            assert_eq!(session.handshake().protocol_version, "2024-11-05");
            session.list_tools().await
        })
        .await
        .expect("session should open")
        .expect("listing should succeed");

        assert_eq!(
            tools,
            vec![
                ToolDescriptor::new("list_exploits", Some("Search exploits")),
                ToolDescriptor::new("run_exploit", None),
            ]
        );
        assert_eq!(
            server.received_methods().await,
            vec!["initialize", "notifications/initialized", "tools/list"]
        );
        assert!(server.wait_for_stream_close().await);
    }

    #[tokio::test]
    async fn handler_failures_still_close_the_session() {
        disable_proxies();
        let mut server = MockMcpServer::start(standard_responder(json!([]))).await;
        let config = config_for(&server);

        let output: Result<(), String> = with_session(&config, |_session| async move {
            Err("handler failed".to_string())
        })
        .await
        .expect("session should open");

        assert_eq!(output, Err("handler failed".to_string()));
        assert!(server.wait_for_stream_close().await);
    }

    #[tokio::test]
    async fn failed_handshake_is_fatal_and_releases_the_stream() {
        disable_proxies();
        let mut server = MockMcpServer::start(Arc::new(|request: &Value| {
            vec![jsonrpc_error(request, -32603, "not ready")]
        }))
        .await;
        let config = config_for(&server);

        let err = with_session(&config, |_session| async move {})
            .await
            .expect_err("handshake should fail");
        assert!(matches!(err, SessionError::Handshake(ref message) if message.contains("not ready")));
        assert!(err.is_fatal());
        assert!(server.wait_for_stream_close().await);
    }

    #[tokio::test]
    async fn connect_failure_is_fatal() {
        disable_proxies();
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let overrides = ConfigOverrides {
            mcp_url: Some(format!("http://{addr}/sse")),
            mcp_timeout: Some(2.0),
            ..ConfigOverrides::default()
        };
        let config =
            BridgeConfig::resolve_with(&overrides, |_| None).expect("config should resolve");

        let err = with_session(&config, |_session| async move {})
            .await
            .expect_err("connect should fail");
        assert!(matches!(err, SessionError::Connect(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn list_tools_follows_cursors() {
        disable_proxies();
        let server = MockMcpServer::start(Arc::new(|request: &Value| {
            match request["method"].as_str() {
                Some("initialize") => vec![jsonrpc_result(request, initialize_result())],
                Some("tools/list") => match request["params"]["cursor"].as_str() {
                    None => vec![jsonrpc_result(
                        request,
                        json!({"tools": [{"name": "a"}], "nextCursor": "page-2"}),
                    )],
                    Some("page-2") => {
                        vec![jsonrpc_result(request, json!({"tools": [{"name": "b"}]}))]
                    }
                    Some(_) => vec![jsonrpc_error(request, -32602, "bad cursor")],
                },
                _ => Vec::new(),
            }
        }))
        .await;
        let config = config_for(&server);

        let names = with_session(&config, |session| async move {
            session
                .list_tools()
                .await
                .map(|tools| tools.into_iter().map(|tool| tool.name).collect::<Vec<_>>())
        })
        .await
        .expect("session should open")
        .expect("listing should succeed");
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn list_tools_is_capped() {
        disable_proxies();
        let server = MockMcpServer::start(Arc::new(|request: &Value| {
            match request["method"].as_str() {
                Some("initialize") => vec![jsonrpc_result(request, initialize_result())],
                Some("tools/list") => {
                    let tools: Vec<Value> = (0..60)
                        .map(|index| json!({"name": format!("tool-{index}")}))
                        .collect();
                    vec![jsonrpc_result(
                        request,
                        json!({"tools": tools, "nextCursor": "again"}),
                    )]
                }
                _ => Vec::new(),
            }
        }))
        .await;
        let config = config_for(&server);

        let count = with_session(&config, |session| async move {
            session.list_tools().await.map(|tools| tools.len())
        })
        .await
        .expect("session should open")
        .expect("listing should succeed");
        assert_eq!(count, MAX_TOOL_LIST);
    }

    #[tokio::test]
    async fn call_tool_always_sends_an_arguments_object() {
        disable_proxies();
        let server = MockMcpServer::start(standard_responder(json!([]))).await;
        let config = config_for(&server);

        let result = with_session(&config, |session| async move {
            session.call_tool("list_active_sessions", ToolArguments::new()).await
        })
        .await
        .expect("session should open")
        .expect("call should succeed");

        assert!(!result.is_error());
        assert_eq!(
            result.content,
            vec![json!({"type": "text", "text": "list_active_sessions {}"})]
        );

        let call = server
            .received()
            .await
            .into_iter()
            .find(|message| message["method"] == json!("tools/call"))
            .expect("tools/call should be sent");
        assert_eq!(call["params"]["name"], json!("list_active_sessions"));
        assert_eq!(call["params"]["arguments"], json!({}));
    }

    #[tokio::test]
    async fn dropped_stream_surfaces_as_disconnect() {
        disable_proxies();
        let server = MockMcpServer::start(standard_responder(json!([]))).await;
        let config = config_for(&server);

        let err = with_session(&config, |session| {
            let server = &server;
            async move {
                server.hang_up();
                while session.is_connected() {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                session.list_tools().await
            }
        })
        .await
        .expect("session should open")
        .expect_err("listing should fail after hang-up");
        assert_eq!(err, SessionError::Disconnected);
        assert!(err.is_fatal());
    }
}
