use rust_mcp_schema::{
    ClientCapabilities, Implementation, InitializeRequestParams, RequestId, RpcError,
    LATEST_PROTOCOL_VERSION,
};
use serde::Deserialize;
use serde_json::{json, Value};

pub(crate) const MCP_METHOD_NOT_FOUND: i64 = -32601;
const PING_METHOD: &str = "ping";

/// A JSON-RPC message received over the SSE stream.
///
/// Decoded loosely so unknown result shapes still reach the caller intact.
#[derive(Debug, Deserialize)]
pub(crate) struct InboundMessage {
    #[serde(default)]
    pub id: Option<RequestId>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

pub(crate) enum Inbound {
    Response {
        id: RequestId,
        outcome: Result<Value, RpcError>,
    },
    ServerRequest {
        id: RequestId,
        method: String,
    },
    Notification {
        method: String,
    },
    Unroutable,
}

impl InboundMessage {
    pub(crate) fn classify(self) -> Inbound {
        match (self.id, self.method) {
            (Some(id), Some(method)) => Inbound::ServerRequest { id, method },
            (None, Some(method)) => Inbound::Notification { method },
            (Some(id), None) => match (self.error, self.result) {
                (Some(error), _) => Inbound::Response {
                    id,
                    outcome: Err(error),
                },
                (None, result) => Inbound::Response {
                    id,
                    outcome: Ok(result.unwrap_or(Value::Null)),
                },
            },
            (None, None) => Inbound::Unroutable,
        }
    }
}

/// Decodes one `message` event payload. Batches are flattened.
pub(crate) fn parse_inbound(payload: &str) -> Result<Vec<InboundMessage>, String> {
    let value: Value = serde_json::from_str(payload).map_err(|err| err.to_string())?;
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(|err| err.to_string()))
            .collect(),
        other => serde_json::from_value(other)
            .map(|message| vec![message])
            .map_err(|err| err.to_string()),
    }
}

/// Reply the client owes for a request the server initiated. Only `ping` is
/// supported; everything else is declined.
pub(crate) fn server_request_reply(id: &RequestId, method: &str) -> Value {
    if method == PING_METHOD {
        json!({"jsonrpc": "2.0", "id": id, "result": {}})
    } else {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {
                "code": MCP_METHOD_NOT_FOUND,
                "message": format!("Method not found: {method}"),
            }
        })
    }
}

pub(crate) fn client_details() -> InitializeRequestParams {
    InitializeRequestParams {
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: Some("Metasploit MCP bridge".to_string()),
            description: Some("Operator shell for Metasploit MCP and Ollama".to_string()),
            icons: Vec::new(),
            website_url: None,
        },
        meta: None,
        protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// The parts of an `initialize` result the bridge cares about.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerHandshake {
    pub protocol_version: String,
    #[serde(default)]
    pub server_info: Option<ServerInfo>,
}

pub(crate) fn parse_handshake(value: Value) -> Result<ServerHandshake, String> {
    let handshake =
        serde_json::from_value::<ServerHandshake>(value).map_err(|err| err.to_string())?;
    if handshake.protocol_version.trim().is_empty() {
        return Err("Unexpected initialize response.".to_string());
    }
    Ok(handshake)
}

pub(crate) fn format_rpc_error(error: &RpcError) -> String {
    let mut output = format!("MCP error {}: {}", error.code, error.message);
    if let Some(data) = &error.data {
        let details = data
            .get("details")
            .and_then(|value| value.as_str())
            .map(|value| value.to_string())
            .or_else(|| data.as_str().map(|value| value.to_string()))
            .or_else(|| serde_json::to_string_pretty(data).ok());

        if let Some(details) = details {
            if !details.is_empty() {
                output.push('\n');
                output.push_str(&details);
            }
        }
    }
    output
}
