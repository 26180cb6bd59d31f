//! Tool metadata, call results, and the capability the command layer uses to
//! reach the tool server.

use crate::mcp::transport::SessionError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::error::Error as StdError;
use std::fmt;

/// Upper bound on tools collected across `tools/list` pages.
pub const MAX_TOOL_LIST: usize = 100;

/// Untyped key/value arguments for `tools/call`.
pub type ToolArguments = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: Option<&str>) -> Self {
        Self {
            name: name.into(),
            description: description.map(str::to_string),
        }
    }
}

/// One `tools/list` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ToolPage {
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Result of `tools/call`. Content blocks stay as raw JSON so nothing the
/// server sent is lost in rendering.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    #[serde(default)]
    pub content: Vec<Value>,
    #[serde(default)]
    pub is_error: Option<bool>,
    #[serde(default)]
    pub structured_content: Option<Map<String, Value>>,
    #[serde(default, rename = "_meta")]
    pub meta: Option<Map<String, Value>>,
}

impl ToolCallResult {
    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }
}

/// What the command layer needs from a live tool-server session.
#[async_trait]
pub trait ToolSession: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, SessionError>;

    async fn call_tool(
        &self,
        name: &str,
        arguments: ToolArguments,
    ) -> Result<ToolCallResult, SessionError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentsError {
    InvalidJson(String),
    NotAnObject,
}

impl fmt::Display for ArgumentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentsError::InvalidJson(message) => {
                write!(f, "Unable to parse JSON arguments: {message}")
            }
            ArgumentsError::NotAnObject => write!(f, "Tool arguments must be a JSON object."),
        }
    }
}

impl StdError for ArgumentsError {}

/// Parses operator-supplied argument text. Blank text is an explicit empty
/// mapping; anything else must be a JSON object.
pub fn parse_tool_arguments(raw: &str) -> Result<ToolArguments, ArgumentsError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(ToolArguments::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ArgumentsError::NotAnObject),
        Err(err) => Err(ArgumentsError::InvalidJson(err.to_string())),
    }
}
