//! Transport-level types shared by the SSE client and the session layer.

use std::error::Error as StdError;
use std::fmt;

pub mod sse;

pub const MCP_JSON_CONTENT_TYPE: &str = "application/json";
pub const MCP_SSE_ACCEPT: &str = "text/event-stream";

/// Failures raised while talking to the tool server.
///
/// Fatal variants mean the connection is unusable and the interactive loop
/// must end; the rest are scoped to the single request that raised them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The SSE stream could not be opened or never announced its endpoint.
    Connect(String),
    /// `initialize` failed or returned something unusable.
    Handshake(String),
    /// No response arrived within the configured window.
    Timeout(String),
    /// The SSE stream ended or the client was closed.
    Disconnected,
    /// The server answered with a JSON-RPC error.
    Rpc(String),
    /// The POST failed or a response could not be decoded.
    Protocol(String),
}

impl SessionError {
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SessionError::Connect(_) | SessionError::Handshake(_) | SessionError::Disconnected
        )
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Connect(message) => {
                write!(f, "Unable to connect to MCP server: {message}")
            }
            SessionError::Handshake(message) => write!(f, "MCP handshake failed: {message}"),
            SessionError::Timeout(what) => write!(f, "Timed out waiting for {what}."),
            SessionError::Disconnected => write!(f, "MCP server connection closed."),
            SessionError::Rpc(message) | SessionError::Protocol(message) => {
                write!(f, "{message}")
            }
        }
    }
}

impl StdError for SessionError {}
