//! Stateless wrapper around the Ollama `/api/chat` endpoint.
//!
//! One call per invocation, no retry and no streaming. Replies that lack a
//! `message.content` field are returned as the pretty-printed response body
//! so odd server answers stay visible to the operator.

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::api::ChatRequest;
use crate::core::config::BridgeConfig;
use crate::utils::url::construct_api_url;

const CHAT_ENDPOINT: &str = "api/chat";

#[derive(Debug)]
pub enum ChatError {
    /// Connection failure, timeout, or a body that could not be read.
    Request(reqwest::Error),
    /// The service answered with a non-success status.
    Status { status: u16, body: String },
    /// The body was not JSON.
    Decode(String),
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::Request(err) if err.is_timeout() => write!(f, "request timed out: {err}"),
            ChatError::Request(err) => write!(f, "{err}"),
            ChatError::Status { status, body } if body.trim().is_empty() => {
                write!(f, "HTTP error: {status}")
            }
            ChatError::Status { status, body } => {
                write!(f, "HTTP error: {status}: {}", body.trim())
            }
            ChatError::Decode(message) => write!(f, "invalid response body: {message}"),
        }
    }
}

impl StdError for ChatError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ChatError::Request(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Request(err)
    }
}

/// Capability used by the `chat` and `plan` commands.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat(&self, prompt: &str, system: Option<&str>) -> Result<String, ChatError>;
}

pub struct ChatClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
}

impl ChatClient {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self, ChatError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: construct_api_url(base_url, CHAT_ENDPOINT),
            model: model.to_string(),
        })
    }

    pub fn from_config(config: &BridgeConfig) -> Result<Self, ChatError> {
        Self::new(&config.ollama_url, &config.ollama_model, config.ollama_timeout)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatBackend for ChatClient {
    async fn chat(&self, prompt: &str, system: Option<&str>) -> Result<String, ChatError> {
        let request = ChatRequest::single_turn(&self.model, prompt, system);
        debug!(
            endpoint = %self.endpoint,
            model = %self.model,
            messages = request.messages.len(),
            "Sending chat request"
        );

        let response = self.http.post(&self.endpoint).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        let value: Value =
            serde_json::from_slice(&body).map_err(|err| ChatError::Decode(err.to_string()))?;
        debug!(endpoint = %self.endpoint, "Chat response received");
        Ok(extract_reply(&value))
    }
}

/// Returns the trimmed `message.content`, or the whole body pretty-printed
/// when that field is missing or empty.
pub fn extract_reply(value: &Value) -> String {
    match value.pointer("/message/content").and_then(Value::as_str) {
        Some(content) if !content.is_empty() => content.trim().to_string(),
        _ => serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
    }
}
