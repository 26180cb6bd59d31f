//! Request payloads for the Ollama chat endpoint.

use serde::{Deserialize, Serialize};

pub const ROLE_SYSTEM: &str = "system";
pub const ROLE_USER: &str = "user";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ROLE_SYSTEM.to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ROLE_USER.to_string(),
            content: content.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

impl ChatRequest {
    /// Builds a single stateless turn: an optional system instruction
    /// followed by exactly one user prompt.
    pub fn single_turn(model: &str, prompt: &str, system: Option<&str>) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system.filter(|text| !text.is_empty()) {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));
        Self {
            model: model.to_string(),
            messages,
            stream: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_turn_without_system_has_one_message() {
        let request = ChatRequest::single_turn("gpt-oss:20b", "hello", None);
        assert_eq!(request.messages, vec![ChatMessage::user("hello")]);
        assert!(!request.stream);
    }

    #[test]
    fn single_turn_puts_system_first() {
        let request = ChatRequest::single_turn("m", "goal", Some("be brief"));
        assert_eq!(
            request.messages,
            vec![ChatMessage::system("be brief"), ChatMessage::user("goal")]
        );
    }

    #[test]
    fn request_serializes_to_ollama_shape() {
        let request = ChatRequest::single_turn("m", "hi", None);
        let value = serde_json::to_value(&request).expect("request should serialize");
        assert_eq!(
            value,
            serde_json::json!({
                "model": "m",
                "messages": [{"role": "user", "content": "hi"}],
                "stream": false
            })
        );
    }
}
