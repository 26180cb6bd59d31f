//! `plan`: tool discovery joined with one chat call.

use crate::core::chat::{ChatBackend, ChatError};
use crate::mcp::tools::{ToolDescriptor, ToolSession};
use crate::mcp::transport::SessionError;

pub const PLAN_SYSTEM_PROMPT: &str =
    "You are helping an operator decide which Metasploit MCP tools to call.";
pub const NO_TOOLS_LINE: &str = "- none advertised";

#[derive(Debug)]
pub enum PlanError {
    Listing(SessionError),
    Chat(ChatError),
}

/// Builds the user prompt. Missing descriptions render empty here, unlike the
/// `tools` listing.
pub fn build_plan_prompt(tools: &[ToolDescriptor], goal: &str) -> String {
    let summary = if tools.is_empty() {
        NO_TOOLS_LINE.to_string()
    } else {
        tools
            .iter()
            .map(|tool| {
                format!(
                    "- {}: {}",
                    tool.name,
                    tool.description.as_deref().unwrap_or_default()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "Available tools:\n{summary}\n\nGoal: {goal}\nSuggest concrete steps and relevant tool names."
    )
}

/// Re-fetches the tool list on every call; tools can change between plans.
pub async fn compose_plan(
    session: &dyn ToolSession,
    chat: &dyn ChatBackend,
    goal: &str,
) -> Result<String, PlanError> {
    let tools = session.list_tools().await.map_err(PlanError::Listing)?;
    let prompt = build_plan_prompt(&tools, goal);
    chat.chat(&prompt, Some(PLAN_SYSTEM_PROMPT))
        .await
        .map_err(PlanError::Chat)
}
