use super::format::{format_tool_listing, format_tool_result, pretty};
use super::plan::{compose_plan, PlanError};
use super::registry::help_text;
use super::Command;
use crate::core::chat::ChatBackend;
use crate::core::health::HealthProbe;
use crate::mcp::tools::ToolSession;
use crate::mcp::transport::SessionError;
use tracing::debug;

/// Capabilities a command may use. The dispatcher never owns any of them.
pub struct CommandContext<'a> {
    pub session: &'a dyn ToolSession,
    pub chat: &'a dyn ChatBackend,
    pub health: &'a dyn HealthProbe,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Output(String),
    Quit,
}

/// Runs one command.
///
/// Failures are turned into a one-line diagnostic so the loop keeps going.
/// Only a dead transport escapes as `Err`.
pub async fn execute(command: Command, context: &CommandContext<'_>) -> Result<Reply, SessionError> {
    let output = match command {
        Command::Quit => return Ok(Reply::Quit),
        Command::Help => help_text(),
        Command::Tools => match context.session.list_tools().await {
            Ok(tools) => format_tool_listing(&tools),
            Err(err) => command_failure("Tool listing failed", err)?,
        },
        Command::Call { name, arguments } => {
            debug!(tool = %name, "Calling tool");
            match context.session.call_tool(&name, arguments).await {
                Ok(result) => format_tool_result(&result),
                Err(err) => command_failure("Tool call failed", err)?,
            }
        }
        Command::Chat { text } => match context.chat.chat(&text, None).await {
            Ok(reply) => reply,
            Err(err) => format!("Ollama request failed: {err}"),
        },
        Command::Plan { goal } => match compose_plan(context.session, context.chat, &goal).await {
            Ok(reply) => reply,
            Err(PlanError::Listing(err)) => command_failure("Tool listing failed", err)?,
            Err(PlanError::Chat(err)) => format!("Ollama request failed: {err}"),
        },
        Command::Status => match context.health.check().await {
            Ok(document) => pretty(&document),
            Err(err) => format!("Health check failed: {err}"),
        },
        Command::Unknown { verb } => format!("Unknown command: {verb}. Try 'help'."),
        Command::Invalid { message } => message,
    };
    Ok(Reply::Output(output))
}

fn command_failure(prefix: &str, err: SessionError) -> Result<String, SessionError> {
    if err.is_fatal() {
        return Err(err);
    }
    Ok(format!("{prefix}: {err}"))
}
