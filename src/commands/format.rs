//! Operator-facing rendering of tool results and descriptors.

use crate::mcp::tools::{ToolCallResult, ToolDescriptor};
use serde_json::{Map, Value};

const INDENT: &str = "  ";
pub const NO_DESCRIPTION: &str = "(no description)";

/// Renders a tool result as: status line, `structured:` block, `meta:` block,
/// then every content block in arrival order.
pub fn format_tool_result(result: &ToolCallResult) -> String {
    let status = if result.is_error() { "error" } else { "ok" };
    let mut lines = vec![format!("status: {status}")];

    if let Some(structured) = non_empty(result.structured_content.as_ref()) {
        lines.push("structured:".to_string());
        lines.push(indent_block(&pretty_object(structured), INDENT));
    }
    if let Some(meta) = non_empty(result.meta.as_ref()) {
        lines.push("meta:".to_string());
        lines.push(indent_block(&pretty_object(meta), INDENT));
    }
    for block in &result.content {
        lines.push(indent_block(&pretty(&strip_nulls(block)), INDENT));
    }

    lines.join("\n")
}

/// `- name: description`, with a placeholder for tools that have none.
pub fn format_tool_line(tool: &ToolDescriptor) -> String {
    let description = match tool.description.as_deref() {
        Some(description) if !description.is_empty() => description,
        _ => NO_DESCRIPTION,
    };
    format!("- {}: {}", tool.name, description)
}

pub fn format_tool_listing(tools: &[ToolDescriptor]) -> String {
    tools
        .iter()
        .map(format_tool_line)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn pretty_object(map: &Map<String, Value>) -> String {
    pretty(&Value::Object(map.clone()))
}

fn non_empty(map: Option<&Map<String, Value>>) -> Option<&Map<String, Value>> {
    map.filter(|map| !map.is_empty())
}

/// Prefixes every non-blank line.
fn indent_block(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                line.to_string()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Content blocks omit unset fields, so explicit nulls are dropped.
fn strip_nulls(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, value)| !value.is_null())
                .map(|(key, value)| (key.clone(), strip_nulls(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(strip_nulls).collect()),
        other => other.clone(),
    }
}
