//! Operator command grammar, dispatch, and the interactive loop.

mod dispatch;
pub mod format;
pub mod plan;
mod registry;
mod repl;

pub use dispatch::{execute, CommandContext, Reply};
pub use registry::{all_commands, find_command, help_text, usage_for, CommandSpec};
pub use repl::{run_shell, ShellExit, BANNER, PROMPT};

use crate::mcp::tools::{parse_tool_arguments, ToolArguments};

/// One parsed line of operator input.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Quit,
    Help,
    Tools,
    Call {
        name: String,
        arguments: ToolArguments,
    },
    Chat {
        text: String,
    },
    Plan {
        goal: String,
    },
    Status,
    Unknown {
        verb: String,
    },
    /// Missing tail or malformed arguments. Printed, never sent anywhere.
    Invalid {
        message: String,
    },
}

/// Splits a line into a case-insensitive verb and the tail after the first
/// space. Blank lines parse to `None`.
pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let (verb, tail) = line.split_once(' ').unwrap_or((line, ""));
    let verb = verb.to_lowercase();
    let command = match verb.as_str() {
        "quit" | "exit" => Command::Quit,
        "help" => Command::Help,
        "tools" => Command::Tools,
        "status" => Command::Status,
        "call" => parse_call(tail),
        "chat" if tail.is_empty() => usage("chat"),
        "chat" => Command::Chat {
            text: tail.to_string(),
        },
        "plan" if tail.is_empty() => usage("plan"),
        "plan" => Command::Plan {
            goal: tail.to_string(),
        },
        _ => Command::Unknown { verb },
    };
    Some(command)
}

fn parse_call(tail: &str) -> Command {
    let tail = tail.trim_start();
    if tail.is_empty() {
        return usage("call");
    }
    let (name, raw_arguments) = tail.split_once(' ').unwrap_or((tail, ""));
    match parse_tool_arguments(raw_arguments) {
        Ok(arguments) => Command::Call {
            name: name.to_string(),
            arguments,
        },
        Err(err) => Command::Invalid {
            message: format!("{err}\n{}", usage_for("call")),
        },
    }
}

fn usage(verb: &str) -> Command {
    Command::Invalid {
        message: usage_for(verb),
    }
}
