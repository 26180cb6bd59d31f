use super::dispatch::{execute, CommandContext, Reply};
use super::parse_command;
use crate::mcp::transport::SessionError;
use std::future::Future;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::warn;

pub const BANNER: &str = "Connected to Metasploit MCP over SSE. Type 'help' for commands.";
pub const PROMPT: &str = "bridge> ";

/// Why the interactive loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellExit {
    Quit,
    EndOfInput,
    /// Interrupt while waiting for a line.
    Interrupted,
    /// Interrupt while a command was still running.
    InterruptedDuringCommand,
}

impl ShellExit {
    /// Any interrupt, at the prompt or mid-command, is a failed run.
    pub fn is_success(self) -> bool {
        matches!(self, ShellExit::Quit | ShellExit::EndOfInput)
    }
}

/// Reads commands one line at a time and runs each to completion before the
/// next read.
///
/// `interrupt` is polled alongside both the line read and the running
/// command, so an interrupt never has to wait for either.
pub async fn run_shell<R, W, I, Fut>(
    context: &CommandContext<'_>,
    mut input: R,
    out: &mut W,
    mut interrupt: I,
) -> Result<ShellExit, SessionError>
where
    R: AsyncBufRead + Unpin,
    W: Write,
    I: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    emit_line(out, BANNER);
    loop {
        let _ = write!(out, "{PROMPT}");
        let _ = out.flush();

        let mut line = String::new();
        let read = tokio::select! {
            read = input.read_line(&mut line) => read,
            _ = interrupt() => {
                emit_line(out, "");
                return Ok(ShellExit::Interrupted);
            }
        };
        match read {
            Ok(0) => {
                emit_line(out, "");
                return Ok(ShellExit::EndOfInput);
            }
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "Failed to read operator input");
                emit_line(out, "");
                return Ok(ShellExit::EndOfInput);
            }
        }

        let Some(command) = parse_command(&line) else {
            continue;
        };
        let reply = tokio::select! {
            reply = execute(command, context) => reply?,
            _ = interrupt() => return Ok(ShellExit::InterruptedDuringCommand),
        };
        match reply {
            Reply::Quit => return Ok(ShellExit::Quit),
            Reply::Output(text) => emit_line(out, &text),
        }
    }
}

fn emit_line<W: Write>(out: &mut W, text: &str) {
    let _ = writeln!(out, "{text}");
    let _ = out.flush();
}
