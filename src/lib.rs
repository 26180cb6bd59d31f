//! msf-bridge is an operator shell for a Metasploit MCP server and an Ollama
//! chat model.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`mcp`] owns the SSE transport, the JSON-RPC client, and the scoped
//!   session used to list and call tools.
//! - [`core`] holds configuration resolution plus the Ollama chat and health
//!   check clients.
//! - [`commands`] parses operator input, dispatches each command against the
//!   session and chat capabilities, and runs the interactive loop.
//! - [`api`] defines the chat payloads sent to Ollama.
//! - [`utils`] carries URL helpers and logging setup.
//!
//! The binary (`src/main.rs`) routes through [`crate::cli::main`], which
//! resolves configuration and runs either the interactive shell or one of the
//! one-shot subcommands.

pub mod api;
pub mod cli;
pub mod commands;
pub mod core;
pub mod mcp;
pub mod utils;
