//! Command-line interface parsing and handling
//!
//! Resolves the configuration, installs logging, and runs either the
//! interactive shell or one of the one-shot subcommands.

use std::error::Error;
use std::future::Future;
use std::io::Write;

use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tokio::sync::oneshot;
use tracing::debug;

use crate::commands::format::{format_tool_listing, format_tool_result};
use crate::commands::{run_shell, CommandContext, ShellExit};
use crate::core::chat::{ChatBackend, ChatClient};
use crate::core::config::{BridgeConfig, ConfigOverrides};
use crate::core::health::HealthClient;
use crate::mcp::tools::{parse_tool_arguments, ToolArguments, ToolSession};
use crate::mcp::with_session;
use crate::utils::logging;

#[derive(Parser, Debug)]
#[command(name = "msf-bridge", version)]
#[command(about = "Interact with the Metasploit MCP server and Ollama")]
#[command(
    long_about = "msf-bridge keeps one SSE session open to a Metasploit MCP server and lets an \
operator list and call its tools, chat with an Ollama model, and ask that model to plan \
which tools to use.\n\n\
Environment Variables (used when the matching flag is absent):\n\
  METASPLOIT_MCP_URL    Full SSE URL of the MCP server\n\
  METASPLOIT_MCP_HOST   MCP host when no URL is set (default 127.0.0.1)\n\
  METASPLOIT_MCP_PORT   MCP port when no URL is set (default 8085)\n\
  OLLAMA_API_URL        Ollama base URL (default http://127.0.0.1:11434)\n\
  OLLAMA_MODEL          Ollama model (falls back to OLLMCP_MODEL, then gpt-oss:20b)\n\
  MSF_BRIDGE_LOG        Log filter, overrides --log-level\n\n\
Interactive commands:\n\
  tools, call <name> [json], chat <message>, plan <goal>, status, help, exit"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Full SSE URL of the MCP server
    #[arg(long, global = true, value_name = "URL")]
    pub mcp_url: Option<String>,

    /// Override for the /healthz endpoint
    #[arg(long, global = true, value_name = "URL")]
    pub health_url: Option<String>,

    /// Ollama base URL
    #[arg(long, global = true, value_name = "URL")]
    pub ollama_url: Option<String>,

    /// Ollama model name
    #[arg(long, global = true, value_name = "MODEL")]
    pub ollama_model: Option<String>,

    /// HTTP timeout for MCP POSTs and the initial connect, in seconds [default: 15]
    #[arg(long, global = true, value_name = "SECONDS")]
    pub mcp_timeout: Option<f64>,

    /// How long to wait for SSE events, in seconds [default: 300]
    #[arg(long, global = true, value_name = "SECONDS")]
    pub mcp_sse_timeout: Option<f64>,

    /// Timeout for Ollama responses, in seconds [default: 120]
    #[arg(long, global = true, value_name = "SECONDS")]
    pub ollama_timeout: Option<f64>,

    /// Log filter written to stderr, e.g. `debug` or `msf_bridge=trace`
    #[arg(long, global = true, value_name = "FILTER")]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Start an interactive REPL (default)
    Interactive,
    /// List available Metasploit MCP tools
    ListTools,
    /// Invoke a specific tool once and exit
    CallTool {
        /// Tool name to call
        name: String,
        /// JSON object with tool arguments
        arguments: Option<String>,
    },
    /// Send a prompt to Ollama and exit
    Chat {
        /// Prompt to forward to Ollama
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },
}

impl Args {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            mcp_url: self.mcp_url.clone(),
            health_url: self.health_url.clone(),
            ollama_url: self.ollama_url.clone(),
            ollama_model: self.ollama_model.clone(),
            mcp_timeout: self.mcp_timeout,
            mcp_sse_timeout: self.mcp_sse_timeout,
            ollama_timeout: self.ollama_timeout,
        }
    }
}

/// How a run ended when it did not raise an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// A diagnostic was already printed.
    Failed,
    Interrupted,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    logging::init_tracing(args.log_level.as_deref());

    let config = BridgeConfig::resolve(&args.overrides())?;
    debug!(
        mcp_url = %config.mcp_url,
        health_url = ?config.health_url,
        ollama_url = %config.ollama_url,
        model = %config.ollama_model,
        "Resolved configuration"
    );

    let runtime = tokio::runtime::Runtime::new()?;
    let command = args.command.unwrap_or(Commands::Interactive);
    let mut stdout = std::io::stdout();
    let outcome = runtime.block_on(run(command, &config, &mut stdout));
    // Stdin reads park a blocking thread that would otherwise hold shutdown.
    runtime.shutdown_background();

    match outcome? {
        RunOutcome::Completed => Ok(()),
        RunOutcome::Failed => std::process::exit(1),
        RunOutcome::Interrupted => {
            println!("\nInterrupted.");
            std::process::exit(1);
        }
    }
}

pub async fn run<W: Write>(
    command: Commands,
    config: &BridgeConfig,
    out: &mut W,
) -> Result<RunOutcome, Box<dyn Error>> {
    match command {
        Commands::Interactive => run_interactive(config, out).await,
        Commands::ListTools => interruptible(list_tools_once(config, out)).await,
        Commands::CallTool { name, arguments } => {
            let arguments = match parse_tool_arguments(arguments.as_deref().unwrap_or("")) {
                Ok(arguments) => arguments,
                Err(err) => {
                    eprintln!("{err}");
                    return Ok(RunOutcome::Failed);
                }
            };
            interruptible(call_tool_once(config, &name, arguments, out)).await
        }
        Commands::Chat { message } => {
            interruptible(chat_once(config, &message.join(" "), out)).await
        }
    }
}

async fn run_interactive<W: Write>(
    config: &BridgeConfig,
    out: &mut W,
) -> Result<RunOutcome, Box<dyn Error>> {
    let chat = ChatClient::from_config(config)?;
    let health = HealthClient::from_config(config)?;
    debug!(chat_endpoint = %chat.endpoint(), "Starting interactive shell");
    let (ready_tx, ready_rx) = oneshot::channel::<()>();

    let shell = with_session(config, |session| async move {
        let _ = ready_tx.send(());
        let context = CommandContext {
            session: session.as_ref(),
            chat: &chat,
            health: &health,
        };
        let input = BufReader::new(tokio::io::stdin());
        run_shell(&context, input, out, wait_for_interrupt).await
    });

    // Once the shell is running it handles interrupts itself; before that an
    // interrupt abandons the connect.
    let connecting = async {
        tokio::select! {
            _ = ready_rx => std::future::pending::<()>().await,
            _ = wait_for_interrupt() => {}
        }
    };

    tokio::select! {
        exit = shell => {
            let exit = exit??;
            debug!(exit = ?exit, "Interactive shell finished");
            Ok(shell_outcome(exit))
        }
        _ = connecting => Ok(RunOutcome::Interrupted),
    }
}

fn shell_outcome(exit: ShellExit) -> RunOutcome {
    if exit.is_success() {
        RunOutcome::Completed
    } else {
        RunOutcome::Interrupted
    }
}

async fn list_tools_once<W: Write>(
    config: &BridgeConfig,
    out: &mut W,
) -> Result<RunOutcome, Box<dyn Error>> {
    let tools = with_session(config, |session| async move { session.list_tools().await }).await??;
    writeln!(out, "Discovered {} tool(s) at {}:", tools.len(), config.mcp_url)?;
    if !tools.is_empty() {
        writeln!(out, "{}", format_tool_listing(&tools))?;
    }
    Ok(RunOutcome::Completed)
}

async fn call_tool_once<W: Write>(
    config: &BridgeConfig,
    name: &str,
    arguments: ToolArguments,
    out: &mut W,
) -> Result<RunOutcome, Box<dyn Error>> {
    let result = with_session(config, |session| async move {
        session.call_tool(name, arguments).await
    })
    .await??;
    writeln!(out, "{}", format_tool_result(&result))?;
    Ok(RunOutcome::Completed)
}

async fn chat_once<W: Write>(
    config: &BridgeConfig,
    prompt: &str,
    out: &mut W,
) -> Result<RunOutcome, Box<dyn Error>> {
    let client = ChatClient::from_config(config)?;
    match client.chat(prompt, None).await {
        Ok(reply) => {
            writeln!(out, "{reply}")?;
            Ok(RunOutcome::Completed)
        }
        Err(err) => {
            eprintln!("Failed to reach Ollama at {}: {err}", config.ollama_url);
            Ok(RunOutcome::Failed)
        }
    }
}

/// Races `work` against Ctrl-C. Dropping `work` drops any open session,
/// which stops its stream reader.
async fn interruptible<F>(work: F) -> Result<RunOutcome, Box<dyn Error>>
where
    F: Future<Output = Result<RunOutcome, Box<dyn Error>>>,
{
    tokio::select! {
        outcome = work => outcome,
        _ = wait_for_interrupt() => Ok(RunOutcome::Interrupted),
    }
}

async fn wait_for_interrupt() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
