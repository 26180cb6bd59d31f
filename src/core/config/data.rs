use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use super::defaults;

/// Resolved endpoints and timeouts for one process run.
///
/// Built once at startup and only ever shared by reference afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// SSE endpoint of the tool server.
    pub mcp_url: String,
    /// Plain GET endpoint returning a JSON health document. A tool-server
    /// URL that cannot be parsed leaves the error here for `status` to report.
    pub health_url: Result<String, ConfigError>,
    /// Base URL of the Ollama chat service.
    pub ollama_url: String,
    pub ollama_model: String,
    /// Connect timeout for the SSE stream and per-POST timeout.
    pub mcp_timeout: Duration,
    /// Longest idle gap tolerated on the SSE stream, also bounds a single
    /// JSON-RPC response wait.
    pub mcp_sse_timeout: Duration,
    pub ollama_timeout: Duration,
    pub health_timeout: Duration,
}

/// Explicit values supplied on the command line.
///
/// Anything left as `None` falls back to the environment, then to the
/// built-in defaults.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub mcp_url: Option<String>,
    pub health_url: Option<String>,
    pub ollama_url: Option<String>,
    pub ollama_model: Option<String>,
    pub mcp_timeout: Option<f64>,
    pub mcp_sse_timeout: Option<f64>,
    pub ollama_timeout: Option<f64>,
}

/// Errors raised while resolving the configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A timeout flag was negative, zero, NaN or too large.
    InvalidTimeout { flag: &'static str, value: f64 },
    /// The tool-server URL could not be parsed.
    InvalidUrl { url: String, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidTimeout { flag, value } => {
                write!(f, "Invalid value for --{flag}: {value} (expected a positive number of seconds)")
            }
            ConfigError::InvalidUrl { url, reason } => {
                write!(f, "Invalid MCP URL '{url}': {reason}")
            }
        }
    }
}

impl StdError for ConfigError {}

impl BridgeConfig {
    /// Resolves the configuration against the process environment.
    pub fn resolve(overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        Self::resolve_with(overrides, |name| std::env::var(name).ok())
    }

    /// Resolves the configuration with an injectable environment lookup.
    ///
    /// Empty environment values are treated as unset.
    pub fn resolve_with<F>(overrides: &ConfigOverrides, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| env(name).filter(|value| !value.is_empty());

        let mcp_url = overrides
            .mcp_url
            .clone()
            .unwrap_or_else(|| defaults::default_mcp_url(&lookup));
        let health_url = match overrides.health_url.clone() {
            Some(url) => Ok(url),
            None => defaults::default_health_url(&mcp_url),
        };
        let ollama_url = overrides
            .ollama_url
            .clone()
            .unwrap_or_else(|| defaults::default_ollama_url(&lookup));
        let ollama_model = overrides
            .ollama_model
            .clone()
            .unwrap_or_else(|| defaults::default_ollama_model(&lookup));

        Ok(Self {
            mcp_url,
            health_url,
            ollama_url,
            ollama_model,
            mcp_timeout: timeout_from(
                "mcp-timeout",
                overrides.mcp_timeout,
                defaults::DEFAULT_MCP_TIMEOUT_SECONDS,
            )?,
            mcp_sse_timeout: timeout_from(
                "mcp-sse-timeout",
                overrides.mcp_sse_timeout,
                defaults::DEFAULT_MCP_SSE_TIMEOUT_SECONDS,
            )?,
            ollama_timeout: timeout_from(
                "ollama-timeout",
                overrides.ollama_timeout,
                defaults::DEFAULT_OLLAMA_TIMEOUT_SECONDS,
            )?,
            health_timeout: Duration::from_secs_f64(defaults::HEALTH_TIMEOUT_SECONDS),
        })
    }
}

fn timeout_from(
    flag: &'static str,
    value: Option<f64>,
    default: f64,
) -> Result<Duration, ConfigError> {
    let seconds = value.unwrap_or(default);
    if seconds.is_nan() || seconds <= 0.0 {
        return Err(ConfigError::InvalidTimeout {
            flag,
            value: seconds,
        });
    }
    Duration::try_from_secs_f64(seconds).map_err(|_| ConfigError::InvalidTimeout {
        flag,
        value: seconds,
    })
}
