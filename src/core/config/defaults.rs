//! Environment variable names and hard-coded fallbacks.

use reqwest::Url;

use super::data::ConfigError;

pub const ENV_MCP_URL: &str = "METASPLOIT_MCP_URL";
pub const ENV_MCP_HOST: &str = "METASPLOIT_MCP_HOST";
pub const ENV_MCP_PORT: &str = "METASPLOIT_MCP_PORT";
pub const ENV_OLLAMA_URL: &str = "OLLAMA_API_URL";
pub const ENV_OLLAMA_MODEL: &str = "OLLAMA_MODEL";
pub const ENV_OLLMCP_MODEL: &str = "OLLMCP_MODEL";

pub const DEFAULT_MCP_HOST: &str = "127.0.0.1";
pub const DEFAULT_MCP_PORT: &str = "8085";
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "gpt-oss:20b";

pub const DEFAULT_MCP_TIMEOUT_SECONDS: f64 = 15.0;
pub const DEFAULT_MCP_SSE_TIMEOUT_SECONDS: f64 = 300.0;
pub const DEFAULT_OLLAMA_TIMEOUT_SECONDS: f64 = 120.0;
pub const HEALTH_TIMEOUT_SECONDS: f64 = 10.0;

const HEALTH_PATH: &str = "/healthz";

pub fn default_mcp_url(env: &impl Fn(&str) -> Option<String>) -> String {
    if let Some(url) = env(ENV_MCP_URL) {
        return url;
    }
    let host = env(ENV_MCP_HOST).unwrap_or_else(|| DEFAULT_MCP_HOST.to_string());
    let port = env(ENV_MCP_PORT).unwrap_or_else(|| DEFAULT_MCP_PORT.to_string());
    format!("http://{host}:{port}/sse")
}

/// Swaps the path of the tool-server URL for `/healthz`, dropping any query
/// or fragment.
pub fn default_health_url(mcp_url: &str) -> Result<String, ConfigError> {
    let mut url = Url::parse(mcp_url).map_err(|err| ConfigError::InvalidUrl {
        url: mcp_url.to_string(),
        reason: err.to_string(),
    })?;
    url.set_path(HEALTH_PATH);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.to_string())
}

pub fn default_ollama_url(env: &impl Fn(&str) -> Option<String>) -> String {
    env(ENV_OLLAMA_URL).unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string())
}

pub fn default_ollama_model(env: &impl Fn(&str) -> Option<String>) -> String {
    env(ENV_OLLAMA_MODEL)
        .or_else(|| env(ENV_OLLMCP_MODEL))
        .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string())
}
