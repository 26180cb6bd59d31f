use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::core::config::{BridgeConfig, ConfigError};

#[derive(Debug)]
pub enum HealthError {
    /// No usable health URL could be derived from the configuration.
    Config(ConfigError),
    Request(reqwest::Error),
    Status(u16),
    Decode(String),
}

impl fmt::Display for HealthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthError::Config(err) => write!(f, "{err}"),
            HealthError::Request(err) => write!(f, "{err}"),
            HealthError::Status(status) => write!(f, "HTTP error: {status}"),
            HealthError::Decode(message) => write!(f, "invalid health document: {message}"),
        }
    }
}

impl StdError for HealthError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            HealthError::Config(err) => Some(err),
            HealthError::Request(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for HealthError {
    fn from(err: reqwest::Error) -> Self {
        HealthError::Request(err)
    }
}

/// Capability used by the `status` command.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self) -> Result<Value, HealthError>;
}

pub struct HealthClient {
    http: reqwest::Client,
    url: Result<String, ConfigError>,
}

impl HealthClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, HealthError> {
        Self::with_url(Ok(url.to_string()), timeout)
    }

    pub fn from_config(config: &BridgeConfig) -> Result<Self, HealthError> {
        Self::with_url(config.health_url.clone(), config.health_timeout)
    }

    fn with_url(url: Result<String, ConfigError>, timeout: Duration) -> Result<Self, HealthError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, url })
    }
}

#[async_trait]
impl HealthProbe for HealthClient {
    async fn check(&self) -> Result<Value, HealthError> {
        let url = self.url.as_ref().map_err(|err| HealthError::Config(err.clone()))?;
        debug!(url = %url, "Fetching health document");
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HealthError::Status(status.as_u16()));
        }
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|err| HealthError::Decode(err.to_string()))
    }
}
