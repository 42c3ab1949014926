//! Application configuration module
//!
//! Provides configuration types for the client: where the REST API lives,
//! where the streaming endpoint lives, and the timing knobs of the realtime
//! channel.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Default REST API base
pub const DEFAULT_API_BASE: &str = "http://localhost:8000/api";

/// Default interval between full-history polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default timeout applied to each HTTP request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// REST API base, e.g. `http://localhost:8000/api`
    pub api_base: String,
    /// Streaming base, e.g. `ws://localhost:8000`
    pub ws_base: String,
    /// Polling fallback interval
    pub poll_interval: Duration,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            ws_base: "ws://localhost:8000".to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_url(&self.api_base, &["http", "https"])?;
        check_url(&self.ws_base, &["ws", "wss"])?;
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue("poll_interval must be non-zero"));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue("request_timeout must be non-zero"));
        }
        Ok(())
    }
}

/// Derive the streaming base from a REST base: same host and port, with the
/// scheme switched to its WebSocket counterpart and the path dropped.
pub fn derive_ws_base(api_base: &str) -> Result<String, ConfigError> {
    let url = check_url(api_base, &["http", "https"])?;
    let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
    let host = url
        .host_str()
        .ok_or_else(|| ConfigError::InvalidUrl(api_base.to_string()))?;
    Ok(match url.port() {
        Some(port) => format!("{scheme}://{host}:{port}"),
        None => format!("{scheme}://{host}"),
    })
}

fn check_url(raw: &str, schemes: &[&str]) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|_| ConfigError::InvalidUrl(raw.to_string()))?;
    if !schemes.contains(&url.scheme()) || url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(raw.to_string()));
    }
    Ok(url)
}

/// On-disk TOML representation. Every field is optional.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    api_base: Option<String>,
    ws_base: Option<String>,
    poll_interval_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
}

/// Builder for AppConfig
#[derive(Debug, Default, Clone)]
pub struct AppConfigBuilder {
    api_base: Option<String>,
    ws_base: Option<String>,
    poll_interval: Option<Duration>,
    request_timeout: Option<Duration>,
}

impl AppConfigBuilder {
    /// Set the REST API base
    pub fn api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = Some(url.into());
        self
    }

    /// Set the streaming base explicitly instead of deriving it
    pub fn ws_base(mut self, url: impl Into<String>) -> Self {
        self.ws_base = Some(url.into());
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Layer values from a TOML document under anything already set
    pub fn merge_toml(mut self, source: &str) -> Result<Self, ConfigError> {
        let file: FileConfig =
            toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        self.api_base = self.api_base.or(file.api_base);
        self.ws_base = self.ws_base.or(file.ws_base);
        self.poll_interval = self
            .poll_interval
            .or(file.poll_interval_secs.map(Duration::from_secs));
        self.request_timeout = self
            .request_timeout
            .or(file.request_timeout_secs.map(Duration::from_secs));
        Ok(self)
    }

    /// Layer values from a TOML file if it exists
    pub fn merge_file(self, path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(self);
        }
        let source =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        self.merge_toml(&source)
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        let api_base = self
            .api_base
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();
        let ws_base = match self.ws_base {
            Some(ws) => ws.trim_end_matches('/').to_string(),
            None => derive_ws_base(&api_base)?,
        };
        let config = AppConfig {
            api_base,
            ws_base,
            poll_interval: self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL),
            request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("invalid value: {0}")]
    InvalidValue(&'static str),
    #[error("failed to parse config file: {0}")]
    Parse(String),
    #[error("failed to read config file: {0}")]
    Io(String),
}
