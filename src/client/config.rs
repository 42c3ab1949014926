use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::client::storage::{keys, KeyValueStore};
use crate::shared::config::{AppConfig, AppConfigBuilder, ConfigError};

/// Environment variable overriding the REST API base
pub const API_URL_ENV: &str = "CLIENT_API_URL";

/// Environment variable overriding the streaming base
pub const WS_URL_ENV: &str = "CLIENT_WS_URL";

/// Client configuration wrapper.
#[derive(Debug, Clone)]
pub struct Config {
    app: AppConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self { app: AppConfig::default() }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builder(builder: AppConfigBuilder) -> Result<Self, ConfigError> {
        Ok(Self { app: builder.build()? })
    }

    /// Resolve the configuration the client starts with.
    ///
    /// Precedence for the API base: persisted `API_BASE` override, then the
    /// `CLIENT_API_URL` environment variable, then the config file, then the
    /// built-in default.
    pub fn resolve(store: &dyn KeyValueStore) -> Result<Self, ConfigError> {
        let mut builder = AppConfig::builder();

        let stored = match store.get(keys::API_BASE) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Ignoring unreadable API_BASE override: {}", e);
                None
            }
        };
        if let Some(api_base) = stored.or_else(|| non_empty_env(API_URL_ENV)) {
            builder = builder.api_base(api_base);
        }
        if let Some(ws_base) = non_empty_env(WS_URL_ENV) {
            builder = builder.ws_base(ws_base);
        }
        if let Some(path) = Self::config_file_path() {
            builder = builder.merge_file(&path)?;
        }

        let config = Self::with_builder(builder)?;
        tracing::info!(api_base = %config.api_base(), ws_base = %config.app.ws_base, "Configuration resolved");
        Ok(config)
    }

    /// Platform config file location: `<config_dir>/xffeed/config.toml`
    pub fn config_file_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push("xffeed");
        path.push("config.toml");
        Some(path)
    }

    /// Get the full URL for an API endpoint
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base(), path)
    }

    pub fn api_base(&self) -> &str {
        &self.app.api_base
    }

    /// Streaming endpoint for a chat. The access token travels as a query
    /// parameter because the handshake cannot carry custom headers.
    pub fn chat_stream_url(&self, chat_id: u64, token: &str) -> Result<Url, ConfigError> {
        let raw = format!("{}/ws/chat/{}/", self.app.ws_base, chat_id);
        let mut url = Url::parse(&raw).map_err(|_| ConfigError::InvalidUrl(raw.clone()))?;
        url.query_pairs_mut().append_pair("token", token);
        Ok(url)
    }

    pub fn poll_interval(&self) -> Duration {
        self.app.poll_interval
    }

    pub fn request_timeout(&self) -> Duration {
        self.app.request_timeout
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
