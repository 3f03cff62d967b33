//! Bot configuration.
//!
//! A small JSON file: the bot token, the API root, and the
//! compression toggle for the event stream.

use std::path::Path;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use yuki_gateway::SessionConfig;

fn default_api_base_url() -> String {
    "https://www.kookapp.cn/api/v3".to_string()
}

fn default_compress() -> bool {
    true
}

/// Main bot configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BotConfig {
    /// Bot token used to authenticate control-plane requests.
    pub token: String,
    /// Root of the platform's HTTP API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Whether to negotiate payload compression on the event stream.
    #[serde(default = "default_compress")]
    pub compress: bool,
}

impl BotConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).with_context(|| {
            format!("failed to read config file '{}'", path.as_ref().display())
        })?;
        Self::from_json(&content)
    }

    /// Parse configuration from a JSON string.
    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(content).context("invalid config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.token.is_empty() {
            bail!("bot token cannot be empty");
        }
        if !self.api_base_url.starts_with("http") {
            bail!("api_base_url must be an http(s) URL");
        }
        Ok(())
    }

    /// A sample configuration for `init-config`.
    #[must_use]
    pub fn sample() -> Self {
        Self {
            token: "<bot token>".to_string(),
            api_base_url: default_api_base_url(),
            compress: default_compress(),
        }
    }

    /// Session timing derived from this configuration.
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            compress: self.compress,
            ..SessionConfig::default()
        }
    }
}
