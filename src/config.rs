use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::relay::auth::AuthorizationGate;
use crate::relay::poller::PollSettings;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub polling: PollingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Chats that receive alerts about rejected clients
    #[serde(default)]
    pub administrators: Vec<i64>,
    #[serde(default)]
    pub whitelist: Vec<i64>,
    /// Admit every chat regardless of the whitelist
    #[serde(default)]
    pub allow_all: bool,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

impl TelegramConfig {
    pub fn authorization(&self) -> AuthorizationGate {
        AuthorizationGate::new(&self.administrators, &self.whitelist, self.allow_all)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollingConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_backoff_initial_secs")]
    pub backoff_initial_secs: u64,
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            backoff_initial_secs: default_backoff_initial_secs(),
            backoff_max_secs: default_backoff_max_secs(),
        }
    }
}

impl PollingConfig {
    fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 || self.timeout_secs > MAX_TIMEOUT_SECS {
            anyhow::bail!("polling.timeout_secs must be between 1 and {}", MAX_TIMEOUT_SECS);
        }
        if self.backoff_initial_secs == 0 {
            anyhow::bail!("polling.backoff_initial_secs must be at least 1");
        }
        if self.backoff_max_secs > MAX_BACKOFF_SECS {
            anyhow::bail!("polling.backoff_max_secs must not exceed {}", MAX_BACKOFF_SECS);
        }
        if self.backoff_initial_secs > self.backoff_max_secs {
            anyhow::bail!("polling.backoff_initial_secs must not exceed polling.backoff_max_secs");
        }
        Ok(())
    }

    pub fn settings(&self) -> PollSettings {
        PollSettings {
            timeout: Duration::from_secs(self.timeout_secs),
            backoff_initial: Duration::from_secs(self.backoff_initial_secs),
            backoff_max: Duration::from_secs(self.backoff_max_secs),
        }
    }
}

/// Upper bound on the long-poll ceiling.
const MAX_TIMEOUT_SECS: u64 = 600;

/// Upper bound on the delay between failed polls.
const MAX_BACKOFF_SECS: u64 = 3600;

fn default_api_base_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_backoff_initial_secs() -> u64 {
    1
}

fn default_backoff_max_secs() -> u64 {
    60
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;

        if config.telegram.bot_token.trim().is_empty() {
            anyhow::bail!("telegram.bot_token must not be empty");
        }
        config.polling.validate()?;

        Ok(config)
    }
}
