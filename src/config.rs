//! Client configuration.
//!
//! All options can be loaded from a TOML file or built in code from
//! [`RestreamConfig::default`]. The API key is either set directly or
//! resolved from an environment variable at connect time.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use url::Url;

/// Streaming client configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RestreamConfig {
    /// Transport endpoint URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// API key appended to the endpoint as a query parameter.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable to read the API key from when `api_key` is unset.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Keepalive ping period in milliseconds.
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
    /// Quota on distinct tracked channels.
    #[serde(default = "default_max_subscriptions")]
    pub max_subscriptions: usize,
    /// Quota on distinct wildcard (`topic:*`) channels.
    #[serde(default = "default_max_wildcard_subscriptions")]
    pub max_wildcard_subscriptions: usize,
    /// Time allowed for `connect()` to succeed, in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Backoff policy for automatic reconnection.
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
}

/// Reconnection backoff policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReconnectPolicy {
    /// Whether unexpected closes trigger automatic reconnection.
    #[serde(default = "default_reconnect_enabled")]
    pub enabled: bool,
    /// Delay before the first reconnection attempt, in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Upper bound on the delay between attempts, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Exponential growth factor applied after each attempt.
    #[serde(default = "default_factor")]
    pub factor: f64,
    /// Symmetric jitter as a fraction of the computed delay.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

fn default_endpoint() -> String {
    "wss://restream.bags.fm".to_string()
}

fn default_ping_interval_ms() -> u64 {
    30_000
}

fn default_max_subscriptions() -> usize {
    50 // service limit
}

fn default_max_wildcard_subscriptions() -> usize {
    5 // service limit
}

fn default_connect_timeout_ms() -> u64 {
    3_000
}

fn default_reconnect_enabled() -> bool {
    true
}

fn default_initial_delay_ms() -> u64 {
    250
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_factor() -> f64 {
    1.8
}

fn default_jitter() -> f64 {
    0.2
}

impl Default for RestreamConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            api_key_env: None,
            ping_interval_ms: default_ping_interval_ms(),
            max_subscriptions: default_max_subscriptions(),
            max_wildcard_subscriptions: default_max_wildcard_subscriptions(),
            connect_timeout_ms: default_connect_timeout_ms(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: default_reconnect_enabled(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            factor: default_factor(),
            jitter: default_jitter(),
        }
    }
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RestreamConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: RestreamConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if Url::parse(&self.endpoint).is_err() {
            return Err(ConfigError::InvalidConfig(format!(
                "endpoint '{}' is not a valid URL",
                self.endpoint
            )));
        }
        if self.ping_interval_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "ping_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "connect_timeout_ms must be greater than 0".to_string(),
            ));
        }
        self.reconnect.validate()
    }

    /// Resolve the API key, preferring the literal value over the
    /// environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key.clone().or_else(|| {
            self.api_key_env
                .as_ref()
                .and_then(|name| std::env::var(name).ok())
        })
    }
}

impl ReconnectPolicy {
    /// Validate backoff parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(ConfigError::InvalidConfig(
                "reconnect.initial_delay_ms must not exceed reconnect.max_delay_ms".to_string(),
            ));
        }
        if self.factor < 1.0 {
            return Err(ConfigError::InvalidConfig(
                "reconnect.factor must be at least 1.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ConfigError::InvalidConfig(
                "reconnect.jitter must be between 0.0 and 1.0".to_string(),
            ));
        }
        Ok(())
    }
}
