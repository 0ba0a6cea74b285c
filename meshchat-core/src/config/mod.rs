//! Configuration management for meshchat
//!
//! Defaults, TOML files and `MESHCHAT_*` environment overrides, validated
//! before a [`Config`] is handed to the chat client.

use crate::logging::{parse_directive, LogConfig, LogLevel};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

mod error;

pub use error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Per-session behaviour
    pub session: SessionConfig,

    /// Message handling limits
    pub messaging: MessagingConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Buffered observation events per subscriber
    pub event_capacity: usize,

    /// How long an alias registry lookup may take before the identity is
    /// treated as unverified
    #[serde(with = "humantime_serde")]
    pub registry_timeout: Duration,
}

/// Messaging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagingConfig {
    /// Maximum plaintext length in bytes
    pub max_message_len: usize,

    /// Clear "new" markers as soon as the thread is on screen
    pub clear_unread_on_view: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include timestamps
    pub with_timestamp: bool,

    /// Include target module
    pub with_target: bool,

    /// Per-target filters on top of `level`, e.g. `meshchat_core::core_chat=trace`
    #[serde(default)]
    pub directives: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            event_capacity: 100,
            registry_timeout: Duration::from_secs(5),
        }
    }
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            max_message_len: 64 * 1024,
            clear_unread_on_view: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_timestamp: true,
            with_target: true,
            directives: Vec::new(),
        }
    }
}

impl LoggingConfig {
    /// Bridge into the logging subsystem
    pub fn to_log_config(&self) -> Result<LogConfig, ConfigError> {
        let level = LogLevel::from_str(&self.level).map_err(|e| ConfigError::InvalidValue {
            key: "logging.level".to_string(),
            reason: e.to_string(),
        })?;

        let config = LogConfig::new(level)
            .json_format(self.json_format)
            .with_timestamp(self.with_timestamp)
            .with_target(self.with_target);
        Ok(self
            .directives
            .iter()
            .fold(config, |config, directive| config.directive(directive.clone())))
    }
}

/// Comma separated directive list, blanks dropped
fn split_directives(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|directive| !directive.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_var<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse().map(Some).map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(None),
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Recognised variables: `MESHCHAT_EVENT_CAPACITY`,
    /// `MESHCHAT_REGISTRY_TIMEOUT` (humantime, e.g. `5s`),
    /// `MESHCHAT_MAX_MESSAGE_LEN`, `MESHCHAT_CLEAR_UNREAD_ON_VIEW`,
    /// `MESHCHAT_LOG_LEVEL`, `MESHCHAT_LOG_JSON` and
    /// `MESHCHAT_LOG_DIRECTIVES` (comma separated).
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(capacity) = parse_var("MESHCHAT_EVENT_CAPACITY")? {
            config.session.event_capacity = capacity;
        }
        if let Ok(raw) = env::var("MESHCHAT_REGISTRY_TIMEOUT") {
            config.session.registry_timeout =
                humantime_serde::re::humantime::parse_duration(&raw).map_err(|e| {
                    ConfigError::InvalidValue {
                        key: "MESHCHAT_REGISTRY_TIMEOUT".to_string(),
                        reason: e.to_string(),
                    }
                })?;
        }
        if let Some(len) = parse_var("MESHCHAT_MAX_MESSAGE_LEN")? {
            config.messaging.max_message_len = len;
        }
        if let Some(clear) = parse_var("MESHCHAT_CLEAR_UNREAD_ON_VIEW")? {
            config.messaging.clear_unread_on_view = clear;
        }
        if let Ok(level) = env::var("MESHCHAT_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(json) = parse_var("MESHCHAT_LOG_JSON")? {
            config.logging.json_format = json;
        }
        if let Ok(raw) = env::var("MESHCHAT_LOG_DIRECTIVES") {
            config.logging.directives = split_directives(&raw);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError(e.to_string()))?;

        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.event_capacity == 0 {
            return Err(ConfigError::ValidationFailed(
                "event_capacity must be greater than 0".to_string(),
            ));
        }

        if self.session.registry_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "registry_timeout must be greater than 0".to_string(),
            ));
        }

        if self.messaging.max_message_len == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_message_len must be greater than 0".to_string(),
            ));
        }

        if LogLevel::from_str(&self.logging.level).is_err() {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        for directive in &self.logging.directives {
            parse_directive(directive)
                .map_err(|e| ConfigError::ValidationFailed(e.to_string()))?;
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, contents).map_err(|e| ConfigError::FileWriteError(e.to_string()))?;

        Ok(())
    }
}
