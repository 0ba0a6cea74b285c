//! Logging subsystem for meshchat
//!
//! Installs a `tracing` subscriber with an env filter and either a plain or
//! JSON formatter. Every other module logs through `tracing` macros with
//! structured fields and never writes to stdout directly.

use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod error;
mod level;

pub use error::LoggingError;
pub use level::LogLevel;

/// Configuration for the logging subsystem
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// The minimum log level to display
    pub level: LogLevel,
    /// Whether to include timestamps
    pub with_timestamp: bool,
    /// Whether to include target module information
    pub with_target: bool,
    /// Whether to use JSON formatting
    pub json_format: bool,
    /// Extra filter directives, e.g. `meshchat_core::core_chat=trace`
    pub directives: Vec<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            with_timestamp: true,
            with_target: true,
            json_format: false,
            directives: Vec::new(),
        }
    }
}

impl LogConfig {
    /// Create a new LogConfig with specified level
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    pub fn with_timestamp(mut self, enabled: bool) -> Self {
        self.with_timestamp = enabled;
        self
    }

    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    pub fn json_format(mut self, enabled: bool) -> Self {
        self.json_format = enabled;
        self
    }

    /// Add a per-target filter directive on top of the base level
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// Build the filter this configuration describes.
    ///
    /// `RUST_LOG` wins when it is set, so operators can always override the
    /// configured level without touching config files.
    pub fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }

        let mut filter = EnvFilter::try_new(self.level.as_str())
            .map_err(|e| LoggingError::InvalidConfiguration(e.to_string()))?;

        for directive in &self.directives {
            filter = filter.add_directive(parse_directive(directive)?);
        }

        Ok(filter)
    }
}

/// Parse one `target=level` filter directive
pub fn parse_directive(directive: &str) -> Result<Directive, LoggingError> {
    directive
        .trim()
        .parse()
        .map_err(|e: tracing_subscriber::filter::ParseError| LoggingError::DirectiveRejected {
            directive: directive.to_string(),
            reason: e.to_string(),
        })
}

/// Initialize the logging subsystem with default configuration
///
/// # Example
/// ```
/// use meshchat_core::logging::init_logging;
///
/// init_logging().expect("Failed to initialize logging");
/// ```
pub fn init_logging() -> Result<(), LoggingError> {
    init_logging_with_config(LogConfig::default())
}

/// Initialize the logging subsystem with custom configuration
///
/// Fails if a global subscriber is already installed.
///
/// # Example
/// ```
/// use meshchat_core::logging::{init_logging_with_config, LogConfig, LogLevel};
///
/// let config = LogConfig::new(LogLevel::Debug)
///     .with_timestamp(false)
///     .directive("meshchat_core::core_graph=warn");
///
/// init_logging_with_config(config).expect("Failed to initialize logging");
/// ```
pub fn init_logging_with_config(config: LogConfig) -> Result<(), LoggingError> {
    let registry = tracing_subscriber::registry().with(config.env_filter()?);
    let target = config.with_target;

    let installed = match (config.json_format, config.with_timestamp) {
        (true, true) => registry.with(fmt::layer().json().with_target(target)).try_init(),
        (true, false) => registry
            .with(fmt::layer().json().without_time().with_target(target))
            .try_init(),
        (false, true) => registry.with(fmt::layer().with_target(target)).try_init(),
        (false, false) => registry
            .with(fmt::layer().without_time().with_target(target))
            .try_init(),
    };

    installed.map_err(|e| LoggingError::InitializationFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.level, LogLevel::Info);
        assert!(config.with_timestamp);
        assert!(config.with_target);
        assert!(!config.json_format);
        assert!(config.directives.is_empty());
    }

    #[test]
    fn test_log_config_builder() {
        let config = LogConfig::new(LogLevel::Debug)
            .with_timestamp(false)
            .with_target(false)
            .json_format(true)
            .directive("meshchat_core=trace");

        assert_eq!(config.level, LogLevel::Debug);
        assert!(!config.with_timestamp);
        assert!(!config.with_target);
        assert!(config.json_format);
        assert_eq!(config.directives, vec!["meshchat_core=trace".to_string()]);
    }

    #[test]
    fn test_env_filter_accepts_target_directives() {
        let config = LogConfig::new(LogLevel::Warn)
            .directive("meshchat_core::core_chat=debug")
            .directive("meshchat_core::core_graph=trace");
        assert!(config.env_filter().is_ok());
    }

    #[test]
    fn test_parse_directive_rejects_garbage() {
        assert!(parse_directive(" meshchat_core=debug ").is_ok());
        assert!(matches!(
            parse_directive("meshchat_core=loud"),
            Err(LoggingError::DirectiveRejected { .. })
        ));
    }
}
