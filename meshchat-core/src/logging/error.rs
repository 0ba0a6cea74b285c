//! Error types for the logging subsystem

use std::fmt;

/// Errors that can occur while installing the subscriber
#[derive(Debug, Clone)]
pub enum LoggingError {
    /// A global subscriber was already installed, or installation failed
    InitializationFailed(String),
    /// The base level could not be turned into a filter
    InvalidConfiguration(String),
    /// A per-target directive did not parse
    DirectiveRejected { directive: String, reason: String },
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoggingError::InitializationFailed(msg) => {
                write!(f, "Failed to initialize logging: {}", msg)
            }
            LoggingError::InvalidConfiguration(msg) => {
                write!(f, "Invalid logging configuration: {}", msg)
            }
            LoggingError::DirectiveRejected { directive, reason } => {
                write!(f, "Rejected log directive '{}': {}", directive, reason)
            }
        }
    }
}

impl std::error::Error for LoggingError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_error_display() {
        let err = LoggingError::InitializationFailed("already set".to_string());
        assert_eq!(err.to_string(), "Failed to initialize logging: already set");

        let err = LoggingError::DirectiveRejected {
            directive: "x=y".to_string(),
            reason: "bad level".to_string(),
        };
        assert_eq!(err.to_string(), "Rejected log directive 'x=y': bad level");
    }
}
