//! Error types for the chat core

use crate::core_crypto::CryptoError;
use crate::core_graph::GraphError;
use thiserror::Error;

/// Result type for chat operations
pub type ChatResult<T> = Result<T, ChatError>;

/// Errors raised by chat operations and event handlers
///
/// Only [`ChatError::Validation`] is expected to reach callers of add and
/// invite flows in normal operation. The absorbed kinds (see
/// [`ChatError::is_absorbed`]) are swallowed by event handlers, leaving the
/// affected entity not yet materialized until a later delivery succeeds.
#[derive(Error, Debug)]
pub enum ChatError {
    /// Claimed alias and public key do not match the alias registry
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Ciphertext could not be opened with the secret available right now
    #[error("Decryption failed: {0}")]
    DecryptionFailure(String),

    /// A record this one depends on has not arrived yet
    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    /// Stored value has an unexpected shape or version
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No active session")]
    NotLoggedIn,

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ChatError {
    /// Failures that event handlers absorb instead of surfacing
    pub fn is_absorbed(&self) -> bool {
        matches!(
            self,
            ChatError::DecryptionFailure(_)
                | ChatError::MissingDependency(_)
                | ChatError::MalformedRecord(_)
        )
    }

    /// Map a failed open into the absorbed decryption kind
    pub(crate) fn from_open(context: &str, err: CryptoError) -> Self {
        if err.is_decryption_failure() {
            ChatError::DecryptionFailure(format!("{}: {}", context, err))
        } else {
            ChatError::Crypto(err)
        }
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(e: serde_json::Error) -> Self {
        ChatError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absorbed_kinds() {
        assert!(ChatError::DecryptionFailure("x".into()).is_absorbed());
        assert!(ChatError::MissingDependency("x".into()).is_absorbed());
        assert!(ChatError::MalformedRecord("x".into()).is_absorbed());
        assert!(!ChatError::Validation("x".into()).is_absorbed());
        assert!(!ChatError::NotLoggedIn.is_absorbed());
    }

    #[test]
    fn test_open_failure_mapping() {
        let err = ChatError::from_open("group key", CryptoError::Decryption);
        assert!(matches!(err, ChatError::DecryptionFailure(_)));

        let err = ChatError::from_open("group key", CryptoError::InvalidKey("short".into()));
        assert!(matches!(err, ChatError::Crypto(_)));
    }
}
