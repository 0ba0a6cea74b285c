//! Error types for crypto operations

use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Key agreement failed: {0}")]
    KeyAgreement(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Wrong secret or tampered ciphertext
    #[error("Decryption failed")]
    Decryption,

    #[error("Unsupported sealed box version {0}")]
    UnsupportedVersion(u16),

    #[error("Malformed sealed box: {0}")]
    MalformedBox(String),
}

impl CryptoError {
    /// True when the ciphertext could not be opened with the given secret
    pub fn is_decryption_failure(&self) -> bool {
        matches!(
            self,
            CryptoError::Decryption | CryptoError::UnsupportedVersion(_) | CryptoError::MalformedBox(_)
        )
    }
}
