//! Key material types
//!
//! Public halves travel as lowercase hex so they can be used directly as
//! graph path segments. Secret halves are zeroized on drop and never shown
//! by `Debug`.

use super::errors::{CryptoError, CryptoResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Current layout of [`SealedBox`]
pub const SEALED_BOX_VERSION: u16 = 1;

fn decode_key(kind: &str, value: &str) -> CryptoResult<[u8; 32]> {
    let bytes =
        hex::decode(value).map_err(|e| CryptoError::InvalidKey(format!("{}: {}", kind, e)))?;
    bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidKey(format!("{}: expected 32 bytes", kind)))
}

fn normalize(kind: &str, value: &str) -> CryptoResult<String> {
    let lower = value.to_ascii_lowercase();
    decode_key(kind, &lower)?;
    Ok(lower)
}

/// Ed25519 identity key, the primary id of a user
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PublicKey(String);

/// X25519 key used only for shared-secret agreement.
///
/// A group's exchange key doubles as the group id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExchangeKey(String);

impl PublicKey {
    pub fn parse(value: &str) -> CryptoResult<Self> {
        normalize("public key", value).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight hex digits, for log lines
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl ExchangeKey {
    pub fn parse(value: &str) -> CryptoResult<Self> {
        normalize("exchange key", value).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        &self.0[..8]
    }

    pub(crate) fn to_bytes(&self) -> CryptoResult<[u8; 32]> {
        decode_key("exchange key", &self.0)
    }
}

impl TryFrom<String> for PublicKey {
    type Error = CryptoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<String> for ExchangeKey {
    type Error = CryptoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PublicKey> for String {
    fn from(key: PublicKey) -> Self {
        key.0
    }
}

impl From<ExchangeKey> for String {
    fn from(key: ExchangeKey) -> Self {
        key.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ExchangeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Full key pair of an identity or a group.
///
/// Serializable so a group pair can be sealed and shipped to invitees.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct KeyPair {
    #[zeroize(skip)]
    public_key: PublicKey,
    signing_secret: String,
    #[zeroize(skip)]
    exchange_public_key: ExchangeKey,
    exchange_secret: String,
}

impl KeyPair {
    pub(crate) fn from_parts(
        public_key: PublicKey,
        signing_secret: String,
        exchange_public_key: ExchangeKey,
        exchange_secret: String,
    ) -> Self {
        Self {
            public_key,
            signing_secret,
            exchange_public_key,
            exchange_secret,
        }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn exchange_public_key(&self) -> &ExchangeKey {
        &self.exchange_public_key
    }

    pub(crate) fn exchange_secret_bytes(&self) -> CryptoResult<[u8; 32]> {
        decode_key("exchange secret", &self.exchange_secret)
    }

    pub(crate) fn signing_secret_bytes(&self) -> CryptoResult<[u8; 32]> {
        decode_key("signing secret", &self.signing_secret)
    }
}

impl PartialEq for KeyPair {
    fn eq(&self, other: &Self) -> bool {
        self.public_key == other.public_key && self.exchange_public_key == other.exchange_public_key
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key.short())
            .field("exchange_public_key", &self.exchange_public_key.short())
            .field("secrets", &"[REDACTED]")
            .finish()
    }
}

/// Symmetric key of one relationship
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; 32]);

impl SharedSecret {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret([REDACTED])")
    }
}

/// Versioned ciphertext envelope, stored as-is in graph values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBox {
    pub v: u16,
    /// Hex encoded nonce
    pub nonce: String,
    /// Hex encoded ciphertext including the tag
    pub ct: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0f0e0d0c0b0a09080706050403020100ffeeddccbbaa99887766554433221100";

    #[test]
    fn test_public_key_parse_normalizes_case() {
        let key = PublicKey::parse(&KEY.to_uppercase()).unwrap();
        assert_eq!(key.as_str(), KEY);
        assert_eq!(key.short(), "0f0e0d0c");
    }

    #[test]
    fn test_public_key_rejects_bad_input() {
        assert!(PublicKey::parse("not hex").is_err());
        assert!(PublicKey::parse("abcd").is_err());
        assert!(serde_json::from_str::<PublicKey>("\"zz\"").is_err());
    }

    #[test]
    fn test_key_serde_as_string() {
        let key = ExchangeKey::parse(KEY).unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{}\"", KEY));
        assert_eq!(serde_json::from_str::<ExchangeKey>(&json).unwrap(), key);
    }

    #[test]
    fn test_secrets_redacted() {
        let secret = SharedSecret::from_bytes([7u8; 32]);
        assert_eq!(format!("{:?}", secret), "SharedSecret([REDACTED])");
    }
}
