//! Crypto provider collaborator
//!
//! Key generation, key agreement and symmetric encryption behind the
//! [`CryptoProvider`] trait, with a dalek/ChaCha20-Poly1305 implementation.

pub mod dalek;
pub mod errors;
pub mod keys;
pub mod provider;

pub use dalek::DalekCrypto;
pub use errors::{CryptoError, CryptoResult};
pub use keys::{ExchangeKey, KeyPair, PublicKey, SealedBox, SharedSecret, SEALED_BOX_VERSION};
pub use provider::CryptoProvider;
