//! Crypto provider trait
//!
//! Abstracts the asymmetric and symmetric primitives used by the key
//! exchange and message thread code.

use super::errors::CryptoResult;
use super::keys::{ExchangeKey, KeyPair, SealedBox, SharedSecret};
use async_trait::async_trait;

/// Cryptographic primitives consumed by the chat core
///
/// `derive_shared_secret(b.exchange, a) == derive_shared_secret(a.exchange, b)`
/// must hold for any two pairs, so both sides of a relationship compute the
/// same secret without sending it.
#[async_trait]
pub trait CryptoProvider: Send + Sync {
    /// Fresh identity or group key pair
    async fn generate_key_pair(&self) -> CryptoResult<KeyPair>;

    /// Agree on a symmetric secret with the holder of `their_exchange_key`
    async fn derive_shared_secret(
        &self,
        their_exchange_key: &ExchangeKey,
        own: &KeyPair,
    ) -> CryptoResult<SharedSecret>;

    /// Authenticated encryption under `secret`
    async fn encrypt(&self, plaintext: &[u8], secret: &SharedSecret) -> CryptoResult<SealedBox>;

    /// Open a box produced by [`encrypt`](Self::encrypt)
    async fn decrypt(&self, sealed: &SealedBox, secret: &SharedSecret) -> CryptoResult<Vec<u8>>;

    /// Confirm the public halves of `pair` belong to its secret halves
    async fn check_key_pair(&self, pair: &KeyPair) -> CryptoResult<()>;
}
