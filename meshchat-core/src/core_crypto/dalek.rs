/*
    DalekCrypto - CryptoProvider on top of the dalek curves

    - identity key: Ed25519
    - exchange key: X25519
    - shared secret: HKDF-SHA256 over the raw X25519 output
    - content: ChaCha20-Poly1305, random 96-bit nonce per box
*/

use super::errors::{CryptoError, CryptoResult};
use super::keys::{ExchangeKey, KeyPair, PublicKey, SealedBox, SharedSecret, SEALED_BOX_VERSION};
use super::provider::CryptoProvider;
use async_trait::async_trait;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use ed25519_dalek::SigningKey;
use hkdf::Hkdf;
use sha2::Sha256;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroize;

const SECRET_INFO: &[u8] = b"meshchat relationship secret v1";
const NONCE_LEN: usize = 12;

/// Default provider
#[derive(Debug, Clone, Copy, Default)]
pub struct DalekCrypto;

impl DalekCrypto {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CryptoProvider for DalekCrypto {
    async fn generate_key_pair(&self) -> CryptoResult<KeyPair> {
        let mut seed: [u8; 32] = rand::random();
        let signing = SigningKey::from_bytes(&seed);
        let public_key = PublicKey::parse(&hex::encode(signing.verifying_key().to_bytes()))?;
        let signing_secret = hex::encode(seed);
        seed.zeroize();

        let mut exchange_bytes: [u8; 32] = rand::random();
        let exchange = StaticSecret::from(exchange_bytes);
        let exchange_public = X25519PublicKey::from(&exchange);
        let exchange_public_key = ExchangeKey::parse(&hex::encode(exchange_public.as_bytes()))?;
        let exchange_secret = hex::encode(exchange_bytes);
        exchange_bytes.zeroize();

        Ok(KeyPair::from_parts(
            public_key,
            signing_secret,
            exchange_public_key,
            exchange_secret,
        ))
    }

    async fn derive_shared_secret(
        &self,
        their_exchange_key: &ExchangeKey,
        own: &KeyPair,
    ) -> CryptoResult<SharedSecret> {
        let theirs = X25519PublicKey::from(their_exchange_key.to_bytes()?);
        let ours = StaticSecret::from(own.exchange_secret_bytes()?);

        let shared = ours.diffie_hellman(&theirs);
        if !shared.was_contributory() {
            return Err(CryptoError::KeyAgreement(
                "peer exchange key is a low order point".to_string(),
            ));
        }

        let hk = Hkdf::<Sha256>::new(None, shared.as_bytes());
        let mut okm = [0u8; 32];
        hk.expand(SECRET_INFO, &mut okm)
            .map_err(|e| CryptoError::KeyAgreement(e.to_string()))?;

        Ok(SharedSecret::from_bytes(okm))
    }

    async fn encrypt(&self, plaintext: &[u8], secret: &SharedSecret) -> CryptoResult<SealedBox> {
        let cipher = ChaCha20Poly1305::new(Key::from_slice(secret.as_bytes()));
        let nonce_bytes: [u8; NONCE_LEN] = rand::random();

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;

        Ok(SealedBox {
            v: SEALED_BOX_VERSION,
            nonce: hex::encode(nonce_bytes),
            ct: hex::encode(ciphertext),
        })
    }

    async fn decrypt(&self, sealed: &SealedBox, secret: &SharedSecret) -> CryptoResult<Vec<u8>> {
        if sealed.v != SEALED_BOX_VERSION {
            return Err(CryptoError::UnsupportedVersion(sealed.v));
        }

        let nonce = hex::decode(&sealed.nonce)
            .map_err(|e| CryptoError::MalformedBox(format!("nonce: {}", e)))?;
        if nonce.len() != NONCE_LEN {
            return Err(CryptoError::MalformedBox(format!(
                "nonce must be {} bytes",
                NONCE_LEN
            )));
        }
        let ciphertext =
            hex::decode(&sealed.ct).map_err(|e| CryptoError::MalformedBox(format!("ct: {}", e)))?;

        let cipher = ChaCha20Poly1305::new(Key::from_slice(secret.as_bytes()));
        cipher
            .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
            .map_err(|_| CryptoError::Decryption)
    }

    async fn check_key_pair(&self, pair: &KeyPair) -> CryptoResult<()> {
        let signing = SigningKey::from_bytes(&pair.signing_secret_bytes()?);
        if hex::encode(signing.verifying_key().to_bytes()) != pair.public_key().as_str() {
            return Err(CryptoError::InvalidKey(
                "signing secret does not match public key".to_string(),
            ));
        }

        let exchange = StaticSecret::from(pair.exchange_secret_bytes()?);
        if hex::encode(X25519PublicKey::from(&exchange).as_bytes())
            != pair.exchange_public_key().as_str()
        {
            return Err(CryptoError::InvalidKey(
                "exchange secret does not match exchange key".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generated_pairs_are_consistent() {
        let crypto = DalekCrypto::new();
        let pair = crypto.generate_key_pair().await.unwrap();
        assert!(crypto.check_key_pair(&pair).await.is_ok());

        let other = crypto.generate_key_pair().await.unwrap();
        assert_ne!(pair.public_key(), other.public_key());
    }

    #[tokio::test]
    async fn test_shared_secret_agrees_from_both_sides() {
        let crypto = DalekCrypto::new();
        let alice = crypto.generate_key_pair().await.unwrap();
        let bob = crypto.generate_key_pair().await.unwrap();

        let from_alice = crypto
            .derive_shared_secret(bob.exchange_public_key(), &alice)
            .await
            .unwrap();
        let from_bob = crypto
            .derive_shared_secret(alice.exchange_public_key(), &bob)
            .await
            .unwrap();

        assert_eq!(from_alice, from_bob);
    }

    #[tokio::test]
    async fn test_encrypt_round_trip_and_wrong_secret() {
        let crypto = DalekCrypto::new();
        let secret = SharedSecret::from_bytes([1u8; 32]);
        let wrong = SharedSecret::from_bytes([2u8; 32]);

        let sealed = crypto.encrypt(b"hello", &secret).await.unwrap();
        assert_eq!(sealed.v, SEALED_BOX_VERSION);
        assert_eq!(crypto.decrypt(&sealed, &secret).await.unwrap(), b"hello");

        let err = crypto.decrypt(&sealed, &wrong).await.unwrap_err();
        assert!(err.is_decryption_failure());
    }

    #[tokio::test]
    async fn test_tampered_and_unknown_boxes_rejected() {
        let crypto = DalekCrypto::new();
        let secret = SharedSecret::from_bytes([9u8; 32]);
        let sealed = crypto.encrypt(b"payload", &secret).await.unwrap();

        let mut tampered = sealed.clone();
        let mut ct = hex::decode(&tampered.ct).unwrap();
        ct[0] ^= 0xff;
        tampered.ct = hex::encode(ct);
        assert!(matches!(
            crypto.decrypt(&tampered, &secret).await,
            Err(CryptoError::Decryption)
        ));

        let mut future = sealed;
        future.v = 2;
        assert!(matches!(
            crypto.decrypt(&future, &secret).await,
            Err(CryptoError::UnsupportedVersion(2))
        ));
    }

    #[tokio::test]
    async fn test_mismatched_pair_detected() {
        let crypto = DalekCrypto::new();
        let a = crypto.generate_key_pair().await.unwrap();
        let b = crypto.generate_key_pair().await.unwrap();

        let spliced: KeyPair =
            serde_json::from_value(serde_json::json!({
                "public_key": a.public_key(),
                "signing_secret": hex::encode(a.signing_secret_bytes().unwrap()),
                "exchange_public_key": b.exchange_public_key(),
                "exchange_secret": hex::encode(a.exchange_secret_bytes().unwrap()),
            }))
            .unwrap();

        assert!(crypto.check_key_pair(&spliced).await.is_err());
    }
}
