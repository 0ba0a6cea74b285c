//! Key exchange protocol
//!
//! Derives and distributes relationship secrets:
//!
//! - contact secret: agreement between the two identities' exchange keys,
//!   computed independently by both sides
//! - group secret: agreement of the group key pair with itself, so every
//!   holder of the pair derives the same value
//! - group key pair at rest: sealed under the holder's agreement with the
//!   group exchange key
//! - group key pair in transit: sealed under the inviter/invitee contact
//!   secret, then resealed by the invitee on accept
//!
//! The group pair is only ever in plaintext inside a holder's process.

use super::errors::{ChatError, ChatResult};
use super::types::{ExchangeKey, Identity, PublicKey};
use crate::core_crypto::{CryptoProvider, KeyPair, SealedBox, SharedSecret};
use crate::core_graph::GraphStore;
use crate::core_identity::manager::lookup_profile;
use crate::core_identity::Session;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use zeroize::Zeroize;

#[derive(Clone)]
pub struct KeyExchange {
    graph: Arc<dyn GraphStore>,
    crypto: Arc<dyn CryptoProvider>,
    registry_timeout: Duration,
}

impl KeyExchange {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        crypto: Arc<dyn CryptoProvider>,
        registry_timeout: Duration,
    ) -> Self {
        Self {
            graph,
            crypto,
            registry_timeout,
        }
    }

    pub fn crypto(&self) -> &dyn CryptoProvider {
        self.crypto.as_ref()
    }

    /// Confirm `public_key` was bound to `alias` in the alias registry.
    ///
    /// Performs no writes. A registry that does not answer in time counts
    /// as a failed verification.
    pub async fn verify_identity(&self, public_key: &PublicKey, alias: &str) -> ChatResult<()> {
        let lookup = self.graph.keys_for_alias(alias);
        let keys = tokio::time::timeout(self.registry_timeout, lookup)
            .await
            .map_err(|_| {
                ChatError::Validation(format!("alias registry did not answer for '{}'", alias))
            })??;

        if keys.contains(public_key.as_str()) {
            Ok(())
        } else {
            debug!(alias, public_key = %public_key.short(), "alias does not own key");
            Err(ChatError::Validation(format!(
                "{} is not registered to alias '{}'",
                public_key.short(),
                alias
            )))
        }
    }

    /// Published identity of `public_key`
    pub async fn fetch_identity(&self, public_key: &PublicKey) -> ChatResult<Identity> {
        lookup_profile(self.graph.as_ref(), public_key)
            .await?
            .ok_or_else(|| {
                ChatError::MissingDependency(format!("no profile for {}", public_key.short()))
            })
    }

    /// Pairwise secret with a counterpart
    pub async fn contact_secret(
        &self,
        session: &Session,
        counterpart: &ExchangeKey,
    ) -> ChatResult<SharedSecret> {
        Ok(self
            .crypto
            .derive_shared_secret(counterpart, session.key_pair())
            .await?)
    }

    /// Content secret of a group, derivable by any holder of its pair
    pub async fn group_secret(&self, group: &KeyPair) -> ChatResult<SharedSecret> {
        Ok(self
            .crypto
            .derive_shared_secret(group.exchange_public_key(), group)
            .await?)
    }

    /// Fresh group pair plus its copy sealed for the creator
    pub async fn create_group_keys(&self, session: &Session) -> ChatResult<(KeyPair, SealedBox)> {
        let pair = self.crypto.generate_key_pair().await?;
        let sealed = self.seal_for_self(session, &pair).await?;
        Ok((pair, sealed))
    }

    /// Seal a group pair for storage in the holder's own namespace
    pub async fn seal_for_self(&self, session: &Session, group: &KeyPair) -> ChatResult<SealedBox> {
        let secret = self.contact_secret(session, group.exchange_public_key()).await?;
        self.seal_pair(group, &secret).await
    }

    /// Open the holder's own sealed copy of group `id`
    pub async fn open_for_self(
        &self,
        session: &Session,
        id: &ExchangeKey,
        sealed: &SealedBox,
    ) -> ChatResult<KeyPair> {
        let secret = self.contact_secret(session, id).await?;
        self.open_pair(id, sealed, &secret).await
    }

    /// Seal a group pair for one invitee
    pub async fn wrap_for_invitee(
        &self,
        session: &Session,
        group: &KeyPair,
        invitee: &ExchangeKey,
    ) -> ChatResult<SealedBox> {
        let secret = self.contact_secret(session, invitee).await?;
        self.seal_pair(group, &secret).await
    }

    /// Open a pair sealed by `inviter` for us
    pub async fn unwrap_from_inviter(
        &self,
        session: &Session,
        id: &ExchangeKey,
        sealed: &SealedBox,
        inviter: &ExchangeKey,
    ) -> ChatResult<KeyPair> {
        let secret = self.contact_secret(session, inviter).await?;
        self.open_pair(id, sealed, &secret).await
    }

    async fn seal_pair(&self, pair: &KeyPair, secret: &SharedSecret) -> ChatResult<SealedBox> {
        let mut plain = serde_json::to_vec(pair)?;
        let sealed = self.crypto.encrypt(&plain, secret).await;
        plain.zeroize();
        Ok(sealed?)
    }

    async fn open_pair(
        &self,
        id: &ExchangeKey,
        sealed: &SealedBox,
        secret: &SharedSecret,
    ) -> ChatResult<KeyPair> {
        let mut plain = self
            .crypto
            .decrypt(sealed, secret)
            .await
            .map_err(|e| ChatError::from_open("group key pair", e))?;
        let parsed = serde_json::from_slice::<KeyPair>(&plain);
        plain.zeroize();

        let pair = parsed.map_err(|e| ChatError::MalformedRecord(format!("group key pair: {}", e)))?;
        if pair.exchange_public_key() != id {
            return Err(ChatError::MalformedRecord(format!(
                "sealed pair does not belong to group {}",
                id.short()
            )));
        }
        self.crypto
            .check_key_pair(&pair)
            .await
            .map_err(|e| ChatError::MalformedRecord(format!("group key pair: {}", e)))?;
        Ok(pair)
    }

    /// Encrypt a serializable payload
    pub async fn seal<T: serde::Serialize + Sync>(
        &self,
        payload: &T,
        secret: &SharedSecret,
    ) -> ChatResult<SealedBox> {
        let plain = serde_json::to_vec(payload)?;
        Ok(self.crypto.encrypt(&plain, secret).await?)
    }

    /// Decrypt and parse a payload sealed by [`seal`](Self::seal)
    pub async fn open<T: serde::de::DeserializeOwned>(
        &self,
        sealed: &SealedBox,
        secret: &SharedSecret,
    ) -> ChatResult<T> {
        let plain = self
            .crypto
            .decrypt(sealed, secret)
            .await
            .map_err(|e| ChatError::from_open("message", e))?;
        serde_json::from_slice(&plain).map_err(|e| ChatError::MalformedRecord(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_crypto::DalekCrypto;
    use crate::core_graph::MemoryGraph;
    use crate::core_identity::IdentityManager;

    struct Fixture {
        graph: Arc<MemoryGraph>,
        keys: KeyExchange,
        identities: IdentityManager,
    }

    fn fixture() -> Fixture {
        let graph = Arc::new(MemoryGraph::new());
        let crypto = Arc::new(DalekCrypto::new());
        Fixture {
            keys: KeyExchange::new(graph.clone(), crypto.clone(), Duration::from_secs(1)),
            identities: IdentityManager::new(graph.clone(), crypto),
            graph,
        }
    }

    #[tokio::test]
    async fn test_contact_secret_is_symmetric() {
        let f = fixture();
        let alice = f.identities.register("alice", "Alice").await.unwrap();
        let bob = f.identities.register("bob", "Bob").await.unwrap();

        let ab = f
            .keys
            .contact_secret(&alice, &bob.identity().exchange_public_key)
            .await
            .unwrap();
        let ba = f
            .keys
            .contact_secret(&bob, &alice.identity().exchange_public_key)
            .await
            .unwrap();
        assert_eq!(ab, ba);

        let sealed = f.keys.seal(&"hi".to_string(), &ab).await.unwrap();
        let opened: String = f.keys.open(&sealed, &ba).await.unwrap();
        assert_eq!(opened, "hi");
    }

    #[tokio::test]
    async fn test_group_pair_travels_to_invitee() {
        let f = fixture();
        let alice = f.identities.register("alice", "Alice").await.unwrap();
        let bob = f.identities.register("bob", "Bob").await.unwrap();

        let (pair, own_copy) = f.keys.create_group_keys(&alice).await.unwrap();
        let id = pair.exchange_public_key().clone();
        assert_eq!(f.keys.open_for_self(&alice, &id, &own_copy).await.unwrap(), pair);

        let wrapped = f
            .keys
            .wrap_for_invitee(&alice, &pair, &bob.identity().exchange_public_key)
            .await
            .unwrap();
        let received = f
            .keys
            .unwrap_from_inviter(&bob, &id, &wrapped, &alice.identity().exchange_public_key)
            .await
            .unwrap();
        assert_eq!(received, pair);

        // Bob cannot open Alice's private copy
        let err = f.keys.open_for_self(&bob, &id, &own_copy).await.unwrap_err();
        assert!(matches!(err, ChatError::DecryptionFailure(_)));

        // Both derive the same content secret
        let s1 = f.keys.group_secret(&pair).await.unwrap();
        let s2 = f.keys.group_secret(&received).await.unwrap();
        assert_eq!(s1, s2);
    }

    #[tokio::test]
    async fn test_verify_identity() {
        let f = fixture();
        let alice = f.identities.register("alice", "Alice").await.unwrap();
        let mallory = f.identities.register("mallory", "Mallory").await.unwrap();

        assert!(f.keys.verify_identity(alice.public_key(), "alice").await.is_ok());

        let writes = f.graph.write_count();
        let err = f
            .keys
            .verify_identity(mallory.public_key(), "alice")
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Validation(_)));
        assert_eq!(f.graph.write_count(), writes);
    }

    #[tokio::test]
    async fn test_fetch_identity_missing() {
        let f = fixture();
        let stranger = DalekCrypto::new().generate_key_pair().await.unwrap();
        assert!(matches!(
            f.keys.fetch_identity(stranger.public_key()).await,
            Err(ChatError::MissingDependency(_))
        ));
    }
}
