//! Account registration, login and profile lookup

use super::identity::Identity;
use super::session::Session;
use crate::core_chat::errors::{ChatError, ChatResult};
use crate::core_chat::paths;
use crate::core_chat::records;
use crate::core_crypto::{CryptoProvider, ExchangeKey, KeyPair, PublicKey};
use crate::core_graph::GraphStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// What an identity publishes about itself under `~<key>/profile`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub alias: String,
    pub display_name: String,
    pub exchange_public_key: ExchangeKey,
}

/// Creates sessions and resolves other users' public profiles
pub struct IdentityManager {
    graph: Arc<dyn GraphStore>,
    crypto: Arc<dyn CryptoProvider>,
}

impl IdentityManager {
    pub fn new(graph: Arc<dyn GraphStore>, crypto: Arc<dyn CryptoProvider>) -> Self {
        Self { graph, crypto }
    }

    /// Generate a key pair, bind it to `alias` and log in
    pub async fn register(&self, alias: &str, display_name: &str) -> ChatResult<Session> {
        if alias.trim().is_empty() || display_name.trim().is_empty() {
            return Err(ChatError::InvalidInput(
                "alias and display name must not be empty".to_string(),
            ));
        }

        let key_pair = self.crypto.generate_key_pair().await?;
        self.graph
            .register_alias(alias, key_pair.public_key().as_str())
            .await?;

        info!(alias, public_key = %key_pair.public_key().short(), "registered identity");
        self.login(key_pair, alias, display_name).await
    }

    /// Start a session for an existing key pair and publish its profile
    pub async fn login(&self, key_pair: KeyPair, alias: &str, display_name: &str) -> ChatResult<Session> {
        let session = Session::new(key_pair, alias, display_name);
        self.publish_profile(&session).await?;
        info!(alias, public_key = %session.public_key().short(), "logged in");
        Ok(session)
    }

    /// Change the display name and republish the profile
    pub async fn update_display_name(&self, session: &mut Session, display_name: &str) -> ChatResult<()> {
        session.set_display_name(display_name);
        self.publish_profile(session).await
    }

    async fn publish_profile(&self, session: &Session) -> ChatResult<()> {
        let identity = session.identity();
        let profile = ProfileRecord {
            alias: identity.alias.clone(),
            display_name: identity.display_name.clone(),
            exchange_public_key: identity.exchange_public_key.clone(),
        };

        self.graph
            .put(
                identity.public_key.as_str(),
                &paths::profile(&identity.public_key),
                records::encode(profile)?,
            )
            .await?;
        Ok(())
    }

    /// Published profile of `public_key`, if any
    pub async fn lookup(&self, public_key: &PublicKey) -> ChatResult<Option<Identity>> {
        lookup_profile(self.graph.as_ref(), public_key).await
    }
}

pub(crate) async fn lookup_profile(
    graph: &dyn GraphStore,
    public_key: &PublicKey,
) -> ChatResult<Option<Identity>> {
    let Some(value) = graph.get(&paths::profile(public_key)).await? else {
        debug!(public_key = %public_key.short(), "no profile published");
        return Ok(None);
    };

    let profile: ProfileRecord = records::decode(&value)?;
    Ok(Some(Identity {
        public_key: public_key.clone(),
        exchange_public_key: profile.exchange_public_key,
        alias: profile.alias,
        display_name: profile.display_name,
    }))
}
