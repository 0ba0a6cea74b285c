use super::identity::Identity;
use crate::core_crypto::{KeyPair, PublicKey};

/// A logged-in identity together with its key pair
#[derive(Debug, Clone)]
pub struct Session {
    key_pair: KeyPair,
    identity: Identity,
}

impl Session {
    pub fn new(key_pair: KeyPair, alias: impl Into<String>, display_name: impl Into<String>) -> Self {
        let identity = Identity {
            public_key: key_pair.public_key().clone(),
            exchange_public_key: key_pair.exchange_public_key().clone(),
            alias: alias.into(),
            display_name: display_name.into(),
        };
        Self { key_pair, identity }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.identity.public_key
    }

    pub fn display_name(&self) -> &str {
        &self.identity.display_name
    }

    /// Display name is the only mutable part of an identity
    pub fn set_display_name(&mut self, display_name: impl Into<String>) {
        self.identity.display_name = display_name.into();
    }
}
