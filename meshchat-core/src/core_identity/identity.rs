use crate::core_crypto::{ExchangeKey, PublicKey};
use serde::{Deserialize, Serialize};

/// Public face of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub public_key: PublicKey,
    pub exchange_public_key: ExchangeKey,
    pub alias: String,
    pub display_name: String,
}

impl Identity {
    /// Alias and display name are both present
    pub fn is_complete(&self) -> bool {
        !self.alias.trim().is_empty() && !self.display_name.trim().is_empty()
    }
}
