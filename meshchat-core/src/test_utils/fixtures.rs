//! Test fixtures for multi-client scenarios

use crate::config::Config;
use crate::core_chat::{ChatClient, GroupKind};
use crate::core_crypto::{DalekCrypto, ExchangeKey};
use crate::core_graph::MemoryGraph;
use crate::core_identity::IdentityManager;
use std::sync::Arc;
use std::time::Duration;

/// Display name used for a test alias: "alice" becomes "Alice"
pub fn display_name(alias: &str) -> String {
    let mut chars = alias.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Config with a short registry timeout
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.session.registry_timeout = Duration::from_secs(1);
    config
}

/// Several clients sharing one graph
pub struct TestNetwork {
    pub graph: Arc<MemoryGraph>,
    pub crypto: Arc<DalekCrypto>,
    pub identities: IdentityManager,
}

impl Default for TestNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl TestNetwork {
    pub fn new() -> Self {
        let graph = Arc::new(MemoryGraph::new());
        let crypto = Arc::new(DalekCrypto::new());
        let identities = IdentityManager::new(graph.clone(), crypto.clone());
        Self {
            graph,
            crypto,
            identities,
        }
    }

    /// A logged-in client with nothing left to process
    pub fn client(&self) -> ChatClient {
        ChatClient::new(self.graph.clone(), self.crypto.clone(), test_config())
    }

    /// Register `alias` and return its logged-in, idle client
    pub async fn join(&self, alias: &str) -> ChatClient {
        let session = self
            .identities
            .register(alias, &display_name(alias))
            .await
            .expect("register test identity");
        let mut client = self.client();
        client.login(session).await.expect("login test identity");
        client.process_pending().await;
        client
    }

    /// Drain every client until none has queued updates
    pub async fn settle(&self, clients: &mut [&mut ChatClient]) {
        loop {
            let mut handled = 0;
            for client in clients.iter_mut() {
                handled += client.process_pending().await;
            }
            if handled == 0 {
                break;
            }
        }
    }

    /// `proposer` adds `acceptor`, who accepts
    pub async fn befriend(&self, proposer: &mut ChatClient, acceptor: &mut ChatClient) {
        let identity = acceptor.identity().expect("acceptor logged in").clone();
        proposer
            .add_contact(&identity.public_key, &identity.alias)
            .await
            .expect("add contact");
        self.settle(&mut [&mut *proposer, &mut *acceptor]).await;

        let proposer_key = proposer.identity().expect("proposer logged in").public_key.clone();
        let invite_id = acceptor
            .contact_invites()
            .iter()
            .find(|invite| invite.inviter.public_key == proposer_key)
            .map(|invite| invite.invite_id.clone())
            .expect("contact invite delivered");
        acceptor
            .accept_contact_invite(&invite_id)
            .await
            .expect("accept contact");
        self.settle(&mut [&mut *proposer, &mut *acceptor]).await;
    }

    /// `inviter` invites `invitee` into group `id`, who accepts
    pub async fn invite_and_accept(
        &self,
        kind: GroupKind,
        id: &ExchangeKey,
        inviter: &mut ChatClient,
        invitee: &mut ChatClient,
    ) {
        let identity = invitee.identity().expect("invitee logged in").clone();
        inviter
            .invite_to_group(kind, id, &identity.public_key, &identity.alias)
            .await
            .expect("invite to group");
        self.settle(&mut [&mut *inviter, &mut *invitee]).await;

        let invite_id = invitee
            .group_invites(kind)
            .iter()
            .find(|invite| invite.relationship_id == id.as_str())
            .map(|invite| invite.invite_id.clone())
            .expect("group invite delivered");
        invitee
            .accept_group_invite(kind, &invite_id)
            .await
            .expect("accept group invite");
        self.settle(&mut [&mut *inviter, &mut *invitee]).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("alice"), "Alice");
        assert_eq!(display_name(""), "");
    }

    #[tokio::test]
    async fn test_join_starts_idle() {
        let network = TestNetwork::new();
        let mut alice = network.join("alice").await;
        assert_eq!(alice.process_pending().await, 0);
        assert!(alice.contacts().is_empty());
    }
}
