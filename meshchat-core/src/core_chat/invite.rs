//! Invite protocol
//!
//! `Proposed -> Accepted | Denied`. A proposal is written only into the
//! invitee's inbox. Accepting or denying retires the invite id with a
//! tombstone in the same inbox slot, and the materializer guarantees a
//! retired id never shows up as proposed again. A later re-invite carries a
//! fresh id.

use super::errors::{ChatError, ChatResult};
use super::key_exchange::KeyExchange;
use super::materializer::{Materialize, Observation};
use super::records::{Entry, InviteRecord};
use super::types::{
    Admins, ExchangeKey, Invite, InviteState, PublicKey, RelationshipKind, Roster, Timestamp,
};
use crate::core_crypto::SealedBox;
use crate::core_identity::{Identity, Session};
use uuid::Uuid;

impl Materialize for Invite {
    /// One live invite per relationship; a newer proposal replaces it
    fn slot(&self) -> &str {
        &self.relationship_id
    }

    fn id(&self) -> &str {
        &self.invite_id
    }

    /// Redeliveries skip the unwrap step, so keep the pair we already have
    fn refresh(&mut self, incoming: Self) {
        let key_pair = incoming.key_pair.clone().or_else(|| self.key_pair.take());
        *self = incoming;
        self.key_pair = key_pair;
    }
}

/// Inputs of a proposal
pub struct Proposal {
    pub kind: RelationshipKind,
    pub relationship_id: String,
    pub name: String,
    pub key_material: Option<SealedBox>,
    pub roster: Roster,
    pub admins: Admins,
    pub owner: Option<PublicKey>,
}

impl Proposal {
    /// Contacts are identified by the proposer's key and carry no key material
    pub fn contact(inviter: &Identity) -> Self {
        Self {
            kind: RelationshipKind::Contact,
            relationship_id: inviter.public_key.to_string(),
            name: inviter.display_name.clone(),
            key_material: None,
            roster: Roster::new(),
            admins: Admins::new(),
            owner: None,
        }
    }

    /// Stamp a fresh invite id
    pub fn into_record(self, inviter: &Identity, issued_at: Timestamp) -> InviteRecord {
        InviteRecord {
            invite_id: Uuid::new_v4().to_string(),
            kind: self.kind,
            relationship_id: self.relationship_id,
            name: self.name,
            inviter: inviter.clone(),
            key_material: self.key_material,
            roster: self.roster,
            admins: self.admins,
            owner: self.owner,
            issued_at,
        }
    }
}

/// Tombstone retiring `invite`, written on both accept and deny
pub fn retire(invite: &Invite) -> Entry<InviteRecord> {
    Entry::Disabled {
        id: invite.invite_id.clone(),
    }
}

/// Decode step of the invite materializers.
///
/// Group invites are only ready once their key material opens with the
/// pairwise secret; until then the invite stays unmaterialized.
pub async fn observe(
    keys: &KeyExchange,
    session: &Session,
    expected: RelationshipKind,
    needs_key: bool,
    entry: Entry<InviteRecord>,
) -> ChatResult<Observation<Invite>> {
    let record = match entry {
        Entry::Active(record) => record,
        Entry::Disabled { id } => return Ok(Observation::Disabled { id }),
    };

    if record.kind != expected {
        return Err(ChatError::MalformedRecord(format!(
            "{} invite delivered to the {} inbox",
            record.kind, expected
        )));
    }
    record.issued_at.ensure_plausible("invite")?;
    if !record.inviter.is_complete() || record.name.trim().is_empty() {
        return Ok(Observation::NotReady);
    }

    let key_pair = match expected {
        RelationshipKind::Contact => {
            if record.relationship_id != record.inviter.public_key.as_str() {
                return Err(ChatError::MalformedRecord(
                    "contact invite must be keyed by the inviter".to_string(),
                ));
            }
            None
        }
        RelationshipKind::Channel | RelationshipKind::Announcement => {
            let Some(sealed) = record.key_material.as_ref() else {
                return Ok(Observation::NotReady);
            };
            if !needs_key {
                // Already materialized; the pair was unwrapped on first sight
                None
            } else {
                let id = ExchangeKey::parse(&record.relationship_id)
                    .map_err(|e| ChatError::MalformedRecord(e.to_string()))?;
                let pair = keys
                    .unwrap_from_inviter(session, &id, sealed, &record.inviter.exchange_public_key)
                    .await?;
                Some(pair)
            }
        }
    };

    if expected == RelationshipKind::Announcement && record.owner.is_none() {
        return Ok(Observation::NotReady);
    }

    Ok(Observation::Ready(Invite {
        invite_id: record.invite_id,
        kind: record.kind,
        relationship_id: record.relationship_id,
        name: record.name,
        inviter: record.inviter,
        key_pair,
        roster: record.roster,
        admins: record.admins,
        owner: record.owner,
        issued_at: record.issued_at,
        state: InviteState::Proposed,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_chat::materializer::{Materializer, Transition};
    use crate::core_crypto::DalekCrypto;
    use crate::core_graph::MemoryGraph;
    use crate::core_identity::IdentityManager;
    use std::sync::Arc;
    use std::time::Duration;

    async fn setup() -> (KeyExchange, Session, Session) {
        let graph = Arc::new(MemoryGraph::new());
        let crypto = Arc::new(DalekCrypto::new());
        let identities = IdentityManager::new(graph.clone(), crypto.clone());
        let alice = identities.register("alice", "Alice").await.unwrap();
        let bob = identities.register("bob", "Bob").await.unwrap();
        (KeyExchange::new(graph, crypto, Duration::from_secs(1)), alice, bob)
    }

    #[tokio::test]
    async fn test_contact_invite_materializes() {
        let (keys, alice, bob) = setup().await;
        let record = Proposal::contact(alice.identity()).into_record(alice.identity(), Timestamp(1));

        let observed = observe(&keys, &bob, RelationshipKind::Contact, true, Entry::Active(record))
            .await
            .unwrap();
        match observed {
            Observation::Ready(invite) => {
                assert_eq!(invite.inviter.alias, "alice");
                assert_eq!(invite.state, InviteState::Proposed);
                assert!(invite.key_pair.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_group_invite_unwraps_key() {
        let (keys, alice, bob) = setup().await;
        let (pair, _) = keys.create_group_keys(&alice).await.unwrap();
        let sealed = keys
            .wrap_for_invitee(&alice, &pair, &bob.identity().exchange_public_key)
            .await
            .unwrap();

        let proposal = Proposal {
            kind: RelationshipKind::Channel,
            relationship_id: pair.exchange_public_key().to_string(),
            name: "general".to_string(),
            key_material: Some(sealed),
            roster: Roster::new(),
            admins: Admins::new(),
            owner: None,
        };
        let record = proposal.into_record(alice.identity(), Timestamp(1));

        let observed = observe(&keys, &bob, RelationshipKind::Channel, true, Entry::Active(record.clone()))
            .await
            .unwrap();
        let Observation::Ready(invite) = observed else {
            panic!("invite not ready");
        };
        assert_eq!(invite.key_pair.as_ref(), Some(&pair));

        // A third party cannot open it
        let err = observe(&keys, &alice, RelationshipKind::Channel, true, Entry::Active(record))
            .await
            .unwrap_err();
        assert!(err.is_absorbed());
    }

    #[tokio::test]
    async fn test_retired_invite_never_returns() {
        let (keys, alice, bob) = setup().await;
        let record = Proposal::contact(alice.identity()).into_record(alice.identity(), Timestamp(1));
        let mut invites = Materializer::new();

        let first = observe(&keys, &bob, RelationshipKind::Contact, true, Entry::Active(record.clone()))
            .await
            .unwrap();
        assert_eq!(invites.apply(first), Transition::Inserted);

        let tombstone = retire(&invites.items()[0]);
        let observed = observe(&keys, &bob, RelationshipKind::Contact, true, tombstone).await.unwrap();
        assert_eq!(invites.apply(observed), Transition::Removed);

        let replay = observe(&keys, &bob, RelationshipKind::Contact, true, Entry::Active(record))
            .await
            .unwrap();
        assert_eq!(invites.apply(replay), Transition::Ignored);
        assert!(invites.is_empty());
    }

    #[tokio::test]
    async fn test_far_future_invite_rejected() {
        let (keys, alice, bob) = setup().await;
        let record = Proposal::contact(alice.identity()).into_record(alice.identity(), Timestamp(u64::MAX));

        let err = observe(&keys, &bob, RelationshipKind::Contact, true, Entry::Active(record))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::MalformedRecord(_)));
    }

    #[tokio::test]
    async fn test_incomplete_inviter_not_ready() {
        let (keys, alice, bob) = setup().await;
        let mut record = Proposal::contact(alice.identity()).into_record(alice.identity(), Timestamp(1));
        record.inviter.display_name.clear();

        let observed = observe(&keys, &bob, RelationshipKind::Contact, true, Entry::Active(record))
            .await
            .unwrap();
        assert_eq!(observed, Observation::NotReady);
    }
}
