//! 1:1 contacts: proposal, acceptance, removal and direct messages

use super::routing::{self, Route};
use super::ChatClient;
use crate::core_chat::errors::{ChatError, ChatResult};
use crate::core_chat::invite::{self, Proposal};
use crate::core_chat::materializer::{MaterialState, Observation};
use crate::core_chat::paths;
use crate::core_chat::records::{
    self, ChatLine, ContactRecord, Entry, InviteRecord, LatestRecord, MessageBody, UnreadMarker,
};
use crate::core_chat::types::{Contact, ContactState, Message, RelationshipKind, ThreadKey, Timestamp};
use crate::core_crypto::PublicKey;
use crate::core_graph::GraphEvent;
use tracing::{debug, info, trace};
use uuid::Uuid;

impl ChatClient {
    /// Propose a contact relationship to `public_key`.
    ///
    /// `alias` must match the alias registry. Our own contact entry is
    /// written as invited and turns active once the counterpart accepts.
    pub async fn add_contact(&mut self, public_key: &PublicKey, alias: &str) -> ChatResult<()> {
        let session = self.session()?.clone();
        let me = session.public_key();
        if public_key == me {
            return Err(ChatError::Validation("cannot add yourself".to_string()));
        }

        self.keys.verify_identity(public_key, alias).await?;
        let counterpart = self.keys.fetch_identity(public_key).await?;

        if self.contacts.get(public_key.as_str()).is_none() {
            let record = ContactRecord {
                incarnation: Uuid::new_v4().to_string(),
                identity: counterpart,
                state: ContactState::Invited,
            };
            self.put(&paths::contact(me, public_key), Entry::Active(record))
                .await?;
        }

        let issued_at = self.clock.next();
        let proposal = Proposal::contact(session.identity()).into_record(session.identity(), issued_at);
        let path = paths::invite(
            public_key,
            RelationshipKind::Contact,
            me,
            &proposal.relationship_id,
        );
        self.put(&path, Entry::Active(proposal)).await?;

        info!(contact = %public_key.short(), alias, "contact proposed");
        Ok(())
    }

    /// Accept a pending contact invite
    pub async fn accept_contact_invite(&mut self, invite_id: &str) -> ChatResult<()> {
        let invite = self
            .contact_invites
            .find_by_id(invite_id)
            .cloned()
            .ok_or_else(|| ChatError::NotFound(format!("contact invite {}", invite_id)))?;
        let inviter = invite.inviter.clone();
        self.keys
            .verify_identity(&inviter.public_key, &inviter.alias)
            .await?;

        let me = self.me()?;
        let incarnation = match self.contacts.get(inviter.public_key.as_str()) {
            Some(existing) => existing.incarnation.clone(),
            None => Uuid::new_v4().to_string(),
        };
        let record = ContactRecord {
            incarnation,
            identity: inviter.clone(),
            state: ContactState::Active,
        };
        self.put(&paths::contact(&me, &inviter.public_key), Entry::Active(record))
            .await?;
        self.retire_invite(RelationshipKind::Contact, &invite).await?;

        info!(contact = %inviter.public_key.short(), "contact invite accepted");
        Ok(())
    }

    /// Deny a pending contact invite. Nothing is written for the inviter.
    pub async fn deny_contact_invite(&mut self, invite_id: &str) -> ChatResult<()> {
        let invite = self
            .contact_invites
            .find_by_id(invite_id)
            .cloned()
            .ok_or_else(|| ChatError::NotFound(format!("contact invite {}", invite_id)))?;
        self.retire_invite(RelationshipKind::Contact, &invite).await?;
        info!(contact = %invite.inviter.public_key.short(), "contact invite denied");
        Ok(())
    }

    /// Soft-remove a contact. A later add starts a new incarnation.
    pub async fn remove_contact(&mut self, public_key: &PublicKey) -> ChatResult<()> {
        let me = self.me()?;
        let contact = self
            .contacts
            .get(public_key.as_str())
            .cloned()
            .ok_or_else(|| ChatError::NotFound(format!("contact {}", public_key.short())))?;

        let tombstone = Entry::<ContactRecord>::Disabled {
            id: contact.incarnation,
        };
        self.put(&paths::contact(&me, public_key), tombstone).await?;
        info!(contact = %public_key.short(), "contact removed");
        Ok(())
    }

    /// Send a direct message.
    ///
    /// Empty text is a no-op and returns `None`.
    pub async fn send_contact_message(
        &mut self,
        public_key: &PublicKey,
        text: &str,
    ) -> ChatResult<Option<Timestamp>> {
        if text.is_empty() {
            return Ok(None);
        }
        self.check_length(text)?;

        let session = self.session()?.clone();
        let me = session.public_key();
        let contact = self
            .contacts
            .get(public_key.as_str())
            .cloned()
            .ok_or_else(|| ChatError::NotFound(format!("contact {}", public_key.short())))?;

        let secret = self
            .keys
            .contact_secret(&session, &contact.identity.exchange_public_key)
            .await?;
        let body = MessageBody {
            sender_name: session.display_name().to_string(),
            text: text.to_string(),
            control: None,
        };
        let sealed = self.keys.seal(&body, &secret).await?;
        let at = self.clock.next();

        let line = ChatLine {
            timestamp: at,
            sealed: sealed.clone(),
        };
        self.put(&paths::entry(&paths::direct_log(me, public_key), at), line)
            .await?;
        self.put(
            &paths::direct_markers(public_key, me).child(at),
            Entry::Active(UnreadMarker { timestamp: at }),
        )
        .await?;

        let latest = LatestRecord {
            timestamp: at,
            sender: me.clone(),
            sealed,
        };
        self.put(&paths::direct_latest(public_key, me), latest.clone())
            .await?;
        self.put(&paths::direct_latest(me, public_key), latest).await?;

        debug!(contact = %public_key.short(), %at, "direct message sent");
        Ok(Some(at))
    }

    /// Open the thread with `public_key` and follow both directions of it
    pub async fn load_contact_messages(&mut self, public_key: &PublicKey) -> ChatResult<()> {
        let me = self.me()?;
        if self.contacts.get(public_key.as_str()).is_none() {
            return Err(ChatError::NotFound(format!("contact {}", public_key.short())));
        }

        let key = ThreadKey::Contact(public_key.clone());
        self.open_thread(key.clone());

        self.watch_or_replay(
            paths::direct_log(&me, public_key),
            Route::DirectLog {
                counterpart: public_key.clone(),
                writer: me.clone(),
            },
        )
        .await?;
        self.watch_or_replay(
            paths::direct_log(public_key, &me),
            Route::DirectLog {
                counterpart: public_key.clone(),
                writer: public_key.clone(),
            },
        )
        .await?;

        self.clear_on_view(&key).await
    }

    /// Decrypt the most recent message preview of a thread
    pub async fn latest_preview(&self, key: &ThreadKey) -> ChatResult<Option<Message>> {
        let session = self.session()?;
        let me = session.public_key();

        let (path, secret) = match key {
            ThreadKey::Contact(counterpart) => {
                let contact = self.contacts.get(counterpart.as_str()).ok_or_else(|| {
                    ChatError::NotFound(format!("contact {}", counterpart.short()))
                })?;
                let secret = self
                    .keys
                    .contact_secret(session, &contact.identity.exchange_public_key)
                    .await?;
                (paths::direct_latest(me, counterpart), secret)
            }
            ThreadKey::Group(kind, id) => {
                let group = self
                    .groups(*kind)
                    .get(id.as_str())
                    .ok_or_else(|| ChatError::NotFound(format!("{} {}", kind, id.short())))?;
                let secret = self.keys.group_secret(&group.key_pair).await?;
                (paths::group_latest(*kind, id), secret)
            }
        };

        let Some(value) = self.graph.get(&path).await? else {
            return Ok(None);
        };
        let latest: LatestRecord = records::decode(&value)?;
        let body: MessageBody = self.keys.open(&latest.sealed, &secret).await?;
        Ok(Some(Message {
            timestamp: latest.timestamp,
            sender: latest.sender,
            sender_name: body.sender_name,
            text: body.text,
            control: body.control,
        }))
    }

    pub(super) async fn on_contact_record(&mut self, event: &GraphEvent) -> ChatResult<()> {
        let counterpart = routing::member_key(event)?;
        let entry: Entry<ContactRecord> = records::decode(&event.value)?;

        let observation = match entry {
            Entry::Disabled { id } => Observation::Disabled { id },
            Entry::Active(record) => {
                if record.identity.public_key != counterpart {
                    return Err(ChatError::MalformedRecord(format!(
                        "contact entry {} holds another identity",
                        counterpart.short()
                    )));
                }
                if !record.identity.is_complete() || record.state == ContactState::Disabled {
                    Observation::NotReady
                } else {
                    let unread_count = self.unread_count(&ThreadKey::Contact(counterpart.clone()));
                    Observation::Ready(Contact {
                        incarnation: record.incarnation,
                        identity: record.identity,
                        state: record.state,
                        unread_count,
                    })
                }
            }
        };

        let transition = self.contacts.apply(observation);
        trace!(contact = %counterpart.short(), ?transition, "contact entry");

        if transition.inserted() {
            let me = self.me()?;
            self.watch(
                paths::direct_markers(&me, &counterpart),
                Route::Markers(ThreadKey::Contact(counterpart.clone())),
            )
            .await?;
        }

        let awaiting_acceptance = self
            .contacts
            .get(counterpart.as_str())
            .is_some_and(|contact| contact.state == ContactState::Invited);
        if awaiting_acceptance {
            self.watch(
                paths::contacts(&counterpart),
                Route::ContactEcho(counterpart.clone()),
            )
            .await?;
        }

        if self.open_thread_key() == Some(&ThreadKey::Contact(counterpart.clone()))
            && self.contacts.get(counterpart.as_str()).is_none()
        {
            self.close_thread();
        }

        if transition.changed() {
            self.emit_contacts();
        }
        Ok(())
    }

    /// The counterpart listed us as an active contact: our proposal was accepted
    pub(super) async fn on_contact_echo(
        &mut self,
        counterpart: &PublicKey,
        event: &GraphEvent,
    ) -> ChatResult<()> {
        let me = self.me()?;
        if routing::leaf_key(event)? != me.as_str() {
            return Ok(());
        }
        let Entry::Active(echo) = records::decode::<Entry<ContactRecord>>(&event.value)? else {
            return Ok(());
        };
        if echo.state != ContactState::Active {
            return Ok(());
        }
        let Some(contact) = self.contacts.get(counterpart.as_str()) else {
            return Ok(());
        };
        if contact.state != ContactState::Invited {
            return Ok(());
        }

        let record = ContactRecord {
            incarnation: contact.incarnation.clone(),
            identity: contact.identity.clone(),
            state: ContactState::Active,
        };
        self.put(&paths::contact(&me, counterpart), Entry::Active(record))
            .await?;
        info!(contact = %counterpart.short(), "contact accepted our proposal");
        Ok(())
    }

    pub(super) async fn on_invite(
        &mut self,
        kind: RelationshipKind,
        event: &GraphEvent,
    ) -> ChatResult<()> {
        let session = self.session()?.clone();
        let [inviter, relationship_id] = event.relative() else {
            return Err(ChatError::MalformedRecord(format!(
                "unexpected invite leaf {}",
                event.path
            )));
        };

        let entry: Entry<InviteRecord> = records::decode(&event.value)?;
        let needs_key = match &entry {
            Entry::Active(record) => {
                if record.inviter.public_key.as_str() != inviter
                    || record.relationship_id != *relationship_id
                {
                    return Err(ChatError::MalformedRecord(format!(
                        "invite at {} does not match its location",
                        event.path
                    )));
                }
                self.invites(kind).state(&record.invite_id) == MaterialState::NotMaterialized
            }
            Entry::Disabled { .. } => false,
        };

        let observation = invite::observe(&self.keys, &session, kind, needs_key, entry).await?;
        let transition = self.invites_mut(kind).apply(observation);
        trace!(%kind, ?transition, "invite entry");
        if transition.changed() {
            self.emit_invites(kind);
        }
        Ok(())
    }

    pub(super) async fn on_direct_line(
        &mut self,
        counterpart: &PublicKey,
        writer: &PublicKey,
        event: &GraphEvent,
    ) -> ChatResult<()> {
        let key = ThreadKey::Contact(counterpart.clone());
        if !self.is_viewing(&key) {
            trace!(contact = %counterpart.short(), "thread not open, dropping");
            return Ok(());
        }

        let line: ChatLine = records::decode(&event.value)?;
        if routing::leaf_key(event)? != line.timestamp.to_string() {
            return Err(ChatError::MalformedRecord(format!(
                "log entry {} carries timestamp {}",
                event.path, line.timestamp
            )));
        }
        line.timestamp.ensure_plausible("log entry")?;
        if self.has_seen(writer, line.timestamp) {
            return Ok(());
        }

        let session = self.session()?.clone();
        let exchange_key = self
            .contacts
            .get(counterpart.as_str())
            .map(|contact| contact.identity.exchange_public_key.clone())
            .ok_or_else(|| ChatError::MissingDependency(format!("contact {}", counterpart.short())))?;
        let secret = self.keys.contact_secret(&session, &exchange_key).await?;
        let body: MessageBody = self.keys.open(&line.sealed, &secret).await?;

        self.clock.observe(line.timestamp);
        self.insert_into_thread(
            &key,
            Message {
                timestamp: line.timestamp,
                sender: writer.clone(),
                sender_name: body.sender_name,
                text: body.text,
                control: body.control,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestNetwork;

    #[tokio::test]
    async fn test_add_contact_rejects_wrong_alias() {
        let network = TestNetwork::new();
        let mut alice = network.join("alice").await;
        let bob = network.join("bob").await;

        let err = alice
            .add_contact(&bob.identity().unwrap().public_key, "mallory")
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Validation(_)));
    }

    #[tokio::test]
    async fn test_add_self_rejected() {
        let network = TestNetwork::new();
        let mut alice = network.join("alice").await;
        let me = alice.identity().unwrap().public_key.clone();

        let err = alice.add_contact(&me, "alice").await.unwrap_err();
        assert!(matches!(err, ChatError::Validation(_)));
    }

    #[tokio::test]
    async fn test_empty_message_is_noop() {
        let network = TestNetwork::new();
        let mut alice = network.join("alice").await;
        let mut bob = network.join("bob").await;
        network.befriend(&mut alice, &mut bob).await;

        let bob_key = bob.identity().unwrap().public_key.clone();
        let writes = network.graph.write_count();
        assert_eq!(alice.send_contact_message(&bob_key, "").await.unwrap(), None);
        assert_eq!(network.graph.write_count(), writes);
    }

    #[tokio::test]
    async fn test_message_to_stranger_fails() {
        let network = TestNetwork::new();
        let mut alice = network.join("alice").await;
        let bob = network.join("bob").await;

        let err = alice
            .send_contact_message(&bob.identity().unwrap().public_key, "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::NotFound(_)));
    }
}
