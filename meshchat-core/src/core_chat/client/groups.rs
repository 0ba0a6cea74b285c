//! Channels and announcements
//!
//! Both kinds share one implementation keyed by [`GroupKind`]. Every member
//! writes only to its own log and its own copy of the roster; control
//! messages in the logs keep the copies converging. Announcements add the
//! [`Governance`] checks on top.

use super::routing::{self, Route};
use super::ChatClient;
use crate::core_chat::announcement::Governance;
use crate::core_chat::errors::{ChatError, ChatResult};
use crate::core_chat::invite::Proposal;
use crate::core_chat::materializer::{MaterialState, Observation, Transition};
use crate::core_chat::paths;
use crate::core_chat::records::{
    self, ChatLine, Entry, GroupRecord, LatestRecord, MessageBody, UnreadMarker,
};
use crate::core_chat::types::{
    AdminStatus, ControlAction, ControlPayload, Group, GroupKind, MembershipState, Message,
    PeerMembership, Roster, ThreadKey, Timestamp,
};
use crate::core_crypto::{ExchangeKey, KeyPair, PublicKey, SealedBox};
use crate::core_graph::GraphEvent;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

impl ChatClient {
    /// Create a group owned by the current identity and return its id
    pub async fn create_group(&mut self, kind: GroupKind, name: &str) -> ChatResult<ExchangeKey> {
        if name.trim().is_empty() {
            return Err(ChatError::InvalidInput("group name is empty".to_string()));
        }
        let session = self.session()?.clone();
        let me = session.public_key();
        let identity = session.identity();

        let (pair, sealed) = self.keys.create_group_keys(&session).await?;
        let id = pair.exchange_public_key().clone();
        let at = self.clock.next();

        let row = PeerMembership::new(&identity.alias, &identity.display_name, MembershipState::Joined, at);
        self.put(&paths::roster(me, kind, &id).child(me), row).await?;

        let owner = match kind {
            GroupKind::Channel => None,
            GroupKind::Announcement => {
                let status = AdminStatus::Active {
                    display_name: identity.display_name.clone(),
                    since: at,
                };
                self.put(&paths::admins(me, &id).child(me), status).await?;
                Some(me.clone())
            }
        };

        let record = GroupRecord {
            membership: Uuid::new_v4().to_string(),
            kind,
            id: id.clone(),
            name: name.to_string(),
            sealed_key_pair: sealed,
            owner,
        };
        self.put(&paths::group(me, kind, &id), Entry::Active(record))
            .await?;

        info!(%kind, group = %id.short(), name, "group created");
        Ok(id)
    }

    pub async fn create_channel(&mut self, name: &str) -> ChatResult<ExchangeKey> {
        self.create_group(GroupKind::Channel, name).await
    }

    pub async fn create_announcement(&mut self, name: &str) -> ChatResult<ExchangeKey> {
        self.create_group(GroupKind::Announcement, name).await
    }

    /// Invite `invitee` into group `id`.
    ///
    /// The invitee gets the group pair wrapped under our pairwise secret
    /// plus snapshots of the roster and admin map. Our own roster lists
    /// them as invited and the thread records the invitation.
    pub async fn invite_to_group(
        &mut self,
        kind: GroupKind,
        id: &ExchangeKey,
        invitee: &PublicKey,
        alias: &str,
    ) -> ChatResult<()> {
        let session = self.session()?.clone();
        let me = session.public_key();
        if invitee == me {
            return Err(ChatError::Validation("cannot invite yourself".to_string()));
        }
        let group = self.require_group(kind, id)?;

        self.keys.verify_identity(invitee, alias).await?;
        let profile = self.keys.fetch_identity(invitee).await?;
        let key_material = self
            .keys
            .wrap_for_invitee(&session, &group.key_pair, &profile.exchange_public_key)
            .await?;

        // A re-invite must outrank whatever the roster already says
        if let Some(existing) = group.roster.get(invitee) {
            self.clock.observe(existing.updated_at);
        }
        let at = self.clock.next();

        let proposal = Proposal {
            kind: kind.into(),
            relationship_id: id.to_string(),
            name: group.name.clone(),
            key_material: Some(key_material),
            roster: group.roster.clone(),
            admins: group
                .governance
                .as_ref()
                .map(|governance| governance.admins.clone())
                .unwrap_or_default(),
            owner: group.governance.as_ref().map(|governance| governance.owner.clone()),
        };
        let record = proposal.into_record(session.identity(), at);
        self.put(
            &paths::invite(invitee, kind.into(), me, id.as_str()),
            Entry::Active(record),
        )
        .await?;

        let row = PeerMembership::new(&profile.alias, &profile.display_name, MembershipState::Invited, at);
        self.put(&paths::roster(me, kind, id).child(invitee), row.clone())
            .await?;
        self.remember_row(kind, id, invitee.clone(), row).await?;

        let control = ControlPayload {
            action: ControlAction::Invited,
            subject: invitee.clone(),
            alias: profile.alias.clone(),
            display_name: profile.display_name.clone(),
        };
        self.append_control(kind, id, &group.key_pair, control, at)
            .await?;

        info!(%kind, group = %id.short(), invitee = %invitee.short(), "member invited");
        Ok(())
    }

    /// Accept a pending group invite and return the group id
    pub async fn accept_group_invite(
        &mut self,
        kind: GroupKind,
        invite_id: &str,
    ) -> ChatResult<ExchangeKey> {
        let session = self.session()?.clone();
        let me = session.public_key();
        let identity = session.identity();

        let invite = self
            .invites(kind.into())
            .find_by_id(invite_id)
            .cloned()
            .ok_or_else(|| ChatError::NotFound(format!("{} invite {}", kind, invite_id)))?;
        let pair = invite.key_pair.clone().ok_or_else(|| {
            ChatError::MissingDependency(format!("key material of invite {}", invite_id))
        })?;
        let id = pair.exchange_public_key().clone();

        // Our join must sort after the invitation that caused it
        self.clock.observe(invite.issued_at);
        let at = self.clock.next();
        let sealed = self.keys.seal_for_self(&session, &pair).await?;

        let roster_path = paths::roster(me, kind, &id);
        let row = PeerMembership::new(&identity.alias, &identity.display_name, MembershipState::Joined, at);
        self.put(&roster_path.child(me), row).await?;

        if !invite.roster.contains_key(&invite.inviter.public_key) {
            let inviter = PeerMembership::new(
                &invite.inviter.alias,
                &invite.inviter.display_name,
                MembershipState::Joined,
                invite.issued_at,
            );
            self.put(&roster_path.child(&invite.inviter.public_key), inviter)
                .await?;
        }
        for (member, row) in &invite.roster {
            if member != me && row.is_active() {
                self.put(&roster_path.child(member), row.clone()).await?;
            }
        }
        // Only the owner row is taken on trust; other admins are learned by
        // replaying the owner's own promotions
        if let (GroupKind::Announcement, Some(owner)) = (kind, invite.owner.as_ref()) {
            if let Some(status) = invite.admins.get(owner) {
                self.put(&paths::admins(me, &id).child(owner), status.clone())
                    .await?;
            }
        }

        let record = GroupRecord {
            membership: Uuid::new_v4().to_string(),
            kind,
            id: id.clone(),
            name: invite.name.clone(),
            sealed_key_pair: sealed,
            owner: invite.owner.clone(),
        };
        self.put(&paths::group(me, kind, &id), Entry::Active(record))
            .await?;
        self.retire_invite(kind.into(), &invite).await?;

        let control = ControlPayload {
            action: ControlAction::Join,
            subject: me.clone(),
            alias: identity.alias.clone(),
            display_name: identity.display_name.clone(),
        };
        self.append_control(kind, &id, &pair, control, at).await?;

        info!(%kind, group = %id.short(), "group invite accepted");
        Ok(id)
    }

    /// Deny a pending group invite
    pub async fn deny_group_invite(&mut self, kind: GroupKind, invite_id: &str) -> ChatResult<()> {
        let invite = self
            .invites(kind.into())
            .find_by_id(invite_id)
            .cloned()
            .ok_or_else(|| ChatError::NotFound(format!("{} invite {}", kind, invite_id)))?;
        self.retire_invite(kind.into(), &invite).await?;
        info!(%kind, group = %invite.relationship_id, "group invite denied");
        Ok(())
    }

    /// Leave group `id`. Rejoining requires a new invite.
    pub async fn leave_group(&mut self, kind: GroupKind, id: &ExchangeKey) -> ChatResult<()> {
        let session = self.session()?.clone();
        let me = session.public_key();
        let identity = session.identity();
        let group = self.require_group(kind, id)?;
        let at = self.clock.next();

        let control = ControlPayload {
            action: ControlAction::Leave,
            subject: me.clone(),
            alias: identity.alias.clone(),
            display_name: identity.display_name.clone(),
        };
        self.append_control(kind, id, &group.key_pair, control, at)
            .await?;

        let row = PeerMembership::new(&identity.alias, &identity.display_name, MembershipState::Disabled, at);
        self.put(&paths::roster(me, kind, id).child(me), row).await?;

        let tombstone = Entry::<GroupRecord>::Disabled {
            id: group.membership.clone(),
        };
        self.put(&paths::group(me, kind, id), tombstone).await?;

        info!(%kind, group = %id.short(), "left group");
        Ok(())
    }

    /// Post to group `id`.
    ///
    /// The post always lands in our own log. Unread markers and the latest
    /// preview are fanned out only where the sender may broadcast: always in
    /// channels, for admins only in announcements. Empty text is a no-op.
    pub async fn send_group_message(
        &mut self,
        kind: GroupKind,
        id: &ExchangeKey,
        text: &str,
    ) -> ChatResult<Option<Timestamp>> {
        if text.is_empty() {
            return Ok(None);
        }
        self.check_length(text)?;

        let session = self.session()?.clone();
        let me = session.public_key();
        let group = self.require_group(kind, id)?;
        let at = self.clock.next();

        let body = MessageBody {
            sender_name: session.display_name().to_string(),
            text: text.to_string(),
            control: None,
        };
        let sealed = self.append_line(kind, id, &group.key_pair, &body, at).await?;

        let may_fan_out = group
            .governance
            .as_ref()
            .map_or(true, |governance| governance.may_fan_out(me));
        if !may_fan_out {
            debug!(%kind, group = %id.short(), "not an admin, post stays in own log");
            return Ok(Some(at));
        }

        let latest = LatestRecord {
            timestamp: at,
            sender: me.clone(),
            sealed,
        };
        self.put(&paths::group_latest(kind, id), latest).await?;

        for (member, row) in &group.roster {
            if member != me && row.is_active() {
                self.put(
                    &paths::group_markers(kind, id, member).child(at),
                    Entry::Active(UnreadMarker { timestamp: at }),
                )
                .await?;
            }
        }

        debug!(%kind, group = %id.short(), %at, "group message sent");
        Ok(Some(at))
    }

    /// Promote `member` to admin of announcement `id`.
    ///
    /// Only the owner may promote. For anyone else this logs a warning and
    /// returns `None` without writing anything.
    pub async fn add_admin_to_announcement(
        &mut self,
        id: &ExchangeKey,
        member: &PublicKey,
    ) -> ChatResult<Option<Timestamp>> {
        let me = self.me()?;
        let group = self.require_group(GroupKind::Announcement, id)?;
        let is_owner = group
            .governance
            .as_ref()
            .is_some_and(|governance| governance.accepts_promotion(&me));
        if !is_owner {
            warn!(group = %id.short(), "only the owner can promote admins");
            return Ok(None);
        }

        let (alias, display_name) = match group.roster.get(member) {
            Some(row) => (row.alias.clone(), row.display_name.clone()),
            None => {
                let profile = self.keys.fetch_identity(member).await?;
                (profile.alias, profile.display_name)
            }
        };

        let at = self.clock.next();
        let status = AdminStatus::Active {
            display_name: display_name.clone(),
            since: at,
        };
        self.put(&paths::admins(&me, id).child(member), status.clone())
            .await?;
        self.remember_admin(id, member.clone(), status);

        let control = ControlPayload {
            action: ControlAction::NewAdmin,
            subject: member.clone(),
            alias,
            display_name,
        };
        self.append_control(GroupKind::Announcement, id, &group.key_pair, control, at)
            .await?;

        info!(group = %id.short(), admin = %member.short(), "admin promoted");
        Ok(Some(at))
    }

    /// Append a raw control message to our own log of group `id`.
    ///
    /// Receivers decide on their own whether the payload is honored.
    pub async fn send_control_message(
        &mut self,
        kind: GroupKind,
        id: &ExchangeKey,
        control: ControlPayload,
    ) -> ChatResult<Timestamp> {
        let group = self.require_group(kind, id)?;
        let at = self.clock.next();
        self.append_control(kind, id, &group.key_pair, control, at)
            .await?;
        Ok(at)
    }

    /// Open the thread of group `id` and follow the log of every member
    pub async fn load_group_messages(&mut self, kind: GroupKind, id: &ExchangeKey) -> ChatResult<()> {
        let me = self.me()?;
        let group = self.require_group(kind, id)?;
        let key = ThreadKey::Group(kind, id.clone());
        self.open_thread(key.clone());

        let mut writers: Vec<PublicKey> = group
            .roster
            .iter()
            .filter(|(_, row)| row.is_active())
            .map(|(member, _)| member.clone())
            .collect();
        if !writers.contains(&me) {
            writers.push(me.clone());
        }
        // Members that left still have history worth showing
        for route in self.routes.values() {
            if let Route::GroupLog { kind: k, id: i, writer } = route {
                if *k == kind && i == id && !writers.contains(writer) {
                    writers.push(writer.clone());
                }
            }
        }

        for writer in writers {
            self.watch_or_replay(
                paths::group_log(&writer, kind, id),
                Route::GroupLog {
                    kind,
                    id: id.clone(),
                    writer,
                },
            )
            .await?;
        }

        self.clear_on_view(&key).await
    }

    fn require_group(&self, kind: GroupKind, id: &ExchangeKey) -> ChatResult<Group> {
        self.groups(kind)
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| ChatError::NotFound(format!("{} {}", kind, id.short())))
    }

    /// Encrypt `body` under the group secret and append it to our own log
    async fn append_line(
        &self,
        kind: GroupKind,
        id: &ExchangeKey,
        pair: &KeyPair,
        body: &MessageBody,
        at: Timestamp,
    ) -> ChatResult<SealedBox> {
        let me = self.me()?;
        let secret = self.keys.group_secret(pair).await?;
        let sealed = self.keys.seal(body, &secret).await?;
        let line = ChatLine {
            timestamp: at,
            sealed: sealed.clone(),
        };
        self.put(&paths::entry(&paths::group_log(&me, kind, id), at), line)
            .await?;
        Ok(sealed)
    }

    async fn append_control(
        &self,
        kind: GroupKind,
        id: &ExchangeKey,
        pair: &KeyPair,
        control: ControlPayload,
        at: Timestamp,
    ) -> ChatResult<()> {
        let body = MessageBody {
            sender_name: self.session()?.display_name().to_string(),
            text: String::new(),
            control: Some(control),
        };
        self.append_line(kind, id, pair, &body, at).await?;
        Ok(())
    }

    /// Keep the newer of the stored and incoming roster rows, and follow
    /// the member's log while they are active
    async fn remember_row(
        &mut self,
        kind: GroupKind,
        id: &ExchangeKey,
        member: PublicKey,
        row: PeerMembership,
    ) -> ChatResult<()> {
        let follow = row.is_active();
        let changed = self.groups_mut(kind).update(id.as_str(), |group| {
            if let Some(existing) = group.roster.get(&member) {
                if *existing == row || !existing.superseded_by(row.state, row.updated_at) {
                    return false;
                }
            }
            group.roster.insert(member.clone(), row);
            true
        });

        if follow {
            self.watch(
                paths::group_log(&member, kind, id),
                Route::GroupLog {
                    kind,
                    id: id.clone(),
                    writer: member,
                },
            )
            .await?;
        }
        if changed {
            self.emit_groups(kind);
        }
        Ok(())
    }

    fn remember_admin(&mut self, id: &ExchangeKey, member: PublicKey, status: AdminStatus) {
        let changed = self.announcements.update(id.as_str(), |group| {
            group
                .governance
                .as_mut()
                .is_some_and(|governance| governance.record(member, status))
        });
        if changed {
            self.emit_groups(GroupKind::Announcement);
            if self.refresh_visible() {
                self.emit_thread();
            }
        }
    }

    pub(super) async fn on_group_record(
        &mut self,
        kind: GroupKind,
        event: &GraphEvent,
    ) -> ChatResult<()> {
        let session = self.session()?.clone();
        let key = routing::leaf_key(event)?;
        let entry: Entry<GroupRecord> = records::decode(&event.value)?;

        let observation = match entry {
            Entry::Disabled { id } => Observation::Disabled { id },
            Entry::Active(record) => {
                if record.kind != kind || record.id.as_str() != key {
                    return Err(ChatError::MalformedRecord(format!(
                        "group entry {} does not match its location",
                        event.path
                    )));
                }
                if record.name.trim().is_empty()
                    || (kind == GroupKind::Announcement && record.owner.is_none())
                {
                    Observation::NotReady
                } else {
                    let key_pair = match self.groups(kind).find_by_id(&record.membership) {
                        Some(existing) => existing.key_pair.clone(),
                        None if self.groups(kind).state(&record.membership) == MaterialState::Removed => {
                            trace!(group = %record.id.short(), "membership already ended");
                            return Ok(());
                        }
                        None => {
                            self.keys
                                .open_for_self(&session, &record.id, &record.sealed_key_pair)
                                .await?
                        }
                    };
                    let unread_count = self.unread_count(&ThreadKey::Group(kind, record.id.clone()));
                    Observation::Ready(Group {
                        membership: record.membership,
                        kind,
                        id: record.id,
                        name: record.name,
                        key_pair,
                        governance: record.owner.map(Governance::new),
                        roster: Roster::new(),
                        unread_count,
                    })
                }
            }
        };

        let transition = self.groups_mut(kind).apply(observation);
        trace!(%kind, ?transition, "group entry");
        let id = ExchangeKey::parse(key).map_err(|e| ChatError::MalformedRecord(e.to_string()))?;
        let me = session.public_key();

        if transition.inserted() {
            self.watch_or_replay(paths::roster(me, kind, &id), Route::Roster(kind, id.clone()))
                .await?;
            if kind == GroupKind::Announcement {
                self.watch_or_replay(paths::admins(me, &id), Route::Admins(id.clone()))
                    .await?;
            }
            self.watch_or_replay(
                paths::group_markers(kind, &id, me),
                Route::Markers(ThreadKey::Group(kind, id.clone())),
            )
            .await?;
        }

        if matches!(transition, Transition::Removed)
            && self.open_thread_key() == Some(&ThreadKey::Group(kind, id.clone()))
        {
            self.close_thread();
        }
        if transition.changed() {
            self.emit_groups(kind);
        }
        Ok(())
    }

    pub(super) async fn on_roster_row(
        &mut self,
        kind: GroupKind,
        id: &ExchangeKey,
        event: &GraphEvent,
    ) -> ChatResult<()> {
        let member = routing::member_key(event)?;
        let row: PeerMembership = records::decode(&event.value)?;
        if self.groups(kind).get(id.as_str()).is_none() {
            return Err(ChatError::MissingDependency(format!("{} {}", kind, id.short())));
        }
        self.remember_row(kind, id, member, row).await
    }

    pub(super) async fn on_admin_row(&mut self, id: &ExchangeKey, event: &GraphEvent) -> ChatResult<()> {
        let member = routing::member_key(event)?;
        let status: AdminStatus = records::decode(&event.value)?;
        if self.announcements.get(id.as_str()).is_none() {
            return Err(ChatError::MissingDependency(format!("announcement {}", id.short())));
        }
        self.remember_admin(id, member, status);
        Ok(())
    }

    pub(super) async fn on_group_line(
        &mut self,
        kind: GroupKind,
        id: &ExchangeKey,
        writer: &PublicKey,
        event: &GraphEvent,
    ) -> ChatResult<()> {
        let key = ThreadKey::Group(kind, id.clone());
        if !self.is_viewing(&key) {
            trace!(%kind, group = %id.short(), "thread not open, dropping");
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

        let pair = self
            .groups(kind)
            .get(id.as_str())
            .map(|group| group.key_pair.clone())
            .ok_or_else(|| ChatError::MissingDependency(format!("{} {}", kind, id.short())))?;
        let secret = self.keys.group_secret(&pair).await?;
        let body: MessageBody = self.keys.open(&line.sealed, &secret).await?;

        self.clock.observe(line.timestamp);
        if let Some(control) = &body.control {
            self.apply_control(kind, id, writer, control, line.timestamp)
                .await?;
        }
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

    /// Apply a decrypted control payload written by `sender` at `at`
    async fn apply_control(
        &mut self,
        kind: GroupKind,
        id: &ExchangeKey,
        sender: &PublicKey,
        control: &ControlPayload,
        at: Timestamp,
    ) -> ChatResult<()> {
        let state = match control.action {
            ControlAction::NewAdmin => return self.apply_promotion(kind, id, sender, control, at).await,
            ControlAction::Join | ControlAction::Leave if control.subject != *sender => {
                debug!(sender = %sender.short(), "membership change made on behalf of someone else");
                return Ok(());
            }
            ControlAction::Join => MembershipState::Joined,
            ControlAction::Leave => MembershipState::Disabled,
            ControlAction::Invited => MembershipState::Invited,
        };

        let current = self
            .groups(kind)
            .get(id.as_str())
            .ok_or_else(|| ChatError::MissingDependency(format!("{} {}", kind, id.short())))?
            .roster
            .get(&control.subject)
            .cloned();
        if current.is_some_and(|row| !row.superseded_by(state, at)) {
            return Ok(());
        }

        let me = self.me()?;
        let row = PeerMembership::new(&control.alias, &control.display_name, state, at);
        self.put(&paths::roster(&me, kind, id).child(&control.subject), row.clone())
            .await?;
        self.remember_row(kind, id, control.subject.clone(), row).await
    }

    async fn apply_promotion(
        &mut self,
        kind: GroupKind,
        id: &ExchangeKey,
        sender: &PublicKey,
        control: &ControlPayload,
        at: Timestamp,
    ) -> ChatResult<()> {
        if kind != GroupKind::Announcement {
            return Ok(());
        }
        let governance = self
            .announcements
            .get(id.as_str())
            .and_then(|group| group.governance.clone())
            .ok_or_else(|| ChatError::MissingDependency(format!("announcement {}", id.short())))?;

        if !governance.accepts_promotion(sender) {
            debug!(sender = %sender.short(), group = %id.short(), "ignoring promotion not made by the owner");
            return Ok(());
        }
        if governance
            .admin_since(&control.subject)
            .is_some_and(|since| since <= at)
        {
            return Ok(());
        }

        let me = self.me()?;
        let status = AdminStatus::Active {
            display_name: control.display_name.clone(),
            since: at,
        };
        self.put(&paths::admins(&me, id).child(&control.subject), status.clone())
            .await?;
        self.remember_admin(id, control.subject.clone(), status);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestNetwork;

    #[tokio::test]
    async fn test_create_group_rejects_empty_name() {
        let network = TestNetwork::new();
        let mut alice = network.join("alice").await;
        let err = alice.create_channel("  ").await.unwrap_err();
        assert!(matches!(err, ChatError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_creator_is_joined_member() {
        let network = TestNetwork::new();
        let mut alice = network.join("alice").await;
        let id = alice.create_channel("general").await.unwrap();
        network.settle(&mut [&mut alice]).await;

        let me = alice.identity().unwrap().public_key.clone();
        let channel = alice.group(GroupKind::Channel, &id).unwrap();
        assert_eq!(channel.name, "general");
        assert_eq!(channel.roster[&me].state, MembershipState::Joined);
        assert!(channel.governance.is_none());
    }

    #[tokio::test]
    async fn test_announcement_owner_is_admin() {
        let network = TestNetwork::new();
        let mut alice = network.join("alice").await;
        let id = alice.create_announcement("news").await.unwrap();
        network.settle(&mut [&mut alice]).await;

        let me = alice.identity().unwrap().public_key.clone();
        let governance = alice
            .group(GroupKind::Announcement, &id)
            .and_then(|group| group.governance.clone())
            .unwrap();
        assert_eq!(governance.owner, me);
        assert!(governance.is_admin(&me));
    }

    #[tokio::test]
    async fn test_non_owner_cannot_promote() {
        let network = TestNetwork::new();
        let mut alice = network.join("alice").await;
        let mut bob = network.join("bob").await;
        let id = alice.create_announcement("news").await.unwrap();
        network.settle(&mut [&mut alice, &mut bob]).await;
        network
            .invite_and_accept(GroupKind::Announcement, &id, &mut alice, &mut bob)
            .await;

        let alice_key = alice.identity().unwrap().public_key.clone();
        let writes = network.graph.write_count();
        assert_eq!(bob.add_admin_to_announcement(&id, &alice_key).await.unwrap(), None);
        assert_eq!(network.graph.write_count(), writes);
    }

    #[tokio::test]
    async fn test_unknown_group_not_found() {
        let network = TestNetwork::new();
        let mut alice = network.join("alice").await;
        let mut bob = network.join("bob").await;
        let id = bob.create_channel("private").await.unwrap();
        network.settle(&mut [&mut alice, &mut bob]).await;

        let err = alice
            .send_group_message(GroupKind::Channel, &id, "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::NotFound(_)));
    }
}
