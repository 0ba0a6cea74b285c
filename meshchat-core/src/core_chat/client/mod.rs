/*
    ChatClient - one logged-in identity driving the chat core

    Owns the six materializers, the unread counters and the currently open
    thread. All graph subscriptions feed a single mpsc queue which is
    drained on one task; handlers run to completion one event at a time, so
    the client needs no locks. Each subscription prefix maps to a Route that
    decides which handler sees its events.

    Cancellation is by guard, not by unsubscribing: thread handlers drop
    events for any thread other than the open one. Reopening a thread
    replays its logs from the store.
*/

mod contacts;
mod groups;
mod routing;

use self::routing::Route;
use super::errors::{ChatError, ChatResult};
use super::events::{ChatEvent, ChatEventBroadcaster};
use super::key_exchange::KeyExchange;
use super::materializer::Materializer;
use super::paths;
use super::records::{self, Entry, RecordKind, UnreadMarker};
use super::thread::{MessageThread, UnreadCounter};
use super::types::{
    Clock, Contact, Group, GroupKind, Invite, Message, RelationshipKind, ThreadKey, Timestamp,
};
use crate::config::Config;
use crate::core_crypto::{CryptoProvider, ExchangeKey, PublicKey};
use crate::core_graph::{GraphEvent, GraphPath, GraphStore};
use crate::core_identity::{Identity, Session};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, trace};

struct OpenThread {
    thread: MessageThread,
    visible: Vec<Message>,
}

/// Chat client for one session
pub struct ChatClient {
    graph: Arc<dyn GraphStore>,
    keys: KeyExchange,
    config: Config,
    session: Option<Session>,
    clock: Clock,
    events: ChatEventBroadcaster,
    sink: mpsc::UnboundedSender<GraphEvent>,
    inbox: mpsc::UnboundedReceiver<GraphEvent>,
    pending: VecDeque<GraphEvent>,
    routes: HashMap<GraphPath, Route>,
    contacts: Materializer<Contact>,
    contact_invites: Materializer<Invite>,
    channels: Materializer<Group>,
    channel_invites: Materializer<Invite>,
    announcements: Materializer<Group>,
    announcement_invites: Materializer<Invite>,
    unread: HashMap<ThreadKey, UnreadCounter>,
    open: Option<OpenThread>,
}

impl ChatClient {
    pub fn new(graph: Arc<dyn GraphStore>, crypto: Arc<dyn CryptoProvider>, config: Config) -> Self {
        let (sink, inbox) = mpsc::unbounded_channel();
        Self {
            keys: KeyExchange::new(graph.clone(), crypto, config.session.registry_timeout),
            events: ChatEventBroadcaster::new(config.session.event_capacity),
            graph,
            config,
            session: None,
            clock: Clock::default(),
            sink,
            inbox,
            pending: VecDeque::new(),
            routes: HashMap::new(),
            contacts: Materializer::new(),
            contact_invites: Materializer::new(),
            channels: Materializer::new(),
            channel_invites: Materializer::new(),
            announcements: Materializer::new(),
            announcement_invites: Materializer::new(),
            unread: HashMap::new(),
            open: None,
        }
    }

    /// Start following everything owned by or addressed to `session`
    pub async fn login(&mut self, session: Session) -> ChatResult<()> {
        self.forget_local_state();
        let me = session.public_key().clone();
        info!(alias = %session.identity().alias, public_key = %me.short(), "session started");
        self.session = Some(session);

        self.watch_list(paths::contacts(&me), Route::Contacts).await?;
        for kind in [
            RelationshipKind::Contact,
            RelationshipKind::Channel,
            RelationshipKind::Announcement,
        ] {
            self.watch_list(paths::inbox(&me, kind), Route::Invites(kind))
                .await?;
        }
        for kind in [GroupKind::Channel, GroupKind::Announcement] {
            self.watch_list(paths::groups(&me, kind), Route::Groups(kind))
                .await?;
        }
        Ok(())
    }

    /// End the session. Later operations fail with [`ChatError::NotLoggedIn`].
    pub fn logout(&mut self) {
        if let Some(session) = self.session.take() {
            info!(public_key = %session.public_key().short(), "session ended");
        }
        self.forget_local_state();
    }

    /// Soft-disable every relationship, pending invite and unread marker
    /// of the current identity
    pub async fn reset(&mut self) -> ChatResult<()> {
        let me = self.me()?;

        let contacts: Vec<Contact> = self.contacts.items().to_vec();
        for contact in &contacts {
            let tombstone = Entry::<records::ContactRecord>::Disabled {
                id: contact.incarnation.clone(),
            };
            self.put(&paths::contact(&me, &contact.identity.public_key), tombstone)
                .await?;
        }

        for kind in [GroupKind::Channel, GroupKind::Announcement] {
            let groups: Vec<Group> = self.groups(kind).items().to_vec();
            for group in &groups {
                let tombstone = Entry::<records::GroupRecord>::Disabled {
                    id: group.membership.clone(),
                };
                self.put(&paths::group(&me, kind, &group.id), tombstone).await?;
            }
        }

        for kind in [
            RelationshipKind::Contact,
            RelationshipKind::Channel,
            RelationshipKind::Announcement,
        ] {
            let invites: Vec<Invite> = self.invites(kind).items().to_vec();
            for invite in &invites {
                self.retire_invite(kind, invite).await?;
            }
        }

        let keys: Vec<ThreadKey> = self.unread.keys().cloned().collect();
        for key in keys {
            self.clear_markers(&key).await?;
        }

        self.open = None;
        info!(public_key = %me.short(), "identity reset");
        Ok(())
    }

    fn forget_local_state(&mut self) {
        // Dropping the old receiver ends every subscription made through it
        let (sink, inbox) = mpsc::unbounded_channel();
        self.sink = sink;
        self.inbox = inbox;
        self.pending.clear();
        self.routes.clear();
        self.contacts = Materializer::new();
        self.contact_invites = Materializer::new();
        self.channels = Materializer::new();
        self.channel_invites = Materializer::new();
        self.announcements = Materializer::new();
        self.announcement_invites = Materializer::new();
        self.unread.clear();
        self.open = None;
    }

    /// Handle every queued update until the client is idle.
    ///
    /// Returns the number of updates handled.
    pub async fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let event = match self.pending.pop_front() {
                Some(event) => event,
                None => match self.inbox.try_recv() {
                    Ok(event) => event,
                    Err(_) => break,
                },
            };
            self.dispatch(event).await;
            handled += 1;
        }
        handled
    }

    /// Wait for the next update, then drain everything queued behind it
    pub async fn wait_for_updates(&mut self) -> usize {
        match self.inbox.recv().await {
            Some(event) => {
                self.dispatch(event).await;
                1 + self.process_pending().await
            }
            None => 0,
        }
    }

    /// Apply updates as they arrive until the subscription channel closes
    pub async fn run(&mut self) {
        info!("chat client event loop started");
        while self.wait_for_updates().await > 0 {}
        info!("chat client event loop stopped");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    pub fn current_session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.session.as_ref().map(Session::identity)
    }

    pub fn contacts(&self) -> &[Contact] {
        self.contacts.items()
    }

    pub fn contact(&self, public_key: &PublicKey) -> Option<&Contact> {
        self.contacts.get(public_key.as_str())
    }

    pub fn contact_invites(&self) -> &[Invite] {
        self.contact_invites.items()
    }

    pub fn channels(&self) -> &[Group] {
        self.channels.items()
    }

    pub fn channel_invites(&self) -> &[Invite] {
        self.channel_invites.items()
    }

    pub fn announcements(&self) -> &[Group] {
        self.announcements.items()
    }

    pub fn announcement_invites(&self) -> &[Invite] {
        self.announcement_invites.items()
    }

    /// Pending invites for groups of `kind`
    pub fn group_invites(&self, kind: GroupKind) -> &[Invite] {
        self.invites(kind.into()).items()
    }

    pub fn group(&self, kind: GroupKind, id: &ExchangeKey) -> Option<&Group> {
        self.groups(kind).get(id.as_str())
    }

    /// Visible messages of the open thread
    pub fn messages(&self) -> &[Message] {
        match &self.open {
            Some(open) => &open.visible,
            None => &[],
        }
    }

    pub fn open_thread_key(&self) -> Option<&ThreadKey> {
        self.open.as_ref().map(|open| open.thread.key())
    }

    /// Stop following the open thread
    pub fn close_thread(&mut self) {
        self.open = None;
    }

    fn session(&self) -> ChatResult<&Session> {
        self.session.as_ref().ok_or(ChatError::NotLoggedIn)
    }

    fn me(&self) -> ChatResult<PublicKey> {
        Ok(self.session()?.public_key().clone())
    }

    fn groups(&self, kind: GroupKind) -> &Materializer<Group> {
        match kind {
            GroupKind::Channel => &self.channels,
            GroupKind::Announcement => &self.announcements,
        }
    }

    fn groups_mut(&mut self, kind: GroupKind) -> &mut Materializer<Group> {
        match kind {
            GroupKind::Channel => &mut self.channels,
            GroupKind::Announcement => &mut self.announcements,
        }
    }

    fn invites(&self, kind: RelationshipKind) -> &Materializer<Invite> {
        match kind {
            RelationshipKind::Contact => &self.contact_invites,
            RelationshipKind::Channel => &self.channel_invites,
            RelationshipKind::Announcement => &self.announcement_invites,
        }
    }

    fn invites_mut(&mut self, kind: RelationshipKind) -> &mut Materializer<Invite> {
        match kind {
            RelationshipKind::Contact => &mut self.contact_invites,
            RelationshipKind::Channel => &mut self.channel_invites,
            RelationshipKind::Announcement => &mut self.announcement_invites,
        }
    }

    fn check_length(&self, text: &str) -> ChatResult<()> {
        let max = self.config.messaging.max_message_len;
        if text.len() > max {
            return Err(ChatError::InvalidInput(format!(
                "message is {} bytes, limit is {}",
                text.len(),
                max
            )));
        }
        Ok(())
    }

    /// Write one record as the current identity
    async fn put<R: RecordKind>(&self, path: &GraphPath, payload: R) -> ChatResult<()> {
        let author = self.session()?.public_key().as_str();
        self.graph.put(author, path, records::encode(payload)?).await?;
        Ok(())
    }

    /// Subscribe `prefix` once. Returns false when it was already followed.
    async fn watch(&mut self, prefix: GraphPath, route: Route) -> ChatResult<bool> {
        if self.routes.contains_key(&prefix) {
            return Ok(false);
        }
        trace!(%prefix, ?route, "following");
        self.routes.insert(prefix.clone(), route);
        self.graph.subscribe(&prefix, self.sink.clone()).await?;
        Ok(true)
    }

    /// Subscribe `prefix`, or queue its current leaves again if already followed
    async fn watch_or_replay(&mut self, prefix: GraphPath, route: Route) -> ChatResult<()> {
        if self.watch(prefix.clone(), route).await? {
            return Ok(());
        }
        for (path, value) in self.graph.read_once(&prefix).await? {
            self.pending.push_back(GraphEvent {
                prefix: prefix.clone(),
                path,
                value,
            });
        }
        Ok(())
    }

    /// Follow a list and publish it right away if it is still empty
    async fn watch_list(&mut self, prefix: GraphPath, route: Route) -> ChatResult<()> {
        let empty = self.graph.is_empty(&prefix).await?;
        let list = route.clone();
        self.watch(prefix, route).await?;
        if empty {
            match list {
                Route::Contacts => self.emit_contacts(),
                Route::Invites(kind) => self.emit_invites(kind),
                Route::Groups(kind) => self.emit_groups(kind),
                _ => {}
            }
        }
        Ok(())
    }

    fn emit_contacts(&self) {
        self.events
            .emit(ChatEvent::Contacts(self.contacts.items().to_vec()));
    }

    fn emit_invites(&self, kind: RelationshipKind) {
        let invites = self.invites(kind).items().to_vec();
        self.events.emit(match kind {
            RelationshipKind::Contact => ChatEvent::ContactInvites(invites),
            RelationshipKind::Channel => ChatEvent::ChannelInvites(invites),
            RelationshipKind::Announcement => ChatEvent::AnnouncementInvites(invites),
        });
    }

    fn emit_groups(&self, kind: GroupKind) {
        let groups = self.groups(kind).items().to_vec();
        self.events.emit(match kind {
            GroupKind::Channel => ChatEvent::Channels(groups),
            GroupKind::Announcement => ChatEvent::Announcements(groups),
        });
    }

    fn emit_thread(&self) {
        let Some(open) = &self.open else {
            return;
        };
        let messages = open.visible.clone();
        self.events.emit(match open.thread.key().clone() {
            ThreadKey::Contact(counterpart) => ChatEvent::ContactMessages {
                counterpart,
                messages,
            },
            ThreadKey::Group(GroupKind::Channel, id) => ChatEvent::ChannelMessages { id, messages },
            ThreadKey::Group(GroupKind::Announcement, id) => {
                ChatEvent::AnnouncementMessages { id, messages }
            }
        });
    }

    /// Make `key` the open thread and publish its (empty) list
    fn open_thread(&mut self, key: ThreadKey) {
        debug!(?key, "opening thread");
        self.open = Some(OpenThread {
            thread: MessageThread::new(key),
            visible: Vec::new(),
        });
        self.emit_thread();
    }

    fn is_viewing(&self, key: &ThreadKey) -> bool {
        self.open
            .as_ref()
            .is_some_and(|open| open.thread.key() == key)
    }

    fn has_seen(&self, writer: &PublicKey, at: Timestamp) -> bool {
        self.open
            .as_ref()
            .is_some_and(|open| open.thread.has_seen(writer, at))
    }

    /// Add a decrypted entry to the open thread and publish if the visible
    /// list changed
    fn insert_into_thread(&mut self, key: &ThreadKey, message: Message) {
        let inserted = match self.open.as_mut() {
            Some(open) if open.thread.key() == key => open.thread.insert(message),
            _ => false,
        };
        if inserted && self.refresh_visible() {
            self.emit_thread();
        }
    }

    /// Recompute the visible list of the open thread. Returns whether it changed.
    fn refresh_visible(&mut self) -> bool {
        let visible = {
            let Some(open) = &self.open else {
                return false;
            };
            match open.thread.key() {
                ThreadKey::Group(GroupKind::Announcement, id) => {
                    let viewer = self.session.as_ref().map(Session::public_key);
                    let governance = self
                        .announcements
                        .get(id.as_str())
                        .and_then(|group| group.governance.as_ref());
                    match (governance, viewer) {
                        (Some(governance), Some(viewer)) => {
                            open.thread.visible(|message| governance.shows(viewer, message))
                        }
                        _ => Vec::new(),
                    }
                }
                _ => open.thread.visible(|_| true),
            }
        };

        match self.open.as_mut() {
            Some(open) if open.visible != visible => {
                open.visible = visible;
                true
            }
            _ => false,
        }
    }

    fn unread_count(&self, key: &ThreadKey) -> usize {
        self.unread.get(key).map_or(0, UnreadCounter::count)
    }

    fn marker_path(&self, key: &ThreadKey, me: &PublicKey, at: Timestamp) -> GraphPath {
        match key {
            ThreadKey::Contact(sender) => paths::direct_markers(me, sender).child(at),
            ThreadKey::Group(kind, id) => paths::group_markers(*kind, id, me).child(at),
        }
    }

    async fn on_marker(&mut self, key: &ThreadKey, event: &GraphEvent) -> ChatResult<()> {
        let at = routing::leaf_key(event)
            .and_then(|raw| {
                Timestamp::parse_key(raw)
                    .ok_or_else(|| ChatError::MalformedRecord(format!("marker key {}", raw)))
            })?;
        let unread = match records::decode::<Entry<UnreadMarker>>(&event.value)? {
            Entry::Active(_) => true,
            Entry::Disabled { .. } => false,
        };

        if self.unread.entry(key.clone()).or_default().set(at, unread) {
            self.sync_unread(key);
        }

        if unread && self.is_viewing(key) && self.config.messaging.clear_unread_on_view {
            self.clear_markers(key).await?;
        }
        Ok(())
    }

    /// Copy the counter into the materialized entity and publish its list
    fn sync_unread(&mut self, key: &ThreadKey) {
        let count = self.unread_count(key);
        match key {
            ThreadKey::Contact(counterpart) => {
                let changed = self.contacts.update(counterpart.as_str(), |contact| {
                    let changed = contact.unread_count != count;
                    contact.unread_count = count;
                    changed
                });
                if changed {
                    self.emit_contacts();
                }
            }
            ThreadKey::Group(kind, id) => {
                let changed = self.groups_mut(*kind).update(id.as_str(), |group| {
                    let changed = group.unread_count != count;
                    group.unread_count = count;
                    changed
                });
                if changed {
                    self.emit_groups(*kind);
                }
            }
        }
    }

    /// Overwrite every pending "new" marker of `key` with the cleared tombstone
    async fn clear_markers(&mut self, key: &ThreadKey) -> ChatResult<()> {
        let me = self.me()?;
        let pending = self
            .unread
            .get(key)
            .map(UnreadCounter::pending)
            .unwrap_or_default();

        for at in pending {
            let path = self.marker_path(key, &me, at);
            self.put(&path, Entry::<UnreadMarker>::Disabled { id: at.to_string() })
                .await?;
        }
        Ok(())
    }

    /// Clear markers of a thread that was just opened, if configured to
    async fn clear_on_view(&mut self, key: &ThreadKey) -> ChatResult<()> {
        if self.config.messaging.clear_unread_on_view {
            self.clear_markers(key).await?;
        }
        Ok(())
    }

    async fn retire_invite(&mut self, kind: RelationshipKind, invite: &Invite) -> ChatResult<()> {
        let me = self.me()?;
        let path = paths::invite(&me, kind, &invite.inviter.public_key, &invite.relationship_id);
        self.put(&path, super::invite::retire(invite)).await
    }
}
