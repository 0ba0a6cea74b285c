//! Observation channels
//!
//! Nine channels, each carrying the full current list of one kind whenever
//! it changes. Delivered over a tokio broadcast channel so any number of
//! UI or test subscribers can follow one client.

use super::types::{Contact, ExchangeKey, Group, Invite, Message, PublicKey};
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    Contacts(Vec<Contact>),
    ContactInvites(Vec<Invite>),
    ContactMessages {
        counterpart: PublicKey,
        messages: Vec<Message>,
    },
    Channels(Vec<Group>),
    ChannelInvites(Vec<Invite>),
    ChannelMessages {
        id: ExchangeKey,
        messages: Vec<Message>,
    },
    Announcements(Vec<Group>),
    AnnouncementInvites(Vec<Invite>),
    AnnouncementMessages {
        id: ExchangeKey,
        messages: Vec<Message>,
    },
}

impl ChatEvent {
    /// Name of the observation channel this event belongs to
    pub fn channel(&self) -> &'static str {
        match self {
            ChatEvent::Contacts(_) => "contacts",
            ChatEvent::ContactInvites(_) => "contactInvites",
            ChatEvent::ContactMessages { .. } => "contactMessages",
            ChatEvent::Channels(_) => "channels",
            ChatEvent::ChannelInvites(_) => "channelInvites",
            ChatEvent::ChannelMessages { .. } => "channelMessages",
            ChatEvent::Announcements(_) => "announcements",
            ChatEvent::AnnouncementInvites(_) => "announcementInvites",
            ChatEvent::AnnouncementMessages { .. } => "announcementMessages",
        }
    }
}

/// Fans [`ChatEvent`]s out to subscribers
#[derive(Clone)]
pub struct ChatEventBroadcaster {
    tx: broadcast::Sender<ChatEvent>,
}

impl ChatEventBroadcaster {
    /// # Arguments
    /// * `capacity` - Events buffered per subscriber before it lags
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Emit an event to all subscribers
    ///
    /// # Returns
    /// Number of subscribers that received the event
    pub fn emit(&self, event: ChatEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChatEventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_without_subscribers() {
        let broadcaster = ChatEventBroadcaster::default();
        assert_eq!(broadcaster.subscriber_count(), 0);
        assert_eq!(broadcaster.emit(ChatEvent::Contacts(vec![])), 0);
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_full_list() {
        let broadcaster = ChatEventBroadcaster::new(4);
        let mut rx1 = broadcaster.subscribe();
        let mut rx2 = broadcaster.subscribe();

        assert_eq!(broadcaster.emit(ChatEvent::Channels(vec![])), 2);

        let e1 = rx1.recv().await.unwrap();
        let e2 = rx2.recv().await.unwrap();
        assert_eq!(e1, ChatEvent::Channels(vec![]));
        assert_eq!(e1.channel(), "channels");
        assert_eq!(e1, e2);
    }
}
