//! Message threads and unread accounting
//!
//! A thread is the union of several per-writer logs. Entries are decrypted
//! as they stream in and inserted in timestamp order; ties keep arrival
//! order. An entry is remembered as seen only after it decrypted, so a
//! delivery that failed earlier is retried when the store redelivers it.

use super::types::{Message, PublicKey, ThreadKey, Timestamp};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone)]
pub struct MessageThread {
    key: ThreadKey,
    seen: HashSet<(PublicKey, Timestamp)>,
    entries: Vec<Message>,
}

impl MessageThread {
    pub fn new(key: ThreadKey) -> Self {
        Self {
            key,
            seen: HashSet::new(),
            entries: Vec::new(),
        }
    }

    pub fn key(&self) -> &ThreadKey {
        &self.key
    }

    pub fn has_seen(&self, writer: &PublicKey, at: Timestamp) -> bool {
        self.seen.contains(&(writer.clone(), at))
    }

    /// Insert a decrypted entry. Returns false for a duplicate.
    pub fn insert(&mut self, message: Message) -> bool {
        if !self.seen.insert((message.sender.clone(), message.timestamp)) {
            return false;
        }
        let at = self
            .entries
            .partition_point(|existing| existing.timestamp <= message.timestamp);
        self.entries.insert(at, message);
        true
    }

    /// Every entry, control messages included
    pub fn entries(&self) -> &[Message] {
        &self.entries
    }

    /// Content messages accepted by `policy`, in thread order
    pub fn visible(&self, policy: impl Fn(&Message) -> bool) -> Vec<Message> {
        self.entries
            .iter()
            .filter(|message| message.is_content() && policy(message))
            .cloned()
            .collect()
    }
}

/// "new" markers addressed to the current identity for one relationship
#[derive(Debug, Clone, Default)]
pub struct UnreadCounter {
    markers: BTreeMap<Timestamp, bool>,
}

impl UnreadCounter {
    /// Record a marker as present (`true`) or cleared. Returns whether the
    /// count changed.
    pub fn set(&mut self, at: Timestamp, unread: bool) -> bool {
        let before = self.count();
        self.markers.insert(at, unread);
        self.count() != before
    }

    pub fn count(&self) -> usize {
        self.markers.values().filter(|unread| **unread).count()
    }

    pub fn is_unread(&self, at: Timestamp) -> bool {
        self.markers.get(&at).copied().unwrap_or(false)
    }

    /// Markers still waiting to be cleared
    pub fn pending(&self) -> Vec<Timestamp> {
        self.markers
            .iter()
            .filter(|(_, unread)| **unread)
            .map(|(at, _)| *at)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_chat::types::{ControlAction, ControlPayload};
    use proptest::prelude::*;

    fn key() -> PublicKey {
        PublicKey::parse(&"ab".repeat(32)).unwrap()
    }

    fn message(at: u64, text: &str) -> Message {
        Message {
            timestamp: Timestamp(at),
            sender: key(),
            sender_name: "Alice".to_string(),
            text: text.to_string(),
            control: None,
        }
    }

    fn thread() -> MessageThread {
        MessageThread::new(ThreadKey::Contact(key()))
    }

    #[test]
    fn test_out_of_order_inserts_sorted() {
        let mut thread = thread();
        for at in [5, 1, 3] {
            assert!(thread.insert(message(at, &at.to_string())));
        }
        let order: Vec<u64> = thread.entries().iter().map(|m| m.timestamp.0).collect();
        assert_eq!(order, vec![1, 3, 5]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut thread = thread();
        assert!(thread.insert(message(7, "hi")));
        assert!(!thread.insert(message(7, "hi")));
        assert!(thread.has_seen(&key(), Timestamp(7)));
        assert_eq!(thread.entries().len(), 1);
    }

    #[test]
    fn test_ties_keep_arrival_order() {
        let mut thread = thread();
        let other = PublicKey::parse(&"cd".repeat(32)).unwrap();
        thread.insert(message(4, "first"));
        let mut second = message(4, "second");
        second.sender = other;
        thread.insert(second);

        let texts: Vec<_> = thread.entries().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[test]
    fn test_visible_hides_control_only_entries() {
        let mut thread = thread();
        let mut join = message(1, "");
        join.control = Some(ControlPayload {
            action: ControlAction::Join,
            subject: key(),
            alias: "alice".to_string(),
            display_name: "Alice".to_string(),
        });
        thread.insert(join);
        thread.insert(message(2, "hello"));

        let visible = thread.visible(|_| true);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].text, "hello");
        assert!(thread.visible(|_| false).is_empty());
    }

    #[test]
    fn test_unread_counter() {
        let mut counter = UnreadCounter::default();
        assert!(counter.set(Timestamp(1), true));
        assert!(counter.set(Timestamp(2), true));
        assert!(!counter.set(Timestamp(2), true));
        assert_eq!(counter.count(), 2);

        assert!(counter.set(Timestamp(1), false));
        assert!(!counter.set(Timestamp(1), false));
        assert_eq!(counter.count(), 1);
        assert_eq!(counter.pending(), vec![Timestamp(2)]);
        assert!(!counter.is_unread(Timestamp(1)));
    }

    proptest! {
        #[test]
        fn prop_always_sorted(stamps in prop::collection::vec(0u64..50, 0..40)) {
            let mut thread = thread();
            for at in &stamps {
                thread.insert(message(*at, "x"));
                let entries = thread.entries();
                prop_assert!(entries.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
            }
            let mut unique = stamps.clone();
            unique.sort();
            unique.dedup();
            prop_assert_eq!(thread.entries().len(), unique.len());
        }
    }
}
