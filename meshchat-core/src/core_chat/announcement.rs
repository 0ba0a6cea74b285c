//! Announcement access control
//!
//! Layered on the message thread for the broadcast group kind. The owner is
//! fixed at creation. Only admins fan out posts, and only the owner can
//! promote a member to admin. Every receiver re-checks both rules against
//! its own copy of the admin map.

use super::types::{AdminStatus, Admins, Message, PublicKey, Timestamp};

#[derive(Debug, Clone, PartialEq)]
pub struct Governance {
    pub owner: PublicKey,
    pub admins: Admins,
}

impl Governance {
    pub fn new(owner: PublicKey) -> Self {
        Self {
            owner,
            admins: Admins::new(),
        }
    }

    /// Admin since when, or `None` when not an active admin
    pub fn admin_since(&self, member: &PublicKey) -> Option<Timestamp> {
        match self.admins.get(member) {
            Some(AdminStatus::Active { since, .. }) => Some(*since),
            _ => None,
        }
    }

    pub fn is_admin(&self, member: &PublicKey) -> bool {
        self.admin_since(member).is_some()
    }

    /// Content from `sender` gets latest/new-marker fan out
    pub fn may_fan_out(&self, sender: &PublicKey) -> bool {
        self.is_admin(sender)
    }

    /// A `newAdmin` payload from `sender` is authoritative
    pub fn accepts_promotion(&self, sender: &PublicKey) -> bool {
        *sender == self.owner
    }

    /// Whether `viewer` sees content `message`.
    ///
    /// Authors always see their own posts. Everyone else only sees posts
    /// made while the author was an admin.
    pub fn shows(&self, viewer: &PublicKey, message: &Message) -> bool {
        if message.sender == *viewer {
            return true;
        }
        matches!(self.admin_since(&message.sender), Some(since) if since <= message.timestamp)
    }

    /// Store an admin map row. Returns whether the map changed.
    pub fn record(&mut self, member: PublicKey, status: AdminStatus) -> bool {
        if self.admins.get(&member) == Some(&status) {
            return false;
        }
        self.admins.insert(member, status);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: &str) -> PublicKey {
        PublicKey::parse(&byte.repeat(32)).unwrap()
    }

    fn post(sender: &PublicKey, at: u64) -> Message {
        Message {
            timestamp: Timestamp(at),
            sender: sender.clone(),
            sender_name: "x".to_string(),
            text: "news".to_string(),
            control: None,
        }
    }

    fn active(since: u64) -> AdminStatus {
        AdminStatus::Active {
            display_name: "x".to_string(),
            since: Timestamp(since),
        }
    }

    #[test]
    fn test_only_owner_promotes() {
        let owner = key("01");
        let governance = Governance::new(owner.clone());
        assert!(governance.accepts_promotion(&owner));
        assert!(!governance.accepts_promotion(&key("02")));
    }

    #[test]
    fn test_fan_out_requires_active_admin() {
        let (owner, bob) = (key("01"), key("02"));
        let mut governance = Governance::new(owner.clone());
        governance.record(owner.clone(), active(0));
        governance.record(bob.clone(), AdminStatus::Disabled);

        assert!(governance.may_fan_out(&owner));
        assert!(!governance.may_fan_out(&bob));
        assert!(!governance.may_fan_out(&key("03")));
    }

    #[test]
    fn test_visibility_uses_promotion_time() {
        let (owner, bob, carol) = (key("01"), key("02"), key("03"));
        let mut governance = Governance::new(owner.clone());
        governance.record(bob.clone(), active(100));

        assert!(!governance.shows(&carol, &post(&bob, 99)));
        assert!(governance.shows(&carol, &post(&bob, 100)));
        assert!(governance.shows(&bob, &post(&bob, 5)));
        assert!(!governance.shows(&carol, &post(&owner, 1)));
    }

    #[test]
    fn test_record_reports_changes() {
        let mut governance = Governance::new(key("01"));
        assert!(governance.record(key("02"), active(1)));
        assert!(!governance.record(key("02"), active(1)));
        assert!(governance.record(key("02"), AdminStatus::Disabled));
    }
}
