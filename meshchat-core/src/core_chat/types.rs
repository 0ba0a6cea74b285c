/*
    types.rs - domain types of the chat core

    Relationship kinds, the materialized entities shown to observers
    (contacts, groups, invites, messages) and the time source used to key
    log entries.
*/

use super::announcement::Governance;
use super::errors::{ChatError, ChatResult};
use crate::core_crypto::KeyPair;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

pub use crate::core_crypto::{ExchangeKey, PublicKey};
pub use crate::core_identity::Identity;

/// How far ahead of local time a remote timestamp may be
pub const MAX_CLOCK_SKEW: Timestamp = Timestamp(24 * 60 * 60 * 1000);

/// Unix timestamp in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Timestamp(millis)
    }

    pub fn from_millis(millis: u64) -> Self {
        Timestamp(millis)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Not further ahead of the local clock than [`MAX_CLOCK_SKEW`]
    pub fn is_plausible(&self) -> bool {
        self.0 <= Timestamp::now().0.saturating_add(MAX_CLOCK_SKEW.as_millis())
    }

    /// Reject a remote timestamp that would pin every later entry behind it
    pub fn ensure_plausible(&self, what: &str) -> ChatResult<()> {
        if self.is_plausible() {
            Ok(())
        } else {
            Err(ChatError::MalformedRecord(format!(
                "{} timestamp {} is too far in the future",
                what, self.0
            )))
        }
    }

    /// Parse a graph key written by [`Display`](fmt::Display)
    pub fn parse_key(key: &str) -> Option<Self> {
        key.parse().ok().map(Timestamp)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-session time source.
///
/// Never hands out the same value twice and never runs behind a timestamp
/// it has observed, so entries written after seeing another member's entry
/// always sort after it.
#[derive(Debug, Default)]
pub struct Clock {
    last: u64,
}

impl Clock {
    pub fn next(&mut self) -> Timestamp {
        self.last = Timestamp::now().0.max(self.last.saturating_add(1));
        Timestamp(self.last)
    }

    /// Implausible timestamps are ignored
    pub fn observe(&mut self, seen: Timestamp) {
        if seen.is_plausible() {
            self.last = self.last.max(seen.0);
        }
    }
}

/// The three relationship kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    Contact,
    Channel,
    Announcement,
}

impl RelationshipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::Contact => "contact",
            RelationshipKind::Channel => "channel",
            RelationshipKind::Announcement => "announcement",
        }
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Group flavours: symmetric channels and admin-gated announcements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    Channel,
    Announcement,
}

impl GroupKind {
    pub fn as_str(&self) -> &'static str {
        RelationshipKind::from(*self).as_str()
    }
}

impl From<GroupKind> for RelationshipKind {
    fn from(kind: GroupKind) -> Self {
        match kind {
            GroupKind::Channel => RelationshipKind::Channel,
            GroupKind::Announcement => RelationshipKind::Announcement,
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one message thread
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ThreadKey {
    Contact(PublicKey),
    Group(GroupKind, ExchangeKey),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactState {
    /// Proposed by us, counterpart has not accepted yet
    Invited,
    Active,
    Disabled,
}

/// A 1:1 relationship as seen by the current identity
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    /// Fresh per add, so a re-added contact is a new materialized entry
    pub incarnation: String,
    pub identity: Identity,
    pub state: ContactState,
    pub unread_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipState {
    Invited,
    Joined,
    Disabled,
}

impl MembershipState {
    /// Tie break between entries carrying the same timestamp
    pub(crate) fn precedence(&self) -> u8 {
        match self {
            MembershipState::Invited => 0,
            MembershipState::Joined => 1,
            MembershipState::Disabled => 2,
        }
    }
}

/// One roster row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerMembership {
    pub alias: String,
    pub display_name: String,
    pub joined: bool,
    pub state: MembershipState,
    /// Timestamp of the entry or control message that produced this row
    pub updated_at: Timestamp,
}

impl PeerMembership {
    pub fn new(alias: &str, display_name: &str, state: MembershipState, updated_at: Timestamp) -> Self {
        Self {
            alias: alias.to_string(),
            display_name: display_name.to_string(),
            joined: state == MembershipState::Joined,
            state,
            updated_at,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state != MembershipState::Disabled
    }

    /// Whether a row produced at `at` with `state` should replace this one
    pub fn superseded_by(&self, state: MembershipState, at: Timestamp) -> bool {
        (at, state.precedence()) > (self.updated_at, self.state.precedence())
    }
}

pub type Roster = BTreeMap<PublicKey, PeerMembership>;

/// Admin map entry of an announcement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdminStatus {
    Active { display_name: String, since: Timestamp },
    Disabled,
}

pub type Admins = BTreeMap<PublicKey, AdminStatus>;

/// A channel or announcement the current identity belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    /// Fresh per create or accept
    pub membership: String,
    pub kind: GroupKind,
    /// Exchange key of the group key pair
    pub id: ExchangeKey,
    pub name: String,
    pub key_pair: KeyPair,
    /// Present for announcements only
    pub governance: Option<Governance>,
    pub roster: Roster,
    pub unread_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteState {
    Proposed,
    Accepted,
    Denied,
}

/// A pending invitation addressed to the current identity
#[derive(Debug, Clone, PartialEq)]
pub struct Invite {
    pub invite_id: String,
    pub kind: RelationshipKind,
    /// Inviter key for contacts, group id otherwise
    pub relationship_id: String,
    pub name: String,
    pub inviter: Identity,
    /// Group key pair, already unwrapped
    pub key_pair: Option<KeyPair>,
    pub roster: Roster,
    pub admins: Admins,
    pub owner: Option<PublicKey>,
    pub issued_at: Timestamp,
    pub state: InviteState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    Join,
    Leave,
    Invited,
    NewAdmin,
}

/// Roster or admin change carried by a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlPayload {
    pub action: ControlAction,
    pub subject: PublicKey,
    pub alias: String,
    pub display_name: String,
}

/// One decrypted thread entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub timestamp: Timestamp,
    pub sender: PublicKey,
    pub sender_name: String,
    pub text: String,
    pub control: Option<ControlPayload>,
}

impl Message {
    /// Carries user visible text
    pub fn is_content(&self) -> bool {
        !self.text.is_empty()
    }
}
