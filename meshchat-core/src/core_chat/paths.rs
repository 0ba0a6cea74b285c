//! Where each record lives in the graph
//!
//! Private state sits in the writer's own `~<key>` namespace. Cross-identity
//! traffic goes through three shared mailboxes: `inbox` for invites,
//! `directMail` for contact unread markers and previews, `groupMail` for
//! group unread markers and previews.

use super::types::{ExchangeKey, GroupKind, PublicKey, RelationshipKind, Timestamp};
use crate::core_graph::GraphPath;

pub fn profile(owner: &PublicKey) -> GraphPath {
    GraphPath::user(owner).child("profile")
}

pub fn contacts(owner: &PublicKey) -> GraphPath {
    GraphPath::user(owner).child("contacts")
}

pub fn contact(owner: &PublicKey, counterpart: &PublicKey) -> GraphPath {
    contacts(owner).child(counterpart)
}

/// Outbound log of `writer` towards `counterpart`
pub fn direct_log(writer: &PublicKey, counterpart: &PublicKey) -> GraphPath {
    GraphPath::user(writer).child("dm").child(counterpart)
}

pub fn direct_mailbox(recipient: &PublicKey, sender: &PublicKey) -> GraphPath {
    GraphPath::root("directMail").child(recipient).child(sender)
}

pub fn direct_markers(recipient: &PublicKey, sender: &PublicKey) -> GraphPath {
    direct_mailbox(recipient, sender).child("new")
}

pub fn direct_latest(recipient: &PublicKey, sender: &PublicKey) -> GraphPath {
    direct_mailbox(recipient, sender).child("latest")
}

pub fn groups(owner: &PublicKey, kind: GroupKind) -> GraphPath {
    GraphPath::user(owner).child(kind)
}

pub fn group(owner: &PublicKey, kind: GroupKind, id: &ExchangeKey) -> GraphPath {
    groups(owner, kind).child(id)
}

pub fn roster(owner: &PublicKey, kind: GroupKind, id: &ExchangeKey) -> GraphPath {
    GraphPath::user(owner).child("roster").child(kind).child(id)
}

pub fn admins(owner: &PublicKey, id: &ExchangeKey) -> GraphPath {
    GraphPath::user(owner).child("admins").child(id)
}

/// Per-member append-only log of one group
pub fn group_log(writer: &PublicKey, kind: GroupKind, id: &ExchangeKey) -> GraphPath {
    GraphPath::user(writer).child("chat").child(kind).child(id)
}

pub fn group_markers(kind: GroupKind, id: &ExchangeKey, member: &PublicKey) -> GraphPath {
    GraphPath::root("groupMail").child(kind).child(id).child(member).child("new")
}

pub fn group_latest(kind: GroupKind, id: &ExchangeKey) -> GraphPath {
    GraphPath::root("groupMail").child(kind).child(id).child("latest")
}

pub fn inbox(recipient: &PublicKey, kind: RelationshipKind) -> GraphPath {
    GraphPath::root("inbox").child(recipient).child(kind)
}

pub fn invite(
    recipient: &PublicKey,
    kind: RelationshipKind,
    inviter: &PublicKey,
    relationship_id: &str,
) -> GraphPath {
    inbox(recipient, kind).child(inviter).child(relationship_id)
}

pub fn entry(log: &GraphPath, at: Timestamp) -> GraphPath {
    log.child(at)
}
