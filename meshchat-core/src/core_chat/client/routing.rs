//! Subscription routing
//!
//! Every followed prefix is tagged with a [`Route`]. Queued events are
//! dispatched by the route of the prefix they arrived on, and handler
//! failures are logged here instead of bubbling up: an update that cannot
//! be applied yet is simply seen again on the next redelivery.

use super::ChatClient;
use crate::core_chat::errors::{ChatError, ChatResult};
use crate::core_chat::types::{GroupKind, RelationshipKind, ThreadKey};
use crate::core_crypto::{ExchangeKey, PublicKey};
use crate::core_graph::GraphEvent;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Route {
    /// `~me/contacts`
    Contacts,
    /// A proposed contact's own contact list, watched for acceptance
    ContactEcho(PublicKey),
    /// `inbox/me/<kind>`
    Invites(RelationshipKind),
    /// `~me/<kind>`
    Groups(GroupKind),
    Roster(GroupKind, ExchangeKey),
    Admins(ExchangeKey),
    /// "new" markers addressed to us for one thread
    Markers(ThreadKey),
    DirectLog {
        counterpart: PublicKey,
        writer: PublicKey,
    },
    GroupLog {
        kind: GroupKind,
        id: ExchangeKey,
        writer: PublicKey,
    },
}

/// The single segment below the subscribed prefix
pub(super) fn leaf_key(event: &GraphEvent) -> ChatResult<&str> {
    match event.relative() {
        [key] => Ok(key.as_str()),
        _ => Err(ChatError::MalformedRecord(format!(
            "unexpected leaf {} under {}",
            event.path, event.prefix
        ))),
    }
}

/// Parse a leaf key that names a member
pub(super) fn member_key(event: &GraphEvent) -> ChatResult<PublicKey> {
    let key = leaf_key(event)?;
    PublicKey::parse(key).map_err(|e| ChatError::MalformedRecord(format!("member {}: {}", key, e)))
}

impl ChatClient {
    pub(super) async fn dispatch(&mut self, event: GraphEvent) {
        let Some(route) = self.routes.get(&event.prefix).cloned() else {
            trace!(path = %event.path, "no route, dropping");
            return;
        };

        let result = match &route {
            Route::Contacts => self.on_contact_record(&event).await,
            Route::ContactEcho(counterpart) => self.on_contact_echo(counterpart, &event).await,
            Route::Invites(kind) => self.on_invite(*kind, &event).await,
            Route::Groups(kind) => self.on_group_record(*kind, &event).await,
            Route::Roster(kind, id) => self.on_roster_row(*kind, id, &event).await,
            Route::Admins(id) => self.on_admin_row(id, &event).await,
            Route::Markers(key) => self.on_marker(key, &event).await,
            Route::DirectLog { counterpart, writer } => {
                self.on_direct_line(counterpart, writer, &event).await
            }
            Route::GroupLog { kind, id, writer } => {
                self.on_group_line(*kind, id, writer, &event).await
            }
        };

        if let Err(err) = result {
            if err.is_absorbed() {
                debug!(path = %event.path, error = %err, "update skipped");
            } else {
                warn!(path = %event.path, ?route, error = %err, "failed to apply update");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_graph::GraphPath;
    use serde_json::Value;

    fn event(prefix: &GraphPath, path: GraphPath) -> GraphEvent {
        GraphEvent {
            prefix: prefix.clone(),
            path,
            value: Value::Null,
        }
    }

    #[test]
    fn test_leaf_key() {
        let prefix = GraphPath::root("inbox").child("bob");
        assert_eq!(leaf_key(&event(&prefix, prefix.child("alice"))).unwrap(), "alice");

        let nested = event(&prefix, prefix.child("channel").child("alice"));
        assert!(matches!(leaf_key(&nested), Err(ChatError::MalformedRecord(_))));
    }

    #[test]
    fn test_member_key_rejects_garbage() {
        let prefix = GraphPath::root("roster");
        let err = member_key(&event(&prefix, prefix.child("not-a-key"))).unwrap_err();
        assert!(matches!(err, ChatError::MalformedRecord(_)));
    }
}
