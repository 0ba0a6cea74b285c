//! Wire records
//!
//! Every value the chat core stores in the graph is an [`Envelope`]: a
//! format version plus one tagged [`Record`]. Disablement is an explicit
//! [`Entry::Disabled`] variant carrying the id it retires, never an absent
//! or partial field.
//!
//! ```text
//! {"v":1,"body":{"type":"group","data":{"state":"disabled","record":{"id":"..."}}}}
//! ```

use super::errors::{ChatError, ChatResult};
use super::types::{
    AdminStatus, Admins, ContactState, ControlPayload, GroupKind, PeerMembership, RelationshipKind,
    Roster, Timestamp,
};
use crate::core_crypto::{ExchangeKey, PublicKey, SealedBox};
use crate::core_identity::{Identity, ProfileRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current envelope version
pub const RECORD_VERSION: u16 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub v: u16,
    pub body: Record,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Record {
    Profile(ProfileRecord),
    Contact(Entry<ContactRecord>),
    Invite(Entry<InviteRecord>),
    Group(Entry<GroupRecord>),
    Member(PeerMembership),
    Admin(AdminStatus),
    Chat(ChatLine),
    Marker(Entry<UnreadMarker>),
    Latest(LatestRecord),
}

/// Live record or the tombstone that retires it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "record", rename_all = "snake_case")]
pub enum Entry<T> {
    Active(T),
    Disabled { id: String },
}

/// `~<owner>/contacts/<counterpart>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub incarnation: String,
    pub identity: Identity,
    pub state: ContactState,
}

/// `inbox/<invitee>/<kind>/<inviter>/<relationship>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InviteRecord {
    pub invite_id: String,
    pub kind: RelationshipKind,
    pub relationship_id: String,
    pub name: String,
    pub inviter: Identity,
    /// Group key pair sealed under the inviter/invitee secret
    pub key_material: Option<SealedBox>,
    #[serde(default)]
    pub roster: Roster,
    #[serde(default)]
    pub admins: Admins,
    pub owner: Option<PublicKey>,
    pub issued_at: Timestamp,
}

/// `~<owner>/<kind>/<group id>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub membership: String,
    pub kind: GroupKind,
    pub id: ExchangeKey,
    pub name: String,
    /// Group key pair sealed under the owner's own derived secret
    pub sealed_key_pair: SealedBox,
    pub owner: Option<PublicKey>,
}

/// One entry of a per-writer log. The writer is the owner of the path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatLine {
    pub timestamp: Timestamp,
    pub sealed: SealedBox,
}

/// Plaintext inside [`ChatLine::sealed`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageBody {
    pub sender_name: String,
    pub text: String,
    pub control: Option<ControlPayload>,
}

/// Unread accounting only. Cleared markers become `Entry::Disabled`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnreadMarker {
    pub timestamp: Timestamp,
}

/// Preview of the most recent content message of a relationship
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestRecord {
    pub timestamp: Timestamp,
    pub sender: PublicKey,
    pub sealed: SealedBox,
}

/// Binds a payload type to its [`Record`] variant
pub trait RecordKind: Sized {
    const NAME: &'static str;

    fn into_record(self) -> Record;

    fn from_record(record: Record) -> Option<Self>;
}

macro_rules! record_kind {
    ($ty:ty, $variant:ident, $name:literal) => {
        impl RecordKind for $ty {
            const NAME: &'static str = $name;

            fn into_record(self) -> Record {
                Record::$variant(self)
            }

            fn from_record(record: Record) -> Option<Self> {
                match record {
                    Record::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

record_kind!(ProfileRecord, Profile, "profile");
record_kind!(Entry<ContactRecord>, Contact, "contact");
record_kind!(Entry<InviteRecord>, Invite, "invite");
record_kind!(Entry<GroupRecord>, Group, "group");
record_kind!(PeerMembership, Member, "member");
record_kind!(AdminStatus, Admin, "admin");
record_kind!(ChatLine, Chat, "chat");
record_kind!(Entry<UnreadMarker>, Marker, "marker");
record_kind!(LatestRecord, Latest, "latest");

/// Wrap a payload in the current envelope
pub fn encode<R: RecordKind>(payload: R) -> ChatResult<Value> {
    let envelope = Envelope {
        v: RECORD_VERSION,
        body: payload.into_record(),
    };
    Ok(serde_json::to_value(envelope)?)
}

/// Unwrap a stored value, rejecting other versions and other record kinds
pub fn decode<R: RecordKind>(value: &Value) -> ChatResult<R> {
    let envelope: Envelope = serde_json::from_value(value.clone())
        .map_err(|e| ChatError::MalformedRecord(format!("{}: {}", R::NAME, e)))?;

    if envelope.v != RECORD_VERSION {
        return Err(ChatError::MalformedRecord(format!(
            "{}: unsupported version {}",
            R::NAME,
            envelope.v
        )));
    }

    R::from_record(envelope.body)
        .ok_or_else(|| ChatError::MalformedRecord(format!("expected a {} record", R::NAME)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_disabled_entry_shape() {
        let value = encode(Entry::<UnreadMarker>::Disabled { id: "42".to_string() }).unwrap();
        assert_eq!(
            value,
            json!({"v": 1, "body": {"type": "marker", "data": {"state": "disabled", "record": {"id": "42"}}}})
        );

        let back: Entry<UnreadMarker> = decode(&value).unwrap();
        assert_eq!(back, Entry::Disabled { id: "42".to_string() });
    }

    #[test]
    fn test_decode_rejects_other_kind() {
        let value = encode(Entry::Active(UnreadMarker { timestamp: Timestamp(5) })).unwrap();
        let err = decode::<LatestRecord>(&value).unwrap_err();
        assert!(matches!(err, ChatError::MalformedRecord(_)));
    }

    #[test]
    fn test_decode_rejects_future_version() {
        let mut value = encode(AdminStatus::Disabled).unwrap();
        value["v"] = json!(2);
        assert!(matches!(
            decode::<AdminStatus>(&value),
            Err(ChatError::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        for value in [json!(null), json!("hello"), json!({"v": 1}), json!({"v": 1, "body": {"type": "nope"}})] {
            assert!(matches!(
                decode::<ChatLine>(&value),
                Err(ChatError::MalformedRecord(_))
            ));
        }
    }

    #[test]
    fn test_partial_membership_is_malformed() {
        let value = json!({
            "v": 1,
            "body": {"type": "member", "data": {"alias": "bob", "joined": true}}
        });
        assert!(decode::<PeerMembership>(&value).is_err());
    }
}
