//! Chat core
//!
//! Contacts, channels and announcements over the replicated graph. Raw
//! store updates are reduced into stable lists by the
//! [`materializer`](materializer), secrets come from
//! [`key_exchange`](key_exchange), and [`ChatClient`] ties both to one
//! logged-in session and publishes the results on nine observation
//! channels.

pub mod announcement;
pub mod client;
pub mod errors;
pub mod events;
pub mod invite;
pub mod key_exchange;
pub mod materializer;
pub mod paths;
pub mod records;
pub mod thread;
pub mod types;

pub use announcement::Governance;
pub use client::ChatClient;
pub use errors::{ChatError, ChatResult};
pub use events::{ChatEvent, ChatEventBroadcaster};
pub use types::{
    AdminStatus, Admins, Contact, ContactState, ControlAction, ControlPayload, Group, GroupKind,
    Invite, InviteState, MembershipState, Message, PeerMembership, RelationshipKind, Roster,
    ThreadKey, Timestamp,
};
