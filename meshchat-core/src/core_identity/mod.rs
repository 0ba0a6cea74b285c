//! Identity and session management
//!
//! An [`Identity`] is what other users see of someone. A [`Session`] is the
//! logged-in holder of that identity's key pair and is threaded explicitly
//! through the chat client.

pub mod identity;
pub mod manager;
pub mod session;

pub use identity::Identity;
pub use manager::{IdentityManager, ProfileRecord};
pub use session::Session;
