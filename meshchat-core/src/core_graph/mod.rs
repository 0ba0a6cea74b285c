//! Replicated graph collaborator
//!
//! The chat core never talks to a concrete store. It writes and subscribes
//! through [`GraphStore`], addressing leaves with [`GraphPath`]s. Paths whose
//! first segment starts with `~` belong to a single identity and only that
//! identity may write under them; every other path is a shared mailbox.

pub mod errors;
pub mod memory;
pub mod path;
pub mod store;

pub use errors::{GraphError, GraphResult};
pub use memory::MemoryGraph;
pub use path::GraphPath;
pub use store::{GraphEvent, GraphSink, GraphStore};
