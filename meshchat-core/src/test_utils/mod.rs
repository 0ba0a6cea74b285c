//! Test utilities for the chat core
//!
//! Fixtures that put several clients on one shared in-memory graph, plus
//! helpers for waiting on observation channels. Used by unit tests and by
//! the integration tests under `tests/`.

pub mod async_helpers;
pub mod fixtures;

pub use async_helpers::*;
pub use fixtures::*;
