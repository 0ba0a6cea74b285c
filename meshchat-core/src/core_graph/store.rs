//! Graph store trait
//!
//! Defines the interface the chat core consumes from the replicated graph.

use super::errors::GraphResult;
use super::path::GraphPath;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeSet;
use tokio::sync::mpsc;

/// One leaf value delivered to a subscription
#[derive(Debug, Clone, PartialEq)]
pub struct GraphEvent {
    /// The prefix that was subscribed to
    pub prefix: GraphPath,
    /// The leaf that changed
    pub path: GraphPath,
    pub value: Value,
}

impl GraphEvent {
    /// Segments of the leaf below the subscribed prefix
    pub fn relative(&self) -> &[String] {
        self.path.relative_to(&self.prefix).unwrap_or(&[])
    }
}

/// Where a subscription delivers its events
pub type GraphSink = mpsc::UnboundedSender<GraphEvent>;

/// Replicated, eventually consistent graph
///
/// Implementations must ensure:
/// - `put` is an idempotent upsert of a single leaf
/// - subscriptions fire for local and remote writes at or below the prefix
/// - subscribing redelivers every leaf currently below the prefix
/// - writes below `~<key>` are only accepted from `<key>`
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Upsert the leaf at `path` on behalf of `author`
    async fn put(&self, author: &str, path: &GraphPath, value: Value) -> GraphResult<()>;

    /// Current value of one leaf
    async fn get(&self, path: &GraphPath) -> GraphResult<Option<Value>>;

    /// Snapshot of every leaf below `prefix`
    async fn read_once(&self, prefix: &GraphPath) -> GraphResult<Vec<(GraphPath, Value)>>;

    /// Deliver every current and future leaf below `prefix` into `sink`.
    ///
    /// The subscription lives until the receiving half of `sink` is dropped.
    async fn subscribe(&self, prefix: &GraphPath, sink: GraphSink) -> GraphResult<()>;

    /// True when nothing is stored below `prefix`
    async fn is_empty(&self, prefix: &GraphPath) -> GraphResult<bool>;

    /// Bind `public_key` to `alias` in the alias registry
    async fn register_alias(&self, alias: &str, public_key: &str) -> GraphResult<()>;

    /// Every key that was ever bound to `alias`
    async fn keys_for_alias(&self, alias: &str) -> GraphResult<BTreeSet<String>>;
}
