/*
    MemoryGraph - in-process stand-in for the replicated graph

    Holds every leaf in one ordered map so a prefix is a contiguous range.
    Subscriptions are prefix based: a put notifies each live subscriber whose
    prefix contains the written path. All clients sharing one MemoryGraph see
    each other's writes immediately, which is what the scenario tests use to
    model several devices on one network.

    Also keeps:
    - the alias registry (alias -> every key ever bound to it)
    - a write counter so tests can assert that a rejected call wrote nothing
*/

use super::errors::{GraphError, GraphResult};
use super::path::GraphPath;
use super::store::{GraphEvent, GraphSink, GraphStore};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::trace;

#[derive(Default)]
struct GraphState {
    leaves: BTreeMap<GraphPath, Value>,
    subscribers: Vec<(GraphPath, GraphSink)>,
    aliases: HashMap<String, BTreeSet<String>>,
    writes: usize,
}

impl GraphState {
    fn below<'a>(&'a self, prefix: &'a GraphPath) -> impl Iterator<Item = (&'a GraphPath, &'a Value)> {
        self.leaves
            .range(prefix.clone()..)
            .take_while(move |(path, _)| path.starts_with(prefix))
    }
}

/// Shared in-memory graph
#[derive(Clone, Default)]
pub struct MemoryGraph {
    state: Arc<RwLock<GraphState>>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> GraphResult<RwLockReadGuard<'_, GraphState>> {
        self.state
            .read()
            .map_err(|_| GraphError::Unavailable("graph lock poisoned".to_string()))
    }

    fn write(&self) -> GraphResult<RwLockWriteGuard<'_, GraphState>> {
        self.state
            .write()
            .map_err(|_| GraphError::Unavailable("graph lock poisoned".to_string()))
    }

    /// Number of accepted puts since creation
    pub fn write_count(&self) -> usize {
        self.read().map(|state| state.writes).unwrap_or(0)
    }

    /// Number of leaves currently stored
    pub fn leaf_count(&self) -> usize {
        self.read().map(|state| state.leaves.len()).unwrap_or(0)
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn put(&self, author: &str, path: &GraphPath, value: Value) -> GraphResult<()> {
        if path.is_empty() {
            return Err(GraphError::InvalidPath("empty path".to_string()));
        }
        if let Some(owner) = path.owner() {
            if owner != author {
                return Err(GraphError::ForeignNamespace {
                    author: author.to_string(),
                    owner: owner.to_string(),
                    path: path.to_string(),
                });
            }
        }

        let mut state = self.write()?;
        state.leaves.insert(path.clone(), value.clone());
        state.writes += 1;

        // Closed sinks belong to dropped clients
        state.subscribers.retain(|(prefix, sink)| {
            if !path.starts_with(prefix) {
                return !sink.is_closed();
            }
            sink.send(GraphEvent {
                prefix: prefix.clone(),
                path: path.clone(),
                value: value.clone(),
            })
            .is_ok()
        });

        trace!(%path, author, "graph put");
        Ok(())
    }

    async fn get(&self, path: &GraphPath) -> GraphResult<Option<Value>> {
        Ok(self.read()?.leaves.get(path).cloned())
    }

    async fn read_once(&self, prefix: &GraphPath) -> GraphResult<Vec<(GraphPath, Value)>> {
        let state = self.read()?;
        Ok(state
            .below(prefix)
            .map(|(path, value)| (path.clone(), value.clone()))
            .collect())
    }

    async fn subscribe(&self, prefix: &GraphPath, sink: GraphSink) -> GraphResult<()> {
        let mut state = self.write()?;

        let current: Vec<GraphEvent> = state
            .below(prefix)
            .map(|(path, value)| GraphEvent {
                prefix: prefix.clone(),
                path: path.clone(),
                value: value.clone(),
            })
            .collect();

        for event in current {
            if sink.send(event).is_err() {
                return Ok(());
            }
        }

        state.subscribers.push((prefix.clone(), sink));
        trace!(%prefix, "graph subscribe");
        Ok(())
    }

    async fn is_empty(&self, prefix: &GraphPath) -> GraphResult<bool> {
        Ok(self.read()?.below(prefix).next().is_none())
    }

    async fn register_alias(&self, alias: &str, public_key: &str) -> GraphResult<()> {
        let mut state = self.write()?;
        state
            .aliases
            .entry(alias.to_string())
            .or_default()
            .insert(public_key.to_string());
        Ok(())
    }

    async fn keys_for_alias(&self, alias: &str) -> GraphResult<BTreeSet<String>> {
        Ok(self
            .read()?
            .aliases
            .get(alias)
            .cloned()
            .unwrap_or_default())
    }
}
