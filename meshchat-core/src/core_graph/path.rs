//! Slash separated locations in the graph

use serde::{Deserialize, Serialize};
use std::fmt;

/// Marks the first segment of a path as an identity namespace
pub const IDENTITY_PREFIX: char = '~';

/// A location in the graph, e.g. `~<pubkey>/contacts/<pubkey>`.
///
/// Ordering is segment-wise, so every path below a prefix sorts directly
/// after that prefix. [`MemoryGraph`](super::MemoryGraph) relies on this for
/// range scans.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GraphPath(Vec<String>);

impl GraphPath {
    /// A path with a single public segment
    pub fn root(segment: impl Into<String>) -> Self {
        Self(vec![segment.into()])
    }

    /// The signed namespace of one identity
    pub fn user(public_key: impl fmt::Display) -> Self {
        Self(vec![format!("{}{}", IDENTITY_PREFIX, public_key)])
    }

    pub fn child(&self, segment: impl ToString) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn parent(&self) -> Option<Self> {
        match self.0.len() {
            0 | 1 => None,
            n => Some(Self(self.0[..n - 1].to_vec())),
        }
    }

    /// Identity that owns this path, if it lives in a `~` namespace
    pub fn owner(&self) -> Option<&str> {
        self.0
            .first()
            .and_then(|first| first.strip_prefix(IDENTITY_PREFIX))
    }

    pub fn starts_with(&self, prefix: &GraphPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Segments below `prefix`, or `None` when `prefix` does not contain this path
    pub fn relative_to(&self, prefix: &GraphPath) -> Option<&[String]> {
        self.0.strip_prefix(prefix.0.as_slice())
    }
}

impl fmt::Display for GraphPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_namespace_owner() {
        let path = GraphPath::user("abc").child("contacts").child("def");
        assert_eq!(path.owner(), Some("abc"));
        assert_eq!(path.to_string(), "~abc/contacts/def");
        assert_eq!(GraphPath::root("inbox").child("abc").owner(), None);
    }

    #[test]
    fn test_parent_and_last() {
        let path = GraphPath::root("a").child("b").child(3);
        assert_eq!(path.last(), Some("3"));
        assert_eq!(path.parent(), Some(GraphPath::root("a").child("b")));
        assert_eq!(GraphPath::root("a").parent(), None);
    }

    #[test]
    fn test_relative_to() {
        let prefix = GraphPath::root("inbox").child("bob");
        let leaf = prefix.child("channel").child("alice");
        assert!(leaf.starts_with(&prefix));
        assert_eq!(
            leaf.relative_to(&prefix),
            Some(&["channel".to_string(), "alice".to_string()][..])
        );
        assert_eq!(prefix.relative_to(&leaf), None);
    }

    #[test]
    fn test_prefix_sorts_before_descendants() {
        let prefix = GraphPath::root("a").child("b");
        let inside = prefix.child("c");
        let sibling = GraphPath::root("a").child("c");
        assert!(prefix < inside);
        assert!(inside < sibling);
    }
}
