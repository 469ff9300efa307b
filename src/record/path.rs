//! Node paths in the record tree

use crate::record::store::{RecordErrorCode, RecordStoreError};
use std::fmt;

/// Characters the record store rejects inside a key
const FORBIDDEN_KEY_CHARS: [char; 5] = ['.', '#', '$', '[', ']'];

/// Slash-separated location of a node in the record tree.
///
/// The empty path is the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodePath {
    segments: Vec<String>,
}

impl NodePath {
    /// Root of the tree
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse `"a/b/c"`; empty segments (leading, trailing or doubled slashes) are skipped.
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Path of a child node. `key` may itself contain slashes.
    pub fn child(&self, key: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(key.split('/').filter(|s| !s.is_empty()).map(str::to_string));
        Self { segments }
    }

    /// Path of the child named by a caller-supplied id.
    ///
    /// Unlike [`NodePath::child`], `id` must be exactly one non-empty segment.
    pub fn id_child(&self, id: &str) -> Result<Self, RecordStoreError> {
        if id.is_empty() || id.contains('/') {
            return Err(RecordStoreError::coded(
                RecordErrorCode::OperationFailed,
                format!("Invalid id {id:?} under {self}"),
            ));
        }
        let mut segments = self.segments.clone();
        segments.push(id.to_string());
        Ok(Self { segments })
    }

    /// Path segments from the root
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last segment, `None` at the root
    pub fn key(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Check whether this is the root path
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// True if `self` equals `other` or lies above it
    pub fn contains(&self, other: &NodePath) -> bool {
        other.segments.starts_with(&self.segments)
    }

    /// True if one path contains the other
    pub fn overlaps(&self, other: &NodePath) -> bool {
        self.contains(other) || other.contains(self)
    }

    /// First segment the record store would reject, if any
    pub fn invalid_segment(&self) -> Option<&str> {
        self.segments
            .iter()
            .find(|s| s.contains(FORBIDDEN_KEY_CHARS) || s.chars().any(char::is_control))
            .map(String::as_str)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

impl From<&str> for NodePath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_empty_segments() {
        let path = NodePath::parse("/messages//c1/");
        assert_eq!(path.segments(), ["messages", "c1"]);
        assert_eq!(path.to_string(), "/messages/c1");
    }

    #[test]
    fn test_child_and_key() {
        let path = NodePath::root().child("presence").child("users/alice");
        assert_eq!(path.key(), Some("alice"));
        assert_eq!(path.segments().len(), 3);
        assert!(NodePath::root().key().is_none());
    }

    #[test]
    fn test_id_child_is_one_segment() {
        let root = NodePath::parse("messages");
        assert_eq!(root.id_child("c1").unwrap().segments(), ["messages", "c1"]);
        for bad in ["", "a/b", "/", "c1/"] {
            assert!(matches!(
                root.id_child(bad),
                Err(RecordStoreError::Coded {
                    code: RecordErrorCode::OperationFailed,
                    ..
                })
            ));
        }
    }

    #[test]
    fn test_contains_and_overlaps() {
        let parent = NodePath::parse("a/b");
        let child = NodePath::parse("a/b/c");
        let sibling = NodePath::parse("a/bc");

        assert!(parent.contains(&child));
        assert!(!child.contains(&parent));
        assert!(child.overlaps(&parent));
        assert!(!parent.overlaps(&sibling));
        assert!(NodePath::root().contains(&sibling));
    }

    #[test]
    fn test_invalid_segment() {
        assert_eq!(NodePath::parse("users/a.b").invalid_segment(), Some("a.b"));
        assert!(NodePath::parse("users/alice").invalid_segment().is_none());
    }
}
