//! Buffered writes of a copy-on-write overlay.
//!
//! The scratch space is a flat `BTreeMap` from normalized path to [`Node`].
//! A path with no node falls through to the base tree, unless an ancestor
//! hides it: a whiteout or file at an ancestor removes the whole base
//! subtree, and an opaque directory hides the base directory's children.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;

use arbor_store::EntryMode;
use arbor_types::ObjectId;

use crate::path::{ancestors, is_within};

/// Content of a buffered file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Content {
    /// Bytes written through the overlay, not stored yet.
    Inline(Arc<[u8]>),
    /// A blob already in the store, carried over from the base by chmod,
    /// chtimes or rename.
    Stored { id: ObjectId, size: Option<u64> },
}

impl Content {
    pub fn size(&self) -> Option<u64> {
        match self {
            Content::Inline(data) => Some(data.len() as u64),
            Content::Stored { size, .. } => *size,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    File {
        content: Content,
        mode: EntryMode,
        /// Unknown for blobs carried over from the base.
        modified: Option<SystemTime>,
    },
    Dir {
        /// Base children at this path are hidden.
        opaque: bool,
        modified: Option<SystemTime>,
    },
    /// The base entry at this path, and everything beneath it, is deleted.
    Whiteout,
}

#[derive(Clone, Debug, Default)]
pub struct ScratchSpace {
    nodes: BTreeMap<String, Node>,
}

impl ScratchSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&Node> {
        self.nodes.get(path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut Node> {
        self.nodes.get_mut(path)
    }

    pub fn insert(&mut self, path: String, node: Node) {
        self.nodes.insert(path, node);
    }

    /// Forget every node at or below `path`.
    pub fn remove_subtree(&mut self, path: &str) {
        self.nodes.retain(|p, _| !is_within(p, path));
    }

    /// Drop everything; returns how many nodes were held.
    pub fn clear(&mut self) -> usize {
        let n = self.nodes.len();
        self.nodes.clear();
        n
    }

    /// Whether an ancestor of `path` makes it unreachable: a whiteout or a
    /// file sits on the way down.
    pub fn blocked(&self, path: &str) -> bool {
        ancestors(path).any(|a| {
            matches!(
                self.nodes.get(a),
                Some(Node::Whiteout | Node::File { .. })
            )
        })
    }

    /// Whether the base children of directory `dir` show through.
    pub fn base_children_visible(&self, dir: &str) -> bool {
        if dir.is_empty() {
            return true;
        }
        match self.nodes.get(dir) {
            Some(Node::Dir { opaque: false, .. }) => !self.hides_base_above(dir),
            Some(_) => false,
            None => !self.hides_base_above(dir),
        }
    }

    /// Whether a node strictly above `path` hides the base entry there.
    pub fn hides_base_above(&self, path: &str) -> bool {
        ancestors(path).any(|a| {
            matches!(
                self.nodes.get(a),
                Some(Node::Whiteout | Node::File { .. } | Node::Dir { opaque: true, .. })
            )
        })
    }

    /// Nodes directly inside `dir` as `(name, node)`.
    pub fn children<'a>(&'a self, dir: &'a str) -> impl Iterator<Item = (&'a str, &'a Node)> + 'a {
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{dir}/")
        };
        self.nodes
            .range(prefix.clone()..)
            .take_while(move |(p, _)| p.starts_with(&prefix))
            .filter_map(move |(p, node)| {
                let rest = &p[dir.len() + usize::from(!dir.is_empty())..];
                (!rest.contains('/')).then_some((rest, node))
            })
    }
}
