//! Hierarchical resource trees and full key paths
//!
//! A [`Tree`] models a nested translation resource: each key maps either to a
//! leaf string or to a nested tree. Key order is preserved so that a tree
//! written back to disk keeps the layout of the file it came from.
//!
//! JSON arrays are represented as branches whose segments are `[0]`, `[1]`, …
//! A branch remembers whether it was read from an array, so an object that
//! happens to use `"[0]"` as a key is written back as an object.

use std::fmt;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::entry::{SourceKind, TranslationEntry};
use crate::error::TreeError;

static INDEX_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[\d+\]$").expect("valid index segment pattern"));

// One dot-separated piece of a display path: `name`, `name[0][1]` or `[3]`
static PATH_PIECE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^\[\]]*)((?:\[\d+\])*)$").expect("valid path piece pattern")
});

static INDEX_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+)\]").expect("valid index run pattern"));

/// Full path from a tree root to a node.
///
/// Ordering is segment-wise lexicographic, which is the canonical ordering of
/// change sets. Serialized as a plain list of segments so that keys containing
/// dots (common in PO msgids) survive a round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyPath(Vec<String>);

impl KeyPath {
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        KeyPath(segments.into_iter().map(Into::into).collect())
    }

    /// Parse the display syntax, e.g. `menu.items[2].label`
    pub fn parse(text: &str) -> Result<Self, TreeError> {
        let invalid = || TreeError::InvalidPath(text.to_string());
        if text.is_empty() {
            return Err(invalid());
        }

        let mut segments = Vec::new();
        for piece in text.split('.') {
            let caps = PATH_PIECE.captures(piece).ok_or_else(invalid)?;
            let name = &caps[1];
            let indices = &caps[2];
            if name.is_empty() && indices.is_empty() {
                return Err(invalid());
            }
            if !name.is_empty() {
                segments.push(name.to_string());
            }
            for index in INDEX_RUN.captures_iter(indices) {
                let position: usize = index[1].parse().map_err(|_| invalid())?;
                segments.push(Self::index_segment(position));
            }
        }
        Ok(KeyPath(segments))
    }

    /// Segment used for the `position`-th element of a JSON array
    pub fn index_segment(position: usize) -> String {
        format!("[{}]", position)
    }

    pub fn is_index_segment(segment: &str) -> bool {
        INDEX_SEGMENT.is_match(segment)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Last segment, or `""` for the empty path
    pub fn leaf(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or("")
    }

    pub fn child(&self, segment: impl Into<String>) -> KeyPath {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        KeyPath(segments)
    }

    /// True when `prefix` is this path or one of its ancestors
    pub fn starts_with(&self, prefix: &KeyPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Array position named by an index segment
    pub fn index_position(segment: &str) -> Option<usize> {
        if !Self::is_index_segment(segment) {
            return None;
        }
        segment[1..segment.len() - 1].parse().ok()
    }

    fn prefix(&self, len: usize) -> KeyPath {
        KeyPath(self.0[..len].to_vec())
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 && !Self::is_index_segment(segment) {
                f.write_str(".")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Leaf(String),
    Branch(Tree),
}

impl Node {
    pub fn as_leaf(&self) -> Option<&str> {
        match self {
            Node::Leaf(value) => Some(value),
            Node::Branch(_) => None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    fn from_json(value: &Value, path: &str) -> Option<Node> {
        match value {
            Value::String(text) => Some(Node::Leaf(text.clone())),
            Value::Object(map) => Some(Node::Branch(Tree::from_object(map, path))),
            Value::Array(items) => Some(Node::Branch(Tree::from_array(items, path))),
            other => {
                warn!(path, value = %other, "skipping non-string value");
                None
            }
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Node::Leaf(text) => Value::String(text.clone()),
            Node::Branch(tree) => match tree.array_to_json() {
                Some(items) => Value::Array(items),
                None => Value::Object(tree.object_to_json()),
            },
        }
    }
}

/// Ordered, nested mapping from key segment to [`Node`].
///
/// Equality ignores key order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tree {
    nodes: IndexMap<String, Node>,
    /// Read from a JSON array
    array: bool,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from `(path, value)` pairs, in order
    pub fn from_leaves<I, S>(leaves: I) -> Result<Self, TreeError>
    where
        I: IntoIterator<Item = (KeyPath, S)>,
        S: Into<String>,
    {
        let mut tree = Tree::new();
        for (path, value) in leaves {
            tree.insert_leaf(&path, value)?;
        }
        Ok(tree)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_array(&self) -> bool {
        self.array
    }

    /// Number of top-level keys
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .values()
            .map(|node| match node {
                Node::Leaf(_) => 1,
                Node::Branch(tree) => tree.leaf_count(),
            })
            .sum()
    }

    /// Top-level keys and nodes in document order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Node)> {
        self.nodes.iter()
    }

    pub fn get(&self, path: &KeyPath) -> Option<&Node> {
        let (first, rest) = path.segments().split_first()?;
        let mut node = self.nodes.get(first)?;
        for segment in rest {
            match node {
                Node::Branch(tree) => node = tree.nodes.get(segment)?,
                Node::Leaf(_) => return None,
            }
        }
        Some(node)
    }

    pub fn get_leaf(&self, path: &KeyPath) -> Option<&str> {
        self.get(path).and_then(Node::as_leaf)
    }

    pub fn contains_leaf(&self, path: &KeyPath) -> bool {
        self.get_leaf(path).is_some()
    }

    /// Set the leaf at `path`, creating intermediate branches as needed.
    ///
    /// Returns the previous value. Refuses to replace a subtree with a leaf or
    /// to descend through an existing leaf.
    pub fn insert_leaf(
        &mut self,
        path: &KeyPath,
        value: impl Into<String>,
    ) -> Result<Option<String>, TreeError> {
        let (leaf, current) = self.parent_mut(path)?;
        match current.nodes.get_mut(leaf) {
            Some(Node::Branch(_)) => Err(TreeError::BranchInTheWay(path.clone())),
            Some(Node::Leaf(existing)) => Ok(Some(std::mem::replace(existing, value.into()))),
            None => {
                current.nodes.insert(leaf.clone(), Node::Leaf(value.into()));
                Ok(None)
            }
        }
    }

    /// Make sure a branch exists at `path`, creating it empty with the given
    /// array-ness when absent. An existing branch is left as it is.
    pub fn insert_branch(&mut self, path: &KeyPath, array: bool) -> Result<(), TreeError> {
        let (last, current) = self.parent_mut(path)?;
        match current.nodes.get(last) {
            Some(Node::Branch(_)) => Ok(()),
            Some(Node::Leaf(_)) => Err(TreeError::LeafInTheWay {
                key_path: path.clone(),
                blocked_at: path.clone(),
            }),
            None => {
                let branch = Tree {
                    nodes: IndexMap::new(),
                    array,
                };
                current.nodes.insert(last.clone(), Node::Branch(branch));
                Ok(())
            }
        }
    }

    /// Walk to the tree holding the last segment of `path`, creating
    /// intermediate branches as needed
    fn parent_mut<'a, 'p>(
        &'a mut self,
        path: &'p KeyPath,
    ) -> Result<(&'p String, &'a mut Tree), TreeError> {
        let (last, parents) = path
            .segments()
            .split_last()
            .ok_or_else(|| TreeError::InvalidPath(String::new()))?;

        let mut current = self;
        for (depth, segment) in parents.iter().enumerate() {
            let node = current
                .nodes
                .entry(segment.clone())
                .or_insert_with(|| Node::Branch(Tree::new()));
            current = match node {
                Node::Branch(tree) => tree,
                Node::Leaf(_) => {
                    return Err(TreeError::LeafInTheWay {
                        key_path: path.clone(),
                        blocked_at: path.prefix(depth + 1),
                    });
                }
            };
        }
        Ok((last, current))
    }

    /// Copy array-ness from the branches of `shape` found at the same paths
    pub fn adopt_shape(&mut self, shape: &Tree) {
        for (key, node) in self.nodes.iter_mut() {
            if let (Node::Branch(mine), Some(Node::Branch(theirs))) = (node, shape.nodes.get(key))
            {
                mine.array = theirs.array;
                mine.adopt_shape(theirs);
            }
        }
    }

    /// Set the leaf at `path` unconditionally, replacing whatever is in the way
    pub fn overwrite_leaf(&mut self, path: &KeyPath, value: impl Into<String>) -> Result<(), TreeError> {
        if path.is_empty() {
            return Err(TreeError::InvalidPath(String::new()));
        }
        overwrite_in(self, path.segments(), value.into());
        Ok(())
    }

    /// Remove the node at `path`, pruning branches left empty by the removal
    pub fn remove(&mut self, path: &KeyPath) -> Option<Node> {
        remove_in(self, path.segments())
    }

    /// Remove the leaf at `path`, leaving its enclosing branches in place
    pub fn take_leaf(&mut self, path: &KeyPath) -> Option<String> {
        let (last, parents) = path.segments().split_last()?;
        let mut current = self;
        for segment in parents {
            current = match current.nodes.get_mut(segment)? {
                Node::Branch(tree) => tree,
                Node::Leaf(_) => return None,
            };
        }
        if !current.nodes.get(last)?.is_leaf() {
            return None;
        }
        match current.nodes.shift_remove(last) {
            Some(Node::Leaf(value)) => Some(value),
            _ => None,
        }
    }

    /// Every leaf with its full path, depth first in document order
    pub fn leaves(&self) -> Vec<(KeyPath, &str)> {
        let mut out = Vec::new();
        self.collect_leaves(&mut Vec::new(), &mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, prefix: &mut Vec<String>, out: &mut Vec<(KeyPath, &'a str)>) {
        for (key, node) in &self.nodes {
            prefix.push(key.clone());
            match node {
                Node::Leaf(value) => out.push((KeyPath(prefix.clone()), value.as_str())),
                Node::Branch(tree) => tree.collect_leaves(prefix, out),
            }
            prefix.pop();
        }
    }

    /// Flatten into translation entries, in document order
    pub fn entries(&self, source_kind: SourceKind) -> Vec<TranslationEntry> {
        self.leaves()
            .into_iter()
            .map(|(path, value)| TranslationEntry::new(path, value, source_kind))
            .collect()
    }

    /// Wrap this tree under a single top-level key
    pub fn nest(self, segment: impl Into<String>) -> Tree {
        let mut outer = Tree::new();
        outer.nodes.insert(segment.into(), Node::Branch(self));
        outer
    }

    /// Build a tree from a parsed JSON document. The root must be an object.
    pub fn from_json(value: &Value) -> Result<Self, TreeError> {
        match value {
            Value::Object(map) => Ok(Self::from_object(map, "")),
            _ => Err(TreeError::UnsupportedJson {
                path: "$".to_string(),
                reason: "root must be an object".to_string(),
            }),
        }
    }

    /// Serialize back to JSON; the root is always an object
    pub fn to_json(&self) -> Value {
        Value::Object(self.object_to_json())
    }

    fn object_to_json(&self) -> Map<String, Value> {
        self.nodes
            .iter()
            .map(|(key, node)| (key.clone(), node.to_json()))
            .collect()
    }

    fn from_object(map: &Map<String, Value>, path: &str) -> Tree {
        let mut tree = Tree::new();
        for (key, value) in map {
            let child_path = if path.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", path, key)
            };
            if let Some(node) = Node::from_json(value, &child_path) {
                tree.nodes.insert(key.clone(), node);
            }
        }
        tree
    }

    fn from_array(items: &[Value], path: &str) -> Tree {
        let mut tree = Tree {
            nodes: IndexMap::new(),
            array: true,
        };
        for (position, value) in items.iter().enumerate() {
            let child_path = format!("{}[{}]", path, position);
            if let Some(node) = Node::from_json(value, &child_path) {
                tree.nodes.insert(KeyPath::index_segment(position), node);
            }
        }
        tree
    }

    /// Elements of an array branch, `null` where a position has no node.
    /// `None` for object branches and for arrays that gained a non-index key.
    fn array_to_json(&self) -> Option<Vec<Value>> {
        if !self.array {
            return None;
        }
        let mut items = Vec::with_capacity(self.nodes.len());
        for (key, node) in &self.nodes {
            let position = KeyPath::index_position(key)?;
            if items.len() <= position {
                items.resize(position + 1, Value::Null);
            }
            items[position] = node.to_json();
        }
        Some(items)
    }
}

fn overwrite_in(tree: &mut Tree, segments: &[String], value: String) {
    match segments {
        [] => {}
        [leaf] => {
            tree.nodes.insert(leaf.clone(), Node::Leaf(value));
        }
        [head, rest @ ..] => {
            let node = tree
                .nodes
                .entry(head.clone())
                .or_insert_with(|| Node::Branch(Tree::new()));
            match node {
                Node::Branch(child) => overwrite_in(child, rest, value),
                Node::Leaf(_) => {
                    let mut child = Tree::new();
                    overwrite_in(&mut child, rest, value);
                    *node = Node::Branch(child);
                }
            }
        }
    }
}

fn remove_in(tree: &mut Tree, segments: &[String]) -> Option<Node> {
    match segments {
        [] => None,
        [leaf] => tree.nodes.shift_remove(leaf),
        [head, rest @ ..] => {
            let Some(Node::Branch(child)) = tree.nodes.get_mut(head) else {
                return None;
            };
            let removed = remove_in(child, rest);
            if removed.is_some() && child.is_empty() {
                tree.nodes.shift_remove(head);
            }
            removed
        }
    }
}
