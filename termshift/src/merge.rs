//! Merging several resource trees into one
//!
//! Trees are folded in the order given. Two trees agree at a path when they
//! hold the same leaf value there; anything else at the same full path is a
//! [`Conflict`]. A conflicting value is withheld from the merged tree until a
//! resolution is supplied, so a merge never silently picks a winner.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use termshift::merge::MergeEngine;
//! use termshift::tree::{KeyPath, Tree};
//!
//! let zh = Tree::from_json(&json!({"a": {"b": "x"}})).unwrap();
//! let en = Tree::from_json(&json!({"a": {"b": "y"}, "c": "z"})).unwrap();
//!
//! let outcome = MergeEngine::merge(&[zh, en]);
//! assert!(outcome.has_conflicts());
//!
//! let path = KeyPath::parse("a.b").unwrap();
//! assert!(outcome.tree.get_leaf(&path).is_none());
//!
//! let merged = outcome.resolve([(path.clone(), "x".to_string())]).unwrap();
//! assert_eq!(merged.get_leaf(&path), Some("x"));
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::MergeError;
use crate::tree::{KeyPath, Node, Tree};

/// What one side of a conflict holds at the conflicting path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Leaf(String),
    Branch,
}

impl Slot {
    fn of(node: &Node) -> Self {
        match node {
            Node::Leaf(value) => Slot::Leaf(value.clone()),
            Node::Branch(_) => Slot::Branch,
        }
    }

    pub fn as_leaf(&self) -> Option<&str> {
        match self {
            Slot::Leaf(value) => Some(value),
            Slot::Branch => None,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Leaf(value) => write!(f, "{:?}", value),
            Slot::Branch => f.write_str("<subtree>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub key_path: KeyPath,
    /// What the merged tree held when the conflict was found
    pub existing: Slot,
    pub incoming: Slot,
    /// Position of the incoming tree in the merge input
    pub incoming_source_index: usize,
}

impl Conflict {
    /// Both sides are values, so a resolution is required
    pub fn is_value_conflict(&self) -> bool {
        self.existing.as_leaf().is_some() && self.incoming.as_leaf().is_some()
    }

    pub fn existing_value(&self) -> Option<&str> {
        self.existing.as_leaf()
    }

    pub fn incoming_value(&self) -> Option<&str> {
        self.incoming.as_leaf()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Everything that merged cleanly. Withheld values are absent but their
    /// enclosing branches stay, keeping their array or object shape.
    pub tree: Tree,
    /// In discovery order
    pub conflicts: Vec<Conflict>,
}

impl MergeOutcome {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// Distinct conflicting paths, in discovery order
    pub fn conflict_paths(&self) -> Vec<&KeyPath> {
        let mut seen = BTreeSet::new();
        self.conflicts
            .iter()
            .map(|c| &c.key_path)
            .filter(|path| seen.insert(*path))
            .collect()
    }

    /// Write the chosen value for each conflicting path and return the final tree.
    ///
    /// Resolutions overwrite whatever the merged tree holds at their path.
    /// Fails if any value conflict is left without a resolution.
    pub fn resolve<I>(self, resolutions: I) -> Result<Tree, MergeError>
    where
        I: IntoIterator<Item = (KeyPath, String)>,
    {
        let resolutions: BTreeMap<KeyPath, String> = resolutions.into_iter().collect();

        let missing: BTreeSet<KeyPath> = self
            .conflicts
            .iter()
            .filter(|c| c.is_value_conflict() && !resolutions.contains_key(&c.key_path))
            .map(|c| c.key_path.clone())
            .collect();
        if !missing.is_empty() {
            return Err(MergeError::Unresolved(missing.into_iter().collect()));
        }

        let mut tree = self.tree;
        for (path, value) in resolutions {
            tree.overwrite_leaf(&path, value)?;
        }
        Ok(tree)
    }
}

/// Incremental merge: feed trees with [`add`](Self::add), then [`finish`](Self::finish)
#[derive(Debug, Default)]
pub struct MergeEngine {
    tree: Tree,
    /// Paths withheld after a value conflict, with the first value seen there
    blocked: BTreeMap<KeyPath, String>,
    conflicts: Vec<Conflict>,
    sources: usize,
}

impl MergeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `trees` in order
    pub fn merge(trees: &[Tree]) -> MergeOutcome {
        let mut engine = MergeEngine::new();
        for tree in trees {
            engine.add(tree);
        }
        engine.finish()
    }

    pub fn add(&mut self, incoming: &Tree) {
        let source = self.sources;
        self.sources += 1;
        self.merge_children(incoming, &KeyPath::default(), source);
    }

    pub fn finish(self) -> MergeOutcome {
        info!(
            trees = self.sources,
            leaves = self.tree.leaf_count(),
            conflicts = self.conflicts.len(),
            "merged trees"
        );
        MergeOutcome {
            tree: self.tree,
            conflicts: self.conflicts,
        }
    }

    fn merge_children(&mut self, incoming: &Tree, prefix: &KeyPath, source: usize) {
        for (segment, node) in incoming.iter() {
            self.merge_node(&prefix.child(segment.as_str()), node, source);
        }
    }

    fn merge_node(&mut self, path: &KeyPath, node: &Node, source: usize) {
        if let Some(first) = self.blocked.get(path) {
            let existing = Slot::Leaf(first.clone());
            let incoming = Slot::of(node);
            if existing != incoming {
                self.record(path, existing, incoming, source);
            }
            return;
        }

        match (self.tree.get(path).map(Slot::of), node) {
            (None, Node::Leaf(value)) => {
                if let Err(err) = self.tree.insert_leaf(path, value.as_str()) {
                    warn!(key = %path, error = %err, "could not merge leaf");
                }
            }
            (None, Node::Branch(child)) => {
                // The first tree to bring a branch decides whether it is an array
                match self.tree.insert_branch(path, child.is_array()) {
                    Ok(()) => self.merge_children(child, path, source),
                    Err(err) => warn!(key = %path, error = %err, "could not merge branch"),
                }
            }
            (Some(Slot::Branch), Node::Branch(child)) => {
                self.merge_children(child, path, source);
            }
            (Some(Slot::Leaf(existing)), Node::Leaf(value)) => {
                if existing == *value {
                    return;
                }
                self.record(
                    path,
                    Slot::Leaf(existing.clone()),
                    Slot::Leaf(value.clone()),
                    source,
                );
                self.tree.take_leaf(path);
                self.blocked.insert(path.clone(), existing);
            }
            (Some(existing), incoming) => {
                self.record(path, existing, Slot::of(incoming), source);
            }
        }
    }

    fn record(&mut self, path: &KeyPath, existing: Slot, incoming: Slot, source: usize) {
        debug!(key = %path, %existing, %incoming, source, "merge conflict");
        self.conflicts.push(Conflict {
            key_path: path.clone(),
            existing,
            incoming,
            incoming_source_index: source,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(value: serde_json::Value) -> Tree {
        Tree::from_json(&value).unwrap()
    }

    fn path(text: &str) -> KeyPath {
        KeyPath::parse(text).unwrap()
    }

    #[test]
    fn test_same_leaf_name_under_different_parents_is_not_a_conflict() {
        let outcome = MergeEngine::merge(&[
            tree(json!({"home": {"title": "首頁"}})),
            tree(json!({"about": {"title": "關於"}})),
        ]);
        assert!(!outcome.has_conflicts());
        assert_eq!(outcome.tree.get_leaf(&path("home.title")), Some("首頁"));
        assert_eq!(outcome.tree.get_leaf(&path("about.title")), Some("關於"));
    }

    #[test]
    fn test_same_leaf_name_at_different_depths_is_not_a_conflict() {
        let outcome = MergeEngine::merge(&[tree(json!({"a": {"b": "x"}})), tree(json!({"b": "y"}))]);
        assert!(!outcome.has_conflicts());
        assert_eq!(outcome.tree.to_json(), json!({"a": {"b": "x"}, "b": "y"}));
    }

    #[test]
    fn test_arrays_stay_arrays_through_merge_and_resolve() {
        let outcome = MergeEngine::merge(&[
            tree(json!({"menu": ["首頁", "關於"], "x": {"[0]": "a"}})),
            tree(json!({"menu": ["首頁", "簡介"], "x": {"[0]": "a"}})),
        ]);
        assert_eq!(outcome.conflict_paths(), vec![&path("menu[1]")]);
        assert_eq!(outcome.tree.to_json(), json!({"menu": ["首頁"], "x": {"[0]": "a"}}));

        let merged = outcome.resolve([(path("menu[1]"), "簡介".to_string())]).unwrap();
        assert_eq!(
            merged.to_json(),
            json!({"menu": ["首頁", "簡介"], "x": {"[0]": "a"}})
        );
    }

    #[test]
    fn test_different_values_conflict_and_neither_is_taken() {
        let outcome = MergeEngine::merge(&[tree(json!({"a": {"b": "x"}})), tree(json!({"a": {"b": "y"}}))]);

        assert_eq!(
            outcome.conflicts,
            vec![Conflict {
                key_path: path("a.b"),
                existing: Slot::Leaf("x".to_string()),
                incoming: Slot::Leaf("y".to_string()),
                incoming_source_index: 1,
            }]
        );
        assert!(outcome.tree.get(&path("a.b")).is_none());
    }

    #[test]
    fn test_equal_values_merge_cleanly() {
        let outcome = MergeEngine::merge(&[
            tree(json!({"a": "x", "b": "1"})),
            tree(json!({"a": "x", "c": "2"})),
        ]);
        assert!(!outcome.has_conflicts());
        assert_eq!(outcome.tree.leaf_count(), 3);
    }

    #[test]
    fn test_leaf_against_branch_keeps_existing_shape() {
        let outcome = MergeEngine::merge(&[tree(json!({"a": "x"})), tree(json!({"a": {"b": "y"}}))]);

        assert_eq!(outcome.conflicts.len(), 1);
        let conflict = &outcome.conflicts[0];
        assert_eq!(conflict.existing_value(), Some("x"));
        assert_eq!(conflict.incoming, Slot::Branch);
        assert!(!conflict.is_value_conflict());
        assert_eq!(outcome.tree.get_leaf(&path("a")), Some("x"));

        let reversed = MergeEngine::merge(&[tree(json!({"a": {"b": "y"}})), tree(json!({"a": "x"}))]);
        assert_eq!(reversed.conflicts[0].existing, Slot::Branch);
        assert_eq!(reversed.tree.get_leaf(&path("a.b")), Some("y"));
    }

    #[test]
    fn test_blocked_path_is_never_written_later() {
        let outcome = MergeEngine::merge(&[
            tree(json!({"a": "x"})),
            tree(json!({"a": "y"})),
            tree(json!({"a": "x"})),
            tree(json!({"a": "z"})),
        ]);

        // The third tree agrees with the first value; the fourth does not
        let sources: Vec<usize> = outcome
            .conflicts
            .iter()
            .map(|c| c.incoming_source_index)
            .collect();
        assert_eq!(sources, vec![1, 3]);
        assert_eq!(outcome.conflicts[1].existing_value(), Some("x"));
        assert_eq!(outcome.conflict_paths(), vec![&path("a")]);
        assert!(outcome.tree.get(&path("a")).is_none());
    }

    #[test]
    fn test_leaf_over_withheld_subtree_is_a_conflict() {
        let outcome = MergeEngine::merge(&[
            tree(json!({"a": {"b": "x"}})),
            tree(json!({"a": {"b": "y"}})),
            tree(json!({"a": "flat"})),
        ]);
        assert_eq!(outcome.conflicts.len(), 2);
        assert_eq!(outcome.conflicts[1].existing, Slot::Branch);
        assert!(outcome.tree.get_leaf(&path("a")).is_none());
        assert_eq!(outcome.tree.to_json(), json!({"a": {}}));
    }

    #[test]
    fn test_resolve_requires_every_value_conflict() {
        let outcome = MergeEngine::merge(&[
            tree(json!({"a": {"b": "x"}, "c": "1"})),
            tree(json!({"a": {"b": "y"}, "c": "2"})),
        ]);

        let err = outcome
            .clone()
            .resolve([(path("a.b"), "x".to_string())])
            .unwrap_err();
        assert_eq!(err, MergeError::Unresolved(vec![path("c")]));

        let merged = outcome
            .resolve([(path("a.b"), "y".to_string()), (path("c"), "3".to_string())])
            .unwrap();
        assert_eq!(merged.to_json(), json!({"a": {"b": "y"}, "c": "3"}));
    }

    #[test]
    fn test_resolve_without_conflicts_returns_tree() {
        let outcome = MergeEngine::merge(&[tree(json!({"a": "x"}))]);
        let merged = outcome.resolve(Vec::new()).unwrap();
        assert_eq!(merged, tree(json!({"a": "x"})));
    }

    #[test]
    fn test_nested_languages_merge_side_by_side() {
        let zh = tree(json!({"title": "學生"})).nest("zh_TW");
        let en = tree(json!({"title": "Student"})).nest("en");

        let outcome = MergeEngine::merge(&[zh, en]);
        assert!(!outcome.has_conflicts());
        assert_eq!(
            outcome.tree.to_json(),
            json!({"zh_TW": {"title": "學生"}, "en": {"title": "Student"}})
        );
    }

    #[test]
    fn test_incremental_add_matches_merge() {
        let a = tree(json!({"x": "1", "y": {"z": "2"}}));
        let b = tree(json!({"x": "3", "w": "4"}));

        let mut engine = MergeEngine::new();
        engine.add(&a);
        engine.add(&b);
        assert_eq!(engine.finish(), MergeEngine::merge(&[a, b]));
    }
}
