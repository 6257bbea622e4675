//! Error types for catalog construction, plan application, merging and loading
//!
//! Matching and planning have no error path: "no match" is a normal outcome.
//! Merge conflicts are values (see [`crate::merge::Conflict`]), not errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::tree::KeyPath;

/// Malformed or ambiguous term configuration. Fatal: raised before any matching.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// A term was declared with an empty phrase
    #[error("empty phrase in category '{category}'")]
    EmptyPhrase { category: String },

    /// The same phrase was declared under two categories
    #[error("phrase '{phrase}' declared in both '{first}' and '{second}'")]
    ConflictingCategory {
        phrase: String,
        first: String,
        second: String,
    },

    /// A replacement names a business type the catalog does not declare
    #[error("phrase '{phrase}' has a replacement for unknown business type '{business_type}'")]
    UnknownBusinessType {
        phrase: String,
        business_type: String,
    },

    /// A replacement was given for a phrase that is not a term
    #[error("replacement for '{phrase}' ({business_type}) does not refer to a declared term")]
    UnknownTerm {
        phrase: String,
        business_type: String,
    },

    /// Two different replacements for the same phrase and business type
    #[error(
        "phrase '{phrase}' has conflicting replacements for '{business_type}': '{first}' vs '{second}'"
    )]
    ConflictingReplacement {
        phrase: String,
        business_type: String,
        first: String,
        second: String,
    },

    #[error("business type '{0}' declared more than once")]
    DuplicateBusinessType(String),
}

/// A change set that no longer matches the tree it is applied to.
///
/// Fatal for the affected business type only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// The record's key path is not a leaf of the original tree
    #[error("stale plan for '{business_type}': no leaf at '{key_path}'")]
    StalePath {
        key_path: KeyPath,
        business_type: String,
    },

    /// The record was planned against a different value than the tree now holds
    #[error(
        "stale plan for '{business_type}' at '{key_path}': planned against '{planned}', tree has '{current}'"
    )]
    StaleValue {
        key_path: KeyPath,
        business_type: String,
        planned: String,
        current: String,
    },

    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Errors raised while finishing a merge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("{} conflicting path(s) have no resolution: {}", .0.len(), join_paths(.0))]
    Unresolved(Vec<KeyPath>),

    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// A review edit or reviewed plan that does not fit the change set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReviewError {
    #[error("no change record for '{key_path}' ({business_type})")]
    UnknownRecord {
        key_path: KeyPath,
        business_type: String,
    },

    #[error("more than one change record for '{key_path}' ({business_type})")]
    DuplicateRecord {
        key_path: KeyPath,
        business_type: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("invalid key path '{0}'")]
    InvalidPath(String),

    /// A leaf sits where the path needs to descend further
    #[error("cannot descend into leaf at '{blocked_at}' while writing '{key_path}'")]
    LeafInTheWay {
        key_path: KeyPath,
        blocked_at: KeyPath,
    },

    /// A subtree sits where a leaf should be written
    #[error("'{0}' holds a subtree, not a value")]
    BranchInTheWay(KeyPath),

    #[error("unsupported JSON at '{path}': {reason}")]
    UnsupportedJson { path: String, reason: String },
}

/// Failures while reading or writing resource, dictionary or plan files.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse JSON from '{}': {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid dictionary: {0}")]
    Dictionary(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Tree(#[from] TreeError),
}

fn join_paths(paths: &[KeyPath]) -> String {
    paths
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for loader operations
pub type LoadResult<T> = Result<T, LoadError>;
