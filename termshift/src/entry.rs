use serde::{Deserialize, Serialize};

use crate::tree::KeyPath;

/// Which kind of resource file an entry was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Po,
    Json,
}

/// A single translated string, addressed by its full key path.
///
/// Two entries are the same entry only if their full paths are equal; a shared
/// leaf name at different depths does not make them equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationEntry {
    pub key_path: KeyPath,
    pub value: String,
    pub source_kind: SourceKind,
}

impl TranslationEntry {
    pub fn new(key_path: KeyPath, value: impl Into<String>, source_kind: SourceKind) -> Self {
        Self {
            key_path,
            value: value.into(),
            source_kind,
        }
    }

    /// Convenience constructor for JSON-origin entries
    pub fn json(key_path: KeyPath, value: impl Into<String>) -> Self {
        Self::new(key_path, value, SourceKind::Json)
    }
}
