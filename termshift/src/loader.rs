use std::fs;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::catalog::{BusinessVariant, Term, TermCatalog};
use crate::changeset::ChangeSet;
use crate::error::{LoadError, LoadResult};
use crate::tree::Tree;

/// Load a term dictionary from a JSON file
///
/// The JSON file should have the following structure:
/// ```json
/// {
///     "@metadata": { ... },  // Ignored
///     "身份": {
///         "學生": { "enterprise": "人員", "public": "民眾" },
///         "大學生": { "enterprise": "資深員工" }
///     }
/// }
/// ```
///
/// Top-level keys are categories; each maps phrases to their replacement per
/// business type. A phrase with `null` or `{}` is detected but never replaced.
///
/// # Errors
/// - File read errors
/// - Invalid JSON or dictionary shape
/// - Catalog validation errors (see [`crate::error::CatalogError`])
pub fn load_catalog_from_file<B, S>(path: &Path, business_types: B) -> LoadResult<TermCatalog>
where
    B: IntoIterator<Item = S>,
    S: Into<String>,
{
    let json: Value = read_json(path)?;
    catalog_from_value(&json, business_types)
}

/// Build a catalog from an already parsed dictionary document
pub fn catalog_from_value<B, S>(json: &Value, business_types: B) -> LoadResult<TermCatalog>
where
    B: IntoIterator<Item = S>,
    S: Into<String>,
{
    let categories = json
        .as_object()
        .ok_or_else(|| LoadError::Dictionary("root must be an object".to_string()))?;

    let mut terms = Vec::new();
    let mut variants = Vec::new();
    for (category, phrases) in categories {
        if category.starts_with('@') {
            continue;
        }
        let phrases = phrases.as_object().ok_or_else(|| {
            LoadError::Dictionary(format!("category '{}' must map phrases to replacements", category))
        })?;

        for (phrase, replacements) in phrases {
            terms.push(Term::new(phrase.as_str(), category.as_str()));
            match replacements {
                Value::Null => {}
                Value::Object(map) => {
                    for (business_type, replacement) in map {
                        match replacement.as_str() {
                            Some(text) => variants.push(BusinessVariant::new(
                                phrase.as_str(),
                                business_type.as_str(),
                                text,
                            )),
                            None => warn!(
                                phrase,
                                business_type, "replacement is not a string, skipping"
                            ),
                        }
                    }
                }
                _ => {
                    return Err(LoadError::Dictionary(format!(
                        "phrase '{}' in '{}' must map business types to replacements",
                        phrase, category
                    )));
                }
            }
        }
    }

    debug!(terms = terms.len(), variants = variants.len(), "parsed dictionary");
    Ok(TermCatalog::new(business_types, terms, variants)?)
}

/// Load a JSON resource file as a [`Tree`]; the root must be an object
pub fn load_tree_from_file(path: &Path) -> LoadResult<Tree> {
    let json: Value = read_json(path)?;
    Ok(Tree::from_json(&json)?)
}

/// Write a tree as pretty-printed JSON, keeping key order
pub fn write_tree_to_file(path: &Path, tree: &Tree) -> LoadResult<()> {
    write_json(path, &tree.to_json())
}

pub fn load_changes_from_file(path: &Path) -> LoadResult<ChangeSet> {
    read_json(path)
}

pub fn write_changes_to_file(path: &Path, changes: &ChangeSet) -> LoadResult<()> {
    write_json(path, changes)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> LoadResult<T> {
    let content = fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> LoadResult<()> {
    let mut content = serde_json::to_string_pretty(value).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    content.push('\n');
    fs::write(path, content).map_err(|source| LoadError::Write {
        path: path.to_path_buf(),
        source,
    })
}
