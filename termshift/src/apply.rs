//! Applying a reviewed change set to a resource tree
//!
//! Only records whose status is `approved` or `user_override` change
//! anything. Each business type is applied independently: a stale record
//! fails that business type's output and leaves the others alone.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::changeset::ChangeSet;
use crate::error::ApplyError;
use crate::tree::Tree;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyMode {
    /// The whole original tree with approved values written in
    Full,
    /// Only the leaves whose value actually changes, with their nesting
    Partial,
}

#[derive(Debug, Clone, Copy)]
pub struct Applier<'a> {
    original: &'a Tree,
}

impl<'a> Applier<'a> {
    pub fn new(original: &'a Tree) -> Self {
        Self { original }
    }

    /// Apply `changes` for each business type; one result per business type
    pub fn apply<S: AsRef<str>>(
        &self,
        changes: &ChangeSet,
        business_types: &[S],
        mode: ApplyMode,
    ) -> BTreeMap<String, Result<Tree, ApplyError>> {
        business_types
            .iter()
            .map(|bt| {
                let bt = bt.as_ref();
                let result = self.apply_one(changes, bt, mode);
                if let Err(err) = &result {
                    warn!(business_type = bt, error = %err, "skipping output");
                }
                (bt.to_string(), result)
            })
            .collect()
    }

    pub fn apply_one(
        &self,
        changes: &ChangeSet,
        business_type: &str,
        mode: ApplyMode,
    ) -> Result<Tree, ApplyError> {
        let mut output = match mode {
            ApplyMode::Full => self.original.clone(),
            ApplyMode::Partial => Tree::new(),
        };
        let mut written = 0;

        for record in changes.for_business_type(business_type) {
            let Some(current) = self.original.get_leaf(&record.key_path) else {
                return Err(ApplyError::StalePath {
                    key_path: record.key_path.clone(),
                    business_type: business_type.to_string(),
                });
            };
            let Some(value) = record.effective_value() else {
                continue;
            };
            if current != record.original_value {
                return Err(ApplyError::StaleValue {
                    key_path: record.key_path.clone(),
                    business_type: business_type.to_string(),
                    planned: record.original_value.clone(),
                    current: current.to_string(),
                });
            }
            if value == current {
                continue;
            }
            output.insert_leaf(&record.key_path, value)?;
            written += 1;
        }
        if mode == ApplyMode::Partial {
            output.adopt_shape(self.original);
        }

        info!(business_type, ?mode, written, "applied change set");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BusinessVariant, Term, TermCatalog};
    use crate::entry::SourceKind;
    use crate::planner::SubstitutionPlanner;
    use crate::tree::KeyPath;
    use serde_json::json;

    fn original() -> Tree {
        Tree::from_json(&json!({
            "home": {
                "title": "大學生活動",
                "intro": "歡迎光臨"
            },
            "menu": ["學生專區", "老師專區"],
            "title": "學生"
        }))
        .unwrap()
    }

    fn catalog() -> TermCatalog {
        TermCatalog::new(
            ["enterprise", "public"],
            [
                Term::new("學生", "身份"),
                Term::new("大學生", "身份"),
                Term::new("老師", "職稱"),
            ],
            [
                BusinessVariant::new("學生", "enterprise", "人員"),
                BusinessVariant::new("大學生", "enterprise", "資深員工"),
                BusinessVariant::new("老師", "enterprise", "講師"),
                BusinessVariant::new("學生", "public", "民眾"),
            ],
        )
        .unwrap()
    }

    fn approved_changes(tree: &Tree, catalog: &TermCatalog) -> ChangeSet {
        let mut changes = SubstitutionPlanner::new(catalog)
            .plan(&tree.entries(SourceKind::Json), catalog.business_types());
        changes.approve_all_proposed();
        changes
    }

    fn path(text: &str) -> KeyPath {
        KeyPath::parse(text).unwrap()
    }

    #[test]
    fn test_full_with_empty_change_set_is_identity() {
        let tree = original();
        let outputs = Applier::new(&tree).apply(&ChangeSet::new(), &["enterprise"], ApplyMode::Full);
        assert_eq!(outputs["enterprise"].as_ref().unwrap(), &tree);
    }

    #[test]
    fn test_full_writes_approved_values() {
        let tree = original();
        let catalog = catalog();
        let mut changes = approved_changes(&tree, &catalog);
        changes.reject(&path("title"), "enterprise").unwrap();
        changes
            .override_value(&path("menu[1]"), "enterprise", "教師專區")
            .unwrap();

        let out = Applier::new(&tree)
            .apply_one(&changes, "enterprise", ApplyMode::Full)
            .unwrap();

        assert_eq!(out.get_leaf(&path("home.title")), Some("資深員工活動"));
        assert_eq!(out.get_leaf(&path("home.intro")), Some("歡迎光臨"));
        assert_eq!(out.get_leaf(&path("menu[0]")), Some("人員專區"));
        assert_eq!(out.get_leaf(&path("menu[1]")), Some("教師專區"));
        // Rejected keeps the original
        assert_eq!(out.get_leaf(&path("title")), Some("學生"));
        assert_eq!(out.leaf_count(), tree.leaf_count());
    }

    #[test]
    fn test_full_is_idempotent() {
        let tree = original();
        let catalog = catalog();
        let changes = approved_changes(&tree, &catalog);
        let applier = Applier::new(&tree);

        let first = applier.apply(&changes, catalog.business_types(), ApplyMode::Full);
        let second = applier.apply(&changes, catalog.business_types(), ApplyMode::Full);
        assert_eq!(first, second);
    }

    #[test]
    fn test_partial_is_subset_of_full() {
        let tree = original();
        let catalog = catalog();
        let changes = approved_changes(&tree, &catalog);
        let applier = Applier::new(&tree);

        for bt in catalog.business_types() {
            let full = applier.apply_one(&changes, bt, ApplyMode::Full).unwrap();
            let partial = applier.apply_one(&changes, bt, ApplyMode::Partial).unwrap();

            assert!(partial.leaf_count() < full.leaf_count());
            for (key, value) in partial.leaves() {
                assert_eq!(full.get_leaf(&key), Some(value));
                assert_ne!(tree.get_leaf(&key), Some(value));
            }
        }
    }

    #[test]
    fn test_partial_contains_only_changed_leaves() {
        let tree = original();
        let catalog = catalog();
        let changes = approved_changes(&tree, &catalog);

        let partial = Applier::new(&tree)
            .apply_one(&changes, "public", ApplyMode::Partial)
            .unwrap();

        // 大學生 has no public plan, so home.title is detection-only and absent
        assert_eq!(
            partial.to_json(),
            json!({
                "menu": ["民眾專區"],
                "title": "民眾"
            })
        );
    }

    #[test]
    fn test_partial_keeps_array_positions() {
        let tree = Tree::from_json(&json!({"menu": ["歡迎", "學生專區"]})).unwrap();
        let catalog = catalog();
        let changes = approved_changes(&tree, &catalog);

        let partial = Applier::new(&tree)
            .apply_one(&changes, "enterprise", ApplyMode::Partial)
            .unwrap();
        assert_eq!(partial.to_json(), json!({"menu": [null, "人員專區"]}));
    }

    #[test]
    fn test_partial_skips_overrides_equal_to_original() {
        let tree = original();
        let catalog = catalog();
        let mut changes = approved_changes(&tree, &catalog);
        changes
            .override_value(&path("title"), "enterprise", "學生")
            .unwrap();

        let partial = Applier::new(&tree)
            .apply_one(&changes, "enterprise", ApplyMode::Partial)
            .unwrap();
        assert!(partial.get_leaf(&path("title")).is_none());
    }

    #[test]
    fn test_stale_path_fails_only_that_business_type() {
        let tree = original();
        let catalog = catalog();
        let changes = approved_changes(&tree, &catalog);

        let mut shrunk = tree.clone();
        shrunk.remove(&path("home.title"));

        let outputs = Applier::new(&shrunk).apply(&changes, catalog.business_types(), ApplyMode::Full);
        assert!(matches!(
            outputs["enterprise"],
            Err(ApplyError::StalePath { .. })
        ));
        // The detection-only public record at home.title is stale as well
        assert!(outputs["public"].is_err());

        let trimmed: ChangeSet = changes
            .iter()
            .filter(|r| !(r.business_type == "public" && r.key_path == path("home.title")))
            .cloned()
            .collect();
        let outputs = Applier::new(&shrunk).apply(&trimmed, catalog.business_types(), ApplyMode::Full);
        assert!(outputs["enterprise"].is_err());
        assert!(outputs["public"].is_ok());
    }

    #[test]
    fn test_stale_value_is_reported() {
        let tree = original();
        let catalog = catalog();
        let changes = approved_changes(&tree, &catalog);

        let mut edited = tree.clone();
        edited.insert_leaf(&path("title"), "學生們").unwrap();

        let err = Applier::new(&edited)
            .apply_one(&changes, "enterprise", ApplyMode::Full)
            .unwrap_err();
        assert_eq!(
            err,
            ApplyError::StaleValue {
                key_path: path("title"),
                business_type: "enterprise".to_string(),
                planned: "學生".to_string(),
                current: "學生們".to_string(),
            }
        );
    }
}
