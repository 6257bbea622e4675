//! Substitution planning
//!
//! Turns translation entries into proposed change records, one per
//! `(entry, business_type)` pair that contains at least one catalog phrase.
//! Entries are only read. Planning is independent per pair, so
//! [`SubstitutionPlanner::plan_parallel`] fans the work out with rayon; both
//! entry points return identical change sets because [`ChangeSet`] orders
//! records by key rather than by arrival.

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::catalog::TermCatalog;
use crate::changeset::{ChangeRecord, ChangeSet};
use crate::entry::TranslationEntry;
use crate::matcher::Matcher;

#[derive(Debug, Clone, Copy)]
pub struct SubstitutionPlanner<'a> {
    catalog: &'a TermCatalog,
    matcher: Matcher<'a>,
}

impl<'a> SubstitutionPlanner<'a> {
    pub fn new(catalog: &'a TermCatalog) -> Self {
        Self {
            catalog,
            matcher: Matcher::new(catalog),
        }
    }

    /// Plan one entry for one business type.
    ///
    /// `None` when nothing matched (or the business type is not in the
    /// catalog). A match without any replacement still yields a record whose
    /// proposed value equals the original and whose `unresolved_terms` say why.
    pub fn plan_entry(&self, entry: &TranslationEntry, business_type: &str) -> Option<ChangeRecord> {
        let replacements = self.catalog.lookup(business_type)?;
        let result = self
            .matcher
            .substitute(&entry.value, replacements)
            .into_result()?;

        if result.is_detection_only() {
            debug!(
                key = %entry.key_path,
                business_type,
                terms = ?result.unresolved.iter().map(|o| o.phrase.as_str()).collect::<Vec<_>>(),
                "detected without replacement"
            );
        } else {
            debug!(
                key = %entry.key_path,
                business_type,
                terms = ?result.triggering_terms(),
                "proposed substitution"
            );
        }

        Some(ChangeRecord::proposed(entry, business_type, result))
    }

    /// Plan every entry for every business type, sequentially
    pub fn plan<S: AsRef<str>>(&self, entries: &[TranslationEntry], business_types: &[S]) -> ChangeSet {
        let business_types = self.known_business_types(business_types);
        let changes: ChangeSet = entries
            .iter()
            .flat_map(|entry| {
                business_types
                    .iter()
                    .filter_map(move |bt| self.plan_entry(entry, bt))
            })
            .collect();
        info!(
            entries = entries.len(),
            records = changes.len(),
            "planned substitutions"
        );
        changes
    }

    /// Same result as [`plan`](Self::plan), computed on the rayon pool
    pub fn plan_parallel<S: AsRef<str>>(
        &self,
        entries: &[TranslationEntry],
        business_types: &[S],
    ) -> ChangeSet {
        let business_types = self.known_business_types(business_types);
        let records: Vec<ChangeRecord> = entries
            .par_iter()
            .flat_map_iter(|entry| {
                business_types
                    .iter()
                    .filter_map(move |bt| self.plan_entry(entry, bt))
            })
            .collect();
        let changes: ChangeSet = records.into_iter().collect();
        info!(
            entries = entries.len(),
            records = changes.len(),
            "planned substitutions (parallel)"
        );
        changes
    }

    fn known_business_types<'b, S: AsRef<str>>(&self, business_types: &'b [S]) -> Vec<&'b str> {
        business_types
            .iter()
            .map(AsRef::as_ref)
            .filter(|bt| {
                let known = self.catalog.lookup(bt).is_some();
                if !known {
                    warn!(business_type = %bt, "business type not in catalog, skipping");
                }
                known
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BusinessVariant, Term};
    use crate::changeset::ChangeStatus;
    use crate::tree::KeyPath;

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
                BusinessVariant::new("學生", "public", "民眾"),
                BusinessVariant::new("老師", "enterprise", "講師"),
            ],
        )
        .unwrap()
    }

    fn entries() -> Vec<TranslationEntry> {
        vec![
            TranslationEntry::json(KeyPath::parse("home.title").unwrap(), "大學生活動"),
            TranslationEntry::json(KeyPath::parse("home.teacher").unwrap(), "老師專區"),
            TranslationEntry::json(KeyPath::parse("footer").unwrap(), "聯絡我們"),
            TranslationEntry::json(KeyPath::parse("title").unwrap(), "學生與老師"),
        ]
    }

    #[test]
    fn test_plan_entry_proposes_substitution() {
        let catalog = catalog();
        let planner = SubstitutionPlanner::new(&catalog);
        let entry = &entries()[0];

        let record = planner.plan_entry(entry, "enterprise").unwrap();
        assert_eq!(record.original_value, "大學生活動");
        assert_eq!(record.proposed_value, "資深員工活動");
        assert_eq!(record.triggering_terms, vec!["大學生"]);
        assert_eq!(record.status, ChangeStatus::Proposed);
        assert!(record.unresolved_terms.is_empty());
    }

    #[test]
    fn test_plan_entry_surfaces_detection_without_replacement() {
        let catalog = catalog();
        let planner = SubstitutionPlanner::new(&catalog);
        let entry = &entries()[0];

        // "public" has no plan for 大學生; 學生 inside it must not be used instead
        let record = planner.plan_entry(entry, "public").unwrap();
        assert_eq!(record.proposed_value, record.original_value);
        assert!(record.is_detection_only());
        assert_eq!(record.unresolved_terms, vec!["大學生"]);
    }

    #[test]
    fn test_plan_entry_without_match_is_none() {
        let catalog = catalog();
        let planner = SubstitutionPlanner::new(&catalog);
        assert!(planner.plan_entry(&entries()[2], "enterprise").is_none());
        assert!(planner.plan_entry(&entries()[0], "education").is_none());
    }

    #[test]
    fn test_plan_covers_all_pairs() {
        let catalog = catalog();
        let planner = SubstitutionPlanner::new(&catalog);
        let changes = planner.plan(&entries(), catalog.business_types());

        // footer never matches; every other entry matches for both types
        assert_eq!(changes.len(), 6);
        let title = changes
            .get(&KeyPath::parse("title").unwrap(), "public")
            .unwrap();
        assert_eq!(title.proposed_value, "民眾與老師");
        assert_eq!(title.unresolved_terms, vec!["老師"]);
    }

    #[test]
    fn test_plan_skips_unknown_business_types() {
        let catalog = catalog();
        let planner = SubstitutionPlanner::new(&catalog);
        let changes = planner.plan(&entries(), &["enterprise", "education"]);
        assert_eq!(changes.business_types(), vec!["enterprise"]);
    }

    #[test]
    fn test_planning_is_deterministic() {
        let catalog = catalog();
        let planner = SubstitutionPlanner::new(&catalog);
        let mut entries = entries();

        let sequential = planner.plan(&entries, catalog.business_types());
        let parallel = planner.plan_parallel(&entries, catalog.business_types());
        assert_eq!(sequential, parallel);

        // Input order does not leak into output order
        entries.reverse();
        let reversed = planner.plan_parallel(&entries, catalog.business_types());
        assert_eq!(
            serde_json::to_string(&sequential).unwrap(),
            serde_json::to_string(&reversed).unwrap()
        );
    }

    #[test]
    fn test_planning_leaves_entries_untouched() {
        let catalog = catalog();
        let planner = SubstitutionPlanner::new(&catalog);
        let entries = entries();
        let before = entries.clone();
        planner.plan(&entries, catalog.business_types());
        assert_eq!(entries, before);
    }
}
