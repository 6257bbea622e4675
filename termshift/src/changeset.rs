//! Change records and the reviewable change set
//!
//! A [`ChangeSet`] holds at most one [`ChangeRecord`] per
//! `(key_path, business_type)` and always iterates in that key order, so the
//! same input produces the same sequence no matter how it was planned.
//! It serializes as a plain JSON array of records, which is what reviewers
//! edit between planning and applying.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entry::TranslationEntry;
use crate::error::ReviewError;
use crate::matcher::{MatchResult, Substitution};
use crate::tree::KeyPath;

/// Review state of a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    Proposed,
    Approved,
    Rejected,
    /// Approved, but with a value supplied by the reviewer
    UserOverride { value: String },
}

impl ChangeStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ChangeStatus::Proposed => "proposed",
            ChangeStatus::Approved => "approved",
            ChangeStatus::Rejected => "rejected",
            ChangeStatus::UserOverride { .. } => "user_override",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub key_path: KeyPath,
    pub business_type: String,
    pub original_value: String,
    pub proposed_value: String,
    /// Substituted phrases in application order
    pub triggering_terms: Vec<String>,
    /// Audit trail: what was replaced, with what, where
    #[serde(default)]
    pub substitutions: Vec<Substitution>,
    /// Phrases detected in the value that have no replacement for this business type
    #[serde(default)]
    pub unresolved_terms: Vec<String>,
    pub status: ChangeStatus,
}

impl ChangeRecord {
    /// New `proposed` record from a matcher result
    pub fn proposed(entry: &TranslationEntry, business_type: &str, result: MatchResult) -> Self {
        Self {
            key_path: entry.key_path.clone(),
            business_type: business_type.to_string(),
            original_value: entry.value.clone(),
            triggering_terms: result.triggering_terms(),
            proposed_value: result.new_text,
            substitutions: result.applied,
            unresolved_terms: result.unresolved.into_iter().map(|o| o.phrase).collect(),
            status: ChangeStatus::Proposed,
        }
    }

    pub fn key(&self) -> ChangeKey {
        ChangeKey::new(self.key_path.clone(), &self.business_type)
    }

    /// Matched, but nothing could be substituted yet
    pub fn is_detection_only(&self) -> bool {
        self.substitutions.is_empty()
    }

    /// Value to write when applying, if the record is approved in some form
    pub fn effective_value(&self) -> Option<&str> {
        match &self.status {
            ChangeStatus::Approved => Some(&self.proposed_value),
            ChangeStatus::UserOverride { value } => Some(value),
            ChangeStatus::Proposed | ChangeStatus::Rejected => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChangeKey {
    pub key_path: KeyPath,
    pub business_type: String,
}

impl ChangeKey {
    pub fn new(key_path: KeyPath, business_type: &str) -> Self {
        Self {
            key_path,
            business_type: business_type.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ChangeRecord>", into = "Vec<ChangeRecord>")]
pub struct ChangeSet {
    records: BTreeMap<ChangeKey, ChangeRecord>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing (and returning) any record with the same key
    pub fn insert(&mut self, record: ChangeRecord) -> Option<ChangeRecord> {
        self.records.insert(record.key(), record)
    }

    pub fn get(&self, key_path: &KeyPath, business_type: &str) -> Option<&ChangeRecord> {
        self.records
            .get(&ChangeKey::new(key_path.clone(), business_type))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records ordered by key path, then business type
    pub fn iter(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.records.values()
    }

    pub fn for_business_type<'a>(
        &'a self,
        business_type: &'a str,
    ) -> impl Iterator<Item = &'a ChangeRecord> + 'a {
        self.records
            .values()
            .filter(move |r| r.business_type == business_type)
    }

    /// Distinct business types present, sorted
    pub fn business_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.iter().map(|r| r.business_type.as_str()).collect();
        types.sort_unstable();
        types.dedup();
        types
    }

    pub fn set_status(
        &mut self,
        key_path: &KeyPath,
        business_type: &str,
        status: ChangeStatus,
    ) -> Result<(), ReviewError> {
        let record = self
            .records
            .get_mut(&ChangeKey::new(key_path.clone(), business_type))
            .ok_or_else(|| ReviewError::UnknownRecord {
                key_path: key_path.clone(),
                business_type: business_type.to_string(),
            })?;
        record.status = status;
        Ok(())
    }

    pub fn approve(&mut self, key_path: &KeyPath, business_type: &str) -> Result<(), ReviewError> {
        self.set_status(key_path, business_type, ChangeStatus::Approved)
    }

    pub fn reject(&mut self, key_path: &KeyPath, business_type: &str) -> Result<(), ReviewError> {
        self.set_status(key_path, business_type, ChangeStatus::Rejected)
    }

    pub fn override_value(
        &mut self,
        key_path: &KeyPath,
        business_type: &str,
        value: impl Into<String>,
    ) -> Result<(), ReviewError> {
        self.set_status(
            key_path,
            business_type,
            ChangeStatus::UserOverride {
                value: value.into(),
            },
        )
    }

    /// Approve every `proposed` record that carries at least one substitution.
    ///
    /// Detection-only records stay `proposed`. Returns how many were approved.
    pub fn approve_all_proposed(&mut self) -> usize {
        let mut approved = 0;
        for record in self.records.values_mut() {
            if record.status == ChangeStatus::Proposed && !record.is_detection_only() {
                record.status = ChangeStatus::Approved;
                approved += 1;
            }
        }
        approved
    }

    /// Record count per status label
    pub fn status_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for record in self.iter() {
            *counts.entry(record.status.label()).or_insert(0) += 1;
        }
        counts
    }
}

impl FromIterator<ChangeRecord> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = ChangeRecord>>(iter: I) -> Self {
        let mut set = ChangeSet::new();
        set.extend(iter);
        set
    }
}

impl Extend<ChangeRecord> for ChangeSet {
    fn extend<I: IntoIterator<Item = ChangeRecord>>(&mut self, iter: I) {
        for record in iter {
            self.insert(record);
        }
    }
}

impl TryFrom<Vec<ChangeRecord>> for ChangeSet {
    type Error = ReviewError;

    fn try_from(records: Vec<ChangeRecord>) -> Result<Self, Self::Error> {
        let mut set = ChangeSet::new();
        for record in records {
            let key = record.key();
            if set.records.contains_key(&key) {
                return Err(ReviewError::DuplicateRecord {
                    key_path: key.key_path,
                    business_type: key.business_type,
                });
            }
            set.records.insert(key, record);
        }
        Ok(set)
    }
}

impl From<ChangeSet> for Vec<ChangeRecord> {
    fn from(set: ChangeSet) -> Self {
        set.records.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::TranslationEntry;
    use crate::matcher::Occurrence;

    fn record(path: &[&str], business_type: &str) -> ChangeRecord {
        let entry = TranslationEntry::json(KeyPath::from_segments(path.iter().copied()), "學生");
        let result = MatchResult {
            new_text: "人員".to_string(),
            applied: vec![Substitution {
                phrase: "學生".to_string(),
                replacement: "人員".to_string(),
                start: 0,
                end: 6,
            }],
            unresolved: Vec::new(),
        };
        ChangeRecord::proposed(&entry, business_type, result)
    }

    #[test]
    fn test_iterates_by_path_then_business_type() {
        let set: ChangeSet = [
            record(&["b"], "public"),
            record(&["a", "z"], "public"),
            record(&["b"], "enterprise"),
            record(&["a", "z"], "enterprise"),
        ]
        .into_iter()
        .collect();

        let order: Vec<(String, &str)> = set
            .iter()
            .map(|r| (r.key_path.to_string(), r.business_type.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("a.z".to_string(), "enterprise"),
                ("a.z".to_string(), "public"),
                ("b".to_string(), "enterprise"),
                ("b".to_string(), "public"),
            ]
        );
        assert_eq!(set.business_types(), vec!["enterprise", "public"]);
    }

    #[test]
    fn test_review_edits() {
        let path = KeyPath::from_segments(["a"]);
        let mut set: ChangeSet = [record(&["a"], "enterprise"), record(&["a"], "public")]
            .into_iter()
            .collect();

        set.approve(&path, "enterprise").unwrap();
        set.override_value(&path, "public", "同學").unwrap();

        assert_eq!(set.get(&path, "enterprise").unwrap().effective_value(), Some("人員"));
        assert_eq!(set.get(&path, "public").unwrap().effective_value(), Some("同學"));

        set.reject(&path, "public").unwrap();
        assert_eq!(set.get(&path, "public").unwrap().effective_value(), None);

        let err = set.approve(&KeyPath::from_segments(["missing"]), "enterprise");
        assert!(matches!(err, Err(ReviewError::UnknownRecord { .. })));
    }

    #[test]
    fn test_approve_all_skips_detection_only() {
        let entry = TranslationEntry::json(KeyPath::from_segments(["t"]), "老師");
        let detection_only = ChangeRecord::proposed(
            &entry,
            "enterprise",
            MatchResult {
                new_text: "老師".to_string(),
                applied: Vec::new(),
                unresolved: vec![Occurrence {
                    phrase: "老師".to_string(),
                    start: 0,
                    end: 6,
                }],
            },
        );
        assert!(detection_only.is_detection_only());
        assert_eq!(detection_only.unresolved_terms, vec!["老師"]);
        assert_eq!(detection_only.proposed_value, detection_only.original_value);

        let mut set: ChangeSet = [detection_only, record(&["a"], "enterprise")]
            .into_iter()
            .collect();
        assert_eq!(set.approve_all_proposed(), 1);

        let counts = set.status_counts();
        assert_eq!(counts.get("approved"), Some(&1));
        assert_eq!(counts.get("proposed"), Some(&1));
    }

    #[test]
    fn test_serializes_as_record_list() {
        let mut set: ChangeSet = [record(&["a"], "enterprise")].into_iter().collect();
        set.override_value(&KeyPath::from_segments(["a"]), "enterprise", "同仁")
            .unwrap();

        let json = serde_json::to_value(&set).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["key_path"], serde_json::json!(["a"]));
        assert_eq!(
            json[0]["status"],
            serde_json::json!({"user_override": {"value": "同仁"}})
        );

        let back: ChangeSet = serde_json::from_value(json).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn test_rejects_duplicate_records_on_load() {
        let records = vec![record(&["a"], "enterprise"), record(&["a"], "enterprise")];
        let json = serde_json::to_value(&records).unwrap();
        assert!(serde_json::from_value::<ChangeSet>(json).is_err());
    }

    #[test]
    fn test_status_accepts_plain_strings() {
        let status: ChangeStatus = serde_json::from_str("\"approved\"").unwrap();
        assert_eq!(status, ChangeStatus::Approved);
    }
}
