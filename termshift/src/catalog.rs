//! Sensitive-term catalog
//!
//! A [`TermCatalog`] is built once from dictionary data and never mutated.
//! It is passed explicitly to the matcher and planner, so several independently
//! configured catalogs can coexist (and be shared across threads) freely.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{Level, debug};

use crate::error::CatalogError;
use crate::index::PhraseIndex;

/// A configured sensitive phrase
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Term {
    pub phrase: String,
    pub category: String,
}

impl Term {
    pub fn new(phrase: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            phrase: phrase.into(),
            category: category.into(),
        }
    }
}

/// Replacement for one term under one business type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessVariant {
    pub phrase: String,
    pub business_type: String,
    pub replacement: String,
}

impl BusinessVariant {
    pub fn new(
        phrase: impl Into<String>,
        business_type: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        Self {
            phrase: phrase.into(),
            business_type: business_type.into(),
            replacement: replacement.into(),
        }
    }
}

/// phrase → replacement, for a single business type
pub type ReplacementMap = BTreeMap<String, String>;

#[derive(Debug)]
pub struct TermCatalog {
    business_types: Vec<String>,
    terms: BTreeMap<String, Term>,
    // Keyed by business type; every declared type has an entry, possibly empty
    replacements: BTreeMap<String, ReplacementMap>,
    index: PhraseIndex,
}

impl TermCatalog {
    /// Validate and build a catalog.
    ///
    /// A blank (empty or whitespace-only) replacement means "no replacement"
    /// and is dropped. Repeating a term with the same category is harmless;
    /// repeating it with another category is an error.
    pub fn new<B, S, T, V>(business_types: B, terms: T, variants: V) -> Result<Self, CatalogError>
    where
        B: IntoIterator<Item = S>,
        S: Into<String>,
        T: IntoIterator<Item = Term>,
        V: IntoIterator<Item = BusinessVariant>,
    {
        let mut declared = Vec::new();
        let mut replacements = BTreeMap::new();
        for business_type in business_types {
            let business_type: String = business_type.into();
            if replacements.contains_key(&business_type) {
                return Err(CatalogError::DuplicateBusinessType(business_type));
            }
            replacements.insert(business_type.clone(), ReplacementMap::new());
            declared.push(business_type);
        }

        let mut by_phrase: BTreeMap<String, Term> = BTreeMap::new();
        for term in terms {
            if term.phrase.is_empty() {
                return Err(CatalogError::EmptyPhrase {
                    category: term.category,
                });
            }
            match by_phrase.get(&term.phrase) {
                Some(existing) if existing.category != term.category => {
                    return Err(CatalogError::ConflictingCategory {
                        phrase: term.phrase,
                        first: existing.category.clone(),
                        second: term.category,
                    });
                }
                Some(_) => {}
                None => {
                    by_phrase.insert(term.phrase.clone(), term);
                }
            }
        }

        for variant in variants {
            let Some(map) = replacements.get_mut(&variant.business_type) else {
                return Err(CatalogError::UnknownBusinessType {
                    phrase: variant.phrase,
                    business_type: variant.business_type,
                });
            };
            if !by_phrase.contains_key(&variant.phrase) {
                return Err(CatalogError::UnknownTerm {
                    phrase: variant.phrase,
                    business_type: variant.business_type,
                });
            }
            if variant.replacement.trim().is_empty() {
                debug!(
                    phrase = %variant.phrase,
                    business_type = %variant.business_type,
                    "blank replacement, treating as none"
                );
                continue;
            }
            match map.get(&variant.phrase) {
                Some(existing) if *existing != variant.replacement => {
                    return Err(CatalogError::ConflictingReplacement {
                        phrase: variant.phrase,
                        business_type: variant.business_type,
                        first: existing.clone(),
                        second: variant.replacement,
                    });
                }
                Some(_) => {}
                None => {
                    map.insert(variant.phrase, variant.replacement);
                }
            }
        }

        let index = PhraseIndex::new(by_phrase.keys().cloned());
        let catalog = TermCatalog {
            business_types: declared,
            terms: by_phrase,
            replacements,
            index,
        };

        if tracing::enabled!(Level::DEBUG) {
            let inclusions = catalog.inclusions();
            debug!(
                terms = catalog.len(),
                inclusions = inclusions.len(),
                "term catalog built"
            );
            for (outer, inner) in inclusions {
                debug!("'{}' contains '{}'", outer, inner);
            }
        }

        Ok(catalog)
    }

    /// phrase → replacement for a business type; `None` if the type is undeclared
    pub fn lookup(&self, business_type: &str) -> Option<&ReplacementMap> {
        self.replacements.get(business_type)
    }

    /// Every phrase, sorted, regardless of replacements
    pub fn all_phrases(&self) -> impl Iterator<Item = &str> {
        self.terms.keys().map(String::as_str)
    }

    pub fn term(&self, phrase: &str) -> Option<&Term> {
        self.terms.get(phrase)
    }

    pub fn terms(&self) -> impl Iterator<Item = &Term> {
        self.terms.values()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Business types in declaration order
    pub fn business_types(&self) -> &[String] {
        &self.business_types
    }

    pub fn categories(&self) -> BTreeSet<&str> {
        self.terms.values().map(|t| t.category.as_str()).collect()
    }

    pub fn index(&self) -> &PhraseIndex {
        &self.index
    }

    /// Number of phrases with a replacement for `business_type`
    pub fn replacement_count(&self, business_type: &str) -> usize {
        self.lookup(business_type).map_or(0, |map| map.len())
    }

    /// Phrases detected but never replaced for `business_type`.
    ///
    /// For an undeclared business type every phrase is missing.
    pub fn missing_replacements(&self, business_type: &str) -> Vec<&str> {
        let map = self.lookup(business_type);
        self.all_phrases()
            .filter(|phrase| map.is_none_or(|m| !m.contains_key(*phrase)))
            .collect()
    }

    /// `(outer, inner)` pairs where `inner` is a substring of the longer `outer`.
    ///
    /// These are the pairs the longest-match rule arbitrates.
    pub fn inclusions(&self) -> Vec<(&str, &str)> {
        let mut pairs = Vec::new();
        for outer in self.all_phrases() {
            for inner in self.all_phrases() {
                if outer != inner && outer.contains(inner) {
                    pairs.push((outer, inner));
                }
            }
        }
        pairs
    }
}
