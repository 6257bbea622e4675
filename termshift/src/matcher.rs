//! Term detection, overlap resolution and substitution
//!
//! Detection always runs against every phrase in the catalog. When
//! occurrences overlap, the longer phrase wins, then the earlier start, then
//! the lexicographically smaller phrase. The winners are pairwise disjoint
//! and are substituted in one left-to-right pass over the original text using
//! the original offsets. The output is never scanned again, so a replacement
//! containing another catalog phrase does not trigger a second substitution.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::catalog::{ReplacementMap, TermCatalog};
use crate::index::{Candidate, PhraseIndex};

/// A winning phrase occurrence. Offsets are byte offsets into the scanned text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub phrase: String,
    pub start: usize,
    pub end: usize,
}

/// One applied substitution, with offsets into the original text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Substitution {
    pub phrase: String,
    pub replacement: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub new_text: String,
    /// Substitutions in application (left-to-right) order
    pub applied: Vec<Substitution>,
    /// Winning occurrences left verbatim because no replacement exists
    pub unresolved: Vec<Occurrence>,
}

impl MatchResult {
    /// Phrases that were substituted, in application order
    pub fn triggering_terms(&self) -> Vec<String> {
        self.applied.iter().map(|s| s.phrase.clone()).collect()
    }

    /// True when phrases matched but none had a replacement
    pub fn is_detection_only(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Outcome of a substitution pass.
///
/// `NoMatch` is distinct from a match whose replacement happens to leave the
/// text unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    NoMatch,
    Matched(MatchResult),
}

impl MatchOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, MatchOutcome::Matched(_))
    }

    pub fn into_result(self) -> Option<MatchResult> {
        match self {
            MatchOutcome::NoMatch => None,
            MatchOutcome::Matched(result) => Some(result),
        }
    }
}

/// Stateless matcher over a borrowed catalog
#[derive(Debug, Clone, Copy)]
pub struct Matcher<'a> {
    catalog: &'a TermCatalog,
}

impl<'a> Matcher<'a> {
    pub fn new(catalog: &'a TermCatalog) -> Self {
        Self { catalog }
    }

    /// Winning occurrences in `text`, ordered by start offset
    pub fn find(&self, text: &str) -> Vec<Occurrence> {
        let index = self.catalog.index();
        select_winners(index, text)
            .into_iter()
            .map(|c| Occurrence {
                phrase: index.phrase(c.phrase).to_string(),
                start: c.start,
                end: c.end,
            })
            .collect()
    }

    /// Substitute winning occurrences that have an entry in `replacements`
    pub fn substitute(&self, text: &str, replacements: &ReplacementMap) -> MatchOutcome {
        let index = self.catalog.index();
        let winners = select_winners(index, text);
        if winners.is_empty() {
            return MatchOutcome::NoMatch;
        }

        let mut new_text = String::with_capacity(text.len());
        let mut applied = Vec::new();
        let mut unresolved = Vec::new();
        let mut cursor = 0;

        for winner in winners {
            let phrase = index.phrase(winner.phrase);
            match replacements.get(phrase) {
                Some(replacement) => {
                    new_text.push_str(&text[cursor..winner.start]);
                    new_text.push_str(replacement);
                    cursor = winner.end;
                    applied.push(Substitution {
                        phrase: phrase.to_string(),
                        replacement: replacement.clone(),
                        start: winner.start,
                        end: winner.end,
                    });
                }
                None => unresolved.push(Occurrence {
                    phrase: phrase.to_string(),
                    start: winner.start,
                    end: winner.end,
                }),
            }
        }
        new_text.push_str(&text[cursor..]);

        trace!(
            applied = applied.len(),
            unresolved = unresolved.len(),
            "substitution pass"
        );

        MatchOutcome::Matched(MatchResult {
            new_text,
            applied,
            unresolved,
        })
    }
}

// Longer phrase first, then earlier start, then smaller phrase
fn priority(index: &PhraseIndex, a: &Candidate, b: &Candidate) -> Ordering {
    b.char_len
        .cmp(&a.char_len)
        .then(a.start.cmp(&b.start))
        .then_with(|| index.phrase(a.phrase).cmp(index.phrase(b.phrase)))
}

/// Greedy selection in priority order; the result is sorted by start offset
/// and pairwise disjoint.
fn select_winners(index: &PhraseIndex, text: &str) -> Vec<Candidate> {
    let mut candidates = index.find_all(text);
    candidates.sort_by(|a, b| priority(index, a, b));

    let mut winners: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        let pos = winners.partition_point(|w| w.start < candidate.start);
        let overlaps_prev = pos > 0 && winners[pos - 1].end > candidate.start;
        let overlaps_next = pos < winners.len() && winners[pos].start < candidate.end;
        if !overlaps_prev && !overlaps_next {
            winners.insert(pos, candidate);
        }
    }
    winners
}
