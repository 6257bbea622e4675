//! Multi-phrase search index
//!
//! A character trie over every catalog phrase. One scan reports all
//! occurrences of all phrases, including overlapping ones and phrases nested
//! inside longer phrases; choosing among them is the matcher's job.
//!
//! Cost is bounded by `text length × longest phrase`, independent of how many
//! phrases the catalog holds.

use std::collections::HashMap;

#[derive(Debug, Default)]
struct TrieNode {
    children: HashMap<char, usize>,
    /// Id of the phrase ending at this node
    phrase: Option<usize>,
}

/// One raw occurrence of a phrase. Offsets are byte offsets into the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub phrase: usize,
    pub start: usize,
    pub end: usize,
    /// Phrase length in characters, used for longest-match ranking
    pub char_len: usize,
}

#[derive(Debug)]
pub struct PhraseIndex {
    nodes: Vec<TrieNode>,
    phrases: Vec<String>,
}

impl PhraseIndex {
    /// Build the index. Phrase ids follow iteration order; empty phrases and
    /// repeats are ignored.
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut index = PhraseIndex {
            nodes: vec![TrieNode::default()],
            phrases: Vec::new(),
        };
        for phrase in phrases {
            index.insert(phrase.into());
        }
        index
    }

    fn insert(&mut self, phrase: String) {
        if phrase.is_empty() {
            return;
        }
        let mut node = 0;
        for ch in phrase.chars() {
            node = match self.nodes[node].children.get(&ch) {
                Some(&next) => next,
                None => {
                    self.nodes.push(TrieNode::default());
                    let next = self.nodes.len() - 1;
                    self.nodes[node].children.insert(ch, next);
                    next
                }
            };
        }
        if self.nodes[node].phrase.is_none() {
            self.nodes[node].phrase = Some(self.phrases.len());
            self.phrases.push(phrase);
        }
    }

    pub fn phrase(&self, id: usize) -> &str {
        &self.phrases[id]
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    /// Every occurrence of every phrase, ordered by start offset then length
    pub fn find_all(&self, text: &str) -> Vec<Candidate> {
        let mut found = Vec::new();
        for (start, _) in text.char_indices() {
            let mut node = 0;
            let mut char_len = 0;
            for (offset, ch) in text[start..].char_indices() {
                let Some(&next) = self.nodes[node].children.get(&ch) else {
                    break;
                };
                node = next;
                char_len += 1;
                if let Some(phrase) = self.nodes[node].phrase {
                    found.push(Candidate {
                        phrase,
                        start,
                        end: start + offset + ch.len_utf8(),
                        char_len,
                    });
                }
            }
        }
        found
    }
}
