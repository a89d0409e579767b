use std::collections::HashMap;

use regex::Regex;

use crate::analysis::token::Token;
use crate::compression::bitpack::grow_capacity;
use crate::core::error::{Error, Result};
use crate::core::types::DocId;
use crate::core::utils::levenshtein_distance;
use crate::index::posting::{Posting, PostingList};

/// A normalized token surface form, keyed as raw bytes so it round-trips
/// through storage without re-validating UTF-8 on every lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Term(Vec<u8>);

impl Term {
    pub fn new(text: &str) -> Self {
        Term(text.as_bytes().to_vec())
    }

    pub fn as_str(&self) -> Result<&str> {
        std::str::from_utf8(&self.0).map_err(|_| Error::schema_violation("invalid UTF-8 in term"))
    }
}

/// One field's inverted index: term -> sorted-by-doc_id postings. A
/// collection holds one `InvertedIndex` per indexed string/string-array
/// field (spec.md §4.1).
#[derive(Clone)]
pub struct InvertedIndex {
    postings: HashMap<Term, Vec<Posting>>,
    doc_count: usize,
    total_tokens: usize,
}

impl InvertedIndex {
    pub fn new() -> Self {
        InvertedIndex { postings: HashMap::new(), doc_count: 0, total_tokens: 0 }
    }

    /// Index one field value's tokens against `doc_id`. Tokens must
    /// already carry final positions (array-element gaps applied by the
    /// analyzer, see `analysis::analyzer::Analyzer::analyze_array`).
    /// Callers insert documents in ascending `doc_id` order, so each
    /// term's posting vector stays sorted without a re-sort here.
    pub fn add_document(&mut self, doc_id: DocId, tokens: &[Token]) {
        let mut term_positions: HashMap<Term, Vec<u32>> = HashMap::new();

        for token in tokens {
            term_positions.entry(Term::new(&token.text)).or_default().push(token.position);
        }

        for (term, mut positions) in term_positions {
            positions.sort_unstable();
            let postings = self.postings.entry(term).or_default();
            push_with_growth_factor(postings, Posting { doc_id, positions });
        }

        self.doc_count += 1;
        self.total_tokens += tokens.len();
    }

    /// Remove a document's postings for this field, e.g. on delete or
    /// re-index during an `alter`. O(terms * postings) — acceptable since
    /// deletes are rare relative to inserts in this workload.
    pub fn remove_document(&mut self, doc_id: DocId) {
        self.postings.retain(|_, postings| {
            postings.retain(|p| p.doc_id != doc_id);
            !postings.is_empty()
        });
    }

    pub fn term_postings(&self, term: &Term) -> Option<&[Posting]> {
        self.postings.get(term).map(|v| v.as_slice())
    }

    pub fn doc_freq(&self, term: &Term) -> usize {
        self.postings.get(term).map(|v| v.len()).unwrap_or(0)
    }

    pub fn doc_count(&self) -> usize {
        self.doc_count
    }

    pub fn total_tokens(&self) -> usize {
        self.total_tokens
    }

    pub fn terms(&self) -> impl Iterator<Item = &Term> {
        self.postings.keys()
    }

    /// Freeze a term's postings into the durable bit-packed layout
    /// (spec.md §4.3), for flushing to the KV store.
    pub fn to_posting_list(&self, term: &Term) -> Result<PostingList> {
        match self.postings.get(term) {
            Some(postings) => PostingList::encode(postings),
            None => Ok(PostingList::empty()),
        }
    }

    /// All terms matching a `*`/`?` glob, for admin/debugging tooling.
    pub fn wildcard_search(&self, pattern: &str) -> Result<Vec<String>> {
        let regex_pattern = format!("^{}$", regex::escape(pattern).replace(r"\*", ".*").replace(r"\?", "."));
        let regex = Regex::new(&regex_pattern)
            .map_err(|e| Error::invalid_filter(format!("invalid wildcard pattern: {}", e)))?;

        let mut matches = Vec::new();
        for term in self.postings.keys() {
            let term_str = String::from_utf8_lossy(&term.0);
            if regex.is_match(&term_str) {
                matches.push(term_str.to_string());
            }
        }
        Ok(matches)
    }

    /// Brute-force bounded-edit-distance scan, kept as a fallback for
    /// fields too small to be worth building a typo dictionary for. The
    /// primary typo-tolerant path is `index::typo_dict::TypoDictionary`.
    pub fn fuzzy_search(&self, term: &str, max_distance: u8, prefix_length: u8) -> Vec<(String, u8)> {
        let (prefix, suffix) = if prefix_length > 0 && term.len() >= prefix_length as usize {
            term.split_at(prefix_length as usize)
        } else {
            ("", term)
        };

        let mut matches = Vec::new();
        for dict_term in self.postings.keys() {
            let dict_term_str = String::from_utf8_lossy(&dict_term.0);
            if !prefix.is_empty() && !dict_term_str.starts_with(prefix) {
                continue;
            }
            let distance = levenshtein_distance(suffix, &dict_term_str[prefix.len()..]);
            if distance <= max_distance as usize {
                matches.push((dict_term_str.to_string(), distance as u8));
            }
        }

        matches.sort_by_key(|(_, dist)| *dist);
        matches
    }
}

/// Append to a term's live posting buffer, reallocating by `GROWTH_FACTOR`
/// (spec.md §4.3) instead of `Vec`'s default doubling whenever the buffer
/// is full. The bit-packed layout itself is only materialized once, in
/// `to_posting_list`, at flush time — this governs how the mutable buffer
/// backing a term grows while documents are still being indexed into it.
fn push_with_growth_factor(postings: &mut Vec<Posting>, posting: Posting) {
    if postings.len() == postings.capacity() {
        let target = grow_capacity(postings.capacity(), postings.len() + 1);
        postings.reserve_exact(target - postings.capacity());
    }
    postings.push(posting);
}

impl Default for InvertedIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(text: &str, position: u32) -> Token {
        Token::new(text.to_string(), position, 0)
    }

    #[test]
    fn add_document_indexes_every_surviving_token() {
        let mut index = InvertedIndex::new();
        index.add_document(DocId::new(1), &[token("red", 1), token("car", 2)]);
        assert_eq!(index.doc_freq(&Term::new("red")), 1);
        assert_eq!(index.doc_freq(&Term::new("car")), 1);
    }

    #[test]
    fn postings_buffer_grows_by_1_3x_not_doubling() {
        let mut postings: Vec<Posting> = Vec::with_capacity(10);
        for i in 0..11 {
            push_with_growth_factor(&mut postings, Posting { doc_id: DocId::new(i), positions: vec![1] });
        }
        // Capacity 10 was full after the 10th push; the 11th must grow it
        // by `GROWTH_FACTOR` (to 13), never jumping straight to `Vec`'s
        // default doubling (20).
        assert!(postings.capacity() >= 11);
        assert!(postings.capacity() < 20);
    }

    #[test]
    fn remove_document_drops_its_postings() {
        let mut index = InvertedIndex::new();
        index.add_document(DocId::new(1), &[token("red", 1)]);
        index.add_document(DocId::new(2), &[token("red", 1)]);
        index.remove_document(DocId::new(1));
        assert_eq!(index.doc_freq(&Term::new("red")), 1);
    }

    #[test]
    fn wildcard_search_matches_glob_pattern() {
        let mut index = InvertedIndex::new();
        index.add_document(DocId::new(1), &[token("running", 1), token("runner", 2), token("walker", 3)]);
        let mut matches = index.wildcard_search("run*").unwrap();
        matches.sort();
        assert_eq!(matches, vec!["runner".to_string(), "running".to_string()]);
    }

    #[test]
    fn fuzzy_search_finds_close_terms() {
        let mut index = InvertedIndex::new();
        index.add_document(DocId::new(1), &[token("apple", 1)]);
        let matches = index.fuzzy_search("appel", 2, 0);
        assert!(matches.iter().any(|(t, _)| t == "apple"));
    }
}
