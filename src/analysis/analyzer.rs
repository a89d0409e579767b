use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rust_stemmers::Algorithm;

use crate::analysis::filter::TokenFilter;
use crate::analysis::filters::lowercase::LowercaseFilter;
use crate::analysis::filters::stemmer::StemmerFilter;
use crate::analysis::filters::stopword::StopWordFilter;
use crate::analysis::language::vietnamese::VietnameseTokenizer;
use crate::analysis::token::Token;
use crate::analysis::tokenizer::{StandardTokenizer, Tokenizer};
use crate::core::error::{Error, Result};

/// Gap inserted between successive elements of an array-valued field so a
/// proximity window can never span two elements (spec.md §4.2).
pub const ARRAY_ELEMENT_GAP: u32 = 8;

/// Text analysis pipeline: a tokenizer plus an ordered chain of filters.
pub struct Analyzer {
    pub tokenizer: Box<dyn Tokenizer>,
    pub filters: Vec<Box<dyn TokenFilter>>,
    pub name: String,
}

impl Analyzer {
    pub fn new(name: String, tokenizer: Box<dyn Tokenizer>) -> Self {
        Analyzer { tokenizer, filters: Vec::new(), name }
    }

    pub fn add_filter(mut self, filter: Box<dyn TokenFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn analyze(&self, text: &str) -> Vec<Token> {
        let mut tokens = self.tokenizer.tokenize(text);
        for filter in &self.filters {
            tokens = filter.filter(tokens);
        }
        tokens
    }

    /// Analyze each element of an array-valued field, re-basing positions
    /// so every element starts at least `ARRAY_ELEMENT_GAP` tokens after
    /// the previous one ends. This keeps cross-element phrase/proximity
    /// matches impossible while preserving per-token ordering within an
    /// element.
    pub fn analyze_array(&self, values: &[String]) -> Vec<Token> {
        let mut out = Vec::new();
        let mut base_position = 1u32;

        for value in values {
            let tokens = self.analyze(value);
            let max_position = tokens.iter().map(|t| t.position).max().unwrap_or(0);
            for mut token in tokens {
                token.position = base_position + token.position - 1;
                out.push(token);
            }
            base_position += max_position.max(1) + ARRAY_ELEMENT_GAP;
        }

        out
    }

    /// Standard English analyzer: lowercase + stem. Stopwords are
    /// deliberately NOT part of the default chain — an always-on stopword
    /// filter would mean a surviving token like "the" is never
    /// independently searchable, violating the per-token search
    /// invariant in spec.md §8. Use `standard_english_with_stopwords` to
    /// opt in explicitly.
    pub fn standard_english() -> Self {
        Analyzer::new("standard_english".to_string(), Box::new(StandardTokenizer::default()))
            .add_filter(Box::new(LowercaseFilter))
            .add_filter(Box::new(StemmerFilter::new(Algorithm::English)))
    }

    pub fn standard_english_with_stopwords() -> Self {
        Analyzer::new("standard_english_stopwords".to_string(), Box::new(StandardTokenizer::default()))
            .add_filter(Box::new(LowercaseFilter))
            .add_filter(Box::new(StopWordFilter::english()))
            .add_filter(Box::new(StemmerFilter::new(Algorithm::English)))
    }

    /// Unstemmed analyzer: lowercase only. Used where exact token surface
    /// form matters (typo/prefix dictionary construction wants the same
    /// normalized form that search queries will produce).
    pub fn simple() -> Self {
        Analyzer::new("simple".to_string(), Box::new(StandardTokenizer::default()))
            .add_filter(Box::new(LowercaseFilter))
    }

    pub fn vietnamese_search() -> Self {
        Analyzer::new("vietnamese_search".to_string(), Box::new(VietnameseTokenizer::new()))
            .add_filter(Box::new(LowercaseFilter))
    }
}

/// Registry for managing named analyzers, looked up per-field via
/// `Schema::get_analyzer_for_field`.
pub struct AnalyzerRegistry {
    analyzers: RwLock<HashMap<String, Arc<Analyzer>>>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        let registry = AnalyzerRegistry { analyzers: RwLock::new(HashMap::new()) };
        registry.register_defaults();
        registry
    }

    fn register_defaults(&self) {
        self.register("standard", Analyzer::standard_english());
        self.register("standard_stopwords", Analyzer::standard_english_with_stopwords());
        self.register("simple", Analyzer::simple());
        self.register("vietnamese", Analyzer::vietnamese_search());
    }

    pub fn register(&self, name: &str, analyzer: Analyzer) {
        self.analyzers.write().insert(name.to_string(), Arc::new(analyzer));
    }

    pub fn get(&self, name: &str) -> Option<Arc<Analyzer>> {
        self.analyzers.read().get(name).cloned()
    }

    pub fn analyze(&self, analyzer_name: &str, text: &str) -> Result<Vec<Token>> {
        self.get(analyzer_name)
            .map(|analyzer| analyzer.analyze(text))
            .ok_or_else(|| Error::not_found(format!("analyzer `{}` not found", analyzer_name)))
    }
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_elements_get_a_position_gap() {
        let analyzer = Analyzer::simple();
        let tokens = analyzer.analyze_array(&["red car".to_string(), "blue bike".to_string()]);
        let positions: Vec<u32> = tokens.iter().map(|t| t.position).collect();
        assert_eq!(positions[0], 1);
        assert_eq!(positions[1], 2);
        assert!(positions[2] - positions[1] > 1);
    }

    #[test]
    fn default_standard_analyzer_keeps_stopwords_searchable() {
        let analyzer = Analyzer::standard_english();
        let tokens = analyzer.analyze("the cat sat");
        assert!(tokens.iter().any(|t| t.text == "the"));
    }
}
