use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use crate::analysis::analyzer::Analyzer;
use crate::core::error::Result;
use crate::core::types::{DocId, Document, FieldValue};
use crate::index::inverted::Term;
use crate::index::posting::Posting;

/// Parallel tokenizer for bulk document import. Fans `analyze()` calls
/// out across a rayon thread pool so a large import batch's CPU-bound
/// tokenization work isn't serialized behind the single writer that
/// later applies the resulting postings (spec.md §5: indexing is the
/// only parallelizable stage; application to the snapshot stays
/// single-writer).
pub struct ParallelIndexer {
    pub workers: usize,
    pub batch_size: usize,
    progress: Arc<AtomicUsize>,
}

impl ParallelIndexer {
    pub fn new(workers: usize) -> Self {
        rayon::ThreadPoolBuilder::new().num_threads(workers).build_global().ok();

        ParallelIndexer { workers, batch_size: 1000, progress: Arc::new(AtomicUsize::new(0)) }
    }

    pub fn progress(&self) -> usize {
        self.progress.load(Ordering::Relaxed)
    }

    /// Tokenizes every text/text-array field of each document in
    /// parallel, returning one `IndexedDocument` per input document
    /// (order not preserved).
    pub fn tokenize_batch(&self, documents: &[Document], analyzer: &Analyzer) -> Vec<IndexedDocument> {
        self.progress.store(0, Ordering::Relaxed);

        documents
            .par_chunks(self.batch_size)
            .flat_map(|chunk| {
                chunk
                    .par_iter()
                    .map(|doc| {
                        let indexed = self.tokenize_document(doc, analyzer);
                        self.progress.fetch_add(1, Ordering::Relaxed);
                        indexed
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Builds a `term -> postings` map from a tokenized batch, ready to
    /// be merged into a collection's `InvertedIndex` under the single
    /// writer lock. Postings within each term are sorted by `doc_id`.
    pub fn build_postings(&self, indexed: &[IndexedDocument]) -> Result<HashMap<Term, Vec<Posting>>> {
        let mut inverted: HashMap<Term, Vec<Posting>> = HashMap::new();

        for doc in indexed {
            let mut positions_by_term: HashMap<Term, Vec<u32>> = HashMap::new();
            for (term, position) in &doc.term_positions {
                positions_by_term.entry(term.clone()).or_default().push(*position);
            }

            for (term, mut positions) in positions_by_term {
                positions.sort_unstable();
                inverted.entry(term).or_default().push(Posting { doc_id: doc.doc_id, positions });
            }
        }

        for postings in inverted.values_mut() {
            postings.sort_by_key(|p| p.doc_id);
        }

        Ok(inverted)
    }

    fn tokenize_document(&self, doc: &Document, analyzer: &Analyzer) -> IndexedDocument {
        let mut term_positions = Vec::new();

        for value in doc.fields.values() {
            match value {
                FieldValue::Text(text) => {
                    for token in analyzer.analyze(text) {
                        term_positions.push((Term::new(&token.text), token.position));
                    }
                }
                FieldValue::TextArray(texts) => {
                    for token in analyzer.analyze_array(texts) {
                        term_positions.push((Term::new(&token.text), token.position));
                    }
                }
                _ => {}
            }
        }

        IndexedDocument { doc_id: doc.id, term_positions }
    }
}

pub struct IndexedDocument {
    pub doc_id: DocId,
    pub term_positions: Vec<(Term, u32)>,
}
