pub mod indexer;

pub use indexer::{IndexedDocument, ParallelIndexer};
