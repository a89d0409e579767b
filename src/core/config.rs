use std::path::PathBuf;
use std::time::Duration;

/// In-process engine configuration. This is a plain struct, not a
/// file/env loader — loading configuration from disk or environment is a
/// peripheral concern outside the core (spec.md §1).
#[derive(Debug, Clone)]
pub struct Config {
    pub storage_path: PathBuf,
    pub memory_limit: usize,
    pub cache_size: usize,

    pub writer_batch_size: usize,
    pub writer_commit_interval_secs: u64,

    pub max_readers: usize,
    pub indexing_threads: Option<usize>,

    pub buffer_pool_size: Option<usize>,

    /// Default `max_candidates` for prefix/typo expansion (spec.md §4.4).
    pub default_max_candidates: usize,
    /// Default proximity window size W (spec.md §4.6.1).
    pub default_proximity_window: usize,
    /// Default query deadline, checked at candidate-generation and
    /// scoring-batch boundaries (spec.md §5).
    pub default_query_deadline: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage_path: PathBuf::from("./data"),
            cache_size: 10 * 1024 * 1024,
            memory_limit: 100 * 1024 * 1024,

            writer_batch_size: 1000,
            writer_commit_interval_secs: 60,

            max_readers: 16,
            indexing_threads: None,

            buffer_pool_size: Some(64 * 1024 * 1024),

            default_max_candidates: 100,
            default_proximity_window: 5,
            default_query_deadline: Duration::from_millis(500),
        }
    }
}
