pub mod file_kv;
pub mod kv;
pub mod mem_kv;

pub use file_kv::FileKvStore;
pub use kv::{KvStore, FORMAT_VERSION};
pub use mem_kv::MemKvStore;
