pub mod file_lock;
pub mod layout;
pub mod wal;

pub use file_lock::FileLock;
pub use layout::StorageLayout;
pub use wal::{replay, SyncMode, Wal, WalEntry, WalOperation};
