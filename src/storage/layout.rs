use std::path::{Path, PathBuf};

use crate::core::error::Result;

/// On-disk directory layout for a running node. Each collection owns a
/// subdirectory under `collections_dir` holding its WAL and its periodic
/// full snapshot; there is no teacher-style global segment file, since
/// this store keeps one append log and one snapshot per collection
/// rather than LSM-style immutable segments (spec.md §7).
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub base_dir: PathBuf,
    pub collections_dir: PathBuf,
    pub wal_dir: PathBuf,
    pub meta_dir: PathBuf,
}

impl StorageLayout {
    pub fn new(base_dir: PathBuf) -> Result<Self> {
        let collections_dir = base_dir.join("collections");
        let wal_dir = base_dir.join("wal");
        let meta_dir = base_dir.join("meta");

        std::fs::create_dir_all(&collections_dir)?;
        std::fs::create_dir_all(&wal_dir)?;
        std::fs::create_dir_all(&meta_dir)?;

        Ok(StorageLayout { base_dir, collections_dir, wal_dir, meta_dir })
    }

    /// Directory holding a single collection's durable state.
    pub fn collection_dir(&self, collection_name: &str) -> PathBuf {
        self.collections_dir.join(collection_name)
    }

    /// Full-snapshot file a collection's latest committed state is
    /// checkpointed to; replayed on recovery before the WAL tail.
    pub fn snapshot_path(&self, collection_name: &str) -> PathBuf {
        self.collection_dir(collection_name).join("snapshot.bin")
    }

    /// WAL file for a collection's append log.
    pub fn wal_path(&self, collection_name: &str) -> PathBuf {
        self.wal_dir.join(format!("{collection_name}.wal"))
    }

    /// Node-wide metadata file (collection schema registry, node id, etc).
    pub fn node_meta_path(&self) -> PathBuf {
        self.meta_dir.join("node.json")
    }

    pub fn ensure_collection_dir(&self, collection_name: &str) -> Result<PathBuf> {
        let dir = self.collection_dir(collection_name);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn wal_dir(&self) -> &Path {
        &self.wal_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_creates_all_layout_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(tmp.path().to_path_buf()).unwrap();
        assert!(layout.collections_dir.is_dir());
        assert!(layout.wal_dir.is_dir());
        assert!(layout.meta_dir.is_dir());
    }

    #[test]
    fn wal_path_is_scoped_per_collection() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(tmp.path().to_path_buf()).unwrap();
        let a = layout.wal_path("books");
        let b = layout.wal_path("movies");
        assert_ne!(a, b);
        assert!(a.to_string_lossy().contains("books"));
    }
}
