use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::core::error::Result;
use crate::store::kv::KvStore;

/// In-memory `KvStore` backed by a `BTreeMap`, so `scan(prefix)` can walk
/// a contiguous key range instead of filtering every entry. Used by the
/// core's own unit tests, which need `KvStore` semantics but no
/// filesystem (spec.md §6 ambient test tooling).
pub struct MemKvStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemKvStore {
    pub fn new() -> Self {
        MemKvStore { data: RwLock::new(BTreeMap::new()) }
    }
}

impl Default for MemKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for MemKvStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.data.write().remove(key);
        Ok(())
    }

    fn scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(self
            .data
            .read()
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_roundtrips() {
        let store = MemKvStore::new();
        store.put(b"a", b"1").unwrap();
        assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn scan_returns_only_matching_prefix_in_key_order() {
        let store = MemKvStore::new();
        store.put(b"col/a/1", b"x").unwrap();
        store.put(b"col/a/2", b"y").unwrap();
        store.put(b"col/b/1", b"z").unwrap();

        let results = store.scan(b"col/a/").unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, b"col/a/1");
    }

    #[test]
    fn delete_removes_the_key() {
        let store = MemKvStore::new();
        store.put(b"a", b"1").unwrap();
        store.delete(b"a").unwrap();
        assert_eq!(store.get(b"a").unwrap(), None);
    }
}
