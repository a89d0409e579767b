use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};

use crate::core::error::{Error, ErrorKind, Result};
use crate::store::kv::{KvStore, FORMAT_VERSION};

const TOMBSTONE: u8 = 0;
const VALUE_RECORD: u8 = 1;

/// Single-file, append-only `KvStore`. Every `put`/`delete` appends a new
/// record (tag, crc32, key, value) to `log_path`; an in-memory
/// `BTreeMap<key, offset>` index, rebuilt by scanning the log once at
/// open time, resolves `get`/`scan` to direct seeks instead of a linear
/// file walk. This is this crate's concrete realization of the durable
/// blob store spec.md §6 calls for, built the way the teacher builds its
/// WAL (`storage::wal::Wal`): length-prefixed bincode-free records,
/// `crc32fast` checksums, append + fsync for durability.
pub struct FileKvStore {
    log_path: PathBuf,
    file: Mutex<File>,
    index: RwLock<BTreeMap<Vec<u8>, u64>>,
}

struct Record {
    tag: u8,
    key: Vec<u8>,
    value: Vec<u8>,
}

impl FileKvStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let log_path = path.as_ref().to_path_buf();
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().create(true).read(true).append(true).open(&log_path)?;
        let index = Self::rebuild_index(&mut file)?;

        Ok(FileKvStore { log_path, file: Mutex::new(file), index: RwLock::new(index) })
    }

    fn rebuild_index(file: &mut File) -> Result<BTreeMap<Vec<u8>, u64>> {
        file.seek(SeekFrom::Start(0))?;
        let mut index = BTreeMap::new();
        let mut offset = 0u64;

        loop {
            let record_offset = offset;
            let record = match Self::read_record(file, &mut offset)? {
                Some(r) => r,
                None => break,
            };
            match record.tag {
                TOMBSTONE => {
                    index.remove(&record.key);
                }
                VALUE_RECORD => {
                    index.insert(record.key, record_offset);
                }
                _ => return Err(Error::new(ErrorKind::BackendFailure, "unknown KV record tag")),
            }
        }

        Ok(index)
    }

    /// Reads one record starting at `*offset`, advancing it past the
    /// record. Returns `Ok(None)` at a clean end-of-file.
    fn read_record(file: &mut File, offset: &mut u64) -> Result<Option<Record>> {
        let mut header = [0u8; 1 + 1 + 4 + 4 + 4];
        match file.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let format_version = header[0];
        if format_version != FORMAT_VERSION {
            return Err(Error::new(ErrorKind::BackendFailure, "unsupported KV store format version"));
        }
        let tag = header[1];
        let key_len = u32::from_le_bytes(header[2..6].try_into().unwrap()) as usize;
        let value_len = u32::from_le_bytes(header[6..10].try_into().unwrap()) as usize;
        let expected_crc = u32::from_le_bytes(header[10..14].try_into().unwrap());

        let mut key = vec![0u8; key_len];
        let mut value = vec![0u8; value_len];
        match (|| -> std::io::Result<()> {
            file.read_exact(&mut key)?;
            file.read_exact(&mut value)?;
            Ok(())
        })() {
            Ok(()) => {}
            // A torn final write (crash mid-append) stops recovery at the last complete record.
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&key);
        hasher.update(&value);
        if hasher.finalize() != expected_crc {
            return Err(Error::new(ErrorKind::BackendFailure, "KV store record failed checksum"));
        }

        *offset += header.len() as u64 + key_len as u64 + value_len as u64;
        Ok(Some(Record { tag, key, value }))
    }

    fn append_record(&self, tag: u8, key: &[u8], value: &[u8]) -> Result<u64> {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(key);
        hasher.update(value);
        let crc = hasher.finalize();

        let mut file = self.file.lock();
        let offset = file.seek(SeekFrom::End(0))?;

        let mut header = Vec::with_capacity(14);
        header.push(FORMAT_VERSION);
        header.push(tag);
        header.extend_from_slice(&(key.len() as u32).to_le_bytes());
        header.extend_from_slice(&(value.len() as u32).to_le_bytes());
        header.extend_from_slice(&crc.to_le_bytes());

        file.write_all(&header)?;
        file.write_all(key)?;
        file.write_all(value)?;
        file.sync_data()?;

        Ok(offset)
    }

    fn read_value_at(&self, offset: u64) -> Result<Vec<u8>> {
        let mut file = self.file.lock();
        let mut cursor = offset;
        match Self::read_record(&mut file, &mut cursor)? {
            Some(record) => Ok(record.value),
            None => Err(Error::new(ErrorKind::BackendFailure, "KV store index points past end of log")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }
}

impl KvStore for FileKvStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let offset = match self.index.read().get(key) {
            Some(offset) => *offset,
            None => return Ok(None),
        };
        Ok(Some(self.read_value_at(offset)?))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let offset = self.append_record(VALUE_RECORD, key, value)?;
        self.index.write().insert(key.to_vec(), offset);
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.append_record(TOMBSTONE, key, &[])?;
        self.index.write().remove(key);
        Ok(())
    }

    fn scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let matching: Vec<(Vec<u8>, u64)> = self
            .index
            .read()
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, offset)| (k.clone(), *offset))
            .collect();

        matching
            .into_iter()
            .map(|(key, offset)| Ok((key, self.read_value_at(offset)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_roundtrips_across_a_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("store.kv");

        {
            let store = FileKvStore::open(&path).unwrap();
            store.put(b"a", b"hello").unwrap();
        }

        let store = FileKvStore::open(&path).unwrap();
        assert_eq!(store.get(b"a").unwrap(), Some(b"hello".to_vec()));
    }

    #[test]
    fn delete_is_durable_across_a_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("store.kv");

        {
            let store = FileKvStore::open(&path).unwrap();
            store.put(b"a", b"hello").unwrap();
            store.delete(b"a").unwrap();
        }

        let store = FileKvStore::open(&path).unwrap();
        assert_eq!(store.get(b"a").unwrap(), None);
    }

    #[test]
    fn scan_respects_prefix_after_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("store.kv");

        let store = FileKvStore::open(&path).unwrap();
        store.put(b"col/a/1", b"x").unwrap();
        store.put(b"col/b/1", b"y").unwrap();

        let results = store.scan(b"col/a/").unwrap();
        assert_eq!(results, vec![(b"col/a/1".to_vec(), b"x".to_vec())]);
    }

    #[test]
    fn overwriting_a_key_returns_the_latest_value() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("store.kv");
        let store = FileKvStore::open(&path).unwrap();

        store.put(b"a", b"first").unwrap();
        store.put(b"a", b"second").unwrap();
        assert_eq!(store.get(b"a").unwrap(), Some(b"second".to_vec()));
    }
}
