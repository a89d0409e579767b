use std::fs::{File, OpenOptions};

use crate::core::error::{Error, ErrorKind, Result};
use crate::storage::layout::StorageLayout;

/// Process-wide single-writer guarantee: one exclusive `FileLock` must be
/// held for the whole node's `base_dir` before any collection accepts
/// writes, so two processes never open the same WAL/snapshot files at
/// once (spec.md §7).
pub struct FileLock {
    pub file: File,
    pub exclusive: bool,
}

impl FileLock {
    pub fn acquire(storage: &StorageLayout, exclusive: bool) -> Result<Self> {
        let lock_path = storage.base_dir.join(".lock");

        let file = if exclusive {
            OpenOptions::new().create(true).write(true).open(&lock_path)?
        } else {
            OpenOptions::new().create(true).read(true).open(&lock_path)?
        };

        #[cfg(unix)]
        {
            use libc::{flock, LOCK_EX, LOCK_NB, LOCK_SH};
            use std::os::unix::io::AsRawFd;

            let fd = file.as_raw_fd();
            let operation = (if exclusive { LOCK_EX } else { LOCK_SH }) | LOCK_NB;

            unsafe {
                if flock(fd, operation) != 0 {
                    return Err(Error::new(
                        ErrorKind::BackendFailure,
                        "failed to acquire storage directory lock: another process is using it",
                    ));
                }
            }
        }

        Ok(FileLock { file, exclusive })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use libc::{flock, LOCK_UN};
            use std::os::unix::io::AsRawFd;

            let fd = self.file.as_raw_fd();
            unsafe {
                flock(fd, LOCK_UN);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusive_lock_blocks_a_second_exclusive_lock() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = StorageLayout::new(tmp.path().to_path_buf()).unwrap();
        let _first = FileLock::acquire(&storage, true).unwrap();
        assert!(FileLock::acquire(&storage, true).is_err());
    }
}
