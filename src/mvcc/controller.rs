use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};

/// Arc-swapped MVCC snapshot holder, generic over whatever a collection
/// considers its point-in-time state `S` (its per-field indexes, schema,
/// and deleted-doc set bundled together — see `collection::Collection`).
/// Readers call `snapshot()` and get a cheap `Arc` clone that is never
/// mutated from under them; a writer builds a new `S` from the previous
/// snapshot and calls `publish` to make it visible atomically (spec.md
/// §6: "MVCC-style Arc-swapped snapshots").
pub struct MVCCController<S> {
    current: RwLock<Arc<S>>,
}

impl<S> MVCCController<S> {
    pub fn new(initial: S) -> Self {
        MVCCController { current: RwLock::new(Arc::new(initial)) }
    }

    pub fn snapshot(&self) -> Arc<S> {
        self.current.read().clone()
    }

    pub fn publish(&self, next: S) {
        *self.current.write() = Arc::new(next);
    }
}

/// Enforces the collection's single-writer rule: exactly one writer may
/// be building a new snapshot at a time, while readers proceed against
/// whatever snapshot is currently published without blocking on this
/// lock at all (spec.md §6: "per-collection writer-exclusive slot +
/// multi-reader permission").
pub struct WriterSlot {
    lock: Mutex<()>,
}

impl WriterSlot {
    pub fn new() -> Self {
        WriterSlot { lock: Mutex::new(()) }
    }

    pub fn acquire(&self) -> WriterGuard<'_> {
        WriterGuard { _guard: self.lock.lock() }
    }

    pub fn try_acquire(&self) -> Option<WriterGuard<'_>> {
        self.lock.try_lock().map(|guard| WriterGuard { _guard: guard })
    }
}

impl Default for WriterSlot {
    fn default() -> Self {
        Self::new()
    }
}

pub struct WriterGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readers_see_the_previously_published_snapshot_during_a_write() {
        let controller = MVCCController::new(1u32);
        let before = controller.snapshot();
        controller.publish(2);
        let after = controller.snapshot();
        assert_eq!(*before, 1);
        assert_eq!(*after, 2);
    }

    #[test]
    fn writer_slot_rejects_concurrent_acquisition() {
        let slot = WriterSlot::new();
        let _first = slot.acquire();
        assert!(slot.try_acquire().is_none());
    }
}
