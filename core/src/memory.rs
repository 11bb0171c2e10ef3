use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::StoreError;
use crate::persist::{CorpusSnapshot, StoreWriter, TermVectorStore};
use crate::types::TermVector;

/// Process-local store with the same write-session semantics as the sled
/// store: writers in this process queue for the session, and lock contention
/// from another writer can be simulated with [`MemoryStore::fail_next_locks`].
/// Clones share state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    write_gate: Arc<Mutex<()>>,
}

#[derive(Default)]
struct Inner {
    vectors: HashMap<String, TermVector>,
    forced_lock_failures: u32,
    lock_attempts: u32,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Makes the next `n` writer opens fail as if another writer held the lock.
    pub fn fail_next_locks(&self, n: u32) {
        self.inner.lock().forced_lock_failures = n;
    }

    /// Total number of writer opens attempted so far.
    pub fn lock_attempts(&self) -> u32 { self.inner.lock().lock_attempts }

    fn locked() -> StoreError { StoreError::Locked { path: PathBuf::from(":memory:") } }
}

impl TermVectorStore for MemoryStore {
    type Writer = MemoryWriter;

    fn open_writer(&self) -> Result<MemoryWriter, StoreError> {
        {
            let mut inner = self.inner.lock();
            inner.lock_attempts += 1;
            if inner.forced_lock_failures > 0 {
                inner.forced_lock_failures -= 1;
                return Err(Self::locked());
            }
        }
        let gate = self.write_gate.lock_arc();
        Ok(MemoryWriter { store: self.clone(), staged: Vec::new(), _gate: gate })
    }

    fn snapshot(&self) -> Result<CorpusSnapshot, StoreError> {
        let vectors = self.inner.lock().vectors.clone();
        Ok(CorpusSnapshot::from_vectors(vectors))
    }
}

enum Staged {
    Replace(String, TermVector),
    Clear,
}

/// Buffers changes until commit; dropping without commit discards them.
pub struct MemoryWriter {
    store: MemoryStore,
    staged: Vec<Staged>,
    _gate: ArcMutexGuard<RawMutex, ()>,
}

impl StoreWriter for MemoryWriter {
    fn replace(&mut self, doc_id: &str, vector: &TermVector) -> Result<(), StoreError> {
        self.staged.push(Staged::Replace(doc_id.to_string(), vector.clone()));
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.staged.push(Staged::Clear);
        Ok(())
    }

    fn commit(self) -> Result<(), StoreError> {
        let mut inner = self.store.inner.lock();
        for op in self.staged {
            match op {
                Staged::Replace(id, vector) => { inner.vectors.insert(id, vector); }
                Staged::Clear => inner.vectors.clear(),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::CorpusReader;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn second_writer_waits_for_the_first() {
        let store = MemoryStore::new();
        let mut first = store.open_writer().unwrap();
        first.replace("a", &TermVector::from([("hund".to_string(), 1)])).unwrap();

        thread::scope(|s| {
            let waiting = s.spawn(|| {
                let mut second = store.open_writer().unwrap();
                second.replace("b", &TermVector::from([("katze".to_string(), 1)])).unwrap();
                second.commit().unwrap();
            });
            thread::sleep(Duration::from_millis(20));
            assert_eq!(store.snapshot().unwrap().document_count().unwrap(), 0);
            first.commit().unwrap();
            waiting.join().unwrap();
        });
        assert_eq!(store.snapshot().unwrap().document_count().unwrap(), 2);
    }

    #[test]
    fn simulated_contention_reports_locked() {
        let store = MemoryStore::new();
        store.fail_next_locks(1);
        assert!(store.open_writer().err().unwrap().is_locked());
        assert!(store.open_writer().is_ok());
        assert_eq!(store.lock_attempts(), 2);
    }

    #[test]
    fn uncommitted_changes_are_discarded() {
        let store = MemoryStore::new();
        let mut writer = store.open_writer().unwrap();
        writer.replace("a", &TermVector::from([("hund".to_string(), 1)])).unwrap();
        drop(writer);
        assert_eq!(store.snapshot().unwrap().document_count().unwrap(), 0);
    }

    #[test]
    fn snapshot_is_isolated_from_later_commits() {
        let store = MemoryStore::new();
        let snap = store.snapshot().unwrap();
        let mut writer = store.open_writer().unwrap();
        writer.replace("a", &TermVector::from([("hund".to_string(), 1)])).unwrap();
        writer.commit().unwrap();
        assert_eq!(snap.document_count().unwrap(), 0);
        assert_eq!(store.snapshot().unwrap().document_count().unwrap(), 1);
    }
}
