//! Term vector storage.
//!
//! A store maps document identifiers to their [`TermVector`]. Corpus
//! statistics (document count, document frequency) are never stored; they are
//! derived from the vectors whenever a [`CorpusSnapshot`] is taken.

use parking_lot::{ArcMutexGuard, Mutex, RawMutex, RwLock};
use std::collections::HashMap;
use std::fs::create_dir_all;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::StoreError;
use crate::types::TermVector;

const VECTORS_TREE: &str = "term_vectors";

/// Read access used by the statistics phase.
pub trait CorpusReader {
    fn document_count(&self) -> Result<u64, StoreError>;
    /// Number of documents containing `term` at least once.
    fn document_frequency(&self, term: &str) -> Result<u64, StoreError>;
    /// `None` when `doc_id` was never written.
    fn term_vector(&self, doc_id: &str) -> Result<Option<TermVector>, StoreError>;
}

/// An exclusive write session. Dropping the writer releases the store lock;
/// changes are guaranteed durable only after [`StoreWriter::commit`].
pub trait StoreWriter {
    fn replace(&mut self, doc_id: &str, vector: &TermVector) -> Result<(), StoreError>;
    fn clear(&mut self) -> Result<(), StoreError>;
    fn commit(self) -> Result<(), StoreError>;
}

pub trait TermVectorStore {
    type Writer: StoreWriter;

    /// Fails with [`StoreError::Locked`] while another writer holds the store.
    fn open_writer(&self) -> Result<Self::Writer, StoreError>;

    /// Captures the committed state; later writes are not visible through it.
    fn snapshot(&self) -> Result<CorpusSnapshot, StoreError>;
}

/// Point-in-time, in-memory view of the corpus.
#[derive(Debug, Clone, Default)]
pub struct CorpusSnapshot {
    vectors: HashMap<String, TermVector>,
    document_frequencies: HashMap<String, u64>,
}

impl CorpusSnapshot {
    pub fn from_vectors<I>(vectors: I) -> Self
    where
        I: IntoIterator<Item = (String, TermVector)>,
    {
        let vectors: HashMap<String, TermVector> = vectors.into_iter().collect();
        let mut document_frequencies: HashMap<String, u64> = HashMap::new();
        for vector in vectors.values() {
            for (term, count) in vector {
                if *count > 0 {
                    *document_frequencies.entry(term.clone()).or_insert(0) += 1;
                }
            }
        }
        Self { vectors, document_frequencies }
    }

    pub fn vocabulary_size(&self) -> usize { self.document_frequencies.len() }

    /// Every indexed term with its document frequency, sorted by term.
    pub fn terms(&self) -> Vec<(&str, u64)> {
        let mut terms: Vec<(&str, u64)> = self.document_frequencies.iter().map(|(t, df)| (t.as_str(), *df)).collect();
        terms.sort_unstable_by(|a, b| a.0.cmp(b.0));
        terms
    }

    /// Every document with its distinct term count, sorted by identifier.
    pub fn documents(&self) -> Vec<(&str, usize)> {
        let mut docs: Vec<(&str, usize)> = self.vectors.iter().map(|(id, v)| (id.as_str(), v.len())).collect();
        docs.sort_unstable_by(|a, b| a.0.cmp(b.0));
        docs
    }
}

impl CorpusReader for CorpusSnapshot {
    fn document_count(&self) -> Result<u64, StoreError> { Ok(self.vectors.len() as u64) }

    fn document_frequency(&self, term: &str) -> Result<u64, StoreError> {
        Ok(self.document_frequencies.get(term).copied().unwrap_or(0))
    }

    fn term_vector(&self, doc_id: &str) -> Result<Option<TermVector>, StoreError> {
        Ok(self.vectors.get(doc_id).cloned())
    }
}

/// Term vectors persisted in a sled database directory.
///
/// The database is opened on first use and then shared by every clone of the
/// store. sled holds an exclusive file lock for as long as it is open, so
/// [`StoreError::Locked`] only ever reports another process. Write sessions
/// within this process queue on an in-process gate instead, and commits are
/// applied atomically with respect to snapshot loads.
#[derive(Clone)]
pub struct SledStore {
    root: PathBuf,
    handle: Arc<Mutex<Option<(sled::Db, sled::Tree)>>>,
    write_gate: Arc<Mutex<()>>,
    commit_gate: Arc<RwLock<()>>,
}

impl SledStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            handle: Arc::new(Mutex::new(None)),
            write_gate: Arc::new(Mutex::new(())),
            commit_gate: Arc::new(RwLock::new(())),
        }
    }

    pub fn root(&self) -> &Path { &self.root }

    /// The shared term vector tree, opening the database if needed.
    fn tree(&self) -> Result<sled::Tree, StoreError> {
        let mut handle = self.handle.lock();
        if let Some((_, tree)) = handle.as_ref() {
            return Ok(tree.clone());
        }
        create_dir_all(&self.root)?;
        let db = sled::open(&self.root).map_err(|e| self.classify(e))?;
        let tree = db.open_tree(VECTORS_TREE)?;
        tracing::debug!(root = %self.root.display(), "opened term vector store");
        *handle = Some((db, tree.clone()));
        Ok(tree)
    }

    fn classify(&self, err: sled::Error) -> StoreError {
        match err {
            sled::Error::Io(ref io) if is_lock_contention(io) => StoreError::Locked { path: self.root.clone() },
            other => StoreError::Sled(other),
        }
    }
}

fn is_lock_contention(err: &std::io::Error) -> bool {
    err.kind() == ErrorKind::WouldBlock || err.to_string().contains("could not acquire lock")
}

fn decode_vector(raw: &[u8]) -> Result<TermVector, StoreError> {
    Ok(bincode::deserialize(raw)?)
}

impl TermVectorStore for SledStore {
    type Writer = SledWriter;

    fn open_writer(&self) -> Result<SledWriter, StoreError> {
        let tree = self.tree()?;
        let gate = self.write_gate.lock_arc();
        Ok(SledWriter { tree, commit_gate: self.commit_gate.clone(), batch: sled::Batch::default(), clear: false, _gate: gate })
    }

    fn snapshot(&self) -> Result<CorpusSnapshot, StoreError> {
        let tree = self.tree()?;
        let _committed = self.commit_gate.read();
        let mut vectors = Vec::new();
        for item in tree.iter() {
            let (key, value) = item?;
            let doc_id = String::from_utf8(key.to_vec())
                .map_err(|_| StoreError::Corrupt(format!("non UTF-8 document id {:?}", key.as_ref())))?;
            vectors.push((doc_id, decode_vector(&value)?));
        }
        tracing::debug!(root = %self.root.display(), documents = vectors.len(), "loaded corpus snapshot");
        Ok(CorpusSnapshot::from_vectors(vectors))
    }
}

/// Stages changes in a [`sled::Batch`]; nothing reaches the tree before
/// [`StoreWriter::commit`].
pub struct SledWriter {
    tree: sled::Tree,
    commit_gate: Arc<RwLock<()>>,
    batch: sled::Batch,
    clear: bool,
    _gate: ArcMutexGuard<RawMutex, ()>,
}

impl StoreWriter for SledWriter {
    fn replace(&mut self, doc_id: &str, vector: &TermVector) -> Result<(), StoreError> {
        let bytes = bincode::serialize(vector)?;
        self.batch.insert(doc_id.as_bytes(), bytes);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.batch = sled::Batch::default();
        self.clear = true;
        Ok(())
    }

    fn commit(self) -> Result<(), StoreError> {
        let SledWriter { tree, commit_gate, batch, clear, _gate } = self;
        {
            let _applying = commit_gate.write();
            if clear {
                tree.clear()?;
            }
            tree.apply_batch(batch)?;
        }
        tree.flush()?;
        Ok(())
    }
}
