use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures of the underlying term vector store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another writer currently holds the store's exclusive lock.
    #[error("store at {} is locked by another writer", .path.display())]
    Locked { path: PathBuf },

    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("term vector codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("corrupt store entry: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Locked { .. })
    }
}

/// Errors surfaced by the corpus index manager.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The write lock could not be acquired within the retry budget.
    #[error("could not acquire the store write lock for {subject} after {attempts} attempts")]
    LockTimeout { subject: String, attempts: u32 },

    #[error("document identifier must not be empty")]
    InvalidDocumentId,

    /// The store could not be opened or read for the statistics phase.
    #[error("corpus index unavailable: {0}")]
    CorpusUnavailable(#[source] StoreError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors surfaced by the term statistics engine.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("corpus unavailable while ranking terms of {doc_id}: {source}")]
    CorpusUnavailable {
        doc_id: String,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
