//! The corpus index manager: the only entry point that writes term vectors.

use std::path::Path;

use crate::config::EngineConfig;
use crate::error::{ConfigError, IndexError, StoreError};
use crate::persist::{CorpusSnapshot, SledStore, StoreWriter, TermVectorStore};
use crate::retry::{retry_on_lock, RetryPolicy};
use crate::tokenizer::Analyzer;
use crate::types::TermVector;

pub struct CorpusIndex<S: TermVectorStore> {
    store: S,
    analyzer: Analyzer,
    retry: RetryPolicy,
}

impl CorpusIndex<SledStore> {
    /// Opens (lazily) a sled-backed index at `path` configured from `config`.
    pub fn open<P: AsRef<Path>>(path: P, config: &EngineConfig) -> Result<Self, ConfigError> {
        let analyzer = Analyzer::from_config(&config.analyzer)?;
        Ok(Self::new(SledStore::new(path), analyzer, config.retry.clone()))
    }
}

impl<S: TermVectorStore> CorpusIndex<S> {
    pub fn new(store: S, analyzer: Analyzer, retry: RetryPolicy) -> Self {
        Self { store, analyzer, retry }
    }

    pub fn store(&self) -> &S { &self.store }
    pub fn analyzer(&self) -> &Analyzer { &self.analyzer }

    /// Analyzes `text` and stores the result as the full term vector of
    /// `doc_id`, replacing any earlier vector for that identifier. Returns the
    /// number of distinct terms written.
    pub fn add_or_replace(&self, doc_id: &str, text: &str) -> Result<usize, IndexError> {
        if doc_id.is_empty() {
            return Err(IndexError::InvalidDocumentId);
        }
        let vector = self.analyzer.term_vector(text);
        if vector.is_empty() {
            tracing::debug!(doc_id, "document produced no indexed terms");
        }
        let terms = vector.len();
        self.with_writer(doc_id, |writer| writer.replace(doc_id, &vector))?;
        tracing::debug!(doc_id, terms, "indexed document");
        Ok(terms)
    }

    /// Writes a batch of `(doc_id, text)` pairs under a single lock
    /// acquisition. Nothing is written if any identifier is empty.
    pub fn add_or_replace_many<'a, I>(&self, docs: I) -> Result<usize, IndexError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut vectors: Vec<(&str, TermVector)> = Vec::new();
        for (doc_id, text) in docs {
            if doc_id.is_empty() {
                return Err(IndexError::InvalidDocumentId);
            }
            vectors.push((doc_id, self.analyzer.term_vector(text)));
        }
        let subject = format!("batch of {} documents", vectors.len());
        self.with_writer(&subject, |writer| {
            for (doc_id, vector) in &vectors {
                writer.replace(doc_id, vector)?;
            }
            Ok(())
        })?;
        Ok(vectors.len())
    }

    /// Snapshot of everything committed so far, for the statistics phase.
    pub fn open_for_reading(&self) -> Result<CorpusSnapshot, IndexError> {
        retry_on_lock(&self.retry, "corpus snapshot", || self.store.snapshot()).map_err(IndexError::CorpusUnavailable)
    }

    /// Deletes every term vector.
    pub fn reset(&self) -> Result<(), IndexError> {
        self.with_writer("reset", |writer| writer.clear())
    }

    fn with_writer<F>(&self, subject: &str, apply: F) -> Result<(), IndexError>
    where
        F: FnOnce(&mut S::Writer) -> Result<(), StoreError>,
    {
        let mut writer = retry_on_lock(&self.retry, subject, || self.store.open_writer()).map_err(|e| match e {
            StoreError::Locked { .. } => IndexError::LockTimeout { subject: subject.to_string(), attempts: self.retry.attempts() },
            other => IndexError::Store(other),
        })?;
        apply(&mut writer)?;
        writer.commit()?;
        Ok(())
    }
}
