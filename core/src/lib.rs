//! Corpus-wide term weighting: an incremental per-document term-vector index
//! and the statistics that turn it into ranked, discriminative feature terms.

pub mod config;
pub mod error;
pub mod index;
pub mod memory;
pub mod persist;
pub mod record;
pub mod retry;
pub mod stats;
pub mod tokenizer;
pub mod types;

pub use config::{AnalyzerConfig, EngineConfig};
pub use error::{ConfigError, IndexError, StatsError, StoreError};
pub use index::CorpusIndex;
pub use memory::MemoryStore;
pub use persist::{CorpusReader, CorpusSnapshot, SledStore, StoreWriter, TermVectorStore};
pub use record::{annotate_record, FeatureRecord, TOP_TERMS_ATTRIBUTE};
pub use retry::RetryPolicy;
pub use stats::compute_top_terms;
pub use tokenizer::Analyzer;
pub use types::{DocId, LocalFrequencies, TermStatistic, TermVector};
