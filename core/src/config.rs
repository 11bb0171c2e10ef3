use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::retry::RetryPolicy;
use crate::tokenizer::{stemmer_algorithm, DEFAULT_STOPWORDS};

/// Behavior of the corpus-wide analyzer used when indexing document text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub min_token_len: usize,
    pub max_token_len: usize,
    pub lowercase: bool,
    pub stopwords: Vec<String>,
    /// Appended to `stopwords` rather than replacing them.
    pub extra_stopwords: Vec<String>,
    /// Snowball language name; `None` because indexed text is already lemmatized.
    pub stemmer: Option<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            min_token_len: 3,
            max_token_len: 80,
            lowercase: true,
            stopwords: DEFAULT_STOPWORDS.iter().map(|s| s.to_string()).collect(),
            extra_stopwords: Vec::new(),
            stemmer: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Length of the ranked term list attached to each feature record.
    pub max_terms: usize,
    pub analyzer: AnalyzerConfig,
    pub retry: RetryPolicy,
    /// Abort the batch on the first failed statistics computation.
    pub strict: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_terms: 100, analyzer: AnalyzerConfig::default(), retry: RetryPolicy::default(), strict: false }
    }
}

impl EngineConfig {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_terms == 0 {
            return Err(ConfigError::Invalid("max_terms must be at least 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        let a = &self.analyzer;
        if a.min_token_len > a.max_token_len {
            return Err(ConfigError::Invalid(format!(
                "analyzer.min_token_len ({}) exceeds analyzer.max_token_len ({})",
                a.min_token_len, a.max_token_len
            )));
        }
        if let Some(lang) = &a.stemmer {
            if stemmer_algorithm(lang).is_none() {
                return Err(ConfigError::Invalid(format!("unsupported stemmer language: {lang}")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let cfg = EngineConfig::from_json("{}").unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.max_terms, 100);
        assert_eq!(cfg.retry.max_attempts, 5);
        assert!(cfg.analyzer.stopwords.iter().any(|w| w == "cover"));
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let cfg = EngineConfig::from_json(r#"{"max_terms": 50, "analyzer": {"min_token_len": 2}}"#).unwrap();
        assert_eq!(cfg.max_terms, 50);
        assert_eq!(cfg.analyzer.min_token_len, 2);
        assert_eq!(cfg.analyzer.max_token_len, 80);
    }

    #[test]
    fn rejects_inverted_length_bounds() {
        let err = EngineConfig::from_json(r#"{"analyzer": {"min_token_len": 10, "max_token_len": 4}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_unknown_stemmer() {
        let err = EngineConfig::from_json(r#"{"analyzer": {"stemmer": "klingon"}}"#).unwrap_err();
        assert!(err.to_string().contains("klingon"));
    }

    #[test]
    fn reads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        fs::write(&path, r#"{"strict": true}"#).unwrap();
        assert!(EngineConfig::from_path(&path).unwrap().strict);
        assert!(matches!(EngineConfig::from_path(dir.path().join("missing.json")), Err(ConfigError::Io { .. })));
    }
}
