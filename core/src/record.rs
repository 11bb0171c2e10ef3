//! Embedding ranked terms into per-document feature records.

use serde_json::{Map, Value};

use crate::config::EngineConfig;
use crate::error::StatsError;
use crate::persist::CorpusReader;
use crate::stats::compute_top_terms;
use crate::types::{LocalFrequencies, TermStatistic};

pub const TOP_TERMS_ATTRIBUTE: &str = "top-idf";
pub const TOP_TERMS_HEADER: &str = "[index] term - normalizedTfIdfValue - idf - term frequency";

/// A feature record that already holds the rest of a document's features.
pub trait FeatureRecord {
    fn insert_attribute(&mut self, name: &str, value: String);
}

impl FeatureRecord for Map<String, Value> {
    fn insert_attribute(&mut self, name: &str, value: String) {
        self.insert(name.to_string(), Value::String(value));
    }
}

/// Header line followed by one `[i] term - score - idf - tf` line per term.
pub fn render_ranked_terms(terms: &[TermStatistic]) -> String {
    let mut out = String::from(TOP_TERMS_HEADER);
    out.push('\n');
    for (i, t) in terms.iter().enumerate() {
        out.push_str(&format!("[{i}] {} - {} - {} - {}\n", t.term, t.normalized_score(), t.idf, t.term_frequency));
    }
    out
}

/// Computes the ranked terms of `doc_id` and stores them in `record` under
/// [`TOP_TERMS_ATTRIBUTE`]. Returns the number of terms attached.
///
/// Outside strict mode a failed computation is logged and leaves the record
/// without the attribute (`Ok(None)`), so one bad document does not stop a batch.
pub fn annotate_record<F, R>(
    record: &mut F,
    doc_id: &str,
    local: &LocalFrequencies,
    reader: &R,
    config: &EngineConfig,
) -> Result<Option<usize>, StatsError>
where
    F: FeatureRecord + ?Sized,
    R: CorpusReader + ?Sized,
{
    match compute_top_terms(doc_id, local, reader, config.max_terms) {
        Ok(terms) => {
            record.insert_attribute(TOP_TERMS_ATTRIBUTE, render_ranked_terms(&terms));
            Ok(Some(terms.len()))
        }
        Err(e) if !config.strict => {
            tracing::warn!(doc_id, error = %e, "skipping ranked terms for document");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::persist::CorpusSnapshot;
    use crate::types::TermVector;
    use std::path::PathBuf;

    fn stat(term: &str, tf: u32, idf: f64) -> TermStatistic {
        TermStatistic { term: term.into(), term_frequency: tf, idf, normalization_factor: 0.5 }
    }

    #[test]
    fn renders_one_line_per_term() {
        let text = render_ranked_terms(&[stat("wald", 4, 2.0), stat("baum", 1, 1.5)]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec![TOP_TERMS_HEADER, "[0] wald - 2 - 2 - 4", "[1] baum - 0.75 - 1.5 - 1"]);
    }

    #[test]
    fn attaches_attribute_to_json_record() {
        let snap = CorpusSnapshot::from_vectors(vec![("a".to_string(), TermVector::new())]);
        let mut record = Map::new();
        record.insert("documentId".into(), Value::String("a".into()));
        let attached = annotate_record(&mut record, "a", &LocalFrequencies::default(), &snap, &EngineConfig::default()).unwrap();
        assert_eq!(attached, Some(0));
        assert_eq!(record[TOP_TERMS_ATTRIBUTE], Value::String(format!("{TOP_TERMS_HEADER}\n")));
    }

    struct Unavailable;

    impl CorpusReader for Unavailable {
        fn document_count(&self) -> Result<u64, StoreError> { Err(self.err()) }
        fn document_frequency(&self, _term: &str) -> Result<u64, StoreError> { Err(self.err()) }
        fn term_vector(&self, _doc_id: &str) -> Result<Option<TermVector>, StoreError> { Err(self.err()) }
    }

    impl Unavailable {
        fn err(&self) -> StoreError { StoreError::Locked { path: PathBuf::from("idx") } }
    }

    #[test]
    fn lenient_mode_leaves_record_untouched() {
        let mut record = Map::new();
        let res = annotate_record(&mut record, "a", &LocalFrequencies::default(), &Unavailable, &EngineConfig::default());
        assert_eq!(res.unwrap(), None);
        assert!(record.is_empty());
    }

    #[test]
    fn strict_mode_propagates() {
        let mut record = Map::new();
        let config = EngineConfig { strict: true, ..EngineConfig::default() };
        let res = annotate_record(&mut record, "a", &LocalFrequencies::default(), &Unavailable, &config);
        assert!(matches!(res, Err(StatsError::CorpusUnavailable { .. })));
        assert!(record.is_empty());
    }
}
