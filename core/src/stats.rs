//! Corpus-relative term weighting for a single document.

use crate::error::{StatsError, StoreError};
use crate::persist::CorpusReader;
use crate::types::{LocalFrequencies, TermStatistic};

/// Fraction of the corpus above which a term is considered near-universal.
const MAX_DOC_FREQ_RATIO: f64 = 0.9;

/// Document-frequency window for a corpus of `n` documents. A term is
/// kept only when `min < df < max`.
pub fn document_frequency_bounds(n: u64) -> (u64, f64) {
    let min = 2 + u64::from(n.max(1).ilog10());
    (min, MAX_DOC_FREQ_RATIO * n as f64)
}

/// `1 + ln(N / df + 1)`, where `N / df` is an integer quotient.
pub fn inverse_document_frequency(n: u64, df: u64) -> f64 {
    1.0 + ((n / df.max(1)) as f64 + 1.0).ln()
}

/// Ranks the terms of `doc_id` by `sqrt(tf) * idf / sqrt(total_tokens)` and
/// returns at most `max_terms` of them, best first.
///
/// Which terms exist comes from the corpus index; how often they occur comes
/// from `local`. Terms the index knows but `local` does not are skipped. A
/// document missing from the index yields an empty list.
pub fn compute_top_terms<R>(
    doc_id: &str,
    local: &LocalFrequencies,
    reader: &R,
    max_terms: usize,
) -> Result<Vec<TermStatistic>, StatsError>
where
    R: CorpusReader + ?Sized,
{
    let unavailable = |source: StoreError| StatsError::CorpusUnavailable { doc_id: doc_id.to_string(), source };

    let Some(vector) = reader.term_vector(doc_id).map_err(unavailable)? else {
        tracing::debug!(doc_id, "document not found in corpus index");
        return Ok(Vec::new());
    };

    let n = reader.document_count().map_err(unavailable)?;
    let (min_df, max_df) = document_frequency_bounds(n);
    let normalization_factor = 1.0 / (local.total_tokens.max(1) as f64).sqrt();

    let mut ranked = Vec::with_capacity(vector.len());
    let mut mismatched = 0usize;
    for term in vector.keys() {
        let Some(&tf) = local.lemmas.get(term) else {
            mismatched += 1;
            tracing::debug!(doc_id, term = term.as_str(), "indexed term missing from local lemma frequencies");
            continue;
        };
        let df = reader.document_frequency(term).map_err(unavailable)?;
        if df <= min_df || df as f64 >= max_df {
            continue;
        }
        ranked.push(TermStatistic {
            term: term.clone(),
            term_frequency: tf,
            idf: inverse_document_frequency(n, df),
            normalization_factor,
        });
    }

    ranked.sort_by(|a, b| a.rank_cmp(b));
    let candidates = ranked.len();
    ranked.truncate(max_terms);
    tracing::debug!(doc_id, corpus_size = n, min_df, max_df, candidates, kept = ranked.len(), mismatched, "ranked document terms");
    Ok(ranked)
}
