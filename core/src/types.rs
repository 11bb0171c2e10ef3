use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Corpus-unique, opaque document identifier.
pub type DocId = String;

/// Indexed term -> occurrence count for one document. Sorted so that the
/// encoded form of a vector is stable.
pub type TermVector = BTreeMap<String, u32>;

/// Per-document lemma statistics supplied by the linguistic annotator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalFrequencies {
    /// Lemma -> occurrences within the document.
    pub lemmas: HashMap<String, u32>,
    /// Total token count of the document, used for length normalization.
    pub total_tokens: u64,
}

impl LocalFrequencies {
    pub fn new(lemmas: HashMap<String, u32>, total_tokens: u64) -> Self {
        Self { lemmas, total_tokens }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermStatistic {
    pub term: String,
    pub term_frequency: u32,
    pub idf: f64,
    pub normalization_factor: f64,
}

impl TermStatistic {
    /// `sqrt(tf) * idf * norm`
    pub fn normalized_score(&self) -> f64 {
        f64::from(self.term_frequency).sqrt() * self.idf * self.normalization_factor
    }

    /// Ranking order: descending score, exact ties broken by ascending term.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .normalized_score()
            .total_cmp(&self.normalized_score())
            .then_with(|| self.term.cmp(&other.term))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(term: &str, tf: u32, idf: f64) -> TermStatistic {
        TermStatistic { term: term.into(), term_frequency: tf, idf, normalization_factor: 0.5 }
    }

    #[test]
    fn score_combines_sqrt_tf_idf_and_norm() {
        let s = stat("hund", 4, 3.0);
        assert!((s.normalized_score() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn ties_fall_back_to_term_order() {
        let a = stat("apfel", 1, 2.0);
        let b = stat("birne", 1, 2.0);
        assert_eq!(a.rank_cmp(&b), Ordering::Less);
        assert_eq!(b.rank_cmp(&a), Ordering::Greater);
        let high = stat("zebra", 9, 2.0);
        assert_eq!(high.rank_cmp(&a), Ordering::Less);
    }
}
