use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

use crate::config::AnalyzerConfig;
use crate::error::ConfigError;
use crate::types::TermVector;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*").expect("valid regex");
}

/// German stop set plus a few corpus-specific fillers ("dass", "schon", "mehr", "cover").
pub const DEFAULT_STOPWORDS: &[&str] = &[
    "aber","alle","allem","allen","aller","alles","als","also","am","an","ander","andere","anderem","anderen","anderer","anderes","anderm","andern","anders",
    "auch","auf","aus","bei","bin","bis","bist","da","damit","dann","der","den","des","dem","die","das","daß","derselbe","derselben","denselben",
    "desselben","demselben","dieselbe","dieselben","dasselbe","dazu","dein","deine","deinem","deinen","deiner","deines","denn","derer","dessen",
    "dich","dir","du","dies","diese","diesem","diesen","dieser","dieses","doch","dort","durch",
    "ein","eine","einem","einen","einer","eines","einig","einige","einigem","einigen","einiger","einiges","einmal","er","ihn","ihm","es","etwas",
    "euer","eure","eurem","euren","eurer","eures","für","gegen","gewesen","hab","habe","haben","hat","hatte","hatten","hier","hin","hinter",
    "ich","mich","mir","ihr","ihre","ihrem","ihren","ihrer","ihres","euch","im","in","indem","ins","ist",
    "jede","jedem","jeden","jeder","jedes","jene","jenem","jenen","jener","jenes","jetzt","kann","kein","keine","keinem","keinen","keiner","keines",
    "können","könnte","machen","man","manche","manchem","manchen","mancher","manches","mein","meine","meinem","meinen","meiner","meines","mit","muss","musste",
    "nach","nicht","nichts","noch","nun","nur","ob","oder","ohne","sehr","sein","seine","seinem","seinen","seiner","seines","selbst","sich","sie","ihnen",
    "sind","so","solche","solchem","solchen","solcher","solches","soll","sollte","sondern","sonst","über","um","und","uns","unsere","unserem","unseren",
    "unser","unseres","unter","viel","vom","von","vor","während","war","waren","warst","was","weg","weil","weiter","welche","welchem","welchen","welcher",
    "welches","wenn","werde","werden","wie","wieder","will","wir","wird","wirst","wo","wollen","wollte","würde","würden","zu","zum","zur","zwar","zwischen",
    "dass","schon","mehr","cover",
];

/// Maps a language name (or ISO 639-1 code) to a snowball stemmer.
pub fn stemmer_algorithm(lang: &str) -> Option<Algorithm> {
    let algo = match lang.to_lowercase().as_str() {
        "de" | "german" => Algorithm::German,
        "en" | "english" => Algorithm::English,
        "fr" | "french" => Algorithm::French,
        "es" | "spanish" => Algorithm::Spanish,
        "it" | "italian" => Algorithm::Italian,
        "nl" | "dutch" => Algorithm::Dutch,
        "pt" | "portuguese" => Algorithm::Portuguese,
        "sv" | "swedish" => Algorithm::Swedish,
        "da" | "danish" => Algorithm::Danish,
        "no" | "norwegian" => Algorithm::Norwegian,
        "fi" | "finnish" => Algorithm::Finnish,
        "ru" | "russian" => Algorithm::Russian,
        _ => return None,
    };
    Some(algo)
}

/// The corpus-wide analyzer: NFKC normalization, optional case folding,
/// token length filter, stop-word removal and optional stemming.
pub struct Analyzer {
    min_len: usize,
    max_len: usize,
    lowercase: bool,
    stopwords: HashSet<String>,
    stemmer: Option<Stemmer>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self {
            min_len: 3,
            max_len: 80,
            lowercase: true,
            stopwords: DEFAULT_STOPWORDS.iter().map(|s| s.to_string()).collect(),
            stemmer: None,
        }
    }
}

impl Analyzer {
    pub fn from_config(cfg: &AnalyzerConfig) -> Result<Self, ConfigError> {
        let stemmer = match &cfg.stemmer {
            Some(lang) => {
                let algo = stemmer_algorithm(lang)
                    .ok_or_else(|| ConfigError::Invalid(format!("unsupported stemmer language: {lang}")))?;
                Some(Stemmer::create(algo))
            }
            None => None,
        };
        let stopwords = cfg
            .stopwords
            .iter()
            .chain(cfg.extra_stopwords.iter())
            .map(|w| if cfg.lowercase { w.to_lowercase() } else { w.clone() })
            .collect();
        Ok(Self { min_len: cfg.min_token_len, max_len: cfg.max_token_len, lowercase: cfg.lowercase, stopwords, stemmer })
    }

    fn is_stopword(&self, token: &str) -> bool { self.stopwords.contains(token) }

    /// Produces the indexed terms of `text` in document order.
    pub fn analyze(&self, text: &str) -> Vec<String> {
        let mut normalized = text.nfkc().collect::<String>();
        if self.lowercase {
            normalized = normalized.to_lowercase();
        }
        let mut terms = Vec::new();
        for mat in RE.find_iter(&normalized) {
            let token = mat.as_str();
            let len = token.chars().count();
            if len < self.min_len || len > self.max_len { continue; }
            if self.is_stopword(token) { continue; }
            let term = match &self.stemmer {
                Some(stemmer) => stemmer.stem(token).into_owned(),
                None => token.to_string(),
            };
            terms.push(term);
        }
        terms
    }

    /// Counts the analyzed terms of `text`.
    pub fn term_vector(&self, text: &str) -> TermVector {
        let mut vector = TermVector::new();
        for term in self.analyze(text) {
            *vector.entry(term).or_insert(0) += 1;
        }
        vector
    }
}
