//! TF-IDF vectorization over condensation units.
//!
//! Tokens are lowercase runs of two or more word chars, English stop words
//! removed. Weights use raw term counts and smoothed idf
//! `ln((1 + n) / (1 + df)) + 1`, and each row is L2-normalized. The
//! vocabulary is sorted so vectors are reproducible across runs.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use super::CondenseError;

static TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w\w+\b").unwrap());

static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "a", "about", "above", "across", "after", "afterwards", "again", "against", "all",
        "almost", "alone", "along", "already", "also", "although", "always", "am", "among",
        "amongst", "an", "and", "another", "any", "anyhow", "anyone", "anything", "anyway",
        "anywhere", "are", "around", "as", "at", "back", "be", "became", "because", "become",
        "becomes", "becoming", "been", "before", "beforehand", "behind", "being", "below",
        "beside", "besides", "between", "beyond", "both", "but", "by", "can", "cannot",
        "could", "do", "done", "down", "due", "during", "each", "eg", "either", "else",
        "elsewhere", "enough", "etc", "even", "ever", "every", "everyone", "everything",
        "everywhere", "except", "few", "for", "former", "formerly", "from", "further", "get",
        "give", "go", "had", "has", "hasnt", "have", "he", "hence", "her", "here", "hereafter",
        "hereby", "herein", "hers", "herself", "him", "himself", "his", "how", "however", "ie",
        "if", "in", "indeed", "into", "is", "it", "its", "itself", "keep", "last", "latter",
        "least", "less", "ltd", "made", "many", "may", "me", "meanwhile", "might", "more",
        "moreover", "most", "mostly", "much", "must", "my", "myself", "namely", "neither",
        "never", "nevertheless", "next", "no", "nobody", "none", "noone", "nor", "not",
        "nothing", "now", "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto",
        "or", "other", "others", "otherwise", "our", "ours", "ourselves", "out", "over", "own",
        "per", "perhaps", "please", "put", "rather", "re", "same", "see", "seem", "seemed",
        "seeming", "seems", "several", "she", "should", "since", "so", "some", "somehow",
        "someone", "something", "sometime", "sometimes", "somewhere", "still", "such", "than",
        "that", "the", "their", "them", "themselves", "then", "thence", "there", "thereafter",
        "thereby", "therefore", "therein", "thereupon", "these", "they", "this", "those",
        "though", "through", "throughout", "thru", "thus", "to", "together", "too", "toward",
        "towards", "under", "until", "up", "upon", "us", "very", "via", "was", "we", "well",
        "were", "what", "whatever", "when", "whence", "whenever", "where", "whereafter",
        "whereas", "whereby", "wherein", "whereupon", "wherever", "whether", "which", "while",
        "whither", "who", "whoever", "whole", "whom", "whose", "why", "will", "with", "within",
        "without", "would", "yet", "you", "your", "yours", "yourself", "yourselves",
    ]
    .into_iter()
    .collect()
});

/// Lowercased, stop-word-filtered tokens of one unit.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    TOKEN
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|token| !STOP_WORDS.contains(*token))
        .map(str::to_string)
        .collect()
}

/// Dense TF-IDF matrix, one L2-normalized row per unit.
#[derive(Debug, Clone)]
pub struct TfIdfMatrix {
    pub vocabulary: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl TfIdfMatrix {
    pub fn fit(units: &[String]) -> Result<Self, CondenseError> {
        let tokenized: Vec<Vec<String>> = units.iter().map(|u| tokenize(u)).collect();

        // term -> document frequency; BTreeMap keeps column order stable.
        let mut doc_freq: BTreeMap<&str, usize> = BTreeMap::new();
        for tokens in &tokenized {
            let distinct: HashSet<&str> = tokens.iter().map(String::as_str).collect();
            for term in distinct {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }
        if doc_freq.is_empty() {
            return Err(CondenseError::EmptyVocabulary);
        }

        let n = units.len() as f64;
        let column: BTreeMap<&str, usize> = doc_freq
            .keys()
            .enumerate()
            .map(|(i, term)| (*term, i))
            .collect();
        let idf: Vec<f64> = doc_freq
            .values()
            .map(|&df| ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0)
            .collect();

        let rows = tokenized
            .iter()
            .map(|tokens| {
                let mut row = vec![0.0; idf.len()];
                for token in tokens {
                    if let Some(&col) = column.get(token.as_str()) {
                        row[col] += 1.0;
                    }
                }
                for (weight, idf) in row.iter_mut().zip(&idf) {
                    *weight *= idf;
                }
                let norm = row.iter().map(|w| w * w).sum::<f64>().sqrt();
                if norm > 0.0 {
                    row.iter_mut().for_each(|w| *w /= norm);
                }
                row
            })
            .collect();

        let vocabulary = doc_freq.keys().map(|t| t.to_string()).collect();
        Ok(Self { vocabulary, rows })
    }

    /// Sum of a unit's weights: the salience score for top-N selection.
    pub fn row_score(&self, index: usize) -> f64 {
        self.rows.get(index).map(|r| r.iter().sum()).unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
