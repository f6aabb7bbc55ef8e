//! Term-frequency / inverse-document-frequency text features.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Lowercased word tokens of at least two characters.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|token| token.chars().count() >= 2)
        .map(str::to_lowercase)
        .collect()
}

/// Vocabulary plus smoothed idf weights; rows are l2-normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    max_features: usize,
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    pub fn new(max_features: usize) -> Self {
        Self {
            max_features,
            vocabulary: BTreeMap::new(),
            idf: Vec::new(),
        }
    }

    pub fn vocabulary_len(&self) -> usize {
        self.idf.len()
    }

    /// Learn the vocabulary and idf weights, then transform `documents`.
    ///
    /// When the corpus has more distinct terms than `max_features`, the most
    /// frequent terms across the corpus are kept (ties broken alphabetically).
    pub fn fit_transform(&mut self, documents: &[String]) -> Vec<Vec<f64>> {
        let tokenized: Vec<Vec<String>> = documents.iter().map(|d| tokenize(d)).collect();

        let mut term_counts: HashMap<&str, usize> = HashMap::new();
        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for tokens in &tokenized {
            let mut seen: Vec<&str> = Vec::new();
            for token in tokens {
                *term_counts.entry(token.as_str()).or_default() += 1;
                if !seen.contains(&token.as_str()) {
                    seen.push(token.as_str());
                    *doc_freq.entry(token.as_str()).or_default() += 1;
                }
            }
        }

        let mut ranked: Vec<(&str, usize)> = term_counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(self.max_features);

        let mut kept: Vec<&str> = ranked.into_iter().map(|(term, _)| term).collect();
        kept.sort_unstable();

        let n_docs = documents.len() as f64;
        self.vocabulary = kept
            .iter()
            .enumerate()
            .map(|(index, term)| (term.to_string(), index))
            .collect();
        self.idf = kept
            .iter()
            .map(|term| {
                let df = doc_freq.get(term).copied().unwrap_or(0) as f64;
                ((1.0 + n_docs) / (1.0 + df)).ln() + 1.0
            })
            .collect();

        tokenized.iter().map(|tokens| self.vectorize(tokens)).collect()
    }

    pub fn transform(&self, document: &str) -> Vec<f64> {
        self.vectorize(&tokenize(document))
    }

    fn vectorize(&self, tokens: &[String]) -> Vec<f64> {
        let mut row = vec![0.0; self.idf.len()];
        for token in tokens {
            if let Some(&index) = self.vocabulary.get(token) {
                row[index] += 1.0;
            }
        }
        for (value, idf) in row.iter_mut().zip(&self.idf) {
            *value *= idf;
        }

        let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            row.iter_mut().for_each(|v| *v /= norm);
        }
        row
    }
}
