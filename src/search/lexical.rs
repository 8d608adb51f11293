//! Keyword side of hybrid search: tokenizer and an Okapi BM25 index.
//!
//! Documents are addressed by insertion position, which matches the chunk
//! position in [`VectorIndex`](super::VectorIndex). The index is append-only.

use std::collections::HashMap;

/// Term frequency saturation
pub const BM25_K1: f64 = 1.5;
/// Length normalization strength
pub const BM25_B: f64 = 0.75;

/// Lowercased alphanumeric runs longer than two characters.
/// Purely numeric tokens are dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| s.chars().count() > 2)
        .filter(|s| !s.chars().all(|c| c.is_numeric()))
        .map(|s| s.to_lowercase())
        .collect()
}

#[derive(Debug, Default, Clone)]
pub struct KeywordIndex {
    /// term -> ids of documents containing it, ascending
    postings: HashMap<String, Vec<usize>>,
    /// per-document term counts
    term_counts: Vec<HashMap<String, u32>>,
    doc_lengths: Vec<usize>,
    avg_doc_length: f64,
}

impl KeywordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.doc_lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_lengths.is_empty()
    }

    /// Add documents in order; ids continue from the current length.
    pub fn add_documents<'a>(&mut self, texts: impl IntoIterator<Item = &'a str>) {
        for text in texts {
            let doc_id = self.doc_lengths.len();
            let tokens = tokenize(text);

            let mut counts: HashMap<String, u32> = HashMap::new();
            for token in &tokens {
                *counts.entry(token.clone()).or_insert(0) += 1;
            }
            for term in counts.keys() {
                self.postings.entry(term.clone()).or_default().push(doc_id);
            }

            self.doc_lengths.push(tokens.len());
            self.term_counts.push(counts);
        }

        let total: usize = self.doc_lengths.iter().sum();
        self.avg_doc_length = if self.doc_lengths.is_empty() {
            0.0
        } else {
            total as f64 / self.doc_lengths.len() as f64
        };
    }

    pub fn doc_length(&self, doc_id: usize) -> Option<usize> {
        self.doc_lengths.get(doc_id).copied()
    }

    pub fn avg_doc_length(&self) -> f64 {
        self.avg_doc_length
    }

    pub fn total_tokens(&self) -> usize {
        self.doc_lengths.iter().sum()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.postings.len()
    }

    /// BM25 score of every document for `query`, divided by the best score
    /// so the result lies in [0, 1]. Non-matching documents score 0.
    ///
    /// Every query token contributes, so a repeated term weighs more.
    pub fn score(&self, query: &str) -> Vec<f32> {
        if self.is_empty() {
            return Vec::new();
        }

        let mut scores = vec![0.0f64; self.len()];
        let n = self.len() as f64;

        for term in tokenize(query) {
            let Some(docs) = self.postings.get(&term) else {
                continue;
            };

            let df = docs.len() as f64;
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

            for &doc_id in docs {
                let tf = self.term_counts[doc_id].get(&term).copied().unwrap_or(0) as f64;
                let length_ratio = if self.avg_doc_length > 0.0 {
                    self.doc_lengths[doc_id] as f64 / self.avg_doc_length
                } else {
                    1.0
                };
                let norm = 1.0 - BM25_B + BM25_B * length_ratio;
                scores[doc_id] += idf * (tf * (BM25_K1 + 1.0)) / (tf + BM25_K1 * norm);
            }
        }

        let max = scores.iter().copied().fold(0.0f64, f64::max);
        scores
            .into_iter()
            .map(|s| if max > 0.0 { (s / max) as f32 } else { 0.0 })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(docs: &[&str]) -> KeywordIndex {
        let mut index = KeywordIndex::new();
        index.add_documents(docs.iter().copied());
        index
    }

    #[test]
    fn test_tokenize_basic() {
        assert_eq!(
            tokenize("Hybrid Search, with BM25!"),
            vec!["hybrid", "search", "with", "bm25"]
        );
    }

    #[test]
    fn test_tokenize_drops_short_and_numeric() {
        assert_eq!(tokenize("an ox is in 2024 v2 api"), vec!["api"]);
    }

    #[test]
    fn test_tokenize_unicode() {
        assert_eq!(tokenize("Über café"), vec!["über", "café"]);
    }

    #[test]
    fn test_average_length_tracks_inserts() {
        let mut index = index(&["alpha beta gamma delta"]);
        assert_eq!(index.avg_doc_length(), 4.0);

        index.add_documents(["alpha beta"]);
        assert_eq!(index.avg_doc_length(), 3.0);
        assert_eq!(index.doc_length(1), Some(2));
        assert_eq!(index.total_tokens(), 6);
        assert_eq!(index.vocabulary_size(), 4);
    }

    #[test]
    fn test_score_normalized_to_one() {
        let index = index(&[
            "rust ownership and borrowing",
            "python garbage collection",
            "rust rust rust compiler",
        ]);
        let scores = index.score("rust");

        assert_eq!(scores.len(), 3);
        assert_eq!(scores[1], 0.0);
        let max = scores.iter().copied().fold(0.0f32, f32::max);
        assert!((max - 1.0).abs() < 1e-6);
        assert!(scores[0] > 0.0);
    }

    #[test]
    fn test_higher_tf_scores_higher() {
        let index = index(&["cache cache cache layer", "cache layer with other words"]);
        let scores = index.score("cache");
        assert!(scores[0] > scores[1]);
    }

    #[test]
    fn test_rare_term_outweighs_common_term() {
        let index = index(&[
            "common words and embeddings",
            "common words only here",
            "common words again here",
        ]);
        let scores = index.score("common embeddings");
        assert_eq!(scores[0], 1.0);
        assert!(scores[1] < 0.5);
    }

    #[test]
    fn test_matches_reference_formula() {
        let index = index(&["apple banana", "apple cherry date"]);

        assert_eq!(index.score("banana"), vec![1.0, 0.0]);

        // avg length 2.5: norms 0.85 and 1.15, idf cancels out
        let scores = index.score("apple");
        let expected = (2.5 / (1.0 + 1.5 * 1.15)) / (2.5 / (1.0 + 1.5 * 0.85));
        assert_eq!(scores[0], 1.0);
        assert!((scores[1] as f64 - expected).abs() < 1e-5);
    }

    #[test]
    fn test_repeated_query_terms_add_up() {
        let index = index(&[
            "rust language guide",
            "python language guide",
            "other words entirely",
        ]);
        let scores = index.score("rust rust python");

        assert_eq!(scores[0], 1.0);
        assert!((scores[1] - 0.5).abs() < 1e-6);
        assert_eq!(scores[2], 0.0);
    }

    #[test]
    fn test_no_match_and_empty_index() {
        let index = index(&["alpha beta"]);
        assert_eq!(index.score("zeta"), vec![0.0]);
        assert_eq!(index.score(""), vec![0.0]);
        assert!(KeywordIndex::new().score("alpha").is_empty());
    }
}
