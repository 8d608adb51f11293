//! In-memory chunk store with hybrid semantic + keyword search.
//!
//! Chunks are kept in insertion order; that position is the document id of
//! the keyword index. The structure is append-only and search is a linear
//! scan, which is fine at documentation-site scale.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::providers::AiProvider;
use crate::search::hybrid::{self, semantic_score};
use crate::search::lexical::KeywordIndex;
use crate::search::storage::{IndexFileError, IndexStorage};

/// A chunk of a page together with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageChunk {
    pub page_url: String,
    pub title: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub start_pos: usize,
    pub end_pos: usize,
    /// First heading near the top of the chunk
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// Search result from the vector index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub page_url: String,
    pub title: String,
    pub text: String,
    /// Blended score (0.0 to 1.0)
    pub score: f32,
    pub semantic_score: f32,
    pub keyword_score: f32,
    pub section: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub total_chunks: usize,
    pub total_pages: usize,
    pub avg_chunks_per_page: f64,
    pub total_tokens: usize,
    pub avg_tokens_per_chunk: f64,
    pub vocabulary_size: usize,
}

#[derive(Debug, Default, Clone)]
pub struct VectorIndex {
    chunks: Vec<PageChunk>,
    keywords: KeywordIndex,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[PageChunk] {
        &self.chunks
    }

    /// Append chunks and extend the keyword index with them.
    pub fn add_chunks(&mut self, chunks: Vec<PageChunk>) {
        if chunks.is_empty() {
            return;
        }
        self.keywords
            .add_documents(chunks.iter().map(|chunk| chunk.text.as_str()));
        self.chunks.extend(chunks);
    }

    /// Embed `query` with `provider` and rank.
    ///
    /// If the query cannot be embedded the search falls back to keywords
    /// only instead of failing.
    pub fn search(
        &self,
        query: &str,
        provider: &dyn AiProvider,
        limit: usize,
        semantic_weight: f32,
    ) -> Vec<SearchResult> {
        if self.is_empty() {
            log::warn!("search on empty index query={query:?}");
            return Vec::new();
        }

        let embedding = if semantic_weight > 0.0 && !provider.capabilities().embeddings {
            log::debug!(
                "provider={} has no embeddings; using keyword search only",
                provider.name()
            );
            None
        } else if semantic_weight > 0.0 {
            match provider.embed(query) {
                Ok(embedding) => Some(embedding),
                Err(e) => {
                    log::warn!(
                        "query embedding failed provider={} err={e}; using keyword search only",
                        provider.name()
                    );
                    None
                }
            }
        } else {
            None
        };

        self.search_with_embedding(query, embedding.as_deref(), limit, semantic_weight)
    }

    /// Rank every chunk against `query` and an optional query embedding.
    ///
    /// Without an embedding the semantic weight is forced to 0.
    pub fn search_with_embedding(
        &self,
        query: &str,
        query_embedding: Option<&[f32]>,
        limit: usize,
        semantic_weight: f32,
    ) -> Vec<SearchResult> {
        if self.is_empty() {
            log::warn!("search on empty index query={query:?}");
            return Vec::new();
        }

        let (semantic, weight) = match query_embedding {
            Some(query_embedding) => (
                self.chunks
                    .iter()
                    .map(|chunk| semantic_score(query_embedding, &chunk.embedding))
                    .collect::<Vec<_>>(),
                semantic_weight.clamp(0.0, 1.0),
            ),
            None => (vec![0.0; self.chunks.len()], 0.0),
        };
        // pure semantic ranking reports no keyword contribution
        let keyword = if weight >= 1.0 {
            vec![0.0; self.chunks.len()]
        } else {
            self.keywords.score(query)
        };

        let results: Vec<SearchResult> = hybrid::rank(&semantic, &keyword, weight, limit)
            .into_iter()
            .map(|scored| {
                let chunk = &self.chunks[scored.index];
                SearchResult {
                    page_url: chunk.page_url.clone(),
                    title: chunk.title.clone(),
                    text: chunk.text.clone(),
                    score: scored.score,
                    semantic_score: scored.semantic_score,
                    keyword_score: scored.keyword_score,
                    section: chunk.section.clone(),
                }
            })
            .collect();

        log::debug!(
            "query={query:?} weight={weight} results={} of chunks={}",
            results.len(),
            self.chunks.len()
        );
        results
    }

    pub fn stats(&self) -> IndexStats {
        let total_chunks = self.chunks.len();
        let total_pages = self
            .chunks
            .iter()
            .map(|chunk| chunk.page_url.as_str())
            .collect::<HashSet<_>>()
            .len();
        let total_tokens = self.keywords.total_tokens();

        IndexStats {
            total_chunks,
            total_pages,
            avg_chunks_per_page: if total_pages > 0 {
                total_chunks as f64 / total_pages as f64
            } else {
                0.0
            },
            total_tokens,
            avg_tokens_per_chunk: self.keywords.avg_doc_length(),
            vocabulary_size: self.keywords.vocabulary_size(),
        }
    }

    /// Write the index file atomically.
    pub fn save(&self, path: &Path) -> Result<(), IndexFileError> {
        IndexStorage::new(path.to_path_buf()).save(self)
    }

    /// Load an index file, rebuilding the keyword index from chunk text.
    pub fn load(path: &Path) -> Result<Self, IndexFileError> {
        IndexStorage::new(path.to_path_buf()).load()
    }
}
