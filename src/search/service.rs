//! Search service tying the pieces together.
//!
//! Owns the configuration, the embedding generator and the index, and knows
//! where the index file lives. Index build/load errors are fatal; searches
//! degrade instead of failing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::Cache;
use crate::config::SearchConfig;
use crate::providers::AiProvider;
use crate::search::chunker::TextChunker;
use crate::search::embeddings::EmbeddingGenerator;
use crate::search::index::{IndexStats, SearchResult, VectorIndex};
use crate::search::storage::{IndexFileError, IndexStorage};

#[derive(Debug, thiserror::Error)]
pub enum SearchServiceError {
    #[error("Index file error: {0}")]
    IndexFile(#[from] IndexFileError),

    #[error("Provider {0} does not support embeddings; pick one that does to build the index")]
    EmbeddingsUnsupported(String),
}

/// A page handed to the indexer.
#[derive(Debug, Clone)]
pub struct PageSource {
    pub url: String,
    pub title: String,
    /// Markdown or rendered HTML
    pub content: String,
}

impl PageSource {
    pub fn new(url: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            content: content.into(),
        }
    }
}

pub struct SearchService {
    config: SearchConfig,
    storage: IndexStorage,
    generator: EmbeddingGenerator,
    index: VectorIndex,
}

impl SearchService {
    /// Service with an empty index, for a full rebuild.
    pub fn new(
        config: SearchConfig,
        index_path: PathBuf,
        provider: Arc<dyn AiProvider>,
        cache: Option<Arc<dyn Cache>>,
    ) -> Self {
        let chunker = TextChunker::from_config(&config);
        Self {
            config,
            storage: IndexStorage::new(index_path),
            generator: EmbeddingGenerator::new(provider, cache, chunker),
            index: VectorIndex::new(),
        }
    }

    /// Service over the index file at `index_path`, loaded if it exists.
    ///
    /// A malformed or unsupported file is an error, never an empty index.
    pub fn open(
        config: SearchConfig,
        index_path: PathBuf,
        provider: Arc<dyn AiProvider>,
        cache: Option<Arc<dyn Cache>>,
    ) -> Result<Self, SearchServiceError> {
        let mut service = Self::new(config, index_path, provider, cache);
        if service.storage.exists() {
            service.index = service.storage.load()?;
        } else {
            log::info!(
                "no index at {}, starting empty",
                service.storage.path().display()
            );
        }
        Ok(service)
    }

    pub fn index_path(&self) -> &Path {
        self.storage.path()
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Chunk, embed and add one page. Returns the number of chunks added.
    ///
    /// Fails up front when the provider cannot embed at all; individual
    /// chunk failures only drop that chunk.
    pub fn index_page(
        &mut self,
        page_url: &str,
        title: &str,
        content: &str,
    ) -> Result<usize, SearchServiceError> {
        self.ensure_embeddings()?;
        let chunks = self
            .generator
            .generate_page_embeddings(page_url, title, content);
        let added = chunks.len();
        self.index.add_chunks(chunks);
        Ok(added)
    }

    /// Index pages in order. Returns the total number of chunks added.
    pub fn index_pages(
        &mut self,
        pages: impl IntoIterator<Item = PageSource>,
    ) -> Result<usize, SearchServiceError> {
        self.ensure_embeddings()?;
        let mut pages_indexed = 0;
        let mut chunks_added = 0;
        for page in pages {
            chunks_added += self.index_page(&page.url, &page.title, &page.content)?;
            pages_indexed += 1;
        }
        log::info!("indexed pages={pages_indexed} chunks={chunks_added}");
        Ok(chunks_added)
    }

    fn ensure_embeddings(&self) -> Result<(), SearchServiceError> {
        let provider = self.generator.provider();
        if provider.capabilities().embeddings {
            Ok(())
        } else {
            Err(SearchServiceError::EmbeddingsUnsupported(
                provider.name().to_string(),
            ))
        }
    }

    /// Search with config defaults for anything not given.
    pub fn search(
        &self,
        query: &str,
        limit: Option<usize>,
        semantic_weight: Option<f32>,
    ) -> Vec<SearchResult> {
        let limit = limit.unwrap_or(self.config.max_results);
        let weight = semantic_weight
            .unwrap_or(self.config.semantic_weight)
            .clamp(0.0, 1.0);

        if self.index.is_empty() {
            log::warn!("search on empty index query={query:?}");
            return Vec::new();
        }

        let provider = self.generator.provider();
        let embedding = if weight > 0.0 && !provider.capabilities().embeddings {
            log::debug!(
                "provider={} has no embeddings; using keyword search only",
                provider.name()
            );
            None
        } else if weight > 0.0 {
            match self.generator.embed_text(query) {
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

        self.index
            .search_with_embedding(query, embedding.as_deref(), limit, weight)
    }

    pub fn save(&self) -> Result<(), SearchServiceError> {
        self.storage.save(&self.index)?;
        Ok(())
    }

    pub fn stats(&self) -> IndexStats {
        self.index.stats()
    }
}
