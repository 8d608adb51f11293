//! Page-level embedding generation.
//!
//! Turns a page into [`PageChunk`]s: markup is stripped, prose is chunked,
//! and each chunk is embedded through the provider. Embeddings are cached
//! by content hash so unchanged chunks never cost a second call.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::cache::Cache;
use crate::providers::{AiProvider, ProviderError};
use crate::search::chunker::TextChunker;
use crate::search::index::PageChunk;
use crate::search::preprocess::{embedding_cache_key, extract_prose};

/// Lines at the top of a chunk searched for a heading
const SECTION_SCAN_LINES: usize = 3;

pub struct EmbeddingGenerator {
    provider: Arc<dyn AiProvider>,
    cache: Option<Arc<dyn Cache>>,
    chunker: TextChunker,
}

impl EmbeddingGenerator {
    pub fn new(
        provider: Arc<dyn AiProvider>,
        cache: Option<Arc<dyn Cache>>,
        chunker: TextChunker,
    ) -> Self {
        Self {
            provider,
            cache,
            chunker,
        }
    }

    pub fn provider(&self) -> &dyn AiProvider {
        self.provider.as_ref()
    }

    /// Embed `text`, consulting the cache first.
    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let key = embedding_cache_key(text);

        if let Some(cache) = &self.cache {
            if let Some(value) = cache.get(&key) {
                match serde_json::from_value::<Vec<f32>>(value) {
                    Ok(embedding) => return Ok(embedding),
                    Err(e) => log::warn!("ignoring cached embedding key={key}: {e}"),
                }
            }
        }

        let embedding = self.provider.embed(text)?;

        if let Some(cache) = &self.cache {
            let value = serde_json::Value::from(
                embedding.iter().map(|&x| f64::from(x)).collect::<Vec<_>>(),
            );
            if let Err(e) = cache.set(&key, value, None) {
                log::warn!("failed to cache embedding key={key}: {e}");
            }
        }

        Ok(embedding)
    }

    /// Chunk and embed one page.
    ///
    /// Pages with too little prose yield nothing. A chunk whose embedding
    /// fails is logged and dropped; the rest of the page is still indexed.
    pub fn generate_page_embeddings(
        &self,
        page_url: &str,
        title: &str,
        content: &str,
    ) -> Vec<PageChunk> {
        let prose = extract_prose(content);
        let prose_len = prose.chars().count();
        if prose_len < self.chunker.min_size() {
            log::debug!("page={page_url} skipped chars={prose_len}");
            return Vec::new();
        }

        let text_chunks = self.chunker.chunk(&prose);
        let total = text_chunks.len();

        let page_chunks: Vec<PageChunk> = text_chunks
            .into_iter()
            .enumerate()
            .filter_map(|(i, chunk)| match self.embed_text(&chunk.text) {
                Ok(embedding) => Some(PageChunk {
                    page_url: page_url.to_string(),
                    title: title.to_string(),
                    section: extract_section(&chunk.text),
                    text: chunk.text,
                    embedding,
                    start_pos: chunk.start,
                    end_pos: chunk.end,
                    metadata: BTreeMap::new(),
                }),
                Err(e) => {
                    log::warn!("page={page_url} chunk={i} embedding failed, dropped: {e}");
                    None
                }
            })
            .collect();

        log::info!(
            "page={page_url} chunks={}/{total} chars={prose_len}",
            page_chunks.len()
        );
        page_chunks
    }
}

/// Label of the first markdown heading within the first lines of a chunk.
pub fn extract_section(text: &str) -> Option<String> {
    text.lines()
        .take(SECTION_SCAN_LINES)
        .map(str::trim)
        .find(|line| line.starts_with('#'))
        .map(|line| line.trim_start_matches('#').trim().to_string())
        .filter(|label| !label.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_section() {
        assert_eq!(
            extract_section("## Installation\nRun the installer."),
            Some("Installation".to_string())
        );
        assert_eq!(
            extract_section("intro line\n\n# Usage\nmore"),
            Some("Usage".to_string())
        );
        assert_eq!(extract_section("one\ntwo\nthree\n# Late heading"), None);
        assert_eq!(extract_section("#\nbody"), None);
        assert_eq!(extract_section("plain text"), None);
    }
}
