//! Hybrid semantic + keyword search over documentation pages.
//!
//! # Architecture
//!
//! - `preprocess`: markup to prose, content hashes
//! - `chunker`: overlapping, sentence-aware chunks
//! - `embeddings`: chunk embedding through the provider, with caching
//! - `lexical`: tokenizer and BM25 keyword index
//! - `hybrid`: cosine scores and the semantic/keyword blend
//! - `index`: in-memory chunk store and ranked search
//! - `storage`: JSON index file
//! - `service`: high-level indexing and search

pub mod chunker;
pub mod embeddings;
pub mod hybrid;
pub mod lexical;
mod index;
pub mod preprocess;
mod service;
mod storage;

pub use chunker::{TextChunk, TextChunker};
pub use embeddings::EmbeddingGenerator;
pub use index::{IndexStats, PageChunk, SearchResult, VectorIndex};
pub use preprocess::{content_hash, extract_prose};
pub use service::{PageSource, SearchService, SearchServiceError};
pub use storage::{IndexFileError, IndexStorage, INDEX_VERSION};
