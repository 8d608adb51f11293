//! Splits page prose into overlapping, boundary-aware chunks.
//!
//! Offsets are in characters, not bytes. A window of `chunk_size` slides
//! over the text; when the right edge would cut a sentence, the edge snaps
//! back (at most [`BOUNDARY_LOOKBACK`] characters) to the last sentence end
//! or blank line, provided the chunk stays at least `min_size` long.

use crate::config::SearchConfig;

/// How far back from a hard cut we look for a sentence boundary
pub const BOUNDARY_LOOKBACK: usize = 100;

/// A span of the source text with its character offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
    min_size: usize,
}

impl TextChunker {
    /// `overlap` is clamped below `chunk_size` so the window always advances.
    pub fn new(chunk_size: usize, overlap: usize, min_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size - 1),
            min_size,
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap, config.min_chunk_size)
    }

    pub fn min_size(&self) -> usize {
        self.min_size
    }

    pub fn chunk(&self, text: &str) -> Vec<TextChunk> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let mut chunks = Vec::new();
        if total == 0 {
            return chunks;
        }

        let mut start = 0;
        loop {
            let mut end = (start + self.chunk_size).min(total);

            if end < total {
                if let Some(boundary) = sentence_boundary(&chars, start, end) {
                    if boundary - start >= self.min_size {
                        end = boundary;
                    }
                }
            }

            let chunk: String = chars[start..end].iter().collect();
            if chunk.trim().chars().count() >= self.min_size {
                chunks.push(TextChunk {
                    text: chunk,
                    start,
                    end,
                });
            }

            if end >= total {
                break;
            }

            // A snapped chunk can be shorter than the overlap; continue
            // from its end instead of stepping backwards.
            let next = end.saturating_sub(self.overlap);
            start = if next > start { next } else { end };
        }

        chunks
    }
}

/// Latest position in `(start, end]`, no further back than the lookback
/// window, that directly follows a sentence end (`. `, `! `, `? `) or a
/// blank line.
fn sentence_boundary(chars: &[char], start: usize, end: usize) -> Option<usize> {
    let floor = end.saturating_sub(BOUNDARY_LOOKBACK).max(start + 1).max(2);

    (floor..=end).rev().find(|&i| {
        let (prev, last) = (chars[i - 2], chars[i - 1]);
        matches!((prev, last), ('.' | '!' | '?', ' ' | '\t' | '\n') | ('\n', '\n'))
    })
}
