//! Text chunking
//!
//! Splits raw text into overlapping, size-bounded chunks while preferring
//! natural boundaries (paragraph, line, sentence, word) over hard cuts.
//! Boundaries are deterministic: the same input and configuration always
//! produce the same chunk sequence.

use crate::config::ChunkConfig;
use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;

/// A unit of indexed text plus scalar metadata.
///
/// Immutable once created; content is never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    content: String,
    metadata: BTreeMap<String, Value>,
}

impl Chunk {
    /// Create a chunk. Returns None for empty/whitespace-only content.
    pub fn new(content: impl Into<String>) -> Option<Self> {
        let content = content.into();
        if content.trim().is_empty() {
            return None;
        }
        Some(Self {
            content,
            metadata: BTreeMap::new(),
        })
    }

    /// Attach a metadata entry, consuming and returning the chunk.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.metadata
    }
}

/// Strip any non-scalar metadata values from every chunk.
///
/// Upstream loaders can attach nested structures; only strings, numbers and
/// booleans are allowed into the index.
pub fn filter_scalar_metadata(chunks: Vec<Chunk>) -> Vec<Chunk> {
    chunks
        .into_iter()
        .map(|mut chunk| {
            chunk
                .metadata
                .retain(|_, v| matches!(v, Value::String(_) | Value::Number(_) | Value::Bool(_)));
            chunk
        })
        .collect()
}

/// Separator ladder, highest priority first. The empty separator means a
/// hard cut at the size limit.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Splits text into overlapping fixed-size chunks.
#[derive(Debug, Clone)]
pub struct ChunkSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl ChunkSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Config("chunk_size must be positive".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be < chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn from_config(config: &ChunkConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Split text into an ordered sequence of chunks.
    ///
    /// Every chunk is at most `chunk_size` bytes, consecutive chunks share
    /// `chunk_overlap` bytes where the text is long enough, and the full
    /// input is covered.
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        if text.trim().is_empty() {
            return chunks;
        }

        let mut start = 0;
        while start < text.len() {
            start = ensure_char_boundary(text, start);
            if start >= text.len() {
                break;
            }

            let end = if start + self.chunk_size >= text.len() {
                text.len()
            } else {
                self.find_split_point(text, start)
            };

            if end <= start {
                // Size limit smaller than the next character; skip past it.
                start += text[start..].chars().next().map_or(1, |c| c.len_utf8());
                continue;
            }

            if let Some(chunk) = Chunk::new(&text[start..end]) {
                chunks.push(chunk);
            }

            if end >= text.len() {
                break;
            }

            // Step back by the overlap; guard against a break point so early
            // that stepping back would stall.
            start = if end > start + self.chunk_overlap {
                ensure_char_boundary(text, end - self.chunk_overlap)
            } else {
                end
            };
        }

        chunks
    }

    /// Pick the best break point in (start + chunk_size/2, start + chunk_size],
    /// walking the separator ladder from paragraph down to word. Falls back to
    /// a hard cut on a character boundary.
    fn find_split_point(&self, text: &str, start: usize) -> usize {
        let limit = ensure_char_boundary(text, start + self.chunk_size);
        let floor = start + self.chunk_size / 2;
        let window = &text[start..limit];

        for separator in SEPARATORS {
            if let Some(offset) = window.rmatch_indices(separator).map(|(i, _)| i).next() {
                let candidate = start + offset + separator.len();
                if candidate > floor && candidate <= limit {
                    return candidate;
                }
            }
        }

        limit
    }
}

/// Ensure a position is on a valid UTF-8 character boundary
fn ensure_char_boundary(text: &str, pos: usize) -> usize {
    if pos >= text.len() {
        return text.len();
    }
    let mut adjusted = pos;
    while adjusted > 0 && !text.is_char_boundary(adjusted) {
        adjusted -= 1;
    }
    adjusted
}
