//! In-memory vector index
//!
//! Embeds chunks with a pluggable [`Embedder`] and answers similarity
//! queries with a score threshold. Rebuilds go through a staging buffer and
//! swap in only on success, so a transient embedding failure never destroys
//! a previously usable index.

use crate::chunk::Chunk;
use crate::embed::{cosine_similarity, Embedder};
use crate::error::Result;
use std::sync::Arc;
use tracing::{debug, info};

struct IndexEntry {
    chunk: Chunk,
    embedding: Vec<f32>,
}

/// Vector index over one ingestion batch.
pub struct VectorIndex {
    embedder: Arc<dyn Embedder>,
    entries: Vec<IndexEntry>,
    fallback_context: String,
    ready: bool,
}

impl VectorIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            entries: Vec::new(),
            fallback_context: String::new(),
            ready: false,
        }
    }

    /// Whether a successful rebuild has occurred since the last clear.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Concatenation of all ingested chunk contents, kept for the lifetime
    /// of the index as a degraded retrieval fallback.
    pub fn fallback_context(&self) -> &str {
        &self.fallback_context
    }

    /// Replace the index contents with a new chunk batch.
    ///
    /// Embeds into a staging vector first; on any embedding failure the
    /// previous entries and fallback context remain intact.
    pub async fn rebuild(&mut self, chunks: Vec<Chunk>) -> Result<()> {
        let texts: Vec<String> = chunks.iter().map(|c| c.content().to_string()).collect();
        let embeddings = self.embedder.embed(texts).await?;

        let staging: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
            .collect();

        let fallback = staging
            .iter()
            .map(|entry| entry.chunk.content())
            .collect::<Vec<_>>()
            .join("\n");

        info!("Vector index rebuilt with {} chunks", staging.len());
        self.entries = staging;
        self.fallback_context = fallback;
        self.ready = true;
        Ok(())
    }

    /// Return at most `k` chunks scoring at least `score_threshold` against
    /// the query, in strictly descending score order. An empty result is not
    /// an error.
    pub async fn search(&self, query: &str, k: usize, score_threshold: f32) -> Result<Vec<Chunk>> {
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let query_embeddings = self.embedder.embed(vec![query.to_string()]).await?;
        let query_vector = match query_embeddings.into_iter().next() {
            Some(v) => v,
            None => return Ok(Vec::new()),
        };

        let mut scored: Vec<(f32, &Chunk)> = self
            .entries
            .iter()
            .map(|entry| (cosine_similarity(&query_vector, &entry.embedding), &entry.chunk))
            .filter(|(score, _)| *score >= score_threshold)
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        debug!("Retrieved {} chunks above threshold {}", scored.len(), score_threshold);
        Ok(scored.into_iter().map(|(_, chunk)| chunk.clone()).collect())
    }

    /// Drop all entries and the fallback context. Idempotent.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.fallback_context.clear();
        self.ready = false;
    }
}
