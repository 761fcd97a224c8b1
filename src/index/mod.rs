//! Retrieval index abstraction for Spana.
//!
//! Provides a trait-based interface for different vector index backends.

mod memory;
mod sqlite;

pub use memory::MemoryIndex;
pub use sqlite::SqliteIndex;

use crate::error::{Result, SpanaError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chunk of page text, ready for embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Text content of this chunk.
    pub text: String,
    /// URL of the page this chunk came from.
    pub source_id: String,
    /// Order of this chunk within its source.
    pub sequence_index: i32,
}

impl Chunk {
    pub fn new(text: String, source_id: String, sequence_index: i32) -> Self {
        Self {
            text,
            source_id,
            sequence_index,
        }
    }
}

/// An embedded chunk stored in the retrieval index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    /// Unique chunk ID.
    pub id: Uuid,
    /// URL of the page this chunk came from.
    pub source_id: String,
    /// Order of this chunk within its source.
    pub sequence_index: i32,
    /// Text content of this chunk.
    pub text: String,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// When this chunk was indexed.
    pub indexed_at: DateTime<Utc>,
}

impl EmbeddedChunk {
    /// Pair a chunk with its embedding.
    pub fn new(chunk: Chunk, embedding: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id: chunk.source_id,
            sequence_index: chunk.sequence_index,
            text: chunk.text,
            embedding,
            indexed_at: Utc::now(),
        }
    }
}

/// A query result with its similarity score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    /// The matched chunk.
    pub chunk: EmbeddedChunk,
    /// Similarity score (higher is better).
    pub score: f32,
}

/// Summary information about an indexed source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedSource {
    /// Source URL.
    pub source_id: String,
    /// Number of indexed chunks.
    pub chunk_count: u32,
    /// When the source was last indexed.
    pub indexed_at: DateTime<Utc>,
}

/// Trait for retrieval index implementations.
///
/// An index accumulates chunks across ingestion runs; `clear` is the only
/// way to remove content. Every index is built for a fixed embedding
/// dimension and rejects vectors of any other length.
#[async_trait]
pub trait RetrievalIndex: Send + Sync {
    /// Add embedded chunks to the index. Returns the number added.
    async fn add(&self, chunks: &[EmbeddedChunk]) -> Result<usize>;

    /// Find the `k` chunks most similar to the query vector, best first.
    /// An empty index yields an empty result.
    async fn query(&self, query_embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;

    /// Query with a minimum similarity threshold.
    async fn query_with_threshold(
        &self,
        query_embedding: &[f32],
        k: usize,
        min_score: f32,
    ) -> Result<Vec<ScoredChunk>>;

    /// Check if a source has already been indexed.
    async fn is_source_indexed(&self, source_id: &str) -> Result<bool>;

    /// List all indexed sources.
    async fn list_sources(&self) -> Result<Vec<IndexedSource>>;

    /// Get total chunk count.
    async fn chunk_count(&self) -> Result<usize>;

    /// Remove all chunks from the index. Returns the number removed.
    async fn clear(&self) -> Result<usize>;

    /// The embedding dimension this index accepts.
    fn dimensions(&self) -> usize;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Reject vectors whose length does not match the index dimension.
pub(crate) fn ensure_dimensions(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(SpanaError::Config(format!(
            "embedding dimension mismatch: index expects {}, got {}",
            expected, actual
        )));
    }
    Ok(())
}
