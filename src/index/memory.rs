//! In-memory retrieval index implementation.
//!
//! Useful for testing and single-run research sessions.

use super::{
    cosine_similarity, ensure_dimensions, EmbeddedChunk, IndexedSource, RetrievalIndex,
    ScoredChunk,
};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory retrieval index.
pub struct MemoryIndex {
    chunks: RwLock<Vec<EmbeddedChunk>>,
    dimensions: usize,
}

impl MemoryIndex {
    /// Create a new in-memory index for the given embedding dimension.
    pub fn new(dimensions: usize) -> Self {
        Self {
            chunks: RwLock::new(Vec::new()),
            dimensions,
        }
    }
}

#[async_trait]
impl RetrievalIndex for MemoryIndex {
    async fn add(&self, chunks: &[EmbeddedChunk]) -> Result<usize> {
        for chunk in chunks {
            ensure_dimensions(self.dimensions, chunk.embedding.len())?;
        }

        let mut store = self.chunks.write().unwrap();
        store.extend_from_slice(chunks);
        Ok(chunks.len())
    }

    async fn query(&self, query_embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        self.query_with_threshold(query_embedding, k, f32::MIN).await
    }

    async fn query_with_threshold(
        &self,
        query_embedding: &[f32],
        k: usize,
        min_score: f32,
    ) -> Result<Vec<ScoredChunk>> {
        ensure_dimensions(self.dimensions, query_embedding.len())?;

        let store = self.chunks.read().unwrap();

        let mut results: Vec<ScoredChunk> = store
            .iter()
            .map(|chunk| {
                let score = cosine_similarity(query_embedding, &chunk.embedding);
                ScoredChunk {
                    chunk: chunk.clone(),
                    score,
                }
            })
            .filter(|r| r.score >= min_score)
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);

        Ok(results)
    }

    async fn is_source_indexed(&self, source_id: &str) -> Result<bool> {
        let store = self.chunks.read().unwrap();
        Ok(store.iter().any(|c| c.source_id == source_id))
    }

    async fn list_sources(&self) -> Result<Vec<IndexedSource>> {
        let store = self.chunks.read().unwrap();

        let mut source_map: HashMap<String, IndexedSource> = HashMap::new();

        for chunk in store.iter() {
            let entry = source_map
                .entry(chunk.source_id.clone())
                .or_insert_with(|| IndexedSource {
                    source_id: chunk.source_id.clone(),
                    chunk_count: 0,
                    indexed_at: chunk.indexed_at,
                });

            entry.chunk_count += 1;
            if chunk.indexed_at > entry.indexed_at {
                entry.indexed_at = chunk.indexed_at;
            }
        }

        let mut sources: Vec<IndexedSource> = source_map.into_values().collect();
        sources.sort_by(|a, b| b.indexed_at.cmp(&a.indexed_at));

        Ok(sources)
    }

    async fn chunk_count(&self) -> Result<usize> {
        let store = self.chunks.read().unwrap();
        Ok(store.len())
    }

    async fn clear(&self) -> Result<usize> {
        let mut store = self.chunks.write().unwrap();
        let removed = store.len();
        store.clear();
        Ok(removed)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Chunk;

    fn chunk(text: &str, source: &str, order: i32, embedding: Vec<f32>) -> EmbeddedChunk {
        EmbeddedChunk::new(
            Chunk::new(text.to_string(), source.to_string(), order),
            embedding,
        )
    }

    #[tokio::test]
    async fn test_memory_index_query_ordering() {
        let index = MemoryIndex::new(3);

        let added = index
            .add(&[
                chunk("about pricing", "https://a.com", 0, vec![1.0, 0.0, 0.0]),
                chunk("about the team", "https://a.com", 1, vec![0.0, 1.0, 0.0]),
                chunk("contact details", "https://b.com", 0, vec![0.9, 0.1, 0.0]),
            ])
            .await
            .unwrap();
        assert_eq!(added, 3);
        assert_eq!(index.chunk_count().await.unwrap(), 3);

        let results = index.query(&[1.0, 0.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].chunk.text, "about pricing");
        // Scores are non-increasing.
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }

        // k bounds the result even with more matches available.
        let top = index.query(&[1.0, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(top.len(), 2);

        // A query nearest to b.com's chunk surfaces that source first.
        let cross = index.query(&[0.9, 0.1, 0.0], 5).await.unwrap();
        assert_eq!(cross[0].chunk.source_id, "https://b.com");
    }

    #[tokio::test]
    async fn test_memory_index_empty_query() {
        let index = MemoryIndex::new(3);
        let results = index.query(&[1.0, 0.0, 0.0], 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_memory_index_rejects_wrong_dimensions() {
        let index = MemoryIndex::new(3);
        assert!(index
            .add(&[chunk("text", "https://a.com", 0, vec![1.0, 0.0])])
            .await
            .is_err());
        assert!(index.query(&[1.0, 0.0], 5).await.is_err());
    }

    #[tokio::test]
    async fn test_memory_index_accumulates_and_clears() {
        let index = MemoryIndex::new(2);

        index
            .add(&[chunk("one", "https://a.com", 0, vec![1.0, 0.0])])
            .await
            .unwrap();
        index
            .add(&[chunk("two", "https://b.com", 0, vec![0.0, 1.0])])
            .await
            .unwrap();

        assert_eq!(index.chunk_count().await.unwrap(), 2);
        assert!(index.is_source_indexed("https://a.com").await.unwrap());
        assert!(!index.is_source_indexed("https://c.com").await.unwrap());

        let sources = index.list_sources().await.unwrap();
        assert_eq!(sources.len(), 2);

        let removed = index.clear().await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(index.chunk_count().await.unwrap(), 0);
        assert!(index.list_sources().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_index_threshold_filters() {
        let index = MemoryIndex::new(2);
        index
            .add(&[
                chunk("close", "https://a.com", 0, vec![1.0, 0.0]),
                chunk("far", "https://a.com", 1, vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let results = index
            .query_with_threshold(&[1.0, 0.0], 10, 0.5)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.text, "close");
    }
}
