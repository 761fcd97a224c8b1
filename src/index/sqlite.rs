//! SQLite-based retrieval index implementation.
//!
//! Uses SQLite with cosine similarity computed in Rust for simplicity.
//! For production use cases with large datasets, consider using sqlite-vec
//! extension or a dedicated vector database.

use super::{
    cosine_similarity, ensure_dimensions, EmbeddedChunk, IndexedSource, RetrievalIndex,
    ScoredChunk,
};
use crate::error::{Result, SpanaError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};

/// SQLite-based retrieval index.
pub struct SqliteIndex {
    conn: Mutex<Connection>,
    dimensions: usize,
}

impl SqliteIndex {
    /// Open (or create) a SQLite index at the given path.
    #[instrument(skip_all)]
    pub fn new(path: &Path, dimensions: usize) -> Result<Self> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        Self::create_tables(&conn)?;

        info!("Initialized SQLite index at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
            dimensions,
        })
    }

    /// Create an in-memory SQLite index (useful for testing).
    pub fn in_memory(dimensions: usize) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::create_tables(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            dimensions,
        })
    }

    fn create_tables(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                source_id TEXT NOT NULL,
                sequence_index INTEGER NOT NULL,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL,
                indexed_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_source_id ON chunks(source_id);
            CREATE INDEX IF NOT EXISTS idx_chunks_indexed_at ON chunks(indexed_at);
            "#,
        )?;
        Ok(())
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SpanaError::Index(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<EmbeddedChunk> {
        let id_str: String = row.get(0)?;
        let embedding_bytes: Vec<u8> = row.get(4)?;
        let indexed_at_str: String = row.get(5)?;

        Ok(EmbeddedChunk {
            id: uuid::Uuid::parse_str(&id_str).unwrap_or_default(),
            source_id: row.get(1)?,
            sequence_index: row.get(2)?,
            text: row.get(3)?,
            embedding: Self::bytes_to_embedding(&embedding_bytes),
            indexed_at: DateTime::parse_from_rfc3339(&indexed_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

#[async_trait]
impl RetrievalIndex for SqliteIndex {
    #[instrument(skip(self, chunks))]
    async fn add(&self, chunks: &[EmbeddedChunk]) -> Result<usize> {
        for chunk in chunks {
            ensure_dimensions(self.dimensions, chunk.embedding.len())?;
        }

        let conn = self.lock_conn()?;
        let tx = conn.unchecked_transaction()?;

        for chunk in chunks {
            let embedding_bytes = Self::embedding_to_bytes(&chunk.embedding);

            tx.execute(
                r#"
                INSERT OR REPLACE INTO chunks
                (id, source_id, sequence_index, text, embedding, indexed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    chunk.id.to_string(),
                    chunk.source_id,
                    chunk.sequence_index,
                    chunk.text,
                    embedding_bytes,
                    chunk.indexed_at.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        info!("Added {} chunks to index", chunks.len());
        Ok(chunks.len())
    }

    #[instrument(skip(self, query_embedding))]
    async fn query(&self, query_embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        self.query_with_threshold(query_embedding, k, f32::MIN).await
    }

    #[instrument(skip(self, query_embedding))]
    async fn query_with_threshold(
        &self,
        query_embedding: &[f32],
        k: usize,
        min_score: f32,
    ) -> Result<Vec<ScoredChunk>> {
        ensure_dimensions(self.dimensions, query_embedding.len())?;

        let conn = self.lock_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, source_id, sequence_index, text, embedding, indexed_at
            FROM chunks
            "#,
        )?;

        let chunks = stmt.query_map([], Self::row_to_chunk)?;

        let mut results: Vec<ScoredChunk> = chunks
            .filter_map(|chunk_result| chunk_result.ok())
            .map(|chunk| {
                let score = cosine_similarity(query_embedding, &chunk.embedding);
                ScoredChunk { chunk, score }
            })
            .filter(|r| r.score >= min_score)
            .collect();

        // Sort by score descending
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);

        debug!("Found {} matching chunks", results.len());
        Ok(results)
    }

    async fn is_source_indexed(&self, source_id: &str) -> Result<bool> {
        let conn = self.lock_conn()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM chunks WHERE source_id = ?1",
            params![source_id],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }

    #[instrument(skip(self))]
    async fn list_sources(&self) -> Result<Vec<IndexedSource>> {
        let conn = self.lock_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT source_id, COUNT(*) as chunk_count, MAX(indexed_at) as indexed_at
            FROM chunks
            GROUP BY source_id
            ORDER BY indexed_at DESC
            "#,
        )?;

        let sources = stmt.query_map([], |row| {
            let indexed_at_str: String = row.get(2)?;
            Ok(IndexedSource {
                source_id: row.get(0)?,
                chunk_count: row.get(1)?,
                indexed_at: DateTime::parse_from_rfc3339(&indexed_at_str)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            })
        })?;

        let result: Vec<IndexedSource> = sources.filter_map(|s| s.ok()).collect();
        Ok(result)
    }

    async fn chunk_count(&self) -> Result<usize> {
        let conn = self.lock_conn()?;

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<usize> {
        let conn = self.lock_conn()?;

        let removed = conn.execute("DELETE FROM chunks", [])?;

        info!("Cleared {} chunks from index", removed);
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

    #[test]
    fn test_embedding_blob_round_trip() {
        let embedding = vec![0.25, -1.5, 3.75, 0.0];
        let bytes = SqliteIndex::embedding_to_bytes(&embedding);
        assert_eq!(bytes.len(), 16);
        assert_eq!(SqliteIndex::bytes_to_embedding(&bytes), embedding);
    }

    #[tokio::test]
    async fn test_sqlite_index() {
        let index = SqliteIndex::in_memory(3).unwrap();

        index
            .add(&[
                chunk("pricing page text", "https://a.com", 0, vec![1.0, 0.0, 0.0]),
                chunk("team page text", "https://a.com", 1, vec![0.0, 1.0, 0.0]),
            ])
            .await
            .unwrap();

        assert_eq!(index.chunk_count().await.unwrap(), 2);
        assert!(index.is_source_indexed("https://a.com").await.unwrap());

        let results = index.query(&[1.0, 0.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!((results[0].score - 1.0).abs() < 0.001);
        assert_eq!(results[0].chunk.text, "pricing page text");

        let sources = index.list_sources().await.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].chunk_count, 2);

        let removed = index.clear().await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(index.chunk_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sqlite_index_rejects_wrong_dimensions() {
        let index = SqliteIndex::in_memory(3).unwrap();
        assert!(index
            .add(&[chunk("text", "https://a.com", 0, vec![1.0])])
            .await
            .is_err());
        assert!(index.query(&[1.0], 5).await.is_err());
    }

    #[tokio::test]
    async fn test_sqlite_index_empty_query() {
        let index = SqliteIndex::in_memory(2).unwrap();
        let results = index.query(&[1.0, 0.0], 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_index_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");

        {
            let index = SqliteIndex::new(&path, 2).unwrap();
            index
                .add(&[chunk("persisted", "https://a.com", 0, vec![1.0, 0.0])])
                .await
                .unwrap();
        }

        let reopened = SqliteIndex::new(&path, 2).unwrap();
        assert_eq!(reopened.chunk_count().await.unwrap(), 1);
        assert!(reopened.is_source_indexed("https://a.com").await.unwrap());
    }
}
