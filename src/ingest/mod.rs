//! Web ingestion pipeline.
//!
//! Fetches pages, strips them to text, chunks, embeds, and stores the
//! result in the retrieval index.

mod fetch;

pub use fetch::PageFetcher;

use crate::chunking::TextChunker;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::index::{Chunk, EmbeddedChunk, RetrievalIndex};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// A URL that could not be ingested, with the reason.
#[derive(Debug, Clone, Serialize)]
pub struct SourceFailure {
    pub url: String,
    pub error: String,
}

/// Outcome of an ingestion run.
///
/// A run only fails as a whole when embedding or indexing fails; per-URL
/// fetch problems are reported here instead.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestionReport {
    /// Chunks written to the index in this run.
    pub chunks_indexed: usize,
    /// Sources fetched and indexed in this run.
    pub sources_ingested: usize,
    /// Sources skipped because they were already indexed.
    pub sources_skipped: usize,
    /// Sources that could not be fetched or yielded no text.
    pub failures: Vec<SourceFailure>,
}

impl IngestionReport {
    /// One-line summary suitable for a tool observation.
    pub fn summary(&self) -> String {
        let mut parts = vec![format!(
            "Ingested {} chunks from {} URLs into the index.",
            self.chunks_indexed, self.sources_ingested
        )];
        if self.sources_skipped > 0 {
            parts.push(format!("{} already indexed, skipped.", self.sources_skipped));
        }
        if !self.failures.is_empty() {
            let failed: Vec<String> = self
                .failures
                .iter()
                .map(|f| format!("{} ({})", f.url, f.error))
                .collect();
            parts.push(format!("Failed: {}.", failed.join("; ")));
        }
        parts.join(" ")
    }
}

/// Fetch, chunk, embed and index a set of URLs.
pub struct IngestionPipeline {
    fetcher: PageFetcher,
    chunker: TextChunker,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn RetrievalIndex>,
    max_concurrent: usize,
}

impl IngestionPipeline {
    pub fn new(
        fetcher: PageFetcher,
        chunker: TextChunker,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn RetrievalIndex>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            fetcher,
            chunker,
            embedder,
            index,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Ingest the given URLs.
    ///
    /// Already-indexed sources are skipped so repeat ingests stay
    /// idempotent; the index accumulates everything else.
    #[instrument(skip(self, urls), fields(url_count = urls.len()))]
    pub async fn ingest(&self, urls: &[String]) -> Result<IngestionReport> {
        let mut report = IngestionReport::default();

        let mut seen = HashSet::new();
        let mut to_fetch = Vec::new();
        for url in urls {
            if !seen.insert(url.as_str()) {
                continue;
            }
            if self.index.is_source_indexed(url).await? {
                report.sources_skipped += 1;
            } else {
                to_fetch.push(url.clone());
            }
        }

        if to_fetch.is_empty() {
            return Ok(report);
        }

        // Fetch concurrently, then restore input order for stable chunk
        // numbering.
        let mut fetched: Vec<(usize, String, Result<String>)> =
            stream::iter(to_fetch.into_iter().enumerate())
                .map(|(idx, url)| {
                    let fetcher = &self.fetcher;
                    async move {
                        let result = fetcher.fetch_text(&url).await;
                        (idx, url, result)
                    }
                })
                .buffer_unordered(self.max_concurrent)
                .collect()
                .await;
        fetched.sort_by_key(|(idx, _, _)| *idx);

        let mut pending = Vec::new();
        for (_, url, result) in fetched {
            match result {
                Ok(text) => {
                    let chunks = self.chunker.chunk(&text);
                    if chunks.is_empty() {
                        warn!("No extractable text at {}", url);
                        report.failures.push(SourceFailure {
                            url,
                            error: "page contained no extractable text".to_string(),
                        });
                        continue;
                    }
                    report.sources_ingested += 1;
                    for (i, text) in chunks.into_iter().enumerate() {
                        pending.push(Chunk::new(text, url.clone(), i as i32));
                    }
                }
                Err(e) => {
                    warn!("Failed to fetch {}: {}", url, e);
                    report.failures.push(SourceFailure {
                        url,
                        error: e.to_string(),
                    });
                }
            }
        }

        if pending.is_empty() {
            return Ok(report);
        }

        let texts: Vec<String> = pending.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let embedded: Vec<EmbeddedChunk> = pending
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| EmbeddedChunk::new(chunk, embedding))
            .collect();

        report.chunks_indexed = self.index.add(&embedded).await?;

        info!(
            "Ingested {} chunks from {} sources ({} skipped, {} failed)",
            report.chunks_indexed,
            report.sources_ingested,
            report.sources_skipped,
            report.failures.len()
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchSettings;
    use crate::error::SpanaError;
    use crate::index::MemoryIndex;
    use async_trait::async_trait;
    use axum::{response::Html, routing::get, Router};

    /// Embeds along a fixed axis per topic so queries route predictably.
    struct StubEmbedder;

    fn axis(text: &str) -> Vec<f32> {
        if text.contains("roasting") {
            vec![0.0, 1.0, 0.0]
        } else {
            vec![1.0, 0.0, 0.0]
        }
    }

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(axis(text))
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| axis(t)).collect())
        }

        fn dimensions(&self) -> usize {
            3
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(SpanaError::Embedding("service unavailable".to_string()))
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(SpanaError::Embedding("service unavailable".to_string()))
        }

        fn dimensions(&self) -> usize {
            3
        }
    }

    async fn spawn_test_server(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn pipeline(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn RetrievalIndex>,
        max_chars: usize,
        overlap: usize,
    ) -> IngestionPipeline {
        IngestionPipeline::new(
            PageFetcher::new(&FetchSettings::default()).unwrap(),
            TextChunker::new(max_chars, overlap).unwrap(),
            embedder,
            index,
            2,
        )
    }

    #[tokio::test]
    async fn test_ingest_reports_partial_failures() {
        let long_page = format!(
            "<html><body><script>var hidden = 1;</script><p>{}</p></body></html>",
            "x".repeat(2500)
        );
        let app = Router::new().route("/long", get(move || async move { Html(long_page.clone()) }));
        let base = spawn_test_server(app).await;

        let index = Arc::new(MemoryIndex::new(3));
        let pipeline = pipeline(Arc::new(StubEmbedder), index.clone(), 1000, 100);

        let long_url = format!("{}/long", base);
        let missing_url = format!("{}/missing", base);
        let report = pipeline
            .ingest(&[long_url.clone(), missing_url.clone()])
            .await
            .unwrap();

        // 2500 chars at 1000/100 hard-cuts into three chunks.
        assert_eq!(report.chunks_indexed, 3);
        assert_eq!(report.sources_ingested, 1);
        assert_eq!(report.sources_skipped, 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].url, missing_url);
        assert!(report.failures[0].error.contains("404"));

        assert_eq!(index.chunk_count().await.unwrap(), 3);
        assert!(index.is_source_indexed(&long_url).await.unwrap());
    }

    #[tokio::test]
    async fn test_reingest_skips_indexed_sources() {
        let app = Router::new().route(
            "/page",
            get(|| async { Html("<p>Same page every time.</p>") }),
        );
        let base = spawn_test_server(app).await;
        let url = format!("{}/page", base);

        let index = Arc::new(MemoryIndex::new(3));
        let pipeline = pipeline(Arc::new(StubEmbedder), index.clone(), 1000, 100);

        let first = pipeline.ingest(&[url.clone()]).await.unwrap();
        assert_eq!(first.sources_ingested, 1);
        let count_after_first = index.chunk_count().await.unwrap();

        let second = pipeline.ingest(&[url.clone()]).await.unwrap();
        assert_eq!(second.sources_ingested, 0);
        assert_eq!(second.sources_skipped, 1);
        assert_eq!(second.chunks_indexed, 0);
        assert_eq!(index.chunk_count().await.unwrap(), count_after_first);
    }

    #[tokio::test]
    async fn test_queries_route_to_matching_source() {
        let app = Router::new()
            .route(
                "/brewing",
                get(|| async { Html("<p>Pour-over brewing ratios and grind sizes.</p>") }),
            )
            .route(
                "/roasting",
                get(|| async { Html("<p>Drum roasting temperatures and first crack.</p>") }),
            );
        let base = spawn_test_server(app).await;
        let roasting_url = format!("{}/roasting", base);

        let index = Arc::new(MemoryIndex::new(3));
        let embedder = Arc::new(StubEmbedder);
        let pipeline = pipeline(embedder.clone(), index.clone(), 1000, 100);

        pipeline
            .ingest(&[format!("{}/brewing", base), roasting_url.clone()])
            .await
            .unwrap();

        let query = embedder.embed("what are the roasting temperatures?").await.unwrap();
        let results = index.query(&query, 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.source_id, roasting_url);
    }

    #[tokio::test]
    async fn test_embedding_failure_fails_the_run() {
        let app = Router::new().route("/page", get(|| async { Html("<p>Some text.</p>") }));
        let base = spawn_test_server(app).await;

        let index = Arc::new(MemoryIndex::new(3));
        let pipeline = pipeline(Arc::new(FailingEmbedder), index.clone(), 1000, 100);

        let result = pipeline.ingest(&[format!("{}/page", base)]).await;
        assert!(result.is_err());
        assert_eq!(index.chunk_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_page_is_a_source_failure() {
        let app = Router::new().route(
            "/empty",
            get(|| async { Html("<html><body><script>only();</script></body></html>") }),
        );
        let base = spawn_test_server(app).await;
        let url = format!("{}/empty", base);

        let index = Arc::new(MemoryIndex::new(3));
        let pipeline = pipeline(Arc::new(StubEmbedder), index.clone(), 1000, 100);

        let report = pipeline.ingest(&[url.clone()]).await.unwrap();
        assert_eq!(report.sources_ingested, 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].url, url);
        assert!(!index.is_source_indexed(&url).await.unwrap());
    }
}
