//! Ingest command implementation.

use super::{build_embedder, open_index};
use crate::chunking::TextChunker;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::ingest::{IngestionPipeline, PageFetcher};
use anyhow::Result;
use std::sync::Arc;

/// Run the ingest command.
pub async fn run_ingest(urls: &[String], fresh: bool, settings: Settings) -> Result<()> {
    // Pre-flight checks
    if let Err(e) = preflight::check(Operation::Ingest, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'spana doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let embedder = build_embedder(&settings);
    let index = open_index(&settings)?;

    if fresh {
        let removed = index.clear().await?;
        if removed > 0 {
            Output::info(&format!("Cleared {} chunks from the index.", removed));
        }
    }

    let pipeline = IngestionPipeline::new(
        PageFetcher::new(&settings.fetch)?,
        TextChunker::from_settings(&settings.chunking)?,
        embedder,
        Arc::clone(&index),
        settings.fetch.max_concurrent,
    );

    let spinner = Output::spinner(&format!("Ingesting {} URL(s)...", urls.len()));

    let report = pipeline.ingest(urls).await;
    spinner.finish_and_clear();

    match report {
        Ok(report) => {
            Output::success(&format!(
                "Indexed {} chunks from {} URL(s)",
                report.chunks_indexed, report.sources_ingested
            ));
            if report.sources_skipped > 0 {
                Output::info(&format!(
                    "Skipped {} already-indexed URL(s). Use --fresh to re-ingest.",
                    report.sources_skipped
                ));
            }
            for failure in &report.failures {
                Output::warning(&format!("{}: {}", failure.url, failure.error));
            }

            let total = index.chunk_count().await?;
            Output::kv("Chunks in index", &total.to_string());
        }
        Err(e) => {
            Output::error(&format!("Ingestion failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
