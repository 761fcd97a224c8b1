//! Query command implementation.

use super::{build_embedder, open_index};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;

/// Run the query command.
pub async fn run_query(
    query: &str,
    top_k: Option<usize>,
    min_score: f32,
    settings: Settings,
) -> Result<()> {
    // Pre-flight checks
    if let Err(e) = preflight::check(Operation::Query, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'spana doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let top_k = top_k.unwrap_or(settings.index.top_k as usize);
    let embedder = build_embedder(&settings);
    let index = open_index(&settings)?;

    if index.chunk_count().await? == 0 {
        Output::warning("The index is empty. Add content with 'spana ingest <url>' first.");
        return Ok(());
    }

    let spinner = Output::spinner("Querying index...");

    let results = async {
        let embedding = embedder.embed(query).await?;
        index.query_with_threshold(&embedding, top_k, min_score).await
    }
    .await;
    spinner.finish_and_clear();

    match results {
        Ok(chunks) => {
            if chunks.is_empty() {
                Output::warning("No results above the score threshold.");
            } else {
                Output::success(&format!("Found {} matching chunks", chunks.len()));

                for scored in &chunks {
                    Output::chunk_match(&scored.chunk.source_id, scored.score, &scored.chunk.text);
                }
            }
        }
        Err(e) => {
            Output::error(&format!("Query failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
