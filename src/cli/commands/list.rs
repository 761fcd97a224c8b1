//! List command implementation.

use super::open_index;
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;

/// Run the list command.
pub async fn run_list(settings: Settings) -> Result<()> {
    let index = open_index(&settings)?;

    match index.list_sources().await {
        Ok(sources) => {
            if sources.is_empty() {
                Output::info("No sources indexed yet. Use 'spana ingest <url>' to add content.");
            } else {
                Output::header(&format!("Indexed Sources ({})", sources.len()));
                println!();

                for source in &sources {
                    Output::source_info(&source.source_id, source.chunk_count, &source.indexed_at);
                }

                let total_chunks: u32 = sources.iter().map(|s| s.chunk_count).sum();
                println!();
                Output::kv("Total sources", &sources.len().to_string());
                Output::kv("Total chunks", &total_chunks.to_string());
            }
        }
        Err(e) => {
            Output::error(&format!("Failed to list sources: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
