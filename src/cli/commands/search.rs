//! Search command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::search::SearchClient;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(query: &str, limit: usize, settings: Settings) -> Result<()> {
    let client = match SearchClient::from_settings(&settings.search) {
        Ok(client) => client,
        Err(e) => {
            Output::error(&format!("{}", e));
            Output::info("Run 'spana doctor' for detailed diagnostics.");
            return Err(e.into());
        }
    };

    let spinner = Output::spinner("Searching...");

    let results = client.search(query, limit).await;
    spinner.finish_and_clear();

    match results {
        Ok(hits) => {
            if hits.is_empty() {
                Output::warning("No results found matching your query.");
            } else {
                Output::success(&format!("Found {} results", hits.len()));

                for hit in &hits {
                    Output::search_hit(hit.position, &hit.title, &hit.link, hit.snippet.as_deref());
                }
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
