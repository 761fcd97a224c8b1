//! CLI command implementations.

mod chat;
mod config;
mod doctor;
mod ingest;
mod init;
mod list;
mod query;
mod research;
mod search;
mod serve;

pub use chat::run_chat;
pub use config::run_config;
pub use doctor::run_doctor;
pub use ingest::run_ingest;
pub use init::run_init;
pub use list::run_list;
pub use query::run_query;
pub use research::run_research;
pub use search::run_search;
pub use serve::run_serve;

use crate::agent::ToolRegistry;
use crate::chunking::TextChunker;
use crate::config::{IndexProvider, Settings};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::Result;
use crate::index::{MemoryIndex, RetrievalIndex, SqliteIndex};
use crate::ingest::{IngestionPipeline, PageFetcher};
use crate::search::SearchClient;
use std::sync::Arc;

/// Open the retrieval index configured in settings.
pub(crate) fn open_index(settings: &Settings) -> Result<Arc<dyn RetrievalIndex>> {
    let dimensions = settings.embedding.dimensions as usize;
    match settings.index.provider {
        IndexProvider::Sqlite => Ok(Arc::new(SqliteIndex::new(
            &settings.sqlite_path(),
            dimensions,
        )?)),
        IndexProvider::Memory => Ok(Arc::new(MemoryIndex::new(dimensions))),
    }
}

/// Build the embedder configured in settings.
pub(crate) fn build_embedder(settings: &Settings) -> Arc<dyn Embedder> {
    Arc::new(OpenAIEmbedder::from_settings(
        &settings.openai,
        &settings.embedding,
    ))
}

/// Wire the tool registry over the shared embedder and index.
///
/// Returns the embedder and index alongside the registry since the
/// pipeline stages need them independently of the tools.
pub(crate) fn build_tools(
    settings: &Settings,
    search: Option<SearchClient>,
) -> Result<(ToolRegistry, Arc<dyn Embedder>, Arc<dyn RetrievalIndex>)> {
    let embedder = build_embedder(settings);
    let index = open_index(settings)?;

    let ingestion = IngestionPipeline::new(
        PageFetcher::new(&settings.fetch)?,
        TextChunker::from_settings(&settings.chunking)?,
        Arc::clone(&embedder),
        Arc::clone(&index),
        settings.fetch.max_concurrent,
    );

    let registry = ToolRegistry::new(search, ingestion, Arc::clone(&embedder), Arc::clone(&index));
    Ok((registry, embedder, index))
}
