//! Spana - Lead Research Agent
//!
//! An autonomous CLI that researches company leads on the web and drafts
//! the sales follow-through for them.
//!
//! The name "Spana" comes from the Swedish slang word for "to scout" or "keep watch."
//!
//! # Overview
//!
//! Spana allows you to:
//! - Run a tool-calling agent that searches the web, ingests pages and
//!   queries what it indexed
//! - Build a persistent vector index from web content
//! - Run a staged pipeline that qualifies leads, drafts outreach email
//!   and plans follow-up
//! - Explore the indexed content interactively in a chat session
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration and prompt templates
//! - `search` - SerpAPI web search client
//! - `ingest` - Page fetching and the ingestion pipeline
//! - `chunking` - Text chunking
//! - `embedding` - Embedding generation
//! - `index` - Retrieval index abstraction
//! - `agent` - The bounded tool-calling research agent
//! - `pipeline` - The staged lead workflow
//!
//! # Example
//!
//! ```rust,no_run
//! use spana::config::Settings;
//! use spana::search::SearchClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let client = SearchClient::from_settings(&settings.search)?;
//!
//!     let hits = client.search("coffee roasters in Austin, Texas", 5).await?;
//!     for hit in hits {
//!         println!("{} - {}", hit.title, hit.link);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod ingest;
pub mod openai;
pub mod pipeline;
pub mod search;

pub use error::{Result, SpanaError};
