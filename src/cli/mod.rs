//! CLI module for Spana.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Spana - Lead Research Agent
///
/// An autonomous research CLI that finds company leads on the web, indexes
/// what it reads, and drafts qualification, outreach and follow-up output.
/// The name "Spana" comes from the Swedish slang word for "to scout."
#[derive(Parser, Debug)]
#[command(name = "spana")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize Spana and verify configuration
    Init,

    /// Check configuration, API keys and index health
    Doctor,

    /// Run the full lead pipeline for a research objective
    Research {
        /// What to research (e.g., "coffee roasters in Austin, Texas")
        objective: String,

        /// LLM model to use for the agent and pipeline stages
        #[arg(short, long)]
        model: Option<String>,

        /// Maximum tool-use steps for the research agent
        #[arg(long)]
        max_steps: Option<u32>,

        /// Skip writing the JSONL run transcript
        #[arg(long)]
        no_transcript: bool,
    },

    /// Start an interactive chat session with the research tools
    Chat {
        /// LLM model to use
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Search the web via SerpAPI
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Fetch pages and add them to the retrieval index
    Ingest {
        /// URLs to fetch and index
        #[arg(required = true)]
        urls: Vec<String>,

        /// Clear the index before ingesting
        #[arg(long)]
        fresh: bool,
    },

    /// Query the retrieval index
    Query {
        /// Query text
        query: String,

        /// Maximum number of chunks to return (defaults to index.top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Minimum similarity score (0.0-1.0)
        #[arg(short, long, default_value = "0.0")]
        min_score: f32,
    },

    /// List indexed sources
    List,

    /// Start HTTP API server for integration with other systems
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "agent.model")
        key: String,
        /// Configuration value
        value: String,
    },

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
