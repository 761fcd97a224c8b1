//! Error types for Spana.

use thiserror::Error;

/// Library-level error type for Spana operations.
#[derive(Error, Debug)]
pub enum SpanaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Web search failed: {0}")]
    Search(String),

    #[error("Page fetch failed: {0}")]
    Fetch(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Retrieval index error: {0}")]
    Index(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid tool arguments for {tool}: {message}")]
    InvalidToolArguments { tool: String, message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Pipeline stage '{stage}' failed: {message}")]
    Stage { stage: String, message: String },
}

/// Result type alias for Spana operations.
pub type Result<T> = std::result::Result<T, SpanaError>;
