//! Configuration settings for Spana.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub openai: OpenAiSettings,
    pub search: SearchSettings,
    pub fetch: FetchSettings,
    pub embedding: EmbeddingSettings,
    pub chunking: ChunkingSettings,
    pub index: IndexSettings,
    pub agent: AgentSettings,
    pub pipeline: PipelineSettings,
    pub prompts: PromptSettings,
}


/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.spana".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// OpenAI API settings.
///
/// Credentials live here rather than in ambient process state so that
/// every client is constructed from an explicit configuration value.
/// The `OPENAI_API_KEY` environment variable remains the fallback when
/// `api_key` is unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct OpenAiSettings {
    /// API key. Falls back to the OPENAI_API_KEY environment variable.
    pub api_key: Option<String>,
    /// Alternative API base URL (for proxies or compatible providers).
    pub api_base: Option<String>,
    /// Request timeout in seconds (default: 300).
    pub timeout_seconds: Option<u64>,
}


/// Web search (SerpAPI) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// SerpAPI key. Falls back to the SERPAPI_API_KEY environment variable.
    pub api_key: Option<String>,
    /// Search API endpoint.
    pub endpoint: String,
    /// SerpAPI engine to use.
    pub engine: String,
    /// Location bias for searches (e.g. "Austin, Texas"). Omitted when unset.
    pub location: Option<String>,
    /// Google domain to search.
    pub google_domain: String,
    /// Interface language.
    pub language: String,
    /// Country code for results.
    pub country: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://serpapi.com/search".to_string(),
            engine: "google_light".to_string(),
            location: None,
            google_domain: "google.com".to_string(),
            language: "en".to_string(),
            country: "us".to_string(),
            timeout_seconds: 30,
        }
    }
}

/// Page fetching settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
    /// User-Agent header sent with page requests.
    pub user_agent: String,
    /// Maximum redirects to follow.
    pub max_redirects: usize,
    /// Maximum response body size in bytes.
    pub max_body_bytes: usize,
    /// Maximum concurrent page fetches during ingestion.
    pub max_concurrent: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: 10,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36"
                .to_string(),
            max_redirects: 5,
            max_body_bytes: 2 * 1024 * 1024,
            max_concurrent: 4,
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding provider (openai).
    pub provider: String,
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// Text chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Maximum chunk size in characters.
    pub max_chunk_chars: usize,
    /// Overlap between consecutive chunks in characters.
    pub overlap_chars: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            max_chunk_chars: 1000,
            overlap_chars: 100,
        }
    }
}

/// Retrieval index provider type.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum IndexProvider {
    /// SQLite-backed index (default, persists across runs).
    #[default]
    Sqlite,
    /// In-memory index (discarded on exit).
    Memory,
}

impl std::str::FromStr for IndexProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(IndexProvider::Sqlite),
            "memory" | "mem" => Ok(IndexProvider::Memory),
            _ => Err(format!("Unknown index provider: {}", s)),
        }
    }
}

impl std::fmt::Display for IndexProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexProvider::Sqlite => write!(f, "sqlite"),
            IndexProvider::Memory => write!(f, "memory"),
        }
    }
}

/// Retrieval index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Index provider (sqlite, memory).
    pub provider: IndexProvider,
    /// Path to SQLite database (for sqlite provider).
    pub sqlite_path: String,
    /// Default number of chunks returned by a query.
    pub top_k: u32,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            provider: IndexProvider::Sqlite,
            sqlite_path: "~/.spana/index.db".to_string(),
            top_k: 5,
        }
    }
}

/// Research agent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Model used for agent decisions.
    pub model: String,
    /// Sampling temperature. Kept low for predictable tool usage.
    pub temperature: f32,
    /// Maximum tool-use steps before the run is aborted.
    pub max_steps: u32,
    /// Consecutive malformed or failed decisions tolerated before aborting.
    pub decision_retries: u32,
    /// Wall-clock budget for a run in seconds. Unlimited when unset.
    pub max_duration_seconds: Option<u64>,
    /// Write a JSONL transcript of each run under <data_dir>/transcripts.
    pub log_transcripts: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.4,
            max_steps: 15,
            decision_retries: 3,
            max_duration_seconds: None,
            log_transcripts: true,
        }
    }
}

/// Lead pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Model used for the qualification, outreach and follow-up stages.
    pub model: String,
    /// Sampling temperature for stage completions.
    pub temperature: f32,
    /// Total attempts per stage (1 = no retries).
    pub max_retries: u32,
    /// Initial backoff delay between attempts in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound on the backoff delay in milliseconds.
    pub max_delay_ms: u64,
    /// Number of index chunks pulled into stage prompts.
    pub max_context_chunks: u32,
    /// Minimum similarity score for context chunks.
    pub min_context_score: f32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
            max_context_chunks: 5,
            min_context_score: 0.25,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}


impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::SpanaError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("spana")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded SQLite index path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.index.sqlite_path)
    }

    /// Get the directory where agent run transcripts are written.
    pub fn transcripts_dir(&self) -> PathBuf {
        self.data_dir().join("transcripts")
    }
}
