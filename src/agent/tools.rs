//! Tool definitions and implementations for the research agent.

use crate::embedding::Embedder;
use crate::error::{Result, SpanaError};
use crate::index::RetrievalIndex;
use crate::ingest::IngestionPipeline;
use crate::search::SearchClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Tools the agent can invoke.
#[derive(Debug, Clone)]
pub enum ToolCall {
    /// Search the web for candidate pages.
    WebSearch { query: String, max_results: u64 },

    /// Fetch and index a set of URLs.
    WebIngest { urls: Vec<String> },

    /// Query the indexed content for relevant passages.
    VectorQuery { query: String, top_k: u64 },
}

fn default_max_results() -> u64 {
    10
}

fn default_top_k() -> u64 {
    5
}

impl ToolCall {
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::WebSearch { .. } => "web_search",
            ToolCall::WebIngest { .. } => "web_ingest",
            ToolCall::VectorQuery { .. } => "vector_query",
        }
    }
}

/// A tool invocation as produced by the decision step, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool_name: String,
    pub arguments: serde_json::Value,
}

impl std::fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.tool_name, self.arguments)
    }
}

/// Outcome of one tool invocation, fed back to the agent as an observation.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub tool_name: String,
    pub output: String,
    pub is_error: bool,
}

/// The set of tools available to an agent run, with their backing services.
pub struct ToolRegistry {
    search: Option<SearchClient>,
    ingestion: IngestionPipeline,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn RetrievalIndex>,
}

impl ToolRegistry {
    /// Create a registry. `search` is optional so the rest of the tools
    /// keep working without a SerpAPI key.
    pub fn new(
        search: Option<SearchClient>,
        ingestion: IngestionPipeline,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn RetrievalIndex>,
    ) -> Self {
        Self {
            search,
            ingestion,
            embedder,
            index,
        }
    }

    /// Validate a raw invocation into a typed tool call.
    ///
    /// An unregistered name is `UnknownTool`; a registered name with
    /// arguments that violate the schema is `InvalidToolArguments`. Nothing
    /// malformed reaches a handler.
    pub fn parse(&self, invocation: &ToolInvocation) -> Result<ToolCall> {
        let args = &invocation.arguments;
        match invocation.tool_name.as_str() {
            "web_search" => {
                let query = args["query"]
                    .as_str()
                    .ok_or_else(|| missing_argument("web_search", "query"))?
                    .to_string();
                let max_results = args["max_results"].as_u64().unwrap_or_else(default_max_results);
                Ok(ToolCall::WebSearch { query, max_results })
            }
            "web_ingest" => {
                let urls = args["urls"]
                    .as_array()
                    .ok_or_else(|| missing_argument("web_ingest", "urls"))?
                    .iter()
                    .map(|u| {
                        u.as_str().map(|s| s.to_string()).ok_or_else(|| {
                            SpanaError::InvalidToolArguments {
                                tool: "web_ingest".to_string(),
                                message: "'urls' must be an array of strings".to_string(),
                            }
                        })
                    })
                    .collect::<Result<Vec<String>>>()?;
                Ok(ToolCall::WebIngest { urls })
            }
            "vector_query" => {
                let query = args["query"]
                    .as_str()
                    .ok_or_else(|| missing_argument("vector_query", "query"))?
                    .to_string();
                let top_k = args["top_k"].as_u64().unwrap_or_else(default_top_k);
                Ok(ToolCall::VectorQuery { query, top_k })
            }
            other => Err(SpanaError::UnknownTool(other.to_string())),
        }
    }

    /// Execute a validated tool call.
    ///
    /// Handler failures never escape this layer; they come back as a
    /// `ToolResult` with `is_error` set so the loop can observe them.
    pub async fn invoke(&self, call: &ToolCall) -> ToolResult {
        let tool_name = call.name().to_string();
        let outcome = match call {
            ToolCall::WebSearch { query, max_results } => {
                self.run_search(query, *max_results as usize).await
            }
            ToolCall::WebIngest { urls } => self.run_ingest(urls).await,
            ToolCall::VectorQuery { query, top_k } => {
                self.run_query(query, *top_k as usize).await
            }
        };

        match outcome {
            Ok(output) => ToolResult {
                tool_name,
                output,
                is_error: false,
            },
            Err(e) => {
                warn!("Tool {} failed: {}", tool_name, e);
                ToolResult {
                    tool_name,
                    output: format!("Tool error: {}", e),
                    is_error: true,
                }
            }
        }
    }

    async fn run_search(&self, query: &str, max_results: usize) -> Result<String> {
        let client = self.search.as_ref().ok_or_else(|| {
            SpanaError::Config(
                "Web search is not configured. Set search.api_key in config.toml or export SERPAPI_API_KEY".to_string(),
            )
        })?;

        let hits = client.search(query, max_results).await?;
        if hits.is_empty() {
            return Ok("No search results found.".to_string());
        }

        Ok(serde_json::to_string_pretty(&hits)?)
    }

    async fn run_ingest(&self, urls: &[String]) -> Result<String> {
        if urls.is_empty() {
            return Err(SpanaError::InvalidInput(
                "No URLs provided to ingest".to_string(),
            ));
        }

        let report = self.ingestion.ingest(urls).await?;
        Ok(report.summary())
    }

    async fn run_query(&self, query: &str, top_k: usize) -> Result<String> {
        if self.index.chunk_count().await? == 0 {
            return Err(SpanaError::InvalidInput(
                "No indexed content found. Run web_ingest on some URLs first.".to_string(),
            ));
        }

        let embedding = self.embedder.embed(query).await?;
        let results = self.index.query(&embedding, top_k).await?;
        if results.is_empty() {
            return Ok("No relevant results found.".to_string());
        }

        let entries: Vec<serde_json::Value> = results
            .iter()
            .map(|r| {
                serde_json::json!({
                    "text": r.chunk.text,
                    "source": r.chunk.source_id,
                    "score": r.score,
                })
            })
            .collect();

        Ok(serde_json::to_string_pretty(&entries)?)
    }
}

/// Get OpenAI function/tool definitions for the agent.
pub fn tool_definitions() -> Vec<async_openai::types::ChatCompletionTool> {
    use async_openai::types::{ChatCompletionTool, ChatCompletionToolType, FunctionObject};

    vec![
        ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: "web_search".to_string(),
                description: Some(
                    "Search Google for pages matching a query. \
                    Use this to discover candidate companies and sources. \
                    Returns a JSON list of results with title, link and snippet."
                        .to_string(),
                ),
                parameters: Some(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "The exact search phrase to look up"
                        },
                        "max_results": {
                            "type": "integer",
                            "description": "Maximum number of results (default: 10)",
                            "default": 10
                        }
                    },
                    "required": ["query"]
                })),
                strict: None,
            },
        },
        ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: "web_ingest".to_string(),
                description: Some(
                    "Fetch a list of URLs, strip the pages to plain text, and index \
                    the content for retrieval. Run this on URLs found via web_search \
                    before querying for details. Returns a message confirming how many \
                    chunks were stored and which URLs failed."
                        .to_string(),
                ),
                parameters: Some(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "urls": {
                            "type": "array",
                            "items": {"type": "string"},
                            "description": "Page URLs to fetch and index"
                        }
                    },
                    "required": ["urls"]
                })),
                strict: None,
            },
        },
        ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: "vector_query".to_string(),
                description: Some(
                    "Query the indexed page content for relevant passages. \
                    Returns a JSON list of the most relevant text chunks with \
                    their source URLs."
                        .to_string(),
                ),
                parameters: Some(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "The question or search phrase"
                        },
                        "top_k": {
                            "type": "integer",
                            "description": "Number of top results to retrieve (default: 5)",
                            "default": 5
                        }
                    },
                    "required": ["query"]
                })),
                strict: None,
            },
        },
    ]
}

fn missing_argument(tool: &str, field: &str) -> SpanaError {
    SpanaError::InvalidToolArguments {
        tool: tool.to_string(),
        message: format!("missing required '{}' argument", field),
    }
}
