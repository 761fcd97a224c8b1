//! HTTP API server for integration with other systems.
//!
//! Provides REST endpoints for web search, ingestion, index queries and
//! full research runs.

use super::{build_embedder, build_tools, open_index};
use crate::agent::{AgentLoop, OpenAiDecider};
use crate::chunking::TextChunker;
use crate::cli::Output;
use crate::config::{Prompts, Settings};
use crate::index::IndexedSource;
use crate::ingest::{IngestionPipeline, PageFetcher, SourceFailure};
use crate::pipeline::{LeadPipeline, PipelineState};
use crate::search::{SearchClient, SearchHit};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Shared application state.
struct AppState {
    settings: Settings,
    prompts: Prompts,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let prompts = Prompts::load(
        settings.prompts.custom_dir.as_deref(),
        Some(&settings.prompts.variables),
    )?;

    let state = Arc::new(AppState { settings, prompts });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/search", post(search))
        .route("/ingest", post(ingest))
        .route("/query", post(query))
        .route("/research", post(research))
        .route("/sources", get(list_sources))
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Spana API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Web Search", "POST /search");
    Output::kv("Ingest", "POST /ingest");
    Output::kv("Query Index", "POST /query");
    Output::kv("Research", "POST /research");
    Output::kv("List Sources", "GET  /sources");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default = "default_max_results")]
    max_results: usize,
}

fn default_max_results() -> usize {
    10
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct IngestRequest {
    urls: Vec<String>,
    /// Clear the index before ingesting.
    #[serde(default)]
    fresh: bool,
}

#[derive(Serialize)]
struct IngestResponse {
    chunks_indexed: usize,
    sources_ingested: usize,
    sources_skipped: usize,
    failures: Vec<SourceFailure>,
}

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    /// Defaults to the configured index.top_k.
    top_k: Option<usize>,
    #[serde(default)]
    min_score: f32,
}

#[derive(Serialize)]
struct QueryResponse {
    results: Vec<QueryResult>,
}

#[derive(Serialize)]
struct QueryResult {
    text: String,
    source: String,
    score: f32,
}

#[derive(Deserialize)]
struct ResearchRequest {
    objective: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    max_steps: Option<u32>,
}

#[derive(Serialize)]
struct ResearchResponse {
    final_output: String,
    state: PipelineState,
}

#[derive(Serialize)]
struct SourcesResponse {
    sources: Vec<IndexedSource>,
    total: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn internal_error(e: impl std::fmt::Display) -> axum::response::Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn search(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> impl IntoResponse {
    let client = match SearchClient::from_settings(&state.settings.search) {
        Ok(client) => client,
        Err(e) => return internal_error(e),
    };

    match client.search(&req.query, req.max_results).await {
        Ok(results) => Json(SearchResponse { results }).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn ingest(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IngestRequest>,
) -> impl IntoResponse {
    let settings = &state.settings;

    let index = match open_index(settings) {
        Ok(index) => index,
        Err(e) => return internal_error(e),
    };

    if req.fresh {
        if let Err(e) = index.clear().await {
            return internal_error(e);
        }
    }

    let fetcher = match PageFetcher::new(&settings.fetch) {
        Ok(fetcher) => fetcher,
        Err(e) => return internal_error(e),
    };
    let chunker = match TextChunker::from_settings(&settings.chunking) {
        Ok(chunker) => chunker,
        Err(e) => return internal_error(e),
    };

    let pipeline = IngestionPipeline::new(
        fetcher,
        chunker,
        build_embedder(settings),
        index,
        settings.fetch.max_concurrent,
    );

    match pipeline.ingest(&req.urls).await {
        Ok(report) => Json(IngestResponse {
            chunks_indexed: report.chunks_indexed,
            sources_ingested: report.sources_ingested,
            sources_skipped: report.sources_skipped,
            failures: report.failures,
        })
        .into_response(),
        Err(e) => internal_error(e),
    }
}

async fn query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> impl IntoResponse {
    let settings = &state.settings;
    let embedder = build_embedder(settings);

    let index = match open_index(settings) {
        Ok(index) => index,
        Err(e) => return internal_error(e),
    };

    let embedding = match embedder.embed(&req.query).await {
        Ok(embedding) => embedding,
        Err(e) => return internal_error(e),
    };

    let top_k = req.top_k.unwrap_or(settings.index.top_k as usize);
    match index
        .query_with_threshold(&embedding, top_k, req.min_score)
        .await
    {
        Ok(results) => Json(QueryResponse {
            results: results
                .into_iter()
                .map(|scored| QueryResult {
                    text: scored.chunk.text,
                    source: scored.chunk.source_id,
                    score: scored.score,
                })
                .collect(),
        })
        .into_response(),
        Err(e) => internal_error(e),
    }
}

async fn research(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResearchRequest>,
) -> impl IntoResponse {
    let mut settings = state.settings.clone();
    if let Some(model) = req.model {
        settings.agent.model = model.clone();
        settings.pipeline.model = model;
    }
    if let Some(max_steps) = req.max_steps {
        settings.agent.max_steps = max_steps;
    }

    let search = match SearchClient::from_settings(&settings.search) {
        Ok(search) => Some(search),
        Err(e) => return internal_error(e),
    };

    let (registry, embedder, index) = match build_tools(&settings, search) {
        Ok(parts) => parts,
        Err(e) => return internal_error(e),
    };

    let decider = Arc::new(OpenAiDecider::new(
        &settings.openai,
        &settings.agent,
        &state.prompts,
    ));
    let agent = AgentLoop::new(decider, registry, &settings.agent);

    let pipeline = LeadPipeline::new(
        agent,
        embedder,
        index,
        &settings.openai,
        state.prompts.clone(),
        &settings.pipeline,
    );

    let run = pipeline.run(&req.objective).await;
    Json(ResearchResponse {
        final_output: run.final_output,
        state: run.state,
    })
    .into_response()
}

async fn list_sources(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let index = match open_index(&state.settings) {
        Ok(index) => index,
        Err(e) => return internal_error(e),
    };

    match index.list_sources().await {
        Ok(sources) => Json(SourcesResponse {
            total: sources.len(),
            sources,
        })
        .into_response(),
        Err(e) => internal_error(e),
    }
}
