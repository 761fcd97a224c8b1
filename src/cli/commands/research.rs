//! Research command - run the full lead pipeline.

use super::build_tools;
use crate::agent::{AgentLoop, OpenAiDecider, TranscriptLog};
use crate::cli::output::content_preview;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::{Prompts, Settings};
use crate::pipeline::{LeadPipeline, PipelineStatus};
use crate::search::SearchClient;
use anyhow::Result;
use std::sync::Arc;
use uuid::Uuid;

/// Run the research command.
pub async fn run_research(
    objective: &str,
    model: Option<String>,
    max_steps: Option<u32>,
    no_transcript: bool,
    mut settings: Settings,
) -> Result<()> {
    // Pre-flight checks
    if let Err(e) = preflight::check(Operation::Research, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'spana doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    if let Some(model) = model {
        settings.agent.model = model.clone();
        settings.pipeline.model = model;
    }
    if let Some(max_steps) = max_steps {
        settings.agent.max_steps = max_steps;
    }

    let prompts = Prompts::load(
        settings.prompts.custom_dir.as_deref(),
        Some(&settings.prompts.variables),
    )?;

    let search = SearchClient::from_settings(&settings.search)?;
    let (registry, embedder, index) = build_tools(&settings, Some(search))?;

    let decider = Arc::new(OpenAiDecider::new(
        &settings.openai,
        &settings.agent,
        &prompts,
    ));
    let mut agent = AgentLoop::new(decider, registry, &settings.agent);

    if settings.agent.log_transcripts && !no_transcript {
        let log = TranscriptLog::create(&settings.transcripts_dir(), Uuid::new_v4())?;
        Output::info(&format!("Transcript: {}", log.path().display()));
        agent = agent.with_transcript_log(log);
    }

    let pipeline = LeadPipeline::new(
        agent,
        embedder,
        index,
        &settings.openai,
        prompts,
        &settings.pipeline,
    );

    let spinner = Output::spinner("Researching leads...");
    let run = pipeline.run(objective).await;
    spinner.finish_and_clear();

    println!("\n{}\n", run.final_output);

    let state = &run.state;
    Output::header("Pipeline summary");
    Output::kv("Run ID", &state.pipeline_id.to_string());
    Output::kv("Status", status_label(state.status));

    if !state.errors.is_empty() {
        println!();
        for (stage, err) in &state.errors {
            Output::warning(&format!("{}: {}", stage, content_preview(err, 160)));
        }
    }

    if state.status == PipelineStatus::Error && state.lead.is_empty() {
        return Err(anyhow::anyhow!("research run produced no leads"));
    }

    Ok(())
}

fn status_label(status: PipelineStatus) -> &'static str {
    match status {
        PipelineStatus::InProgress => "in progress",
        PipelineStatus::Done => "done",
        PipelineStatus::Error => "completed with errors",
    }
}
