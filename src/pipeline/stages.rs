//! The four-stage lead workflow.
//!
//! Research runs the tool-calling agent to build a lead list; the
//! qualification, outreach and follow-up stages are single completions
//! that enrich it. Every stage goes through the retry wrapper, and only
//! research is blocking.

use super::runner::{run_stage, RetryPolicy};
use super::state::{PipelineState, Stage};
use crate::agent::{AgentLoop, RunOutcome};
use crate::config::{OpenAiSettings, PipelineSettings, Prompts};
use crate::embedding::Embedder;
use crate::error::{Result, SpanaError};
use crate::index::RetrievalIndex;
use crate::openai::create_client;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};

/// Outcome of a full pipeline run.
#[derive(Debug)]
pub struct PipelineRun {
    pub final_output: String,
    pub state: PipelineState,
}

/// Runs the staged lead workflow end to end.
pub struct LeadPipeline {
    agent: AgentLoop,
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn RetrievalIndex>,
    prompts: Prompts,
    settings: PipelineSettings,
    policy: RetryPolicy,
}

impl LeadPipeline {
    pub fn new(
        agent: AgentLoop,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn RetrievalIndex>,
        openai: &OpenAiSettings,
        prompts: Prompts,
        settings: &PipelineSettings,
    ) -> Self {
        Self {
            agent,
            client: create_client(openai),
            embedder,
            index,
            prompts,
            settings: settings.clone(),
            policy: RetryPolicy::from_settings(settings),
        }
    }

    /// Run research, qualification, outreach and follow-up for one
    /// objective.
    ///
    /// A failed research stage halts the run; failures in later stages are
    /// recorded on the state and the remaining stages still run with what
    /// they have.
    #[instrument(skip(self, objective))]
    pub async fn run(&self, objective: &str) -> PipelineRun {
        let mut state = PipelineState::new();
        info!("Starting pipeline {}", state.pipeline_id);

        state = run_stage(Stage::Research, state, &self.policy, |s| {
            self.research_stage(s, objective)
        })
        .await;

        if state.has_error(Stage::Research) {
            let final_output = format!(
                "Lead research failed: {}",
                state.errors[&Stage::Research]
            );
            return PipelineRun { final_output, state };
        }

        state = run_stage(Stage::Qualification, state, &self.policy, |s| {
            self.qualification_stage(s, objective)
        })
        .await;

        state = run_stage(Stage::Outreach, state, &self.policy, |s| {
            self.outreach_stage(s, objective)
        })
        .await;

        state = run_stage(Stage::FollowUp, state, &self.policy, |s| {
            self.followup_stage(s)
        })
        .await;

        state.complete();
        let final_output = render_final_output(&state);
        PipelineRun { final_output, state }
    }

    async fn research_stage(
        &self,
        mut state: PipelineState,
        objective: &str,
    ) -> Result<PipelineState> {
        let run = self.agent.run(objective).await;
        match run.outcome {
            RunOutcome::Finished { ref answer } => {
                state.lead = extract_json_object(answer)?;
                Ok(state)
            }
            RunOutcome::Aborted { .. } => Err(SpanaError::Stage {
                stage: Stage::Research.name().to_string(),
                message: run.output(),
            }),
        }
    }

    async fn qualification_stage(
        &self,
        mut state: PipelineState,
        objective: &str,
    ) -> Result<PipelineState> {
        let mut vars = HashMap::new();
        vars.insert("objective".to_string(), objective.to_string());
        vars.insert(
            "lead".to_string(),
            serde_json::to_string_pretty(&state.lead)?,
        );
        vars.insert("context".to_string(), self.retrieve_context(objective).await?);

        let user = self
            .prompts
            .render_with_custom(&self.prompts.qualification.user, &vars);
        let content = self.complete(&self.prompts.qualification.system, &user).await?;

        state.qualified_lead = extract_json_object(&content)?;
        Ok(state)
    }

    async fn outreach_stage(
        &self,
        mut state: PipelineState,
        objective: &str,
    ) -> Result<PipelineState> {
        // Fall back to the raw research output when qualification failed.
        let leads = if state.qualified_lead.is_empty() {
            &state.lead
        } else {
            &state.qualified_lead
        };

        let mut vars = HashMap::new();
        vars.insert("objective".to_string(), objective.to_string());
        vars.insert(
            "qualified_lead".to_string(),
            serde_json::to_string_pretty(leads)?,
        );

        let user = self
            .prompts
            .render_with_custom(&self.prompts.outreach.user, &vars);
        let content = self.complete(&self.prompts.outreach.system, &user).await?;

        state.outreach_email = Some(content);
        Ok(state)
    }

    async fn followup_stage(&self, mut state: PipelineState) -> Result<PipelineState> {
        let leads = if state.qualified_lead.is_empty() {
            &state.lead
        } else {
            &state.qualified_lead
        };

        let mut vars = HashMap::new();
        vars.insert(
            "qualified_lead".to_string(),
            serde_json::to_string_pretty(leads)?,
        );
        vars.insert(
            "outreach_email".to_string(),
            state
                .outreach_email
                .clone()
                .unwrap_or_else(|| "(no outreach email was generated)".to_string()),
        );

        let user = self
            .prompts
            .render_with_custom(&self.prompts.followup.user, &vars);
        let content = self.complete(&self.prompts.followup.system, &user).await?;

        state.followup_plan = Some(content);
        Ok(state)
    }

    /// Pull passages related to the objective out of the index for the
    /// qualification prompt. An empty index just means no context.
    async fn retrieve_context(&self, objective: &str) -> Result<String> {
        if self.index.chunk_count().await? == 0 {
            return Ok("(no indexed context available)".to_string());
        }

        let embedding = self.embedder.embed(objective).await?;
        let results = self
            .index
            .query_with_threshold(
                &embedding,
                self.settings.max_context_chunks as usize,
                self.settings.min_context_score,
            )
            .await?;

        if results.is_empty() {
            return Ok("(no indexed context available)".to_string());
        }

        Ok(results
            .iter()
            .map(|r| format!("- {} (source: {})", r.chunk.text, r.chunk.source_id))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system.to_string())
                .build()
                .map_err(|e| SpanaError::OpenAI(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user.to_string())
                .build()
                .map_err(|e| SpanaError::OpenAI(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.settings.model)
            .messages(messages)
            .temperature(self.settings.temperature)
            .build()
            .map_err(|e| SpanaError::OpenAI(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| SpanaError::OpenAI(format!("Completion failed: {}", e)))?;

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| SpanaError::OpenAI("Empty completion response".to_string()))
    }
}

/// Extract the outermost JSON object from model output that may carry
/// surrounding prose or code fences.
fn extract_json_object(text: &str) -> Result<serde_json::Map<String, serde_json::Value>> {
    let start = text
        .find('{')
        .ok_or_else(|| SpanaError::Agent("No JSON object found in model output".to_string()))?;
    let end = text
        .rfind('}')
        .ok_or_else(|| SpanaError::Agent("No JSON object found in model output".to_string()))?;

    if end < start {
        return Err(SpanaError::Agent(
            "No JSON object found in model output".to_string(),
        ));
    }

    let value: serde_json::Value = serde_json::from_str(&text[start..=end])
        .map_err(|e| SpanaError::Agent(format!("Model output is not valid JSON: {}", e)))?;

    value
        .as_object()
        .cloned()
        .ok_or_else(|| SpanaError::Agent("Model output is not a JSON object".to_string()))
}

fn render_final_output(state: &PipelineState) -> String {
    let mut sections = Vec::new();

    if !state.qualified_lead.is_empty() {
        if let Ok(json) = serde_json::to_string_pretty(&state.qualified_lead) {
            sections.push(format!("Qualified leads:\n{}", json));
        }
    } else if !state.lead.is_empty() {
        if let Ok(json) = serde_json::to_string_pretty(&state.lead) {
            sections.push(format!("Researched leads:\n{}", json));
        }
    }

    if let Some(email) = &state.outreach_email {
        sections.push(format!("Outreach email:\n{}", email));
    }

    if let Some(plan) = &state.followup_plan {
        sections.push(format!("Follow-up plan:\n{}", plan));
    }

    if !state.errors.is_empty() {
        let errors = state
            .errors
            .iter()
            .map(|(stage, message)| format!("- {}: {}", stage, message))
            .collect::<Vec<_>>()
            .join("\n");
        sections.push(format!("Stages with errors:\n{}", errors));
    }

    if sections.is_empty() {
        "The pipeline produced no output.".to_string()
    } else {
        sections.join("\n\n")
    }
}
