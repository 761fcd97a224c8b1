//! The bounded think-act-observe loop.

use super::decider::{Decider, Decision};
use super::tools::{ToolInvocation, ToolRegistry, ToolResult};
use super::transcript::{AgentStep, TranscriptLog};
use crate::config::AgentSettings;
use crate::error::SpanaError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Where the loop can be between steps.
enum LoopState {
    /// Ask the decider for the next action.
    Thinking,
    /// Validate and execute a chosen invocation.
    Acting {
        thought: String,
        invocation: ToolInvocation,
    },
    /// Record the result and go back to thinking.
    Observing { step: AgentStep },
    /// The decider produced a final answer.
    Finished { answer: String },
    /// Budget exhausted or the decider kept failing.
    Aborted { reason: String },
}

/// How a run ended.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Finished { answer: String },
    Aborted { reason: String },
}

/// A completed agent run with its full transcript.
#[derive(Debug)]
pub struct AgentRun {
    pub outcome: RunOutcome,
    pub transcript: Vec<AgentStep>,
    /// Completed think-act-observe cycles.
    pub steps_used: usize,
}

impl AgentRun {
    pub fn is_finished(&self) -> bool {
        matches!(self.outcome, RunOutcome::Finished { .. })
    }

    /// The final answer, or a summary of the partial transcript for
    /// aborted runs.
    pub fn output(&self) -> String {
        match &self.outcome {
            RunOutcome::Finished { answer } => answer.clone(),
            RunOutcome::Aborted { reason } => {
                let calls: Vec<String> = self
                    .transcript
                    .iter()
                    .filter_map(|s| s.invocation.as_ref())
                    .map(|inv| format!("- {}", inv))
                    .collect();

                if calls.is_empty() {
                    format!("Run aborted after {} steps: {}", self.steps_used, reason)
                } else {
                    format!(
                        "Run aborted after {} steps: {}\n\nTool calls made:\n{}",
                        self.steps_used,
                        reason,
                        calls.join("\n")
                    )
                }
            }
        }
    }
}

/// Drives a bounded tool-calling loop over a [`Decider`] and a
/// [`ToolRegistry`].
///
/// Each cycle asks the decider for an action, validates and executes it,
/// and feeds the observation back. The loop never returns an error: tool
/// failures become observations, and exceeding the step budget, the
/// wall-clock budget, or the consecutive decision-failure bound ends the
/// run as `Aborted` with whatever transcript was gathered.
pub struct AgentLoop {
    decider: Arc<dyn Decider>,
    registry: ToolRegistry,
    max_steps: usize,
    decision_retries: usize,
    max_duration: Option<Duration>,
    transcript_log: Option<TranscriptLog>,
}

impl AgentLoop {
    pub fn new(
        decider: Arc<dyn Decider>,
        registry: ToolRegistry,
        settings: &AgentSettings,
    ) -> Self {
        Self {
            decider,
            registry,
            max_steps: settings.max_steps as usize,
            decision_retries: (settings.decision_retries as usize).max(1),
            max_duration: settings.max_duration_seconds.map(Duration::from_secs),
            transcript_log: None,
        }
    }

    /// Log each step to a JSONL transcript as it happens.
    pub fn with_transcript_log(mut self, log: TranscriptLog) -> Self {
        self.transcript_log = Some(log);
        self
    }

    pub async fn run(&self, objective: &str) -> AgentRun {
        let started = Instant::now();
        let mut transcript: Vec<AgentStep> = Vec::new();
        let mut steps_used = 0;
        let mut decision_failures = 0;
        let mut state = LoopState::Thinking;

        info!("Starting agent run: {}", objective);

        let outcome = loop {
            state = match state {
                LoopState::Thinking => {
                    if steps_used >= self.max_steps {
                        LoopState::Aborted {
                            reason: format!("step budget of {} exhausted", self.max_steps),
                        }
                    } else if self.over_time_budget(started) {
                        LoopState::Aborted {
                            reason: "wall-clock budget exceeded".to_string(),
                        }
                    } else {
                        debug!("Thinking (step {} of {})", steps_used + 1, self.max_steps);
                        match self.decider.decide(objective, &transcript).await {
                            Ok(Decision::Invoke { thought, invocation }) => {
                                LoopState::Acting { thought, invocation }
                            }
                            Ok(Decision::Finish { thought, answer }) => {
                                let step = AgentStep {
                                    thought,
                                    invocation: None,
                                    result: None,
                                };
                                self.log_step(&step);
                                transcript.push(step);
                                LoopState::Finished { answer }
                            }
                            Err(e) => self.decision_failed(&mut decision_failures, e),
                        }
                    }
                }

                LoopState::Acting { thought, invocation } => {
                    match self.registry.parse(&invocation) {
                        Ok(call) => {
                            info!("Invoking tool: {}", invocation);
                            let result = self.registry.invoke(&call).await;
                            LoopState::Observing {
                                step: AgentStep {
                                    thought,
                                    invocation: Some(invocation),
                                    result: Some(result),
                                },
                            }
                        }
                        // An unknown tool name is something the model can
                        // correct once it sees the error, so it becomes an
                        // observation instead of a retry.
                        Err(e @ SpanaError::UnknownTool(_)) => {
                            let result = ToolResult {
                                tool_name: invocation.tool_name.clone(),
                                output: e.to_string(),
                                is_error: true,
                            };
                            LoopState::Observing {
                                step: AgentStep {
                                    thought,
                                    invocation: Some(invocation),
                                    result: Some(result),
                                },
                            }
                        }
                        // Malformed arguments mean the decision itself was
                        // bad; ask again without consuming a step.
                        Err(e) => self.decision_failed(&mut decision_failures, e),
                    }
                }

                LoopState::Observing { step } => {
                    self.log_step(&step);
                    transcript.push(step);
                    steps_used += 1;
                    decision_failures = 0;
                    LoopState::Thinking
                }

                LoopState::Finished { answer } => {
                    info!("Agent finished after {} steps", steps_used);
                    break RunOutcome::Finished { answer };
                }

                LoopState::Aborted { reason } => {
                    warn!("Agent aborted after {} steps: {}", steps_used, reason);
                    break RunOutcome::Aborted { reason };
                }
            };
        };

        AgentRun {
            outcome,
            transcript,
            steps_used,
        }
    }

    fn decision_failed(&self, failures: &mut usize, error: SpanaError) -> LoopState {
        *failures += 1;
        warn!(
            "Decision attempt {} of {} failed: {}",
            failures, self.decision_retries, error
        );
        if *failures >= self.decision_retries {
            LoopState::Aborted {
                reason: format!(
                    "decision failed {} times in a row, last error: {}",
                    failures, error
                ),
            }
        } else {
            LoopState::Thinking
        }
    }

    fn over_time_budget(&self, started: Instant) -> bool {
        self.max_duration
            .map(|budget| started.elapsed() >= budget)
            .unwrap_or(false)
    }

    fn log_step(&self, step: &AgentStep) {
        if let Some(log) = &self.transcript_log {
            if let Err(e) = log.append(step) {
                warn!("Failed to write transcript record: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::TextChunker;
    use crate::config::FetchSettings;
    use crate::embedding::Embedder;
    use crate::error::Result;
    use crate::index::{MemoryIndex, RetrievalIndex};
    use crate::ingest::{IngestionPipeline, PageFetcher};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ConstEmbedder;

    #[async_trait]
    impl Embedder for ConstEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0, 0.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
        }

        fn dimensions(&self) -> usize {
            3
        }
    }

    /// Replays a fixed script of decisions.
    struct ScriptedDecider {
        script: Mutex<VecDeque<Result<Decision>>>,
        calls: AtomicUsize,
    }

    impl ScriptedDecider {
        fn new(script: Vec<Result<Decision>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Decider for ScriptedDecider {
        async fn decide(&self, _objective: &str, _transcript: &[AgentStep]) -> Result<Decision> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(SpanaError::Agent("script exhausted".to_string())))
        }
    }

    fn invoke_decision(tool_name: &str, arguments: serde_json::Value) -> Result<Decision> {
        Ok(Decision::Invoke {
            thought: String::new(),
            invocation: ToolInvocation {
                tool_name: tool_name.to_string(),
                arguments,
            },
        })
    }

    fn finish_decision(answer: &str) -> Result<Decision> {
        Ok(Decision::Finish {
            thought: "Done.".to_string(),
            answer: answer.to_string(),
        })
    }

    fn test_registry() -> ToolRegistry {
        let index: Arc<dyn RetrievalIndex> = Arc::new(MemoryIndex::new(3));
        let embedder: Arc<dyn Embedder> = Arc::new(ConstEmbedder);
        let pipeline = IngestionPipeline::new(
            PageFetcher::new(&FetchSettings::default()).unwrap(),
            TextChunker::new(1000, 100).unwrap(),
            embedder.clone(),
            index.clone(),
            2,
        );
        ToolRegistry::new(None, pipeline, embedder, index)
    }

    fn settings(max_steps: u32) -> AgentSettings {
        AgentSettings {
            max_steps,
            ..Default::default()
        }
    }

    fn query_decision() -> Result<Decision> {
        invoke_decision("vector_query", json!({"query": "anything"}))
    }

    #[tokio::test]
    async fn test_finish_returns_answer_without_consuming_steps() {
        let decider = Arc::new(ScriptedDecider::new(vec![finish_decision("the answer")]));
        let agent = AgentLoop::new(decider.clone(), test_registry(), &settings(15));

        let run = agent.run("find leads").await;

        assert!(run.is_finished());
        assert_eq!(run.output(), "the answer");
        assert_eq!(run.steps_used, 0);
        assert_eq!(run.transcript.len(), 1);
        assert_eq!(decider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_step_budget_aborts_run() {
        // Each decision invokes a tool, so every cycle consumes a step.
        let decider = Arc::new(ScriptedDecider::new(vec![
            query_decision(),
            query_decision(),
            query_decision(),
            query_decision(),
        ]));
        let agent = AgentLoop::new(decider.clone(), test_registry(), &settings(3));

        let run = agent.run("find leads").await;

        assert!(!run.is_finished());
        assert_eq!(run.steps_used, 3);
        assert_eq!(run.transcript.len(), 3);
        // The budget check fires before a fourth decision is requested.
        assert_eq!(decider.call_count(), 3);
        assert!(run.output().contains("step budget"));
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_observation_and_loop_continues() {
        let decider = Arc::new(ScriptedDecider::new(vec![
            invoke_decision("crm_export", json!({})),
            finish_decision("done"),
        ]));
        let agent = AgentLoop::new(decider.clone(), test_registry(), &settings(15));

        let run = agent.run("find leads").await;

        assert!(run.is_finished());
        assert_eq!(run.steps_used, 1);
        let result = run.transcript[0].result.as_ref().unwrap();
        assert!(result.is_error);
        assert!(result.output.contains("Unknown tool"));
    }

    #[tokio::test]
    async fn test_malformed_arguments_retry_within_thinking() {
        // Missing required 'query'; the retry does not consume a step.
        let decider = Arc::new(ScriptedDecider::new(vec![
            invoke_decision("web_search", json!({})),
            finish_decision("done"),
        ]));
        let agent = AgentLoop::new(decider.clone(), test_registry(), &settings(15));

        let run = agent.run("find leads").await;

        assert!(run.is_finished());
        assert_eq!(run.steps_used, 0);
        assert_eq!(decider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_consecutive_decision_failures_abort() {
        let decider = Arc::new(ScriptedDecider::new(vec![
            Err(SpanaError::OpenAI("boom".to_string())),
            Err(SpanaError::OpenAI("boom".to_string())),
            Err(SpanaError::OpenAI("boom".to_string())),
        ]));
        let agent = AgentLoop::new(decider.clone(), test_registry(), &settings(15));

        let run = agent.run("find leads").await;

        assert!(!run.is_finished());
        assert_eq!(decider.call_count(), 3);
        assert!(run.output().contains("decision failed 3 times"));
    }

    #[tokio::test]
    async fn test_successful_step_resets_decision_failures() {
        // Two failures, a good step, then two more failures: never three
        // in a row, so the last decision still goes through.
        let decider = Arc::new(ScriptedDecider::new(vec![
            Err(SpanaError::OpenAI("boom".to_string())),
            Err(SpanaError::OpenAI("boom".to_string())),
            query_decision(),
            Err(SpanaError::OpenAI("boom".to_string())),
            Err(SpanaError::OpenAI("boom".to_string())),
            finish_decision("done"),
        ]));
        let agent = AgentLoop::new(decider.clone(), test_registry(), &settings(15));

        let run = agent.run("find leads").await;

        assert!(run.is_finished());
        assert_eq!(decider.call_count(), 6);
    }

    #[tokio::test]
    async fn test_wall_clock_budget_aborts_before_deciding() {
        let decider = Arc::new(ScriptedDecider::new(vec![finish_decision("too late")]));
        let mut agent_settings = settings(15);
        agent_settings.max_duration_seconds = Some(0);
        let agent = AgentLoop::new(decider.clone(), test_registry(), &agent_settings);

        let run = agent.run("find leads").await;

        assert!(!run.is_finished());
        assert_eq!(decider.call_count(), 0);
        assert!(run.output().contains("wall-clock"));
    }

    #[tokio::test]
    async fn test_aborted_output_summarizes_tool_calls() {
        let decider = Arc::new(ScriptedDecider::new(vec![
            query_decision(),
            Err(SpanaError::OpenAI("boom".to_string())),
            Err(SpanaError::OpenAI("boom".to_string())),
            Err(SpanaError::OpenAI("boom".to_string())),
        ]));
        let agent = AgentLoop::new(decider, test_registry(), &settings(15));

        let run = agent.run("find leads").await;

        assert!(!run.is_finished());
        let output = run.output();
        assert!(output.contains("Tool calls made:"));
        assert!(output.contains("vector_query"));
    }
}
