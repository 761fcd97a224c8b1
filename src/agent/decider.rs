//! The decision step of the agent loop.
//!
//! A [`Decider`] looks at the objective and the transcript so far and
//! either picks the next tool invocation or produces the final answer.
//! The OpenAI-backed implementation lives here; tests drive the loop with
//! scripted deciders instead.

use super::tools::{tool_definitions, ToolInvocation};
use super::transcript::AgentStep;
use crate::config::{AgentSettings, OpenAiSettings, Prompts};
use crate::error::{Result, SpanaError};
use crate::openai::create_client;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionToolType, CreateChatCompletionRequestArgs, FunctionCall,
};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

/// What the decision capability chose to do next.
#[derive(Debug, Clone)]
pub enum Decision {
    /// Invoke a tool and observe the result.
    Invoke {
        thought: String,
        invocation: ToolInvocation,
    },
    /// Stop and return the final answer.
    Finish { thought: String, answer: String },
}

/// Chooses the next action for an agent run.
#[async_trait]
pub trait Decider: Send + Sync {
    async fn decide(&self, objective: &str, transcript: &[AgentStep]) -> Result<Decision>;
}

/// Decider backed by an OpenAI chat model with native tool calling.
pub struct OpenAiDecider {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    temperature: f32,
    system_prompt: String,
    user_template: String,
    prompts: Prompts,
}

impl OpenAiDecider {
    pub fn new(openai: &OpenAiSettings, agent: &AgentSettings, prompts: &Prompts) -> Self {
        let system_prompt = prompts.render_with_custom(&prompts.agent.system, &HashMap::new());
        Self {
            client: create_client(openai),
            model: agent.model.clone(),
            temperature: agent.temperature,
            system_prompt,
            user_template: prompts.agent.user.clone(),
            prompts: prompts.clone(),
        }
    }

    /// Replay the transcript as chat messages so the model sees its own
    /// prior tool calls and their observations.
    fn build_messages(
        &self,
        objective: &str,
        transcript: &[AgentStep],
    ) -> Result<Vec<ChatCompletionRequestMessage>> {
        let mut messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.system_prompt.clone())
                .build()
                .map_err(|e| SpanaError::Agent(e.to_string()))?
                .into(),
        ];

        let mut vars = HashMap::new();
        vars.insert("objective".to_string(), objective.to_string());
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(self.prompts.render_with_custom(&self.user_template, &vars))
                .build()
                .map_err(|e| SpanaError::Agent(e.to_string()))?
                .into(),
        );

        for (i, step) in transcript.iter().enumerate() {
            let (Some(invocation), Some(result)) = (&step.invocation, &step.result) else {
                continue;
            };
            let call_id = format!("call_{}", i);

            let mut assistant = ChatCompletionRequestAssistantMessageArgs::default();
            assistant.tool_calls(vec![ChatCompletionMessageToolCall {
                id: call_id.clone(),
                r#type: ChatCompletionToolType::Function,
                function: FunctionCall {
                    name: invocation.tool_name.clone(),
                    arguments: invocation.arguments.to_string(),
                },
            }]);
            if !step.thought.is_empty() {
                assistant.content(step.thought.clone());
            }
            messages.push(
                assistant
                    .build()
                    .map_err(|e| SpanaError::Agent(e.to_string()))?
                    .into(),
            );

            messages.push(
                ChatCompletionRequestToolMessageArgs::default()
                    .tool_call_id(call_id)
                    .content(result.output.clone())
                    .build()
                    .map_err(|e| SpanaError::Agent(e.to_string()))?
                    .into(),
            );
        }

        Ok(messages)
    }
}

#[async_trait]
impl Decider for OpenAiDecider {
    async fn decide(&self, objective: &str, transcript: &[AgentStep]) -> Result<Decision> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(self.temperature)
            .messages(self.build_messages(objective, transcript)?)
            .tools(tool_definitions())
            .build()
            .map_err(|e| SpanaError::Agent(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| SpanaError::OpenAI(format!("Agent API error: {}", e)))?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| SpanaError::Agent("No response from model".to_string()))?;

        if let Some(tool_calls) = &choice.message.tool_calls {
            // Tools run strictly sequentially, so only the first requested
            // call is honored; the rest would go stale after one observation.
            if let Some(call) = tool_calls.first() {
                debug!("Model requested tool: {}", call.function.name);
                let arguments: serde_json::Value = serde_json::from_str(&call.function.arguments)
                    .map_err(|e| SpanaError::InvalidToolArguments {
                        tool: call.function.name.clone(),
                        message: format!("arguments are not valid JSON: {}", e),
                    })?;

                return Ok(Decision::Invoke {
                    thought: choice.message.content.clone().unwrap_or_default(),
                    invocation: ToolInvocation {
                        tool_name: call.function.name.clone(),
                        arguments,
                    },
                });
            }
        }

        let answer = choice.message.content.clone().ok_or_else(|| {
            SpanaError::Agent("Model returned neither a tool call nor an answer".to_string())
        })?;

        Ok(Decision::Finish {
            thought: String::new(),
            answer,
        })
    }
}
