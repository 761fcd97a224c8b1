//! The tool-calling research agent.
//!
//! An LLM-driven loop that searches the web, ingests pages into the
//! retrieval index, and queries it, one bounded think-act-observe cycle
//! at a time, until it produces a lead list or runs out of budget.

mod decider;
mod runner;
mod tools;
mod transcript;

pub use decider::{Decider, Decision, OpenAiDecider};
pub use runner::{AgentLoop, AgentRun, RunOutcome};
pub use tools::{tool_definitions, ToolCall, ToolInvocation, ToolRegistry, ToolResult};
pub use transcript::{AgentStep, TranscriptLog};
