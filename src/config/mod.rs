//! Configuration module for Spana.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{
    AgentPrompts, ChatPrompts, FollowupPrompts, OutreachPrompts, Prompts, QualificationPrompts,
};
pub use settings::{
    AgentSettings, ChunkingSettings, EmbeddingSettings, FetchSettings, GeneralSettings,
    IndexProvider, IndexSettings, OpenAiSettings, PipelineSettings, PromptSettings,
    SearchSettings, Settings,
};
