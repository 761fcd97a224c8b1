//! Agent run transcripts and their on-disk log.

use super::tools::{ToolInvocation, ToolResult};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// One think-act-observe record.
///
/// A step with no invocation is a closing thought; a step with an
/// invocation but an error result is a failed action the agent observed.
#[derive(Debug, Clone, Serialize)]
pub struct AgentStep {
    pub thought: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invocation: Option<ToolInvocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolResult>,
}

#[derive(Serialize)]
struct TranscriptRecord<'a> {
    recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    step: &'a AgentStep,
}

/// Append-only JSONL log of one agent run, one record per step.
pub struct TranscriptLog {
    path: PathBuf,
}

impl TranscriptLog {
    /// Create a log for a run under the given directory.
    pub fn create(dir: &Path, run_id: Uuid) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.jsonl", run_id));
        Ok(Self { path })
    }

    pub fn append(&self, step: &AgentStep) -> Result<()> {
        let record = TranscriptRecord {
            recorded_at: Utc::now(),
            step,
        };
        let line = serde_json::to_string(&record)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
