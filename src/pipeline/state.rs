//! Workflow state threaded through the lead pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A phase of the lead workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Research,
    Qualification,
    Outreach,
    FollowUp,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Research => "research",
            Stage::Qualification => "qualification",
            Stage::Outreach => "outreach",
            Stage::FollowUp => "follow_up",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    InProgress,
    Done,
    Error,
}

/// Mutable record of one pipeline run.
///
/// Only the stage currently executing mutates it; each stage writes its
/// own fields and leaves the rest alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    pub pipeline_id: Uuid,
    pub current_stage: Option<Stage>,
    pub status: PipelineStatus,
    /// Raw lead data from research.
    pub lead: serde_json::Map<String, serde_json::Value>,
    /// Lead data enriched with fit scoring.
    pub qualified_lead: serde_json::Map<String, serde_json::Value>,
    pub outreach_email: Option<String>,
    pub followup_plan: Option<String>,
    /// Per-stage error messages.
    pub errors: BTreeMap<Stage, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PipelineState {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            pipeline_id: Uuid::new_v4(),
            current_stage: None,
            status: PipelineStatus::InProgress,
            lead: serde_json::Map::new(),
            qualified_lead: serde_json::Map::new(),
            outreach_email: None,
            followup_plan: None,
            errors: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark a stage as the one currently executing.
    pub fn enter_stage(&mut self, stage: Stage) {
        self.current_stage = Some(stage);
        self.updated_at = Utc::now();
    }

    /// Record a stage failure. This is the only path to `Error` status.
    pub fn add_error(&mut self, stage: Stage, message: impl Into<String>) {
        self.errors.insert(stage, message.into());
        self.status = PipelineStatus::Error;
        self.updated_at = Utc::now();
    }

    pub fn has_error(&self, stage: Stage) -> bool {
        self.errors.contains_key(&stage)
    }

    /// Mark the run finished. A run that recorded errors keeps `Error`
    /// status; partial success is still a completed run.
    pub fn complete(&mut self) {
        if self.status != PipelineStatus::Error {
            self.status = PipelineStatus::Done;
        }
        self.updated_at = Utc::now();
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_starts_in_progress() {
        let state = PipelineState::new();
        assert_eq!(state.status, PipelineStatus::InProgress);
        assert!(state.current_stage.is_none());
        assert!(state.lead.is_empty());
        assert!(state.errors.is_empty());
    }

    #[test]
    fn test_add_error_sets_error_status() {
        let mut state = PipelineState::new();
        state.enter_stage(Stage::Qualification);
        state.add_error(Stage::Qualification, "model unreachable");

        assert_eq!(state.status, PipelineStatus::Error);
        assert!(state.has_error(Stage::Qualification));
        assert_eq!(
            state.errors.get(&Stage::Qualification).map(String::as_str),
            Some("model unreachable")
        );
    }

    #[test]
    fn test_complete_keeps_error_status() {
        let mut state = PipelineState::new();
        state.add_error(Stage::Outreach, "boom");
        state.complete();
        assert_eq!(state.status, PipelineStatus::Error);

        let mut clean = PipelineState::new();
        clean.complete();
        assert_eq!(clean.status, PipelineStatus::Done);
    }

    #[test]
    fn test_state_serializes_with_stage_keyed_errors() {
        let mut state = PipelineState::new();
        state.enter_stage(Stage::FollowUp);
        state.add_error(Stage::FollowUp, "boom");

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["current_stage"], "follow_up");
        assert_eq!(json["status"], "error");
        assert_eq!(json["errors"]["follow_up"], "boom");

        let back: PipelineState = serde_json::from_value(json).unwrap();
        assert!(back.has_error(Stage::FollowUp));
    }
}
