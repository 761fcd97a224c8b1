//! The staged lead workflow: research, qualification, outreach and
//! follow-up planning, each independently retried.

mod runner;
mod stages;
mod state;

pub use runner::{run_stage, RetryPolicy};
pub use stages::{LeadPipeline, PipelineRun};
pub use state::{PipelineState, PipelineStatus, Stage};
