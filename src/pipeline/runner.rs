//! Uniform retry wrapper around pipeline stages.

use super::state::{PipelineState, Stage};
use crate::config::PipelineSettings;
use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Bounded, deterministic backoff between stage attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts per stage (1 = no retries).
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &PipelineSettings) -> Self {
        Self {
            max_retries: settings.max_retries.max(1),
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
        }
    }

    /// Delay applied after the zero-based `attempt` has failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay)
    }
}

/// Run one pipeline stage with retries.
///
/// Each attempt gets a clone of the state and returns the updated state;
/// the first success wins and is returned immediately. When every attempt
/// fails, the failure is recorded on the original state via `add_error`
/// and that state is returned otherwise unchanged, so the caller can
/// decide whether the pipeline continues.
pub async fn run_stage<F, Fut>(
    stage: Stage,
    mut state: PipelineState,
    policy: &RetryPolicy,
    stage_fn: F,
) -> PipelineState
where
    F: Fn(PipelineState) -> Fut,
    Fut: Future<Output = Result<PipelineState>>,
{
    state.enter_stage(stage);

    let mut last_error = String::new();
    for attempt in 0..policy.max_retries {
        info!("[{}] attempt {} of {}", stage, attempt + 1, policy.max_retries);
        match stage_fn(state.clone()).await {
            Ok(updated) => {
                info!("[{}] completed", stage);
                return updated;
            }
            Err(e) => {
                warn!("[{}] attempt {} failed: {}", stage, attempt + 1, e);
                last_error = e.to_string();
                if attempt + 1 < policy.max_retries {
                    tokio::time::sleep(policy.delay_for(attempt)).await;
                }
            }
        }
    }

    state.add_error(
        stage,
        format!(
            "failed after {} attempts, last error: {}",
            policy.max_retries, last_error
        ),
    );
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SpanaError;
    use crate::pipeline::state::PipelineStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn test_first_success_returns_immediately() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in = calls.clone();

        let state = run_stage(
            Stage::Outreach,
            PipelineState::new(),
            &fast_policy(3),
            move |mut state| {
                let calls = calls_in.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    state.outreach_email = Some("Subject: hello".to_string());
                    Ok(state)
                }
            },
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.outreach_email.as_deref(), Some("Subject: hello"));
        assert_eq!(state.status, PipelineStatus::InProgress);
        assert!(state.errors.is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_retries_record_stage_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in = calls.clone();

        let state = run_stage(
            Stage::Research,
            PipelineState::new(),
            &fast_policy(3),
            move |_state| {
                let calls = calls_in.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<PipelineState, _>(SpanaError::Agent("no leads".to_string()))
                }
            },
        )
        .await;

        // max_retries is the total attempt count, not extra attempts.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(state.status, PipelineStatus::Error);
        assert!(state.has_error(Stage::Research));
        assert!(state.errors[&Stage::Research].contains("no leads"));
        assert_eq!(state.current_stage, Some(Stage::Research));
    }

    #[tokio::test]
    async fn test_retry_recovers_after_transient_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in = calls.clone();

        let state = run_stage(
            Stage::Qualification,
            PipelineState::new(),
            &fast_policy(3),
            move |mut state| {
                let calls = calls_in.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        return Err(SpanaError::OpenAI("rate limited".to_string()));
                    }
                    state.qualified_lead.insert(
                        "fit_score".to_string(),
                        serde_json::Value::from(8),
                    );
                    Ok(state)
                }
            },
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(state.errors.is_empty());
        assert_eq!(state.qualified_lead["fit_score"], 8);
    }

    #[test]
    fn test_backoff_doubles_up_to_the_cap() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(250),
        };

        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(250));
        assert_eq!(policy.delay_for(10), Duration::from_millis(250));
    }
}
