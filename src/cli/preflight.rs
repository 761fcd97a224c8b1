//! Pre-flight checks before expensive operations.
//!
//! Validates that required API keys are configured before starting
//! operations that would otherwise fail midway.

use crate::config::Settings;
use crate::error::{Result, SpanaError};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// A full research run needs OpenAI and SerpAPI credentials.
    Research,
    /// Chat needs OpenAI; web search degrades gracefully without a key.
    Chat,
    /// Ingestion needs OpenAI for embeddings.
    Ingest,
    /// Index queries need OpenAI for the query embedding.
    Query,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Research => {
            check_openai_key(settings)?;
            check_serpapi_key(settings)?;
        }
        Operation::Chat | Operation::Ingest | Operation::Query => {
            check_openai_key(settings)?;
        }
    }
    Ok(())
}

/// Check that an OpenAI API key is available, config first, environment
/// as fallback.
fn check_openai_key(settings: &Settings) -> Result<()> {
    if key_present(settings.openai.api_key.as_deref(), "OPENAI_API_KEY") {
        return Ok(());
    }
    Err(SpanaError::Config(
        "OpenAI API key not configured. Set openai.api_key in config.toml or export OPENAI_API_KEY='sk-...'"
            .to_string(),
    ))
}

/// Check that a SerpAPI key is available, config first, environment
/// as fallback.
fn check_serpapi_key(settings: &Settings) -> Result<()> {
    if key_present(settings.search.api_key.as_deref(), "SERPAPI_API_KEY") {
        return Ok(());
    }
    Err(SpanaError::Config(
        "SerpAPI key not configured. Set search.api_key in config.toml or export SERPAPI_API_KEY"
            .to_string(),
    ))
}

/// A key counts as present when the config value or the environment
/// variable holds a non-empty string.
pub(crate) fn key_present(configured: Option<&str>, env_var: &str) -> bool {
    if configured.is_some_and(|k| !k.is_empty()) {
        return true;
    }
    std::env::var(env_var).is_ok_and(|k| !k.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_keys_pass_without_environment() {
        let mut settings = Settings::default();
        settings.openai.api_key = Some("sk-test".to_string());
        settings.search.api_key = Some("serp-test".to_string());

        assert!(check(Operation::Research, &settings).is_ok());
        assert!(check(Operation::Chat, &settings).is_ok());
    }

    #[test]
    fn test_empty_configured_key_does_not_count() {
        assert!(!key_present(Some(""), "SPANA_TEST_KEY_THAT_IS_NEVER_SET"));
        assert!(!key_present(None, "SPANA_TEST_KEY_THAT_IS_NEVER_SET"));
        assert!(key_present(Some("k"), "SPANA_TEST_KEY_THAT_IS_NEVER_SET"));
    }
}
