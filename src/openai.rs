//! OpenAI client configuration with sensible defaults.

use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

use crate::config::OpenAiSettings;

/// Default timeout for OpenAI API requests (5 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Create an OpenAI client from the `[openai]` settings section.
///
/// Credentials come from the settings when present; otherwise the client
/// falls back to the `OPENAI_API_KEY` environment variable. A bounded
/// timeout prevents hung API calls.
pub fn create_client(settings: &OpenAiSettings) -> Client<OpenAIConfig> {
    let timeout = Duration::from_secs(settings.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECS));

    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .expect("Failed to create HTTP client");

    let mut config = OpenAIConfig::default();
    if let Some(key) = &settings.api_key {
        config = config.with_api_key(key);
    }
    if let Some(base) = &settings.api_base {
        config = config.with_api_base(base);
    }

    Client::with_config(config).with_http_client(http_client)
}
