//! Doctor command - verify configuration, API keys and index health.

use super::open_index;
use crate::cli::Output;
use crate::config::{IndexProvider, Settings};
use console::style;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub async fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Spana Doctor");
    println!();
    println!("Checking configuration and index health...\n");

    let mut checks = Vec::new();

    // Check API keys
    println!("{}", style("API Configuration").bold());
    let openai_check = check_openai_api_key(settings);
    openai_check.print();
    checks.push(openai_check);
    let serpapi_check = check_serpapi_key(settings);
    serpapi_check.print();
    checks.push(serpapi_check);

    println!();

    // Check the retrieval index
    println!("{}", style("Retrieval Index").bold());
    let index_checks = check_index(settings).await;
    for check in &index_checks {
        check.print();
    }
    checks.extend(index_checks);

    println!();

    // Check directories
    println!("{}", style("Directories").bold());
    let dir_check = check_data_dir(settings);
    dir_check.print();
    checks.push(dir_check);

    println!();

    // Check configuration
    println!("{}", style("Configuration").bold());
    let config_check = check_config_file();
    config_check.print();
    checks.push(config_check);

    println!();

    // Summary
    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using Spana.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Spana is ready to use.");
    }

    Ok(())
}

/// Check if the OpenAI API key is configured, config first.
fn check_openai_api_key(settings: &Settings) -> CheckResult {
    let configured = settings
        .openai
        .api_key
        .clone()
        .filter(|k| !k.is_empty())
        .map(|k| (k, "config.toml"));
    let from_env = std::env::var("OPENAI_API_KEY")
        .ok()
        .filter(|k| !k.is_empty())
        .map(|k| (k, "environment"));

    match configured.or(from_env) {
        Some((key, source)) if key.starts_with("sk-") && key.len() > 20 => CheckResult::ok(
            "OpenAI API key",
            &format!("configured ({}, from {})", mask_key(&key), source),
        ),
        Some((_, source)) => CheckResult::warning(
            "OpenAI API key",
            &format!("set in {} but format looks unusual", source),
            "Expected format: sk-... (OpenAI API key)",
        ),
        None => CheckResult::error(
            "OpenAI API key",
            "not set",
            "Set openai.api_key in config.toml or export OPENAI_API_KEY='sk-...'",
        ),
    }
}

/// Check if the SerpAPI key is configured. Missing is a warning since
/// only web search depends on it.
fn check_serpapi_key(settings: &Settings) -> CheckResult {
    let configured = settings
        .search
        .api_key
        .clone()
        .filter(|k| !k.is_empty())
        .map(|k| (k, "config.toml"));
    let from_env = std::env::var("SERPAPI_API_KEY")
        .ok()
        .filter(|k| !k.is_empty())
        .map(|k| (k, "environment"));

    match configured.or(from_env) {
        Some((key, source)) => CheckResult::ok(
            "SerpAPI key",
            &format!("configured ({}, from {})", mask_key(&key), source),
        ),
        None => CheckResult::warning(
            "SerpAPI key",
            "not set (web search unavailable)",
            "Set search.api_key in config.toml or export SERPAPI_API_KEY",
        ),
    }
}

/// Check the configured retrieval index.
async fn check_index(settings: &Settings) -> Vec<CheckResult> {
    let mut results = Vec::new();

    match settings.index.provider {
        IndexProvider::Memory => {
            results.push(CheckResult::warning(
                "Provider",
                "memory (contents are discarded on exit)",
                "Set index.provider = \"sqlite\" to persist the index",
            ));
        }
        IndexProvider::Sqlite => {
            let db_path = settings.sqlite_path();
            if !db_path.exists() {
                results.push(CheckResult::warning(
                    "Database",
                    &format!("{} (not created yet)", db_path.display()),
                    "The database will be created on first ingest",
                ));
                return results;
            }

            let size = std::fs::metadata(&db_path)
                .map(|m| format_size(m.len()))
                .unwrap_or_else(|_| "unknown size".to_string());
            results.push(CheckResult::ok(
                "Database",
                &format!("{} ({})", db_path.display(), size),
            ));

            match open_and_count(settings).await {
                Ok((chunks, sources)) => {
                    results.push(CheckResult::ok(
                        "Contents",
                        &format!("{} chunks from {} sources", chunks, sources),
                    ));
                }
                Err(e) => {
                    results.push(CheckResult::error(
                        "Contents",
                        &format!("failed to open index: {}", e),
                        "The database may be corrupt; delete it to start fresh",
                    ));
                }
            }
        }
    }

    results
}

async fn open_and_count(settings: &Settings) -> crate::error::Result<(usize, usize)> {
    let index = open_index(settings)?;
    let chunks = index.chunk_count().await?;
    let sources = index.list_sources().await?.len();
    Ok((chunks, sources))
}

/// Check the data directory.
fn check_data_dir(settings: &Settings) -> CheckResult {
    let data_dir = settings.data_dir();
    if data_dir.exists() {
        CheckResult::ok("Data directory", &format!("{}", data_dir.display()))
    } else {
        CheckResult::warning(
            "Data directory",
            &format!("{} (will be created)", data_dir.display()),
            "Directory will be created on first use",
        )
    }
}

/// Check if config file exists.
fn check_config_file() -> CheckResult {
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: spana init (or spana config edit)",
        )
    }
}

/// Mask an API key for display, keeping a short prefix and suffix.
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 11 {
        let prefix: String = chars[..7].iter().collect();
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", prefix, suffix)
    } else {
        "***".to_string()
    }
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_ok() {
        let result = CheckResult::ok("test", "passed");
        assert_eq!(result.status, CheckStatus::Ok);
        assert!(result.hint.is_none());
    }

    #[test]
    fn test_check_result_error() {
        let result = CheckResult::error("test", "failed", "fix it");
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.hint, Some("fix it".to_string()));
    }

    #[test]
    fn test_mask_key_hides_the_middle() {
        let masked = mask_key("sk-abcdefghijklmnopqrstuvwxyz");
        assert_eq!(masked, "sk-abcd...wxyz");
        assert!(!masked.contains("efghij"));
    }

    #[test]
    fn test_mask_key_short_keys_fully_hidden() {
        assert_eq!(mask_key("short"), "***");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.0 GB");
    }
}
