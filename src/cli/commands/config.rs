//! Config command implementation.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use anyhow::Result;
use std::path::Path;

/// Run the config command.
pub fn run_config(action: &ConfigAction, settings: Settings) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let toml_str = toml::to_string_pretty(&settings)
                .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;
            println!("{}", toml_str);
        }

        ConfigAction::Set { key, value } => {
            let config_path = Settings::default_config_path();
            set_value(&config_path, key, value)?;
            Output::success(&format!("Set {} = {}", key, value));
            Output::info(&format!("Config file: {}", config_path.display()));
        }

        ConfigAction::Edit => {
            let config_path = Settings::default_config_path();

            // Create default config if it doesn't exist
            if !config_path.exists() {
                settings.save()?;
                Output::info(&format!("Created default config at {:?}", config_path));
            }

            // Try to open in editor
            let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vim".to_string());

            Output::info(&format!("Opening config in {}...", editor));

            let status = std::process::Command::new(&editor)
                .arg(&config_path)
                .status();

            match status {
                Ok(s) if s.success() => {
                    Output::success("Config saved.");
                }
                Ok(_) => {
                    Output::warning("Editor exited with non-zero status.");
                }
                Err(e) => {
                    Output::error(&format!("Failed to open editor: {}", e));
                    Output::info(&format!("Config file is at: {:?}", config_path));
                }
            }
        }

        ConfigAction::Path => {
            let config_path = Settings::default_config_path();
            println!("{}", config_path.display());
        }
    }

    Ok(())
}

/// Set one dotted key (e.g. "agent.model") in the config file.
///
/// The updated document is deserialized back into [`Settings`] before it
/// is written, so a value of the wrong type is rejected instead of
/// producing a config file that no longer loads.
fn set_value(path: &Path, key: &str, value: &str) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();
    let Some((leaf, sections)) = parts.split_last() else {
        anyhow::bail!("empty config key");
    };
    if sections.is_empty() || leaf.is_empty() || sections.iter().any(|s| s.is_empty()) {
        anyhow::bail!(
            "config keys look like section.name (e.g. agent.model), got '{}'",
            key
        );
    }

    let mut root: toml::Value = if path.exists() {
        toml::from_str(&std::fs::read_to_string(path)?)?
    } else {
        toml::Value::Table(toml::map::Map::new())
    };

    let mut node = &mut root;
    for section in sections {
        let table = node
            .as_table_mut()
            .ok_or_else(|| anyhow::anyhow!("'{}' is not a table", section))?;
        node = table
            .entry(section.to_string())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }
    let table = node
        .as_table_mut()
        .ok_or_else(|| anyhow::anyhow!("'{}' does not name a config section", key))?;
    table.insert((*leaf).to_string(), coerce_value(value));

    // Round-trip through Settings so a bad key or type fails here, not on
    // the next load.
    let _: Settings = root
        .clone()
        .try_into()
        .map_err(|e| anyhow::anyhow!("'{}' would break the config: {}", key, e))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(&root)?)?;
    Ok(())
}

/// Interpret the value as a bool, integer or float before falling back
/// to a string.
fn coerce_value(value: &str) -> toml::Value {
    if let Ok(b) = value.parse::<bool>() {
        return toml::Value::Boolean(b);
    }
    if let Ok(i) = value.parse::<i64>() {
        return toml::Value::Integer(i);
    }
    if let Ok(f) = value.parse::<f64>() {
        return toml::Value::Float(f);
    }
    toml::Value::String(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_value_types() {
        assert_eq!(coerce_value("true"), toml::Value::Boolean(true));
        assert_eq!(coerce_value("15"), toml::Value::Integer(15));
        assert_eq!(coerce_value("0.4"), toml::Value::Float(0.4));
        assert_eq!(
            coerce_value("gpt-4o-mini"),
            toml::Value::String("gpt-4o-mini".to_string())
        );
    }

    #[test]
    fn test_set_value_creates_section_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        set_value(&path, "agent.model", "gpt-4o").unwrap();
        set_value(&path, "agent.max_steps", "20").unwrap();

        let settings = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(settings.agent.model, "gpt-4o");
        assert_eq!(settings.agent.max_steps, 20);
        // Untouched sections keep their defaults.
        assert_eq!(settings.pipeline.max_retries, 3);
    }

    #[test]
    fn test_set_value_rejects_wrong_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let err = set_value(&path, "agent.max_steps", "lots").unwrap_err();
        assert!(err.to_string().contains("would break the config"));
        assert!(!path.exists());
    }

    #[test]
    fn test_set_value_rejects_sectionless_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        assert!(set_value(&path, "model", "gpt-4o").is_err());
    }
}
