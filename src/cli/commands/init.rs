//! Init command - interactive first-run setup.

use crate::cli::preflight::key_present;
use crate::cli::Output;
use crate::config::Settings;
use console::style;
use std::io::{self, Write};

/// Run the init command for first-time setup.
pub fn run_init(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Spana Setup");
    println!();
    println!("Welcome to Spana! Let's make sure everything is configured correctly.\n");

    // Step 1: Check API keys
    println!("{}", style("Step 1: Checking API configuration").bold().cyan());
    println!();

    let openai_ok = key_present(settings.openai.api_key.as_deref(), "OPENAI_API_KEY");
    let serpapi_ok = key_present(settings.search.api_key.as_deref(), "SERPAPI_API_KEY");

    if !openai_ok {
        Output::warning("No OpenAI API key found.");
        println!();
        println!("  Spana requires an OpenAI API key for the agent, pipeline stages and embeddings.");
        println!("  Get your API key from: {}", style("https://platform.openai.com/api-keys").underlined());
        println!();
        println!("  Set it in your shell configuration (~/.bashrc, ~/.zshrc, etc.):");
        println!("  {}", style("export OPENAI_API_KEY='sk-...'").green());
        println!("  or put it under [openai] api_key in the config file.");
        println!();

        if !prompt_continue("Continue without API key?")? {
            println!();
            Output::info("Setup cancelled. Set your API key and run 'spana init' again.");
            return Ok(());
        }
    } else {
        Output::success("OpenAI API key is configured!");
    }

    if !serpapi_ok {
        Output::warning("No SerpAPI key found. Web search will be unavailable.");
        println!();
        println!("  Get a key from: {}", style("https://serpapi.com/manage-api-key").underlined());
        println!("  Set it with: {}", style("export SERPAPI_API_KEY='...'").green());
        println!("  or put it under [search] api_key in the config file.");
        println!();
    } else {
        Output::success("SerpAPI key is configured!");
    }

    println!();

    // Step 2: Create directories
    println!("{}", style("Step 2: Setting up directories").bold().cyan());
    println!();

    let data_dir = settings.data_dir();
    let transcripts_dir = settings.transcripts_dir();

    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)?;
        Output::success(&format!("Created data directory: {}", data_dir.display()));
    } else {
        Output::info(&format!("Data directory exists: {}", data_dir.display()));
    }

    if !transcripts_dir.exists() {
        std::fs::create_dir_all(&transcripts_dir)?;
        Output::success(&format!(
            "Created transcripts directory: {}",
            transcripts_dir.display()
        ));
    } else {
        Output::info(&format!(
            "Transcripts directory exists: {}",
            transcripts_dir.display()
        ));
    }

    println!();

    // Step 3: Create config file
    println!("{}", style("Step 3: Configuration file").bold().cyan());
    println!();

    let config_path = Settings::default_config_path();
    if config_path.exists() {
        Output::info(&format!("Config file exists: {}", config_path.display()));
    } else if prompt_continue("Create default configuration file?")? {
        settings.save_to(&config_path)?;
        Output::success(&format!("Created config file: {}", config_path.display()));
        println!();
        println!("  Edit your config with: {}", style("spana config edit").green());
    } else {
        Output::info("Skipped config file creation. Using defaults.");
    }

    println!();

    // Summary
    println!("{}", style("Setup Complete!").bold().green());
    println!();
    println!("Next steps:");
    println!("  {} Check system status", style("spana doctor").cyan());
    println!(
        "  {} Research your first leads",
        style("spana research \"<objective>\"").cyan()
    );
    println!("  {} Explore interactively", style("spana chat").cyan());
    println!();
    println!("For more help: {}", style("spana --help").cyan());

    Ok(())
}

/// Prompt user for yes/no confirmation.
fn prompt_continue(message: &str) -> io::Result<bool> {
    print!("{} {} ", style("?").cyan(), message);
    print!("{} ", style("[y/N]").dim());
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(input.trim().to_lowercase() == "y" || input.trim().to_lowercase() == "yes")
}
