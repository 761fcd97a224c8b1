//! CLI output formatting utilities.

use chrono::{DateTime, Utc};
use console::{style, Style};
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print an indexed source row.
    pub fn source_info(url: &str, chunks: u32, indexed_at: &DateTime<Utc>) {
        println!(
            "  {} {} ({} chunks, indexed {})",
            style("*").cyan(),
            style(url).bold(),
            chunks,
            style(indexed_at.format("%Y-%m-%d %H:%M UTC")).dim()
        );
    }

    /// Print a web search hit.
    pub fn search_hit(position: Option<u32>, title: &str, link: &str, snippet: Option<&str>) {
        let marker = match position {
            Some(p) => format!("{:2}.", p),
            None => " *.".to_string(),
        };
        println!("\n{} {}", style(marker).green(), style(title).bold());
        println!("    {}", style(link).cyan());
        if let Some(snippet) = snippet {
            println!("    {}", style(content_preview(snippet, 200)).dim());
        }
    }

    /// Print an index query match.
    pub fn chunk_match(source: &str, score: f32, content: &str) {
        println!(
            "\n{} {} (score: {:.2})",
            style(">>").green(),
            style(source).bold(),
            score
        );
        println!("   {}", content_preview(content, 240));
    }

    /// Create a progress bar.
    pub fn progress_bar(len: u64, msg: &str) -> ProgressBar {
        let pb = ProgressBar::new(len);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        pb.set_message(msg.to_string());
        pb
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap(),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }

    /// Style for titles.
    pub fn title_style() -> Style {
        Style::new().bold()
    }

    /// Style for dim text.
    pub fn dim_style() -> Style {
        Style::new().dim()
    }
}

/// Truncate content with ellipsis, folding newlines away.
pub(crate) fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_chars {
        content
    } else {
        let cut: String = content.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
