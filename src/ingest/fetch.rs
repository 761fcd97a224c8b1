//! Page fetching and HTML-to-text extraction.

use crate::config::FetchSettings;
use crate::error::{Result, SpanaError};
use regex::Regex;
use std::time::Duration;
use url::Url;

/// Fetches web pages and reduces them to plain text.
///
/// Pages are fetched with a bounded timeout, a capped redirect chain and a
/// capped body size. HTML is stripped with regexes rather than a full
/// parser; that is rough but good enough for chunking and retrieval.
pub struct PageFetcher {
    client: reqwest::Client,
    max_body_bytes: usize,
    script_re: Regex,
    style_re: Regex,
    comment_re: Regex,
    block_re: Regex,
    tag_re: Regex,
    whitespace_re: Regex,
}

impl PageFetcher {
    /// Create a fetcher from the `[fetch]` settings section.
    pub fn new(settings: &FetchSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .redirect(reqwest::redirect::Policy::limited(settings.max_redirects))
            .user_agent(&settings.user_agent)
            .build()?;

        Ok(Self {
            client,
            max_body_bytes: settings.max_body_bytes,
            script_re: Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("Invalid regex"),
            style_re: Regex::new(r"(?is)<style[^>]*>.*?</style>").expect("Invalid regex"),
            comment_re: Regex::new(r"(?s)<!--.*?-->").expect("Invalid regex"),
            block_re: Regex::new(r"(?i)</(?:p|div|section|article|li|h[1-6]|tr|blockquote)\s*>|<br\s*/?>")
                .expect("Invalid regex"),
            tag_re: Regex::new(r"<[^>]*>").expect("Invalid regex"),
            whitespace_re: Regex::new(r"\s+").expect("Invalid regex"),
        })
    }

    /// Fetch a page and return its extracted text.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        validate_url(url)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SpanaError::Fetch(format!("{}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(SpanaError::Fetch(format!(
                "{} returned HTTP {}",
                url,
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SpanaError::Fetch(format!("{}: {}", url, e)))?;

        if bytes.len() > self.max_body_bytes {
            return Err(SpanaError::Fetch(format!(
                "{} response too large: {} bytes (max {})",
                url,
                bytes.len(),
                self.max_body_bytes
            )));
        }

        let html = String::from_utf8_lossy(&bytes);
        Ok(self.html_to_text(&html))
    }

    /// Strip HTML down to readable text, preserving paragraph breaks.
    pub fn html_to_text(&self, html: &str) -> String {
        let text = self.script_re.replace_all(html, " ");
        let text = self.style_re.replace_all(&text, " ");
        let text = self.comment_re.replace_all(&text, " ");
        // Block-level closers become paragraph breaks before tags are dropped
        let text = self.block_re.replace_all(&text, "\n\n");
        let text = self.tag_re.replace_all(&text, " ");

        let text = text
            .replace("&amp;", "&")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&nbsp;", " ");

        // Collapse whitespace within paragraphs, drop empty ones
        let paragraphs: Vec<String> = text
            .split("\n\n")
            .map(|p| self.whitespace_re.replace_all(p, " ").trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        paragraphs.join("\n\n")
    }
}

/// Reject URLs that cannot be fetched over HTTP.
fn validate_url(raw: &str) -> Result<()> {
    let parsed =
        Url::parse(raw).map_err(|_| SpanaError::Fetch(format!("invalid URL: {}", raw)))?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(SpanaError::Fetch(format!(
            "unsupported URL scheme '{}': {}",
            other, raw
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher() -> PageFetcher {
        PageFetcher::new(&FetchSettings::default()).unwrap()
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.com/page").is_ok());
        assert!(validate_url("http://example.com").is_ok());
        assert!(validate_url("ftp://files.example.com").is_err());
        assert!(validate_url("file:///etc/passwd").is_err());
        assert!(validate_url("not a url").is_err());
    }

    #[test]
    fn test_html_to_text_strips_scripts_and_styles() {
        let html = r#"<html><head><style>body { color: red; }</style></head>
            <body><script type="text/javascript">var x = "<p>not text</p>";
            </script><p>Actual content.</p></body></html>"#;
        let text = fetcher().html_to_text(html);
        assert_eq!(text, "Actual content.");
    }

    #[test]
    fn test_html_to_text_decodes_entities() {
        let html = "<p>Research &amp; Development &lt;Team&gt; &quot;A&quot;&nbsp;&#39;B&#39;</p>";
        let text = fetcher().html_to_text(html);
        assert_eq!(text, "Research & Development <Team> \"A\" 'B'");
    }

    #[test]
    fn test_html_to_text_preserves_paragraphs() {
        let html = "<div><p>First    paragraph\nwith wrapping.</p><p>Second paragraph.</p></div>";
        let text = fetcher().html_to_text(html);
        assert_eq!(text, "First paragraph with wrapping.\n\nSecond paragraph.");
    }

    #[test]
    fn test_html_to_text_strips_comments() {
        let html = "<p>Visible</p><!-- hidden <b>markup</b> -->";
        let text = fetcher().html_to_text(html);
        assert_eq!(text, "Visible");
    }

    #[test]
    fn test_html_to_text_plain_text_passthrough() {
        let text = fetcher().html_to_text("No markup here at all.");
        assert_eq!(text, "No markup here at all.");
    }

    #[test]
    fn test_html_to_text_empty_page() {
        assert_eq!(fetcher().html_to_text(""), "");
        assert_eq!(fetcher().html_to_text("<html><body></body></html>"), "");
    }
}
