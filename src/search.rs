//! Web search via the SerpAPI Google endpoint.

use crate::config::SearchSettings;
use crate::error::{Result, SpanaError};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument};

/// A single organic search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    pub title: String,
    pub link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// SerpAPI search client.
///
/// The API key is resolved once at construction, from settings first and
/// the `SERPAPI_API_KEY` environment variable as fallback.
pub struct SearchClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    engine: String,
    location: Option<String>,
    google_domain: String,
    language: String,
    country: String,
}

impl SearchClient {
    pub fn from_settings(settings: &SearchSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .or_else(|| std::env::var("SERPAPI_API_KEY").ok())
            .ok_or_else(|| {
                SpanaError::Config(
                    "SerpAPI key not configured. Set search.api_key in config.toml or export SERPAPI_API_KEY".to_string(),
                )
            })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()?;

        Ok(Self {
            http,
            endpoint: settings.endpoint.clone(),
            api_key,
            engine: settings.engine.clone(),
            location: settings.location.clone(),
            google_domain: settings.google_domain.clone(),
            language: settings.language.clone(),
            country: settings.country.clone(),
        })
    }

    /// Run a search and return the organic results.
    ///
    /// A response without organic results is a valid empty answer, not an
    /// error.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&self.query_params(query, max_results))
            .send()
            .await
            .map_err(|e| SpanaError::Search(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            let detail = body["error"].as_str().unwrap_or("no error detail");
            return Err(SpanaError::Search(format!(
                "SerpAPI returned HTTP {}: {}",
                status, detail
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SpanaError::Search(format!("invalid response body: {}", e)))?;

        let hits = parse_results(&body);
        debug!("Search for '{}' returned {} hits", query, hits.len());
        Ok(hits)
    }

    fn query_params(&self, query: &str, max_results: usize) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("engine", self.engine.clone()),
            ("q", query.to_string()),
            ("google_domain", self.google_domain.clone()),
            ("hl", self.language.clone()),
            ("gl", self.country.clone()),
            ("api_key", self.api_key.clone()),
            ("num", max_results.to_string()),
        ];
        if let Some(location) = &self.location {
            params.push(("location", location.clone()));
        }
        params
    }
}

fn parse_results(body: &serde_json::Value) -> Vec<SearchHit> {
    let Some(results) = body["organic_results"].as_array() else {
        return Vec::new();
    };

    results
        .iter()
        .filter_map(|entry| {
            let link = entry["link"].as_str()?.to_string();
            Some(SearchHit {
                position: entry["position"].as_u64().map(|p| p as u32),
                title: entry["title"].as_str().unwrap_or("Untitled").to_string(),
                link,
                snippet: entry["snippet"].as_str().map(|s| s.to_string()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings_with_key() -> SearchSettings {
        SearchSettings {
            api_key: Some("test-key".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_results_extracts_hits() {
        let body = json!({
            "organic_results": [
                {
                    "position": 1,
                    "title": "ABC Events",
                    "link": "https://abcevents.com",
                    "snippet": "Leading event management company in Bangalore"
                },
                {
                    "position": 2,
                    "title": "XYZ Venues",
                    "link": "https://xyzvenues.com"
                }
            ]
        });

        let hits = parse_results(&body);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "ABC Events");
        assert_eq!(hits[0].link, "https://abcevents.com");
        assert_eq!(
            hits[0].snippet.as_deref(),
            Some("Leading event management company in Bangalore")
        );
        assert_eq!(hits[1].position, Some(2));
        assert!(hits[1].snippet.is_none());
    }

    #[test]
    fn test_parse_results_without_organic_results_is_empty() {
        let body = json!({"search_metadata": {"status": "Success"}});
        assert!(parse_results(&body).is_empty());
    }

    #[test]
    fn test_parse_results_skips_entries_without_link() {
        let body = json!({
            "organic_results": [
                {"title": "No link here"},
                {"title": "Good", "link": "https://example.com"}
            ]
        });

        let hits = parse_results(&body);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].link, "https://example.com");
    }

    #[test]
    fn test_query_params_cover_the_search_contract() {
        let client = SearchClient::from_settings(&settings_with_key()).unwrap();
        let params = client.query_params("coffee roasters in Portland", 15);

        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("engine"), Some("google_light"));
        assert_eq!(get("q"), Some("coffee roasters in Portland"));
        assert_eq!(get("num"), Some("15"));
        assert_eq!(get("api_key"), Some("test-key"));
        assert_eq!(get("google_domain"), Some("google.com"));
        assert_eq!(get("hl"), Some("en"));
        assert_eq!(get("gl"), Some("us"));
        // No default location is sent unless configured.
        assert_eq!(get("location"), None);
    }

    #[test]
    fn test_query_params_include_configured_location() {
        let mut settings = settings_with_key();
        settings.location = Some("Austin, Texas".to_string());
        let client = SearchClient::from_settings(&settings).unwrap();

        let params = client.query_params("bbq", 10);
        assert!(params
            .iter()
            .any(|(k, v)| *k == "location" && v == "Austin, Texas"));
    }
}
