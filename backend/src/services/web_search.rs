use std::time::Duration;

use serde::Deserialize;

use crate::config::Config;

const SEARCH_URL: &str = "https://www.googleapis.com/customsearch/v1";

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
}

impl SearchResponse {
    fn snippets(&self) -> String {
        self.items
            .iter()
            .take(3)
            .map(|item| format!("{}: {}", item.title, item.snippet))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Google Custom Search, used to ground replies in fresh results.
#[derive(Clone, Debug)]
pub struct WebSearch {
    client: reqwest::Client,
    api_key: String,
    engine_id: String,
}

impl WebSearch {
    pub fn from_config(config: &Config) -> Option<Self> {
        let (api_key, engine_id) = config.search_credentials()?;
        Some(Self {
            client: reqwest::Client::new(),
            api_key,
            engine_id,
        })
    }

    /// Top three results as `title: snippet` lines. Failures are logged and yield `None`.
    pub async fn snippets(&self, query: &str) -> Option<String> {
        let result = self
            .client
            .get(SEARCH_URL)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("num", "3"),
            ])
            .timeout(Duration::from_secs(8))
            .send()
            .await;

        let response = match result {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::warn!(status = %response.status(), "search API rejected the query");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "search request failed");
                return None;
            }
        };

        match response.json::<SearchResponse>().await {
            Ok(parsed) => Some(parsed.snippets()),
            Err(e) => {
                tracing::warn!(error = %e, "malformed search response");
                None
            }
        }
    }
}
