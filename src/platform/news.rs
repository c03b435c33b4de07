//! Headline source for external context

use crate::error::{KairosError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_key_env: String,
    pub query: String,
    pub max_headlines: usize,
    pub request_timeout_secs: u64,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://newsapi.org/v2".to_string(),
            api_key_env: "NEWS_API_KEY".to_string(),
            query: "crypto OR AI".to_string(),
            max_headlines: 5,
            request_timeout_secs: 30,
        }
    }
}

/// News collaborator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Headlines matching `query`, each as a single line of text
    async fn search(&self, query: &str) -> Result<Vec<String>>;
}

/// NewsAPI `/everything` client
pub struct NewsApiClient {
    client: Client,
    config: NewsConfig,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct Articles {
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    #[serde(default)]
    title: Option<String>,
}

impl NewsApiClient {
    pub fn new(config: NewsConfig, api_key: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(KairosError::Config(format!("{} not set", config.api_key_env)));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| KairosError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }
}

#[async_trait]
impl NewsSource for NewsApiClient {
    async fn search(&self, query: &str) -> Result<Vec<String>> {
        let url = format!("{}/everything", self.config.base_url.trim_end_matches('/'));
        debug!("Fetching headlines for '{}'", query);

        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("apiKey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| KairosError::Transport(e.to_string()))?;

        // A refused query yields no context rather than a failed cycle
        if !response.status().is_success() {
            warn!("News request returned status {}", response.status());
            return Ok(Vec::new());
        }

        let body: Articles = response
            .json()
            .await
            .map_err(|e| KairosError::MalformedResponse(format!("news: {}", e)))?;

        Ok(select_headlines(body, self.config.max_headlines))
    }
}

fn select_headlines(body: Articles, max: usize) -> Vec<String> {
    body.articles
        .into_iter()
        .filter_map(|a| a.title)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .take(max)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_select_headlines_skips_untitled_and_caps() {
        let body: Articles = serde_json::from_value(json!({
            "status": "ok",
            "articles": [
                {"title": "One"},
                {"title": null},
                {"title": "  "},
                {"title": "Two"},
                {"title": "Three"}
            ]
        }))
        .unwrap();

        assert_eq!(select_headlines(body, 2), vec!["One", "Two"]);
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let result = NewsApiClient::new(NewsConfig::default(), String::new());
        assert!(matches!(result, Err(KairosError::Config(msg)) if msg.contains("NEWS_API_KEY")));
    }
}
