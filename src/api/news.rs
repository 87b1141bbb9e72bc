//! NewsAPI client for breaking-news signals

use super::NewsSource;
use crate::error::{Result, ScanError};
use crate::relevance::extract_news_keywords;
use crate::types::{ExternalSignal, SignalSource};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const NEWSAPI_URL: &str = "https://newsapi.org/v2/everything";
const PAGE_SIZE: usize = 20;

pub struct NewsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    articles: Vec<RawArticle>,
}

#[derive(Debug, Deserialize)]
struct RawArticle {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    url: String,
    #[serde(rename = "publishedAt", default)]
    published_at: String,
}

impl NewsClient {
    pub fn new(api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: NEWSAPI_URL.to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Point the client at an alternate endpoint (integration testing)
    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self> {
        let mut api = Self::new(api_key)?;
        api.base_url = base_url.to_string();
        Ok(api)
    }
}

#[async_trait]
impl NewsSource for NewsClient {
    async fn get_news_items(&self, keywords: &[String]) -> Result<Vec<ExternalSignal>> {
        let query = keywords.join(" OR ");
        let page_size = PAGE_SIZE.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", query.as_str()),
                ("sortBy", "publishedAt"),
                ("language", "en"),
                ("pageSize", page_size.as_str()),
                ("apiKey", self.api_key.as_str()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ScanError::Payload(format!(
                "news endpoint returned {}",
                response.status()
            )));
        }
        let body: NewsResponse = response.json().await?;

        let signals = body
            .articles
            .into_iter()
            .filter(|a| !a.url.is_empty())
            .map(|article| {
                let published_at = chrono::DateTime::parse_from_rfc3339(&article.published_at)
                    .map(|dt| dt.timestamp())
                    .unwrap_or_else(|_| chrono::Utc::now().timestamp());
                let content = article.description.unwrap_or_default();
                let keywords = extract_news_keywords(&format!("{} {}", article.title, content));
                ExternalSignal {
                    source: SignalSource::News,
                    title: article.title,
                    content,
                    url: article.url,
                    published_at,
                    account: None,
                    keywords,
                }
            })
            .collect();
        Ok(signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_parsing() {
        let json = r#"{
            "status": "ok",
            "articles": [
                {"title": "Bitcoin surges past $100k",
                 "description": "Crypto markets rally after Fed decision",
                 "url": "https://example.com/btc",
                 "publishedAt": "2025-01-15T08:30:00Z"},
                {"title": "No link article", "publishedAt": "bad-date"}
            ]
        }"#;
        let body: NewsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(body.articles.len(), 2);
        assert_eq!(body.articles[0].title, "Bitcoin surges past $100k");
        assert!(body.articles[1].url.is_empty());
    }

    #[test]
    fn test_published_at_parsing() {
        let parsed = chrono::DateTime::parse_from_rfc3339("2025-01-15T08:30:00Z").unwrap();
        assert_eq!(parsed.timestamp(), 1_736_929_800);
    }
}
