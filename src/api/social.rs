//! X (Twitter) API v2 client for monitored-account posts

use super::SocialSource;
use crate::error::{Result, ScanError};
use crate::relevance::extract_social_keywords;
use crate::types::{ExternalSignal, SignalSource};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

const SOCIAL_API: &str = "https://api.twitter.com/2";

pub struct SocialClient {
    client: reqwest::Client,
    base_url: String,
    bearer_token: String,
    /// handle (lowercased) -> user id, looked up once per process
    user_ids: Mutex<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct UserLookup {
    data: Option<UserRecord>,
}

#[derive(Debug, Deserialize)]
struct UserRecord {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TimelineResponse {
    #[serde(default)]
    data: Vec<RawPost>,
}

#[derive(Debug, Deserialize)]
struct RawPost {
    id: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    created_at: String,
}

impl SocialClient {
    pub fn new(bearer_token: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: SOCIAL_API.to_string(),
            bearer_token: bearer_token.to_string(),
            user_ids: Mutex::new(HashMap::new()),
        })
    }

    /// Point the client at an alternate endpoint (integration testing)
    pub fn with_base_url(bearer_token: &str, base_url: &str) -> Result<Self> {
        let mut api = Self::new(bearer_token)?;
        api.base_url = base_url.to_string();
        Ok(api)
    }

    async fn user_id(&self, account: &str) -> Result<Option<String>> {
        let key = account.to_lowercase();
        if let Some(id) = self.user_ids.lock().unwrap().get(&key) {
            return Ok(Some(id.clone()));
        }

        let response = self
            .client
            .get(format!("{}/users/by/username/{}", self.base_url, account))
            .bearer_auth(&self.bearer_token)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            log::warn!("Rate limited looking up @{}", account);
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ScanError::Payload(format!(
                "user lookup for @{} returned {}",
                account,
                response.status()
            )));
        }
        let body: UserLookup = response.json().await?;
        match body.data {
            Some(user) => {
                self.user_ids
                    .lock()
                    .unwrap()
                    .insert(key, user.id.clone());
                Ok(Some(user.id))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl SocialSource for SocialClient {
    async fn get_user_posts(
        &self,
        account: &str,
        since_hours: u32,
        max_results: usize,
    ) -> Result<Vec<ExternalSignal>> {
        let user_id = match self.user_id(account).await? {
            Some(id) => id,
            None => return Ok(Vec::new()),
        };

        let start_time = (chrono::Utc::now()
            - chrono::Duration::hours(since_hours as i64))
        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);

        let max_results = max_results.to_string();
        let response = self
            .client
            .get(format!("{}/users/{}/tweets", self.base_url, user_id))
            .bearer_auth(&self.bearer_token)
            .query(&[
                ("start_time", start_time.as_str()),
                ("max_results", max_results.as_str()),
                ("tweet.fields", "created_at"),
            ])
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            log::warn!("Rate limited fetching posts for @{}", account);
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(ScanError::Payload(format!(
                "timeline for @{} returned {}",
                account,
                response.status()
            )));
        }
        let body: TimelineResponse = response.json().await?;

        let signals = body
            .data
            .into_iter()
            .map(|post| {
                let published_at = chrono::DateTime::parse_from_rfc3339(&post.created_at)
                    .map(|dt| dt.timestamp())
                    .unwrap_or_else(|_| chrono::Utc::now().timestamp());
                let keywords = extract_social_keywords(&post.text);
                ExternalSignal {
                    source: SignalSource::Social,
                    title: format!("@{}", account),
                    content: post.text,
                    url: post.id,
                    published_at,
                    account: Some(account.to_lowercase()),
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
    fn test_timeline_parsing() {
        let json = r#"{
            "data": [
                {"id": "1881", "text": "Tariffs on China coming soon! #tariffs",
                 "created_at": "2025-01-15T12:00:00Z"}
            ]
        }"#;
        let body: TimelineResponse = serde_json::from_str(json).unwrap();
        assert_eq!(body.data.len(), 1);
        assert_eq!(body.data[0].id, "1881");
    }

    #[test]
    fn test_empty_timeline_parsing() {
        // The data field is absent entirely when there are no posts
        let body: TimelineResponse = serde_json::from_str(r#"{"meta": {"result_count": 0}}"#)
            .unwrap();
        assert!(body.data.is_empty());
    }

    #[test]
    fn test_user_lookup_parsing() {
        let body: UserLookup =
            serde_json::from_str(r#"{"data": {"id": "44196397", "username": "elonmusk"}}"#)
                .unwrap();
        assert_eq!(body.data.unwrap().id, "44196397");

        let missing: UserLookup =
            serde_json::from_str(r#"{"errors": [{"title": "Not Found"}]}"#).unwrap();
        assert!(missing.data.is_none());
    }
}
