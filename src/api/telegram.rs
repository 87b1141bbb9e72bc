//! Telegram delivery transport

use super::Notifier;
use crate::error::{Result, ScanError};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

pub struct TelegramNotifier {
    client: reqwest::Client,
    base_url: String,
    chat_id: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

impl TelegramNotifier {
    pub fn new(bot_token: &str, chat_id: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: format!("https://api.telegram.org/bot{}", bot_token),
            chat_id: chat_id.to_string(),
        })
    }

    /// Point the notifier at an alternate endpoint (integration testing)
    pub fn with_base_url(base_url: &str, chat_id: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            chat_id: chat_id.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text: message,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };
        let response = self
            .client
            .post(format!("{}/sendMessage", self.base_url))
            .json(&payload)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ScanError::Delivery(format!(
                "telegram returned {}: {}",
                status, body
            )));
        }
        Ok(())
    }
}
