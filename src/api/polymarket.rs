//! Polymarket API client (gamma, data and clob endpoints)

use super::{ActivitySource, MarketSource, RawActivity, RawMarket, RawPosition, RawTrade, TradeSource};
use crate::error::{Result, ScanError};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const GAMMA_API: &str = "https://gamma-api.polymarket.com";
const DATA_API: &str = "https://data-api.polymarket.com";
const CLOB_API: &str = "https://clob.polymarket.com";

pub struct PolymarketClient {
    client: reqwest::Client,
    gamma_url: String,
    data_url: String,
    clob_url: String,
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    #[serde(default)]
    price: String,
}

impl PolymarketClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            gamma_url: GAMMA_API.to_string(),
            data_url: DATA_API.to_string(),
            clob_url: CLOB_API.to_string(),
        })
    }

    /// Point the client at alternate endpoints (integration testing)
    pub fn with_base_urls(gamma: &str, data: &str, clob: &str) -> Result<Self> {
        let mut api = Self::new()?;
        api.gamma_url = gamma.to_string();
        api.data_url = data.to_string();
        api.clob_url = clob.to_string();
        Ok(api)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self.client.get(url).query(query).send().await?;
        if !response.status().is_success() {
            return Err(ScanError::Payload(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl MarketSource for PolymarketClient {
    async fn list_active_markets(&self, limit: usize) -> Result<Vec<RawMarket>> {
        self.get_json(
            &format!("{}/markets", self.gamma_url),
            &[
                ("active", "true".to_string()),
                ("closed", "false".to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    async fn get_market_price(&self, token_id: &str) -> Result<Option<f64>> {
        let response: PriceResponse = self
            .get_json(
                &format!("{}/price", self.clob_url),
                &[
                    ("token_id", token_id.to_string()),
                    ("side", "BUY".to_string()),
                ],
            )
            .await?;
        Ok(response.price.parse().ok())
    }
}

#[async_trait]
impl ActivitySource for PolymarketClient {
    async fn get_activity(&self, wallet: &str, limit: usize) -> Result<Vec<RawActivity>> {
        self.get_json(
            &format!("{}/activity", self.data_url),
            &[
                ("user", wallet.to_string()),
                ("limit", limit.to_string()),
                ("type", "TRADE".to_string()),
            ],
        )
        .await
    }

    async fn get_positions(&self, wallet: &str) -> Result<Vec<RawPosition>> {
        self.get_json(
            &format!("{}/positions", self.data_url),
            &[("user", wallet.to_string()), ("limit", "500".to_string())],
        )
        .await
    }
}

#[async_trait]
impl TradeSource for PolymarketClient {
    async fn get_recent_trades(&self, market_id: &str, limit: usize) -> Result<Vec<RawTrade>> {
        self.get_json(
            &format!("{}/trades", self.data_url),
            &[
                ("market", market_id.to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }
}
