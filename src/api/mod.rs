//! External collaborator interfaces
//!
//! The core talks to every upstream through the traits below so the
//! detection logic can be exercised against fakes. Concrete clients are
//! thin reqwest wrappers; any upstream failure is surfaced as a
//! `ScanError::Http` and mapped to an empty result by the calling loop.

pub mod news;
pub mod polymarket;
pub mod social;
pub mod telegram;

pub use news::NewsClient;
pub use polymarket::PolymarketClient;
pub use social::SocialClient;
pub use telegram::TelegramNotifier;

use crate::error::Result;
use crate::types::ExternalSignal;
use async_trait::async_trait;
use serde::Deserialize;

/// Raw market record from the markets endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct RawMarket {
    #[serde(default)]
    pub slug: String,
    #[serde(rename = "conditionId", default)]
    pub condition_id: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub description: String,
}

/// Raw activity record for a wallet (trades and other event types mixed)
#[derive(Debug, Clone, Deserialize)]
pub struct RawActivity {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(rename = "usdcSize", default)]
    pub usdc_size: f64,
    #[serde(rename = "conditionId")]
    pub condition_id: Option<String>,
    #[serde(default)]
    pub timestamp: i64,
}

/// Raw position record for a wallet
#[derive(Debug, Clone, Deserialize)]
pub struct RawPosition {
    #[serde(default)]
    pub outcome: String,
    #[serde(default)]
    pub size: f64,
    #[serde(rename = "currentValue", default)]
    pub current_value: f64,
    #[serde(rename = "cashPnl", default)]
    pub cash_pnl: f64,
}

/// Raw trade record from the trade stream. Fields the dedup/identity logic
/// depends on are optional so missing data can be dropped, not defaulted.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTrade {
    #[serde(rename = "transactionHash")]
    pub transaction_hash: Option<String>,
    #[serde(rename = "proxyWallet")]
    pub proxy_wallet: Option<String>,
    #[serde(rename = "conditionId", default)]
    pub condition_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub asset: String,
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub size: f64,
    #[serde(default)]
    pub price: f64,
    #[serde(rename = "usdcSize", default)]
    pub usdc_size: f64,
    #[serde(default)]
    pub outcome: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub slug: String,
}

/// Active market listing and price lookups
#[async_trait]
pub trait MarketSource: Send + Sync {
    async fn list_active_markets(&self, limit: usize) -> Result<Vec<RawMarket>>;
    async fn get_market_price(&self, token_id: &str) -> Result<Option<f64>>;
}

/// Per-wallet trading history and open positions
#[async_trait]
pub trait ActivitySource: Send + Sync {
    async fn get_activity(&self, wallet: &str, limit: usize) -> Result<Vec<RawActivity>>;
    async fn get_positions(&self, wallet: &str) -> Result<Vec<RawPosition>>;
}

/// Recent trades on a single market
#[async_trait]
pub trait TradeSource: Send + Sync {
    async fn get_recent_trades(&self, market_id: &str, limit: usize) -> Result<Vec<RawTrade>>;
}

/// Breaking news matching a keyword query
#[async_trait]
pub trait NewsSource: Send + Sync {
    async fn get_news_items(&self, keywords: &[String]) -> Result<Vec<ExternalSignal>>;
}

/// Recent posts from a monitored social account
#[async_trait]
pub trait SocialSource: Send + Sync {
    async fn get_user_posts(
        &self,
        account: &str,
        since_hours: u32,
        max_results: usize,
    ) -> Result<Vec<ExternalSignal>>;
}

/// Delivery transport for formatted alert messages. No ordering or latency
/// guarantee is assumed; a failed send leaves the alert not-sent.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<()>;
}
