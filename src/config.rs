//! Scanner configuration from environment variables
//!
//! One `ScannerConfig` value is built at startup, validated, and passed by
//! reference/ownership into each component. No component reads ambient
//! global state after construction.

use crate::error::{Result, ScanError};
use std::collections::HashMap;
use std::env;

/// Configuration for the scanner runtime
///
/// Loaded from environment variables with defaults matching the documented
/// thresholds. Lists are comma-separated; the account boost table uses
/// `handle:boost` pairs (`POLYSENTRY_ACCOUNT_BOOSTS=realdonaldtrump:0.3,elonmusk:0.25`).
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Path to the SQLite database file
    pub db_path: String,

    // Bet size tiers (USD). Must be strictly increasing.
    pub large_bet: f64,
    pub very_large_bet: f64,
    pub huge_bet: f64,

    // Wallet age tiers (hours)
    pub new_wallet_hours: f64,
    pub very_new_wallet_hours: f64,

    // Trading behavior thresholds
    pub high_win_rate: f64,
    pub low_trade_count: u32,

    /// Minimum severity submitted for delivery; lower alerts are persisted
    /// but never sent
    pub min_alert_severity: crate::types::Severity,

    // Cache TTLs (seconds)
    pub wallet_cache_ttl_secs: i64,
    pub market_cache_ttl_secs: i64,

    // Polling intervals (seconds)
    pub trade_poll_interval_secs: u64,
    pub news_poll_interval_secs: u64,
    pub social_poll_interval_secs: u64,

    // Correlation thresholds and lookback windows per signal type
    pub news_confidence: f64,
    pub social_confidence: f64,
    pub news_lookback_secs: i64,
    pub social_lookback_secs: i64,
    pub news_min_trades: usize,
    pub social_min_trades: usize,
    // Counts at which a reaction upgrades from notable to high activity
    pub news_high_trades: usize,
    pub social_high_trades: usize,

    /// Markets fetched per cache refresh
    pub max_markets: usize,
    /// Markets polled for trades per cycle (rate-limit guard)
    pub markets_per_poll: usize,
    /// Capacity of the seen-identity sets (trades, news, posts)
    pub seen_capacity: usize,

    /// Relevance boost per influential account (lowercased handle)
    pub account_boosts: HashMap<String, f64>,
    /// Accounts allowed to raise a reaction alert with zero trade evidence
    pub priority_accounts: Vec<String>,
    /// Social accounts polled by the social loop
    pub monitored_accounts: Vec<String>,
    /// Keywords used for the news query
    pub news_keywords: Vec<String>,

    // Delivery transport
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,

    // Upstream credentials
    pub newsapi_key: Option<String>,
    pub social_bearer_token: Option<String>,

    /// Run the historical performer scan on startup
    pub analyze_history_on_start: bool,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_list(key: &str, default: &[&str]) -> Vec<String> {
    match env::var(key) {
        Ok(s) if !s.trim().is_empty() => s
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect(),
        _ => default.iter().map(|s| s.to_string()).collect(),
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

impl ScannerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let account_boosts = match env::var("POLYSENTRY_ACCOUNT_BOOSTS") {
            Ok(s) if !s.trim().is_empty() => s
                .split(',')
                .filter_map(|pair| {
                    let (handle, boost) = pair.split_once(':')?;
                    Some((handle.trim().to_lowercase(), boost.trim().parse().ok()?))
                })
                .collect(),
            _ => Self::default_boosts(),
        };

        Self {
            db_path: env::var("POLYSENTRY_DB_PATH")
                .unwrap_or_else(|_| "polysentry.db".to_string()),

            large_bet: env_or("LARGE_BET_THRESHOLD", 5_000.0),
            very_large_bet: env_or("VERY_LARGE_BET_THRESHOLD", 10_000.0),
            huge_bet: env_or("HUGE_BET_THRESHOLD", 50_000.0),

            new_wallet_hours: env_or("NEW_WALLET_HOURS", 168.0),
            very_new_wallet_hours: env_or("VERY_NEW_WALLET_HOURS", 24.0),

            high_win_rate: env_or("HIGH_WIN_RATE_THRESHOLD", 0.65),
            low_trade_count: env_or("LOW_TRADE_COUNT_THRESHOLD", 10),

            min_alert_severity: env::var("MIN_ALERT_SEVERITY")
                .ok()
                .and_then(|s| crate::types::Severity::parse(&s))
                .unwrap_or(crate::types::Severity::Medium),

            wallet_cache_ttl_secs: env_or("WALLET_CACHE_TTL", 300),
            market_cache_ttl_secs: env_or("MARKET_REFRESH_INTERVAL", 300),

            trade_poll_interval_secs: env_or("TRADE_POLL_INTERVAL", 30),
            news_poll_interval_secs: env_or("NEWS_POLL_INTERVAL", 300),
            social_poll_interval_secs: env_or("SOCIAL_POLL_INTERVAL", 180),

            news_confidence: env_or("NEWS_MIN_CONFIDENCE", 0.7),
            social_confidence: env_or("SOCIAL_MIN_CONFIDENCE", 0.6),
            news_lookback_secs: env_or("NEWS_LOOKBACK_SECS", 3_600),
            social_lookback_secs: env_or("SOCIAL_LOOKBACK_SECS", 1_800),
            news_min_trades: env_or("NEWS_MIN_TRADES", 5),
            social_min_trades: env_or("SOCIAL_MIN_TRADES", 3),
            news_high_trades: env_or("NEWS_HIGH_ACTIVITY_TRADES", 10),
            social_high_trades: env_or("SOCIAL_HIGH_ACTIVITY_TRADES", 5),

            max_markets: env_or("MAX_MARKETS_TO_TRACK", 100),
            markets_per_poll: env_or("MARKETS_PER_POLL", 50),
            seen_capacity: env_or("SEEN_SET_CAPACITY", 1_000),

            account_boosts,
            priority_accounts: env_list(
                "PRIORITY_ACCOUNTS",
                &["realdonaldtrump", "joebiden"],
            ),
            monitored_accounts: env_list(
                "MONITORED_ACCOUNTS",
                &[
                    "realDonaldTrump",
                    "JoeBiden",
                    "elonmusk",
                    "federalreserve",
                    "VitalikButerin",
                ],
            ),
            news_keywords: env_list(
                "NEWS_KEYWORDS",
                &["Trump", "Biden", "Bitcoin", "Fed", "AI", "election", "war"],
            ),

            telegram_bot_token: env_opt("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: env_opt("TELEGRAM_CHAT_ID"),

            newsapi_key: env_opt("NEWSAPI_KEY"),
            social_bearer_token: env_opt("SOCIAL_BEARER_TOKEN"),

            analyze_history_on_start: env_or("ANALYZE_HISTORY_ON_START", true),
        }
    }

    fn default_boosts() -> HashMap<String, f64> {
        [
            ("realdonaldtrump", 0.3),
            ("joebiden", 0.3),
            ("elonmusk", 0.25),
            ("federalreserve", 0.2),
            ("vitalikbuterin", 0.15),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    /// Validate the configuration. Any inconsistency is fatal at startup,
    /// before a single loop runs.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.large_bet >= self.very_large_bet {
            errors.push("LARGE_BET_THRESHOLD must be less than VERY_LARGE_BET_THRESHOLD");
        }
        if self.very_large_bet >= self.huge_bet {
            errors.push("VERY_LARGE_BET_THRESHOLD must be less than HUGE_BET_THRESHOLD");
        }
        if !(0.5..=1.0).contains(&self.high_win_rate) {
            errors.push("HIGH_WIN_RATE_THRESHOLD must be between 0.5 and 1.0");
        }
        if self.very_new_wallet_hours >= self.new_wallet_hours {
            errors.push("VERY_NEW_WALLET_HOURS must be less than NEW_WALLET_HOURS");
        }
        if !(0.0..=1.0).contains(&self.news_confidence)
            || !(0.0..=1.0).contains(&self.social_confidence)
        {
            errors.push("confidence thresholds must be within [0, 1]");
        }
        if self.news_high_trades <= self.news_min_trades
            || self.social_high_trades <= self.social_min_trades
        {
            errors.push("high-activity trade counts must exceed the minimum trade counts");
        }
        if self.seen_capacity == 0 {
            errors.push("SEEN_SET_CAPACITY must be positive");
        }
        if self.telegram_bot_token.is_some() != self.telegram_chat_id.is_some() {
            errors.push("TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID must be set together");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ScanError::Config(errors.join("; ")))
        }
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> ScannerConfig {
    use crate::types::Severity;

    ScannerConfig {
        db_path: ":memory:".to_string(),
        large_bet: 5_000.0,
        very_large_bet: 10_000.0,
        huge_bet: 50_000.0,
        new_wallet_hours: 168.0,
        very_new_wallet_hours: 24.0,
        high_win_rate: 0.65,
        low_trade_count: 10,
        min_alert_severity: Severity::Medium,
        wallet_cache_ttl_secs: 300,
        market_cache_ttl_secs: 300,
        trade_poll_interval_secs: 30,
        news_poll_interval_secs: 300,
        social_poll_interval_secs: 180,
        news_confidence: 0.7,
        social_confidence: 0.6,
        news_lookback_secs: 3_600,
        social_lookback_secs: 1_800,
        news_min_trades: 5,
        social_min_trades: 3,
        news_high_trades: 10,
        social_high_trades: 5,
        max_markets: 100,
        markets_per_poll: 50,
        seen_capacity: 1_000,
        account_boosts: ScannerConfig::default_boosts(),
        priority_accounts: vec!["realdonaldtrump".into(), "joebiden".into()],
        monitored_accounts: vec!["elonmusk".into()],
        news_keywords: vec!["Bitcoin".into()],
        telegram_bot_token: None,
        telegram_chat_id: None,
        newsapi_key: None,
        social_bearer_token: None,
        analyze_history_on_start: false,
    }
}
