//! Polling loops: trade stream, news feed, social feed
//!
//! Each loop runs on its own interval and survives upstream failures by
//! logging and waiting for the next tick. Identity dedup happens here,
//! in fixed-capacity seen-sets, before anything touches the store or the
//! correlation path.

use crate::api::{NewsSource, RawTrade, SocialSource, TradeSource};
use crate::classify::SeverityClassifier;
use crate::config::ScannerConfig;
use crate::correlate::CorrelationCoordinator;
use crate::db::Store;
use crate::error::Result;
use crate::ledger::AlertLedger;
use crate::profile::WalletProfileCache;
use crate::types::{Side, TradeEvent};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TRADES_PER_MARKET: usize = 50;
const POSTS_PER_ACCOUNT: usize = 10;

/// Floor for the startup history scan: wallets with fewer recorded trades
/// in the last day are not worth a profile refresh
const HISTORY_MIN_TRADES: u32 = 5;

/// Pause between per-market trade requests within one poll cycle
const INTER_REQUEST_DELAY_MS: u64 = 100;

/// Fixed-capacity set of already-processed identities. At capacity the
/// oldest entry is evicted first, so memory stays bounded over an
/// unbounded run at the cost of possibly re-processing something ancient
/// (which the store-level dedup then absorbs).
pub struct SeenSet {
    set: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl SeenSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            set: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record an identity. Returns true when it was not already present.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.set.contains(id) {
            return false;
        }
        if self.set.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.set.remove(&oldest);
            }
        }
        self.set.insert(id.to_string());
        self.order.push_back(id.to_string());
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.set.contains(id)
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}

/// Normalize a raw trade record. Records missing their transaction hash,
/// wallet, market or side carry no usable identity and are dropped.
fn to_trade_event(raw: RawTrade) -> Option<TradeEvent> {
    let transaction_hash = raw.transaction_hash?;
    let wallet_address = raw.proxy_wallet?;
    if raw.condition_id.is_empty() {
        return None;
    }
    let side = match Side::parse(&raw.side) {
        Some(side) => side,
        None => {
            log::warn!("Dropping trade {} with unrecognized side {:?}", transaction_hash, raw.side);
            return None;
        }
    };
    let usd_value = if raw.usdc_size > 0.0 {
        raw.usdc_size
    } else {
        raw.size * raw.price
    };
    Some(TradeEvent {
        timestamp: raw.timestamp,
        wallet_address,
        market_id: raw.condition_id,
        market_title: raw.title,
        token_id: raw.asset,
        side,
        size: raw.size,
        price: raw.price,
        usd_value,
        outcome: raw.outcome,
        transaction_hash,
    })
}

/// The on-chain side of the scanner: polls tracked markets for fresh
/// trades, persists them, and runs the large ones through classification.
pub struct TradeWatcher {
    store: Store,
    coordinator: Arc<CorrelationCoordinator>,
    trades: Arc<dyn TradeSource>,
    profiles: Arc<WalletProfileCache>,
    classifier: SeverityClassifier,
    ledger: Arc<AlertLedger>,
    seen: Mutex<SeenSet>,
    large_bet: f64,
    markets_per_poll: usize,
    poll_interval_secs: u64,
}

impl TradeWatcher {
    pub fn new(
        store: Store,
        coordinator: Arc<CorrelationCoordinator>,
        trades: Arc<dyn TradeSource>,
        profiles: Arc<WalletProfileCache>,
        ledger: Arc<AlertLedger>,
        config: &ScannerConfig,
    ) -> Self {
        Self {
            store,
            coordinator,
            trades,
            profiles,
            classifier: SeverityClassifier::new(config),
            ledger,
            seen: Mutex::new(SeenSet::new(config.seen_capacity)),
            large_bet: config.large_bet,
            markets_per_poll: config.markets_per_poll,
            poll_interval_secs: config.trade_poll_interval_secs,
        }
    }

    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(Duration::from_secs(self.poll_interval_secs));
        loop {
            ticker.tick().await;
            match self.poll_once().await {
                Ok(fresh) if fresh > 0 => log::info!("Trade poll: {} new trades", fresh),
                Ok(_) => {}
                Err(e) => log::error!("Trade poll failed: {}", e),
            }
        }
    }

    /// One poll cycle over the tracked markets. Returns the number of
    /// newly recorded trades.
    pub async fn poll_once(&self) -> Result<usize> {
        let markets = self.coordinator.markets().await;
        let mut fresh = 0;

        for market in markets.iter().take(self.markets_per_poll) {
            let raw = match self
                .trades
                .get_recent_trades(&market.condition_id, TRADES_PER_MARKET)
                .await
            {
                Ok(raw) => raw,
                Err(e) => {
                    log::warn!("Trade fetch for {} failed: {}", market.slug, e);
                    continue;
                }
            };

            for record in raw {
                let trade = match to_trade_event(record) {
                    Some(trade) => trade,
                    None => continue,
                };
                if !self.seen.lock().unwrap().insert(&trade.transaction_hash) {
                    continue;
                }
                if !self.store.insert_trade(&trade)? {
                    continue;
                }
                fresh += 1;
                self.store
                    .save_price(&trade.token_id, trade.price, trade.timestamp)?;

                if trade.usd_value >= self.large_bet {
                    self.handle_large_trade(&trade, &market.slug).await?;
                }
            }

            tokio::time::sleep(Duration::from_millis(INTER_REQUEST_DELAY_MS)).await;
        }
        Ok(fresh)
    }

    async fn handle_large_trade(&self, trade: &TradeEvent, slug: &str) -> Result<()> {
        let profile = match self.profiles.get_profile(&trade.wallet_address, false).await {
            Ok(profile) => profile,
            Err(e) => {
                log::warn!("No profile for {}: {}", trade.wallet_address, e);
                None
            }
        };
        if let Some(alert) = self.classifier.classify(trade, profile.as_ref(), slug) {
            let (id, delivered) = self.ledger.record_and_deliver(&alert).await?;
            log::info!(
                "Alert {} [{}] {} (delivered: {})",
                id,
                alert.severity.as_str(),
                alert.reason,
                delivered
            );
        }
        Ok(())
    }
}

/// The off-chain side: polls news and social feeds and hands fresh
/// signals to the correlation path.
pub struct SignalWatcher {
    coordinator: Arc<CorrelationCoordinator>,
    news: Option<Arc<dyn NewsSource>>,
    social: Option<Arc<dyn SocialSource>>,
    news_keywords: Vec<String>,
    monitored_accounts: Vec<String>,
    news_interval_secs: u64,
    social_interval_secs: u64,
    seen_articles: Mutex<SeenSet>,
    seen_posts: Mutex<SeenSet>,
}

impl SignalWatcher {
    pub fn new(
        coordinator: Arc<CorrelationCoordinator>,
        news: Option<Arc<dyn NewsSource>>,
        social: Option<Arc<dyn SocialSource>>,
        config: &ScannerConfig,
    ) -> Self {
        Self {
            coordinator,
            news,
            social,
            news_keywords: config.news_keywords.clone(),
            monitored_accounts: config.monitored_accounts.clone(),
            news_interval_secs: config.news_poll_interval_secs,
            social_interval_secs: config.social_poll_interval_secs,
            seen_articles: Mutex::new(SeenSet::new(config.seen_capacity)),
            seen_posts: Mutex::new(SeenSet::new(config.seen_capacity)),
        }
    }

    pub async fn run_news(&self) {
        let news = match &self.news {
            Some(news) => news.clone(),
            None => {
                log::info!("News feed not configured, skipping news loop");
                return;
            }
        };
        let mut ticker = tokio::time::interval(Duration::from_secs(self.news_interval_secs));
        loop {
            ticker.tick().await;
            if let Err(e) = self.poll_news_once(news.as_ref()).await {
                log::error!("News poll failed: {}", e);
            }
        }
    }

    pub async fn run_social(&self) {
        let social = match &self.social {
            Some(social) => social.clone(),
            None => {
                log::info!("Social feed not configured, skipping social loop");
                return;
            }
        };
        let mut ticker = tokio::time::interval(Duration::from_secs(self.social_interval_secs));
        loop {
            ticker.tick().await;
            if let Err(e) = self.poll_social_once(social.as_ref()).await {
                log::error!("Social poll failed: {}", e);
            }
        }
    }

    pub async fn poll_news_once(&self, news: &dyn NewsSource) -> Result<usize> {
        let items = news.get_news_items(&self.news_keywords).await?;
        let mut fresh = 0;
        for item in items {
            if !self.seen_articles.lock().unwrap().insert(&item.url) {
                continue;
            }
            fresh += 1;
            if let Err(e) = self.coordinator.process_signal(&item).await {
                log::error!("Correlation failed for \"{}\": {}", item.title, e);
            }
        }
        Ok(fresh)
    }

    pub async fn poll_social_once(&self, social: &dyn SocialSource) -> Result<usize> {
        let since_hours = (self.social_interval_secs.div_ceil(3600)).max(1) as u32;
        let mut fresh = 0;
        for account in &self.monitored_accounts {
            let posts = match social
                .get_user_posts(account, since_hours, POSTS_PER_ACCOUNT)
                .await
            {
                Ok(posts) => posts,
                Err(e) => {
                    log::warn!("Post fetch for @{} failed: {}", account, e);
                    continue;
                }
            };
            for post in posts {
                if !self.seen_posts.lock().unwrap().insert(&post.url) {
                    continue;
                }
                fresh += 1;
                if let Err(e) = self.coordinator.process_signal(&post).await {
                    log::error!("Correlation failed for @{}: {}", account, e);
                }
            }
        }
        Ok(fresh)
    }
}

/// Startup pass over recorded history: force-refresh profiles for every
/// wallet with significant recent volume so the smart-money set is warm
/// before the first reaction check. Returns the number of wallets whose
/// refreshed profile clears the high-win-rate bar.
pub async fn scan_high_performers(
    store: &Store,
    profiles: &WalletProfileCache,
    config: &ScannerConfig,
) -> Result<usize> {
    let cutoff = chrono::Utc::now().timestamp() - 24 * 3600;
    let busy = store.high_volume_wallets(cutoff, HISTORY_MIN_TRADES)?;
    log::info!("History scan: {} high-volume wallets", busy.len());

    let mut sharp = 0;
    for (wallet, trade_count, volume) in busy {
        let profile = match profiles.get_profile(&wallet, true).await {
            Ok(Some(profile)) => profile,
            Ok(None) => continue,
            Err(e) => {
                log::warn!("History scan skipped {}: {}", wallet, e);
                continue;
            }
        };
        if profile.win_rate.map(|w| w > config.high_win_rate).unwrap_or(false) {
            sharp += 1;
            log::info!(
                "Top performer {}: {} trades, {} volume, {:.0}% win rate",
                wallet,
                trade_count,
                volume,
                profile.win_rate.unwrap_or(0.0) * 100.0
            );
        }
    }
    Ok(sharp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ActivitySource, MarketSource, RawActivity, RawMarket, RawPosition};
    use crate::config::test_config;
    use crate::db::test_support::open_temp_store;
    use crate::error::ScanError;
    use crate::types::{AlertKind, ExternalSignal, Severity, SignalSource};
    use async_trait::async_trait;

    #[test]
    fn test_seen_set_dedup() {
        let mut seen = SeenSet::new(10);
        assert!(seen.insert("a"));
        assert!(!seen.insert("a"));
        assert!(seen.insert("b"));
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_seen_set_fifo_eviction() {
        let mut seen = SeenSet::new(3);
        seen.insert("a");
        seen.insert("b");
        seen.insert("c");
        seen.insert("d"); // evicts "a"
        assert_eq!(seen.len(), 3);
        assert!(!seen.contains("a"));
        assert!(seen.contains("b"));
        assert!(seen.contains("d"));
        // "a" counts as fresh again after eviction
        assert!(seen.insert("a"));
    }

    fn raw_trade(tx: Option<&str>, wallet: Option<&str>, side: &str, usd: f64) -> RawTrade {
        RawTrade {
            transaction_hash: tx.map(|s| s.to_string()),
            proxy_wallet: wallet.map(|s| s.to_string()),
            condition_id: "0xbtc".to_string(),
            title: "Bitcoin ETF?".to_string(),
            asset: "token_1".to_string(),
            side: side.to_string(),
            size: usd / 0.5,
            price: 0.5,
            usdc_size: usd,
            outcome: "Yes".to_string(),
            timestamp: chrono::Utc::now().timestamp(),
            slug: "btc-etf".to_string(),
        }
    }

    #[test]
    fn test_to_trade_event_drops_incomplete_records() {
        assert!(to_trade_event(raw_trade(None, Some("0xw"), "BUY", 100.0)).is_none());
        assert!(to_trade_event(raw_trade(Some("0xtx"), None, "BUY", 100.0)).is_none());
        assert!(to_trade_event(raw_trade(Some("0xtx"), Some("0xw"), "HOLD", 100.0)).is_none());

        let trade = to_trade_event(raw_trade(Some("0xtx"), Some("0xw"), "BUY", 100.0)).unwrap();
        assert_eq!(trade.transaction_hash, "0xtx");
        assert_eq!(trade.side, Side::Buy);
        assert_eq!(trade.usd_value, 100.0);
    }

    #[test]
    fn test_to_trade_event_usd_fallback() {
        let mut raw = raw_trade(Some("0xtx"), Some("0xw"), "SELL", 0.0);
        raw.size = 200.0;
        raw.price = 0.4;
        let trade = to_trade_event(raw).unwrap();
        assert_eq!(trade.usd_value, 80.0);
    }

    struct FakeMarkets(Vec<RawMarket>);

    #[async_trait]
    impl MarketSource for FakeMarkets {
        async fn list_active_markets(&self, _limit: usize) -> Result<Vec<RawMarket>> {
            Ok(self.0.clone())
        }
        async fn get_market_price(&self, _token_id: &str) -> Result<Option<f64>> {
            Ok(None)
        }
    }

    struct FakeTrades(Vec<RawTrade>);

    #[async_trait]
    impl TradeSource for FakeTrades {
        async fn get_recent_trades(&self, _market: &str, _limit: usize) -> Result<Vec<RawTrade>> {
            Ok(self.0.clone())
        }
    }

    struct NoActivity;

    #[async_trait]
    impl ActivitySource for NoActivity {
        async fn get_activity(&self, _wallet: &str, _limit: usize) -> Result<Vec<RawActivity>> {
            Ok(Vec::new())
        }
        async fn get_positions(&self, _wallet: &str) -> Result<Vec<RawPosition>> {
            Ok(Vec::new())
        }
    }

    fn watcher(store: Store, trades: Vec<RawTrade>) -> TradeWatcher {
        let config = test_config();
        let markets = Arc::new(FakeMarkets(vec![RawMarket {
            slug: "btc-etf".to_string(),
            condition_id: "0xbtc".to_string(),
            question: "Bitcoin ETF?".to_string(),
            description: String::new(),
        }]));
        let ledger = Arc::new(AlertLedger::new(store.clone(), None, config.min_alert_severity));
        let coordinator = Arc::new(CorrelationCoordinator::new(
            store.clone(),
            markets,
            ledger.clone(),
            &config,
        ));
        let profiles = Arc::new(WalletProfileCache::new(
            store.clone(),
            Arc::new(NoActivity),
            config.wallet_cache_ttl_secs,
        ));
        TradeWatcher::new(
            store,
            coordinator,
            Arc::new(FakeTrades(trades)),
            profiles,
            ledger,
            &config,
        )
    }

    #[tokio::test]
    async fn test_poll_records_and_alerts_large_trades() {
        let (_temp, store) = open_temp_store();
        let watcher = watcher(
            store.clone(),
            vec![
                raw_trade(Some("0xtx1"), Some("0xw1"), "BUY", 6_000.0),
                raw_trade(Some("0xtx2"), Some("0xw2"), "SELL", 100.0),
                raw_trade(None, Some("0xw3"), "BUY", 99_999.0), // no identity
            ],
        );

        let fresh = watcher.poll_once().await.unwrap();
        assert_eq!(fresh, 2);

        // Only the large trade alerted; an unprofiled wallet gets the
        // new-wallet flag but keeps the base tier
        let alerts = store.recent_alerts(1).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::LargeBet);
        assert_eq!(alerts[0].severity, Severity::Medium);
        assert!(alerts[0].reason.contains("new wallet (unknown age)"));

        // Second cycle sees nothing new
        assert_eq!(watcher.poll_once().await.unwrap(), 0);
        assert_eq!(store.recent_alerts(1).unwrap().len(), 1);
    }

    struct FakeNews(Vec<ExternalSignal>);

    #[async_trait]
    impl NewsSource for FakeNews {
        async fn get_news_items(&self, _keywords: &[String]) -> Result<Vec<ExternalSignal>> {
            Ok(self.0.clone())
        }
    }

    struct FailingSocial;

    #[async_trait]
    impl SocialSource for FailingSocial {
        async fn get_user_posts(
            &self,
            _account: &str,
            _since_hours: u32,
            _max_results: usize,
        ) -> Result<Vec<ExternalSignal>> {
            Err(ScanError::Payload("down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_news_poll_dedups_by_url() {
        let (_temp, store) = open_temp_store();
        let config = test_config();
        let markets = Arc::new(FakeMarkets(vec![]));
        let ledger = Arc::new(AlertLedger::new(store.clone(), None, config.min_alert_severity));
        let coordinator = Arc::new(CorrelationCoordinator::new(
            store, markets, ledger, &config,
        ));

        let signal = ExternalSignal {
            source: SignalSource::News,
            title: "Bitcoin ETF approved".to_string(),
            content: String::new(),
            url: "https://example.com/a".to_string(),
            published_at: chrono::Utc::now().timestamp(),
            account: None,
            keywords: vec!["Bitcoin".to_string()],
        };
        let news = FakeNews(vec![signal.clone(), signal]);
        let watcher = SignalWatcher::new(coordinator, None, None, &config);

        assert_eq!(watcher.poll_news_once(&news).await.unwrap(), 1);
        assert_eq!(watcher.poll_news_once(&news).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_social_poll_survives_account_failure() {
        let (_temp, store) = open_temp_store();
        let config = test_config();
        let markets = Arc::new(FakeMarkets(vec![]));
        let ledger = Arc::new(AlertLedger::new(store.clone(), None, config.min_alert_severity));
        let coordinator = Arc::new(CorrelationCoordinator::new(
            store, markets, ledger, &config,
        ));
        let watcher = SignalWatcher::new(coordinator, None, None, &config);

        // Every account fails; the cycle still completes
        assert_eq!(watcher.poll_social_once(&FailingSocial).await.unwrap(), 0);
    }
}
