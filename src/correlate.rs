//! Signal-to-market correlation and reaction analysis
//!
//! External signals (news, social posts) are scored against the tracked
//! market set, and each strong match is checked for a trading reaction in
//! the local trade record. Reaction alerts go through the ledger like any
//! other alert.

use crate::api::MarketSource;
use crate::config::ScannerConfig;
use crate::db::Store;
use crate::error::Result;
use crate::ledger::AlertLedger;
use crate::relevance::RelevanceMatcher;
use crate::types::{Alert, AlertKind, ExternalSignal, MarketSnapshot, Severity, SignalSource};
use std::sync::{Arc, Mutex};

/// Strong matches per signal are capped; beyond this the tail is noise
const MAX_MATCHES: usize = 5;

/// Confidence floor for raising an alert with zero trade evidence
const ZERO_EVIDENCE_CONFIDENCE: f64 = 0.8;

struct MarketCache {
    markets: Vec<MarketSnapshot>,
    fetched_at: i64,
}

pub struct CorrelationCoordinator {
    store: Store,
    market_source: Arc<dyn MarketSource>,
    ledger: Arc<AlertLedger>,
    matcher: RelevanceMatcher,
    cache: Mutex<MarketCache>,
    market_cache_ttl_secs: i64,
    max_markets: usize,
    news_confidence: f64,
    social_confidence: f64,
    news_lookback_secs: i64,
    social_lookback_secs: i64,
    news_min_trades: usize,
    social_min_trades: usize,
    news_high_trades: usize,
    social_high_trades: usize,
    high_win_rate: f64,
    low_trade_count: u32,
    priority_accounts: Vec<String>,
}

impl CorrelationCoordinator {
    pub fn new(
        store: Store,
        market_source: Arc<dyn MarketSource>,
        ledger: Arc<AlertLedger>,
        config: &ScannerConfig,
    ) -> Self {
        Self {
            store,
            market_source,
            ledger,
            matcher: RelevanceMatcher::new(config.account_boosts.clone()),
            cache: Mutex::new(MarketCache {
                markets: Vec::new(),
                fetched_at: 0,
            }),
            market_cache_ttl_secs: config.market_cache_ttl_secs,
            max_markets: config.max_markets,
            news_confidence: config.news_confidence,
            social_confidence: config.social_confidence,
            news_lookback_secs: config.news_lookback_secs,
            social_lookback_secs: config.social_lookback_secs,
            news_min_trades: config.news_min_trades,
            social_min_trades: config.social_min_trades,
            news_high_trades: config.news_high_trades,
            social_high_trades: config.social_high_trades,
            high_win_rate: config.high_win_rate,
            low_trade_count: config.low_trade_count,
            priority_accounts: config
                .priority_accounts
                .iter()
                .map(|a| a.to_lowercase())
                .collect(),
        }
    }

    /// Tracked markets, refreshed when the cache has gone stale. A failed
    /// refresh keeps serving the previous set; an empty previous set on a
    /// failed first refresh means no correlation this cycle.
    pub async fn markets(&self) -> Vec<MarketSnapshot> {
        let now = chrono::Utc::now().timestamp();
        {
            let cache = self.cache.lock().unwrap();
            if now - cache.fetched_at < self.market_cache_ttl_secs && !cache.markets.is_empty() {
                return cache.markets.clone();
            }
        }

        match self.market_source.list_active_markets(self.max_markets).await {
            Ok(raw) => {
                let markets: Vec<MarketSnapshot> = raw
                    .into_iter()
                    .filter(|m| !m.condition_id.is_empty())
                    .map(|m| MarketSnapshot {
                        slug: m.slug,
                        condition_id: m.condition_id,
                        question: m.question,
                        description: m.description,
                    })
                    .collect();
                log::info!("Refreshed market cache: {} markets", markets.len());
                let mut cache = self.cache.lock().unwrap();
                cache.markets = markets.clone();
                cache.fetched_at = now;
                markets
            }
            Err(e) => {
                log::warn!("Market refresh failed, serving stale set: {}", e);
                self.cache.lock().unwrap().markets.clone()
            }
        }
    }

    fn confidence_floor(&self, source: SignalSource) -> f64 {
        match source {
            SignalSource::News => self.news_confidence,
            SignalSource::Social => self.social_confidence,
        }
    }

    /// Score a signal against the tracked markets and return the matches
    /// at or above the source's confidence floor, strongest first, at most
    /// `MAX_MATCHES`.
    pub async fn correlate(&self, signal: &ExternalSignal) -> Vec<(MarketSnapshot, f64)> {
        let floor = self.confidence_floor(signal.source);
        let text = signal.text();

        let mut matches: Vec<(MarketSnapshot, f64)> = self
            .markets()
            .await
            .into_iter()
            .filter_map(|market| {
                let score = self.matcher.score(
                    &text,
                    &signal.keywords,
                    &market.text(),
                    signal.account.as_deref(),
                );
                (score >= floor).then_some((market, score))
            })
            .collect();

        matches.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(MAX_MATCHES);
        matches
    }

    /// Correlate one (already deduplicated) signal and raise reaction
    /// alerts for its strong matches.
    pub async fn process_signal(&self, signal: &ExternalSignal) -> Result<()> {
        let matches = self.correlate(signal).await;
        if matches.is_empty() {
            return Ok(());
        }
        log::info!(
            "{} signal \"{}\" matched {} market(s)",
            signal.source.as_str(),
            signal.title,
            matches.len()
        );
        for (market, score) in &matches {
            self.react_to(market, signal, *score).await?;
        }
        Ok(())
    }

    /// Inspect the local trade record for a reaction to a matched signal
    /// and raise the appropriate alert. Returns the raised alert id, if
    /// any.
    pub async fn react_to(
        &self,
        market: &MarketSnapshot,
        signal: &ExternalSignal,
        score: f64,
    ) -> Result<Option<i64>> {
        let (lookback, min_trades, high_trades) = match signal.source {
            SignalSource::News => {
                (self.news_lookback_secs, self.news_min_trades, self.news_high_trades)
            }
            SignalSource::Social => {
                (self.social_lookback_secs, self.social_min_trades, self.social_high_trades)
            }
        };
        let cutoff = chrono::Utc::now().timestamp() - lookback;
        let trades = self.store.recent_market_trades(&market.condition_id, cutoff)?;
        let top_wallets = self.store.top_wallets(self.high_win_rate, self.low_trade_count)?;

        let smart: Vec<_> = trades
            .iter()
            .filter(|t| top_wallets.contains(&t.wallet_address))
            .collect();
        let minutes = lookback / 60;
        let total_volume: f64 = trades.iter().map(|t| t.usd_value).sum();

        let (kind, severity, wallet, reason) = if !smart.is_empty() {
            (
                AlertKind::SmartMoneyMove,
                Severity::Critical,
                smart[0].wallet_address.clone(),
                format!(
                    "{} top-performing wallet(s) traded within {}m of {} signal: {}",
                    smart.len(),
                    minutes,
                    signal.source.as_str(),
                    signal.title
                ),
            )
        } else if trades.len() >= min_trades {
            // Notable churn is MEDIUM; only an unusually heavy burst for the
            // source earns HIGH
            let severity = if trades.len() >= high_trades {
                Severity::High
            } else {
                Severity::Medium
            };
            (
                AlertKind::HighActivity,
                severity,
                String::new(),
                format!(
                    "{} trades within {}m of {} signal: {}",
                    trades.len(),
                    minutes,
                    signal.source.as_str(),
                    signal.title
                ),
            )
        } else if !trades.is_empty() {
            // Some activity, but neither smart money nor enough volume to
            // stand out from baseline churn
            return Ok(None);
        } else {
            // No trade evidence at all. Only a very confident match from a
            // priority account is worth surfacing this early.
            let priority = signal
                .account
                .as_deref()
                .map(|a| self.priority_accounts.iter().any(|p| p == &a.to_lowercase()))
                .unwrap_or(false);
            if score < ZERO_EVIDENCE_CONFIDENCE || !priority {
                return Ok(None);
            }
            (
                AlertKind::SignalMatch,
                Severity::Medium,
                String::new(),
                format!(
                    "Priority account {} signal, no trades yet: {}",
                    signal.source.as_str(),
                    signal.title
                ),
            )
        };

        let alert = Alert {
            kind,
            severity,
            wallet_address: wallet,
            market_title: market.question.clone(),
            market_slug: market.slug.clone(),
            trade_size: total_volume,
            price: 0.0,
            side: String::new(),
            outcome: String::new(),
            wallet_age_hours: None,
            wallet_total_trades: 0,
            wallet_win_rate: None,
            reason,
            timestamp: chrono::Utc::now().timestamp(),
        };
        let (id, _) = self.ledger.record_and_deliver(&alert).await?;
        Ok(Some(id))
    }
}
