//! Wallet profile building and caching
//!
//! Profiles are built from the wallet's full activity and position history,
//! cached in memory with a TTL, and written through to the store so that
//! reaction analysis can join win rates without touching the upstream.

use crate::api::{ActivitySource, RawActivity, RawPosition};
use crate::db::Store;
use crate::error::Result;
use crate::types::WalletProfile;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

const ACTIVITY_FETCH_LIMIT: usize = 500;

pub struct WalletProfileCache {
    store: Store,
    activity: Arc<dyn ActivitySource>,
    ttl_secs: i64,
    cache: Mutex<HashMap<String, (WalletProfile, i64)>>,
}

impl WalletProfileCache {
    pub fn new(store: Store, activity: Arc<dyn ActivitySource>, ttl_secs: i64) -> Self {
        Self {
            store,
            activity,
            ttl_secs,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Profile for a wallet. Fresh cache entries are served directly unless
    /// `force_refresh` is set; otherwise the upstream is queried and the
    /// result written through to the store. A wallet with no recorded
    /// trades has no profile, which is not an error.
    ///
    /// On upstream failure the last persisted profile is served when one
    /// exists, so a flaky data API degrades to stale stats rather than
    /// losing the alert.
    pub async fn get_profile(
        &self,
        wallet: &str,
        force_refresh: bool,
    ) -> Result<Option<WalletProfile>> {
        let now = chrono::Utc::now().timestamp();

        if !force_refresh {
            // Scope the lock so it is released before any await
            let cached = {
                let cache = self.cache.lock().unwrap();
                cache.get(wallet).and_then(|(profile, fetched_at)| {
                    (now - fetched_at < self.ttl_secs).then(|| profile.clone())
                })
            };
            if let Some(profile) = cached {
                return Ok(Some(profile));
            }
        }

        let fetched = self.fetch_profile(wallet).await;
        let profile = match fetched {
            Ok(profile) => profile,
            Err(e) => {
                log::warn!("Profile fetch for {} failed: {}; using stored stats", wallet, e);
                return self.store.load_profile(wallet);
            }
        };

        if let Some(ref profile) = profile {
            self.store.save_profile(profile)?;
            self.cache
                .lock()
                .unwrap()
                .insert(wallet.to_string(), (profile.clone(), now));
        }
        Ok(profile)
    }

    async fn fetch_profile(&self, wallet: &str) -> Result<Option<WalletProfile>> {
        let activity = self
            .activity
            .get_activity(wallet, ACTIVITY_FETCH_LIMIT)
            .await?;
        let positions = self.activity.get_positions(wallet).await?;
        Ok(build_profile(wallet, &activity, &positions))
    }
}

/// Aggregate raw activity and positions into a profile. Returns None for a
/// wallet with no trade records; the win rate stays None when no closed
/// positions exist.
pub fn build_profile(
    wallet: &str,
    activity: &[RawActivity],
    positions: &[RawPosition],
) -> Option<WalletProfile> {
    let trades: Vec<&RawActivity> = activity.iter().filter(|a| a.kind == "TRADE").collect();
    if trades.is_empty() {
        return None;
    }

    let first_trade_time = trades.iter().map(|t| t.timestamp).min().unwrap_or(0);
    let total_volume: f64 = trades.iter().map(|t| t.usdc_size).sum();
    let largest_bet = trades.iter().map(|t| t.usdc_size).fold(0.0, f64::max);
    let markets_traded: HashSet<String> = trades
        .iter()
        .filter_map(|t| t.condition_id.clone())
        .collect();

    let total_positions = positions.len() as u32;
    let profitable_positions = positions.iter().filter(|p| p.cash_pnl > 0.0).count() as u32;
    let win_rate = if total_positions > 0 {
        Some(profitable_positions as f64 / total_positions as f64)
    } else {
        None
    };

    Some(WalletProfile {
        address: wallet.to_string(),
        first_trade_time,
        total_trades: trades.len() as u32,
        total_volume,
        markets_traded,
        win_rate,
        avg_bet_size: total_volume / trades.len() as f64,
        largest_bet,
        profitable_positions,
        total_positions,
    })
}

/// Hours elapsed since the wallet's first recorded trade
pub fn wallet_age_hours(profile: &WalletProfile, now: i64) -> f64 {
    ((now - profile.first_trade_time) as f64 / 3600.0).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{RawActivity, RawPosition};
    use crate::db::test_support::open_temp_store;
    use crate::error::{Result, ScanError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeActivity {
        activity: Vec<RawActivity>,
        positions: Vec<RawPosition>,
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ActivitySource for FakeActivity {
        async fn get_activity(&self, _wallet: &str, _limit: usize) -> Result<Vec<RawActivity>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ScanError::Payload("upstream down".to_string()));
            }
            Ok(self.activity.clone())
        }

        async fn get_positions(&self, _wallet: &str) -> Result<Vec<RawPosition>> {
            Ok(self.positions.clone())
        }
    }

    fn trade_activity(timestamp: i64, usdc_size: f64, market: &str) -> RawActivity {
        RawActivity {
            kind: "TRADE".to_string(),
            usdc_size,
            condition_id: Some(market.to_string()),
            timestamp,
        }
    }

    fn position(cash_pnl: f64) -> RawPosition {
        RawPosition {
            outcome: "Yes".to_string(),
            size: 100.0,
            current_value: 100.0 + cash_pnl,
            cash_pnl,
        }
    }

    #[test]
    fn test_build_profile_aggregates() {
        let activity = vec![
            trade_activity(1_000, 500.0, "m1"),
            trade_activity(2_000, 1_500.0, "m2"),
            trade_activity(3_000, 1_000.0, "m1"),
            RawActivity {
                kind: "REDEEM".to_string(),
                usdc_size: 9_999.0,
                condition_id: None,
                timestamp: 500,
            },
        ];
        let positions = vec![position(50.0), position(-20.0), position(10.0)];

        let profile = build_profile("0xw", &activity, &positions).unwrap();
        assert_eq!(profile.first_trade_time, 1_000);
        assert_eq!(profile.total_trades, 3);
        assert_eq!(profile.total_volume, 3_000.0);
        assert_eq!(profile.markets_traded.len(), 2);
        assert_eq!(profile.largest_bet, 1_500.0);
        assert_eq!(profile.avg_bet_size, 1_000.0);
        assert_eq!(profile.profitable_positions, 2);
        assert_eq!(profile.win_rate, Some(2.0 / 3.0));
    }

    #[test]
    fn test_no_trades_means_no_profile() {
        assert!(build_profile("0xw", &[], &[position(5.0)]).is_none());
    }

    #[test]
    fn test_no_positions_means_unknown_win_rate() {
        let profile =
            build_profile("0xw", &[trade_activity(1_000, 100.0, "m1")], &[]).unwrap();
        assert!(profile.win_rate.is_none());
    }

    #[tokio::test]
    async fn test_cache_serves_fresh_entries() {
        let (_temp, store) = open_temp_store();
        let fake = Arc::new(FakeActivity {
            activity: vec![trade_activity(1_000, 100.0, "m1")],
            positions: vec![],
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let cache = WalletProfileCache::new(store, fake.clone(), 300);

        cache.get_profile("0xw", false).await.unwrap().unwrap();
        cache.get_profile("0xw", false).await.unwrap().unwrap();
        assert_eq!(fake.calls.load(Ordering::SeqCst), 1);

        // Force refresh bypasses the cache
        cache.get_profile("0xw", true).await.unwrap().unwrap();
        assert_eq!(fake.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_profile_written_through_to_store() {
        let (_temp, store) = open_temp_store();
        let fake = Arc::new(FakeActivity {
            activity: vec![trade_activity(1_000, 100.0, "m1")],
            positions: vec![position(5.0)],
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let cache = WalletProfileCache::new(store.clone(), fake, 300);

        cache.get_profile("0xw", false).await.unwrap().unwrap();

        let stored = store.load_profile("0xw").unwrap().unwrap();
        assert_eq!(stored.total_trades, 1);
        assert_eq!(stored.win_rate, Some(1.0));
    }

    #[tokio::test]
    async fn test_upstream_failure_falls_back_to_store() {
        let (_temp, store) = open_temp_store();

        let seed = build_profile(
            "0xw",
            &[trade_activity(1_000, 100.0, "m1")],
            &[position(5.0)],
        )
        .unwrap();
        store.save_profile(&seed).unwrap();

        let fake = Arc::new(FakeActivity {
            activity: vec![],
            positions: vec![],
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let cache = WalletProfileCache::new(store, fake, 300);

        let profile = cache.get_profile("0xw", false).await.unwrap().unwrap();
        assert_eq!(profile.total_trades, 1);
    }

    #[test]
    fn test_wallet_age_hours() {
        let profile = build_profile("0xw", &[trade_activity(0, 100.0, "m1")], &[]).unwrap();
        assert_eq!(wallet_age_hours(&profile, 36_000), 10.0);
        // Clock skew never yields a negative age
        assert_eq!(wallet_age_hours(&profile, -100), 0.0);
    }
}
