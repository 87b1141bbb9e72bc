use polysentry::api::{
    NewsClient, NewsSource, Notifier, PolymarketClient, SocialClient, SocialSource,
    TelegramNotifier,
};
use polysentry::{
    scan_high_performers, AlertLedger, CorrelationCoordinator, ScannerConfig, SignalWatcher,
    Store, TradeWatcher, WalletProfileCache,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> polysentry::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = ScannerConfig::from_env();
    config.validate()?;

    let store = Store::open(&config.db_path)?;
    let polymarket = Arc::new(PolymarketClient::new()?);

    let notifier: Option<Arc<dyn Notifier>> =
        match (&config.telegram_bot_token, &config.telegram_chat_id) {
            (Some(token), Some(chat_id)) => {
                log::info!("Telegram delivery enabled");
                Some(Arc::new(TelegramNotifier::new(token, chat_id)?))
            }
            _ => {
                log::info!("No delivery transport configured, alerts go to the log");
                None
            }
        };

    let news: Option<Arc<dyn NewsSource>> = match &config.newsapi_key {
        Some(key) => Some(Arc::new(NewsClient::new(key)?)),
        None => None,
    };
    let social: Option<Arc<dyn SocialSource>> = match &config.social_bearer_token {
        Some(token) => Some(Arc::new(SocialClient::new(token)?)),
        None => None,
    };

    let ledger = Arc::new(AlertLedger::new(
        store.clone(),
        notifier.clone(),
        config.min_alert_severity,
    ));
    let profiles = Arc::new(WalletProfileCache::new(
        store.clone(),
        polymarket.clone(),
        config.wallet_cache_ttl_secs,
    ));
    let coordinator = Arc::new(CorrelationCoordinator::new(
        store.clone(),
        polymarket.clone(),
        ledger.clone(),
        &config,
    ));

    let markets = coordinator.markets().await;
    log::info!("Tracking {} active markets", markets.len());

    if config.analyze_history_on_start {
        match scan_high_performers(&store, &profiles, &config).await {
            Ok(sharp) => log::info!("History scan done: {} top performers", sharp),
            Err(e) => log::warn!("History scan failed: {}", e),
        }
    }

    if let Some(notifier) = &notifier {
        let startup = format!(
            "\u{1F50D} Scanner online, tracking {} markets",
            markets.len()
        );
        if let Err(e) = notifier.send(&startup).await {
            log::warn!("Startup message failed: {}", e);
        }
    }

    let trade_watcher = Arc::new(TradeWatcher::new(
        store,
        coordinator.clone(),
        polymarket,
        profiles,
        ledger,
        &config,
    ));
    let signal_watcher = Arc::new(SignalWatcher::new(coordinator, news, social, &config));

    {
        let watcher = trade_watcher.clone();
        tokio::spawn(async move { watcher.run().await });
    }
    {
        let watcher = signal_watcher.clone();
        tokio::spawn(async move { watcher.run_news().await });
    }
    {
        let watcher = signal_watcher.clone();
        tokio::spawn(async move { watcher.run_social().await });
    }

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| polysentry::ScanError::Config(format!("signal handler: {}", e)))?;
    log::info!("Shutting down");
    Ok(())
}
