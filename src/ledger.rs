//! Alert persistence and delivery
//!
//! Every classified alert is persisted, even the ones below the delivery
//! floor; the full record is what post-hoc analysis runs on. Delivery is
//! at-most-once per alert, enforced by the store's sent-flag transition.

use crate::api::Notifier;
use crate::db::Store;
use crate::error::{Result, ScanError};
use crate::types::{format_usd, Alert, Severity};
use std::sync::Arc;

pub struct AlertLedger {
    store: Store,
    notifier: Option<Arc<dyn Notifier>>,
    min_severity: Severity,
}

impl AlertLedger {
    pub fn new(store: Store, notifier: Option<Arc<dyn Notifier>>, min_severity: Severity) -> Self {
        Self {
            store,
            notifier,
            min_severity,
        }
    }

    /// Persist an alert in the not-sent state and return its id
    pub fn record(&self, alert: &Alert) -> Result<i64> {
        self.store.save_alert(alert)
    }

    /// Deliver a recorded alert. Below-floor alerts stay persisted but are
    /// never sent (returns false). Re-delivering an already-sent alert is
    /// an error; a failed transport send leaves the alert not-sent so a
    /// later attempt can retry.
    pub async fn deliver(&self, id: i64, alert: &Alert) -> Result<bool> {
        if alert.severity < self.min_severity {
            log::debug!(
                "Alert {} ({}) below delivery floor, persisted only",
                id,
                alert.severity.as_str()
            );
            return Ok(false);
        }
        if self.store.alert_sent(id)? {
            return Err(ScanError::AlreadyDelivered(id));
        }

        let message = format_message(alert);
        match &self.notifier {
            Some(notifier) => notifier.send(&message).await?,
            None => log::info!("ALERT (no transport configured):\n{}", message),
        }

        if !self.store.mark_alert_sent(id)? {
            return Err(ScanError::AlreadyDelivered(id));
        }
        Ok(true)
    }

    /// Persist and immediately attempt delivery. Returns the alert id and
    /// whether it was actually sent.
    pub async fn record_and_deliver(&self, alert: &Alert) -> Result<(i64, bool)> {
        let id = self.record(alert)?;
        let delivered = self.deliver(id, alert).await?;
        Ok((id, delivered))
    }
}

fn severity_emoji(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "\u{1F6A8}",
        Severity::High => "\u{26A0}\u{FE0F}",
        Severity::Medium => "\u{1F4E2}",
        Severity::Low => "\u{2139}\u{FE0F}",
    }
}

fn short_wallet(wallet: &str) -> String {
    if wallet.len() > 12 {
        format!("{}...{}", &wallet[..6], &wallet[wallet.len() - 4..])
    } else {
        wallet.to_string()
    }
}

/// Format an alert for the HTML-mode transport
pub fn format_message(alert: &Alert) -> String {
    let mut lines = vec![
        format!(
            "{} <b>{}</b> {}",
            severity_emoji(alert.severity),
            alert.severity.as_str(),
            alert.kind.as_str()
        ),
        format!("Market: {}", alert.market_title),
        format!(
            "{} {} on {} @ {:.2}",
            alert.side,
            format_usd(alert.trade_size),
            alert.outcome,
            alert.price
        ),
    ];

    if !alert.wallet_address.is_empty() {
        let mut wallet_line = format!("Wallet: {}", short_wallet(&alert.wallet_address));
        if let Some(age) = alert.wallet_age_hours {
            wallet_line.push_str(&format!(", {:.0}h old", age));
        }
        if let Some(win_rate) = alert.wallet_win_rate {
            wallet_line.push_str(&format!(", {:.0}% win rate", win_rate * 100.0));
        }
        lines.push(wallet_line);
    }

    lines.push(format!("Reason: {}", alert.reason));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::open_temp_store;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeNotifier {
        sends: AtomicUsize,
        messages: Mutex<Vec<String>>,
        fail: bool,
    }

    impl FakeNotifier {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                sends: AtomicUsize::new(0),
                messages: Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    #[async_trait]
    impl Notifier for FakeNotifier {
        async fn send(&self, message: &str) -> Result<()> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ScanError::Delivery("transport down".to_string()));
            }
            self.messages.lock().unwrap().push(message.to_string());
            Ok(())
        }
    }

    fn alert(severity: Severity) -> Alert {
        Alert {
            kind: crate::types::AlertKind::LargeBet,
            severity,
            wallet_address: "0xabcdef1234567890abcdef".to_string(),
            market_title: "Test market".to_string(),
            market_slug: "test-market".to_string(),
            trade_size: 6_000.0,
            price: 0.42,
            side: "BUY".to_string(),
            outcome: "Yes".to_string(),
            wallet_age_hours: Some(12.0),
            wallet_total_trades: 4,
            wallet_win_rate: Some(0.7),
            reason: "Large $6,000 bet | new wallet (12h old)".to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    #[tokio::test]
    async fn test_record_and_deliver() {
        let (_temp, store) = open_temp_store();
        let notifier = FakeNotifier::new(false);
        let ledger = AlertLedger::new(store.clone(), Some(notifier.clone()), Severity::Medium);

        let (id, delivered) = ledger.record_and_deliver(&alert(Severity::High)).await.unwrap();
        assert!(delivered);
        assert!(store.alert_sent(id).unwrap());
        assert_eq!(notifier.sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_below_floor_persisted_not_delivered() {
        let (_temp, store) = open_temp_store();
        let notifier = FakeNotifier::new(false);
        let ledger = AlertLedger::new(store.clone(), Some(notifier.clone()), Severity::High);

        let (id, delivered) = ledger
            .record_and_deliver(&alert(Severity::Medium))
            .await
            .unwrap();
        assert!(!delivered);
        assert!(!store.alert_sent(id).unwrap());
        assert_eq!(notifier.sends.load(Ordering::SeqCst), 0);

        // The row exists regardless
        assert_eq!(store.recent_alerts(1).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_redelivery_is_an_error() {
        let (_temp, store) = open_temp_store();
        let notifier = FakeNotifier::new(false);
        let ledger = AlertLedger::new(store, Some(notifier.clone()), Severity::Medium);

        let a = alert(Severity::High);
        let (id, _) = ledger.record_and_deliver(&a).await.unwrap();

        let err = ledger.deliver(id, &a).await.unwrap_err();
        assert!(matches!(err, ScanError::AlreadyDelivered(i) if i == id));
        assert_eq!(notifier.sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_send_leaves_not_sent() {
        let (_temp, store) = open_temp_store();
        let notifier = FakeNotifier::new(true);
        let ledger = AlertLedger::new(store.clone(), Some(notifier), Severity::Medium);

        let a = alert(Severity::High);
        let id = ledger.record(&a).unwrap();
        assert!(ledger.deliver(id, &a).await.is_err());
        assert!(!store.alert_sent(id).unwrap());

        // A retry with a working transport succeeds
        let working = FakeNotifier::new(false);
        let retry_ledger = AlertLedger::new(store.clone(), Some(working), Severity::Medium);
        assert!(retry_ledger.deliver(id, &a).await.unwrap());
        assert!(store.alert_sent(id).unwrap());
    }

    #[tokio::test]
    async fn test_no_transport_still_marks_sent() {
        let (_temp, store) = open_temp_store();
        let ledger = AlertLedger::new(store.clone(), None, Severity::Medium);

        let (id, delivered) = ledger.record_and_deliver(&alert(Severity::High)).await.unwrap();
        assert!(delivered);
        assert!(store.alert_sent(id).unwrap());
    }

    #[test]
    fn test_message_format() {
        let message = format_message(&alert(Severity::Critical));
        assert!(message.contains("<b>CRITICAL</b> LARGE_BET"));
        assert!(message.contains("Market: Test market"));
        assert!(message.contains("BUY $6,000 on Yes @ 0.42"));
        assert!(message.contains("0xabcd"));
        assert!(message.contains("70% win rate"));
        assert!(message.contains("Reason: Large $6,000 bet"));
    }
}
