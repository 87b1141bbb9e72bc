//! Trade severity classification
//!
//! A trade first earns a base tier from its USD size alone, then the
//! wallet's profile escalates it through an ordered list of rules. Each
//! rule sees the current severity and returns an optional reason flag and
//! an optional raised severity; the fold applies them left-to-right and
//! never lowers. The classifier is pure: it never touches the store or
//! the network.

use crate::config::ScannerConfig;
use crate::profile::wallet_age_hours;
use crate::types::{format_usd, Alert, AlertKind, Severity, TradeEvent, WalletProfile};

/// What one escalation rule sees: the wallet's age in hours (None when the
/// wallet has no profile) and the profile itself.
struct EscalationInput<'a> {
    age_hours: Option<f64>,
    profile: Option<&'a WalletProfile>,
}

/// Outcome of one rule: a reason flag to append and/or a severity to raise
/// to. A raise below the current severity is ignored by the fold.
type RuleOutcome = (Option<String>, Option<Severity>);

type EscalationRule = fn(&SeverityClassifier, Severity, &EscalationInput) -> RuleOutcome;

/// Escalation rules in the order their flags appear in the reason string
const ESCALATION_RULES: [EscalationRule; 4] = [
    SeverityClassifier::rule_new_wallet,
    SeverityClassifier::rule_low_trade_count,
    SeverityClassifier::rule_high_win_rate,
    SeverityClassifier::rule_single_market,
];

pub struct SeverityClassifier {
    large_bet: f64,
    very_large_bet: f64,
    huge_bet: f64,
    new_wallet_hours: f64,
    very_new_wallet_hours: f64,
    high_win_rate: f64,
    low_trade_count: u32,
}

impl SeverityClassifier {
    pub fn new(config: &ScannerConfig) -> Self {
        Self {
            large_bet: config.large_bet,
            very_large_bet: config.very_large_bet,
            huge_bet: config.huge_bet,
            new_wallet_hours: config.new_wallet_hours,
            very_new_wallet_hours: config.very_new_wallet_hours,
            high_win_rate: config.high_win_rate,
            low_trade_count: config.low_trade_count,
        }
    }

    /// Classify a trade against the wallet's profile. Trades below the
    /// large-bet tier produce no alert.
    pub fn classify(
        &self,
        trade: &TradeEvent,
        profile: Option<&WalletProfile>,
        market_slug: &str,
    ) -> Option<Alert> {
        let (kind, base_severity, base_reason) = if trade.usd_value >= self.huge_bet {
            (
                AlertKind::HugeBet,
                Severity::Critical,
                format!("Huge {} bet", format_usd(trade.usd_value)),
            )
        } else if trade.usd_value >= self.very_large_bet {
            (
                AlertKind::VeryLargeBet,
                Severity::High,
                format!("Very large {} bet", format_usd(trade.usd_value)),
            )
        } else if trade.usd_value >= self.large_bet {
            (
                AlertKind::LargeBet,
                Severity::Medium,
                format!("Large {} bet", format_usd(trade.usd_value)),
            )
        } else {
            return None;
        };

        let now = chrono::Utc::now().timestamp();
        let input = EscalationInput {
            age_hours: profile.map(|p| wallet_age_hours(p, now)),
            profile,
        };

        let mut severity = base_severity;
        let mut flags: Vec<String> = Vec::new();
        for rule in ESCALATION_RULES {
            let (flag, raised) = rule(self, severity, &input);
            if let Some(flag) = flag {
                flags.push(flag);
            }
            if let Some(raised) = raised {
                severity = severity.max(raised);
            }
        }

        let reason = if flags.is_empty() {
            base_reason
        } else {
            format!("{} | {}", base_reason, flags.join(", "))
        };

        Some(Alert {
            kind,
            severity,
            wallet_address: trade.wallet_address.clone(),
            market_title: trade.market_title.clone(),
            market_slug: market_slug.to_string(),
            trade_size: trade.usd_value,
            price: trade.price,
            side: trade.side.as_str().to_string(),
            outcome: trade.outcome.clone(),
            wallet_age_hours: input.age_hours,
            wallet_total_trades: profile.map(|p| p.total_trades).unwrap_or(0),
            wallet_win_rate: profile.and_then(|p| p.win_rate),
            reason,
            timestamp: trade.timestamp,
        })
    }

    /// A young wallet gets a flag; only a very new one forces CRITICAL.
    /// A wallet with no profile at all counts as new with unknown age,
    /// not as established.
    fn rule_new_wallet(&self, _current: Severity, input: &EscalationInput) -> RuleOutcome {
        match input.age_hours {
            Some(age) if age < self.very_new_wallet_hours => (
                Some(format!("new wallet ({:.0}h old)", age)),
                Some(Severity::Critical),
            ),
            Some(age) if age < self.new_wallet_hours => {
                (Some(format!("new wallet ({:.0}h old)", age)), None)
            }
            Some(_) => (None, None),
            None => (Some("new wallet (unknown age)".to_string()), None),
        }
    }

    fn rule_low_trade_count(&self, current: Severity, input: &EscalationInput) -> RuleOutcome {
        match input.profile {
            Some(profile) if profile.total_trades < self.low_trade_count => (
                Some(format!("Only {} trades", profile.total_trades)),
                (current == Severity::Medium).then_some(Severity::High),
            ),
            _ => (None, None),
        }
    }

    fn rule_high_win_rate(&self, current: Severity, input: &EscalationInput) -> RuleOutcome {
        match input.profile.and_then(|p| p.win_rate) {
            Some(win_rate) if win_rate > self.high_win_rate => (
                Some(format!("High win rate ({:.0}%)", win_rate * 100.0)),
                (current == Severity::Medium).then_some(Severity::High),
            ),
            _ => (None, None),
        }
    }

    /// Single-market wallets are the strongest insider signal
    fn rule_single_market(&self, _current: Severity, input: &EscalationInput) -> RuleOutcome {
        match input.profile {
            Some(profile) if profile.markets_traded.len() == 1 => (
                Some("Only trades this market".to_string()),
                Some(Severity::Critical),
            ),
            _ => (None, None),
        }
    }
}
