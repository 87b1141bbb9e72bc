//! Core domain types shared across the scanner

use std::collections::HashSet;

/// Trade direction. Anything outside BUY/SELL in an upstream record is a
/// data integrity problem, so parsing returns None instead of defaulting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "BUY" => Some(Side::Buy),
            "SELL" => Some(Side::Sell),
            _ => None,
        }
    }
}

/// Alert severity. Declaration order gives the escalation ordering:
/// Low < Medium < High < Critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "LOW" => Some(Severity::Low),
            "MEDIUM" => Some(Severity::Medium),
            "HIGH" => Some(Severity::High),
            "CRITICAL" => Some(Severity::Critical),
            _ => None,
        }
    }
}

/// What a given alert is about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    HugeBet,
    VeryLargeBet,
    LargeBet,
    SmartMoneyMove,
    HighActivity,
    SignalMatch,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::HugeBet => "HUGE_BET",
            AlertKind::VeryLargeBet => "VERY_LARGE_BET",
            AlertKind::LargeBet => "LARGE_BET",
            AlertKind::SmartMoneyMove => "SMART_MONEY_MOVE",
            AlertKind::HighActivity => "HIGH_ACTIVITY",
            AlertKind::SignalMatch => "SIGNAL_MATCH",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "HUGE_BET" => Some(AlertKind::HugeBet),
            "VERY_LARGE_BET" => Some(AlertKind::VeryLargeBet),
            "LARGE_BET" => Some(AlertKind::LargeBet),
            "SMART_MONEY_MOVE" => Some(AlertKind::SmartMoneyMove),
            "HIGH_ACTIVITY" => Some(AlertKind::HighActivity),
            "SIGNAL_MATCH" => Some(AlertKind::SignalMatch),
            _ => None,
        }
    }
}

/// A validated on-chain trade, normalized from the raw feed
#[derive(Debug, Clone)]
pub struct TradeEvent {
    pub timestamp: i64,
    pub wallet_address: String,
    pub market_id: String,
    pub market_title: String,
    pub token_id: String,
    pub side: Side,
    pub size: f64,
    pub price: f64,
    pub usd_value: f64,
    pub outcome: String,
    pub transaction_hash: String,
}

/// Aggregated behavioral profile of a wallet.
///
/// `win_rate` is None until at least one closed position is known; an
/// unknown win rate must never be conflated with a zero one.
#[derive(Debug, Clone)]
pub struct WalletProfile {
    pub address: String,
    pub first_trade_time: i64,
    pub total_trades: u32,
    pub total_volume: f64,
    pub markets_traded: HashSet<String>,
    pub win_rate: Option<f64>,
    pub avg_bet_size: f64,
    pub largest_bet: f64,
    pub profitable_positions: u32,
    pub total_positions: u32,
}

/// A ranked alert ready for persistence and (maybe) delivery
#[derive(Debug, Clone)]
pub struct Alert {
    pub kind: AlertKind,
    pub severity: Severity,
    pub wallet_address: String,
    pub market_title: String,
    pub market_slug: String,
    pub trade_size: f64,
    pub price: f64,
    pub side: String,
    pub outcome: String,
    pub wallet_age_hours: Option<f64>,
    pub wallet_total_trades: u32,
    pub wallet_win_rate: Option<f64>,
    pub reason: String,
    pub timestamp: i64,
}

/// Where an external signal came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalSource {
    News,
    Social,
}

impl SignalSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalSource::News => "news",
            SignalSource::Social => "social",
        }
    }
}

/// An off-chain signal (news article or social post) to correlate against
/// the tracked markets
#[derive(Debug, Clone)]
pub struct ExternalSignal {
    pub source: SignalSource,
    pub title: String,
    pub content: String,
    /// Article URL or post id; doubles as the dedup identity
    pub url: String,
    pub published_at: i64,
    /// Attributed account handle, for social posts
    pub account: Option<String>,
    pub keywords: Vec<String>,
}

impl ExternalSignal {
    /// Full text used for relevance scoring
    pub fn text(&self) -> String {
        format!("{} {}", self.title, self.content)
    }
}

/// Cached view of a tracked market
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub slug: String,
    pub condition_id: String,
    pub question: String,
    pub description: String,
}

impl MarketSnapshot {
    pub fn text(&self) -> String {
        format!("{} {}", self.question, self.description)
    }
}

/// Format a dollar amount with thousands separators, no cents.
/// `format_usd(75000.0)` is `"$75,000"`.
pub fn format_usd(amount: f64) -> String {
    let whole = amount.round() as i64;
    let digits = whole.abs().to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if whole < 0 {
        format!("-${}", out)
    } else {
        format!("${}", out)
    }
}
