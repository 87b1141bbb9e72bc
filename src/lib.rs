//! Insider-activity scanner for prediction markets
//!
//! Watches on-chain trades for size/wallet-behavior anomalies, correlates
//! off-chain news and social signals against the tracked markets, and
//! delivers ranked alerts through a pluggable transport.

pub mod api;
pub mod classify;
pub mod config;
pub mod correlate;
pub mod db;
pub mod error;
pub mod ingest;
pub mod ledger;
pub mod profile;
pub mod relevance;
pub mod types;

pub use classify::SeverityClassifier;
pub use config::ScannerConfig;
pub use correlate::CorrelationCoordinator;
pub use db::Store;
pub use error::{Result, ScanError};
pub use ingest::{scan_high_performers, SignalWatcher, TradeWatcher};
pub use ledger::AlertLedger;
pub use profile::WalletProfileCache;
pub use relevance::RelevanceMatcher;
pub use types::{Alert, AlertKind, Severity, Side, TradeEvent, WalletProfile};
