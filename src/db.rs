//! SQLite store for trades, wallet profiles, alerts, and price snapshots
//!
//! Schema is created idempotently at open time and WAL mode is enabled for
//! concurrent readers. Trades are deduplicated at the store level by a
//! UNIQUE transaction hash with insert-or-ignore; alerts are append-only
//! with a `sent` flag that transitions 0 -> 1 exactly once.

use crate::error::Result;
use crate::types::{Alert, AlertKind, Severity, TradeEvent, WalletProfile};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS trades (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp           INTEGER NOT NULL,
    wallet_address      TEXT NOT NULL,
    market_id           TEXT NOT NULL,
    market_title        TEXT NOT NULL,
    token_id            TEXT NOT NULL,
    side                TEXT NOT NULL,
    size                REAL NOT NULL,
    price               REAL NOT NULL,
    usd_value           REAL NOT NULL,
    outcome             TEXT NOT NULL,
    transaction_hash    TEXT UNIQUE NOT NULL,
    created_at          INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS wallet_stats (
    wallet_address       TEXT PRIMARY KEY,
    first_trade_time     INTEGER NOT NULL,
    last_updated         INTEGER NOT NULL,
    total_trades         INTEGER NOT NULL,
    total_volume         REAL NOT NULL,
    markets_traded       TEXT NOT NULL,
    win_rate             REAL,
    avg_bet_size         REAL NOT NULL,
    largest_bet          REAL NOT NULL,
    profitable_positions INTEGER NOT NULL,
    total_positions      INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS alerts (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    alert_type          TEXT NOT NULL,
    severity            TEXT NOT NULL,
    wallet_address      TEXT NOT NULL,
    market_title        TEXT NOT NULL,
    market_slug         TEXT NOT NULL,
    trade_size          REAL NOT NULL,
    price               REAL NOT NULL,
    side                TEXT NOT NULL,
    outcome             TEXT NOT NULL,
    wallet_age_hours    REAL,
    wallet_total_trades INTEGER NOT NULL,
    wallet_win_rate     REAL,
    reason              TEXT NOT NULL,
    timestamp           INTEGER NOT NULL,
    sent                INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS market_prices (
    token_id    TEXT NOT NULL,
    price       REAL NOT NULL,
    timestamp   INTEGER NOT NULL,
    PRIMARY KEY (token_id, timestamp)
);

CREATE INDEX IF NOT EXISTS idx_trades_wallet ON trades(wallet_address);
CREATE INDEX IF NOT EXISTS idx_trades_market_ts ON trades(market_id, timestamp);
CREATE INDEX IF NOT EXISTS idx_alerts_timestamp ON alerts(timestamp);
"#;

/// A trade row read back for reaction analysis, joined with the wallet's
/// cached stats (NULL when the wallet has never been profiled).
#[derive(Debug, Clone)]
pub struct RecentTrade {
    pub wallet_address: String,
    pub side: String,
    pub usd_value: f64,
    pub timestamp: i64,
    pub win_rate: Option<f64>,
}

/// A persisted alert row (used by tests and the startup summary)
#[derive(Debug, Clone)]
pub struct StoredAlert {
    pub id: i64,
    pub kind: AlertKind,
    pub severity: Severity,
    pub market_title: String,
    pub reason: String,
    pub timestamp: i64,
    pub sent: bool,
}

#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the database and run the idempotent schema.
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA)?;
        log::info!("Database ready at {}", db_path);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Insert a trade, ignoring duplicates by transaction hash.
    /// Returns true when the row was actually inserted.
    pub fn insert_trade(&self, trade: &TradeEvent) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            r#"
            INSERT OR IGNORE INTO trades
                (timestamp, wallet_address, market_id, market_title, token_id,
                 side, size, price, usd_value, outcome, transaction_hash, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                trade.timestamp,
                trade.wallet_address,
                trade.market_id,
                trade.market_title,
                trade.token_id,
                trade.side.as_str(),
                trade.size,
                trade.price,
                trade.usd_value,
                trade.outcome,
                trade.transaction_hash,
                chrono::Utc::now().timestamp(),
            ],
        )?;
        Ok(changed > 0)
    }

    /// Upsert a wallet profile (write-through target of the profile cache)
    pub fn save_profile(&self, profile: &WalletProfile) -> Result<()> {
        let markets: Vec<&String> = profile.markets_traded.iter().collect();
        let markets_json = serde_json::to_string(&markets)
            .unwrap_or_else(|_| "[]".to_string());

        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT OR REPLACE INTO wallet_stats
                (wallet_address, first_trade_time, last_updated, total_trades,
                 total_volume, markets_traded, win_rate, avg_bet_size,
                 largest_bet, profitable_positions, total_positions)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                profile.address,
                profile.first_trade_time,
                chrono::Utc::now().timestamp(),
                profile.total_trades,
                profile.total_volume,
                markets_json,
                profile.win_rate,
                profile.avg_bet_size,
                profile.largest_bet,
                profile.profitable_positions,
                profile.total_positions,
            ],
        )?;
        Ok(())
    }

    pub fn load_profile(&self, wallet: &str) -> Result<Option<WalletProfile>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                r#"
                SELECT wallet_address, first_trade_time, total_trades, total_volume,
                       markets_traded, win_rate, avg_bet_size, largest_bet,
                       profitable_positions, total_positions
                FROM wallet_stats WHERE wallet_address = ?1
                "#,
                [wallet],
                |row| {
                    let markets_json: String = row.get(4)?;
                    Ok(WalletProfile {
                        address: row.get(0)?,
                        first_trade_time: row.get(1)?,
                        total_trades: row.get(2)?,
                        total_volume: row.get(3)?,
                        markets_traded: serde_json::from_str::<HashSet<String>>(&markets_json)
                            .unwrap_or_default(),
                        win_rate: row.get(5)?,
                        avg_bet_size: row.get(6)?,
                        largest_bet: row.get(7)?,
                        profitable_positions: row.get(8)?,
                        total_positions: row.get(9)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Append an alert in the not-sent state, returning its row id
    pub fn save_alert(&self, alert: &Alert) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO alerts
                (alert_type, severity, wallet_address, market_title, market_slug,
                 trade_size, price, side, outcome, wallet_age_hours,
                 wallet_total_trades, wallet_win_rate, reason, timestamp, sent)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, 0)
            "#,
            params![
                alert.kind.as_str(),
                alert.severity.as_str(),
                alert.wallet_address,
                alert.market_title,
                alert.market_slug,
                alert.trade_size,
                alert.price,
                alert.side,
                alert.outcome,
                alert.wallet_age_hours,
                alert.wallet_total_trades,
                alert.wallet_win_rate,
                alert.reason,
                alert.timestamp,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Transition an alert to sent. Returns false when the alert was
    /// already sent (the transition never happens twice or backward).
    pub fn mark_alert_sent(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE alerts SET sent = 1 WHERE id = ?1 AND sent = 0",
            [id],
        )?;
        Ok(changed > 0)
    }

    pub fn alert_sent(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let sent: Option<i64> = conn
            .query_row("SELECT sent FROM alerts WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(sent == Some(1))
    }

    /// Trades on a market since `cutoff`, newest first, joined with the
    /// wallet's cached win rate
    pub fn recent_market_trades(&self, market_id: &str, cutoff: i64) -> Result<Vec<RecentTrade>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT t.wallet_address, t.side, t.usd_value, t.timestamp, w.win_rate
            FROM trades t
            LEFT JOIN wallet_stats w ON t.wallet_address = w.wallet_address
            WHERE t.market_id = ?1 AND t.timestamp > ?2
            ORDER BY t.timestamp DESC
            LIMIT 50
            "#,
        )?;
        let rows = stmt
            .query_map(params![market_id, cutoff], |row| {
                Ok(RecentTrade {
                    wallet_address: row.get(0)?,
                    side: row.get(1)?,
                    usd_value: row.get(2)?,
                    timestamp: row.get(3)?,
                    win_rate: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Wallets whose cached stats exceed the "smart money" thresholds
    pub fn top_wallets(&self, win_rate_floor: f64, trade_count_floor: u32) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT wallet_address FROM wallet_stats
            WHERE win_rate > ?1 AND total_trades > ?2
            ORDER BY win_rate DESC
            LIMIT 20
            "#,
        )?;
        let rows = stmt
            .query_map(params![win_rate_floor, trade_count_floor], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(rows)
    }

    pub fn save_price(&self, token_id: &str, price: f64, timestamp: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO market_prices (token_id, price, timestamp) VALUES (?1, ?2, ?3)",
            params![token_id, price, timestamp],
        )?;
        Ok(())
    }

    /// Price points for a token within the trailing window, oldest first
    pub fn price_history(&self, token_id: &str, hours: i64) -> Result<Vec<(f64, i64)>> {
        let cutoff = chrono::Utc::now().timestamp() - hours * 3600;
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT price, timestamp FROM market_prices
            WHERE token_id = ?1 AND timestamp > ?2
            ORDER BY timestamp ASC
            "#,
        )?;
        let rows = stmt
            .query_map(params![token_id, cutoff], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Alerts raised within the trailing window, newest first
    pub fn recent_alerts(&self, hours: i64) -> Result<Vec<StoredAlert>> {
        let cutoff = chrono::Utc::now().timestamp() - hours * 3600;
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, alert_type, severity, market_title, reason, timestamp, sent
            FROM alerts WHERE timestamp > ?1 ORDER BY timestamp DESC
            "#,
        )?;
        let rows = stmt
            .query_map([cutoff], |row| {
                let kind: String = row.get(1)?;
                let severity: String = row.get(2)?;
                Ok(StoredAlert {
                    id: row.get(0)?,
                    kind: AlertKind::parse(&kind).unwrap_or(AlertKind::SignalMatch),
                    severity: Severity::parse(&severity).unwrap_or(Severity::Low),
                    market_title: row.get(3)?,
                    reason: row.get(4)?,
                    timestamp: row.get(5)?,
                    sent: row.get::<_, i64>(6)? == 1,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Wallets with significant recorded activity since `cutoff`:
    /// (wallet, trade count, total volume) ordered by volume
    pub fn high_volume_wallets(
        &self,
        cutoff: i64,
        min_trades: u32,
    ) -> Result<Vec<(String, u32, f64)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT wallet_address, COUNT(*) AS trade_count, SUM(usd_value) AS total_volume
            FROM trades
            WHERE timestamp > ?1
            GROUP BY wallet_address
            HAVING trade_count >= ?2
            ORDER BY total_volume DESC
            LIMIT 100
            "#,
        )?;
        let rows = stmt
            .query_map(params![cutoff, min_trades], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::types::Side;

    pub fn open_temp_store() -> (tempfile::NamedTempFile, Store) {
        let temp = tempfile::NamedTempFile::new().unwrap();
        let store = Store::open(temp.path().to_str().unwrap()).unwrap();
        (temp, store)
    }

    pub fn make_trade(tx_hash: &str, wallet: &str, market_id: &str, usd_value: f64) -> TradeEvent {
        TradeEvent {
            timestamp: chrono::Utc::now().timestamp(),
            wallet_address: wallet.to_string(),
            market_id: market_id.to_string(),
            market_title: "Test market".to_string(),
            token_id: "token_1".to_string(),
            side: Side::Buy,
            size: usd_value / 0.5,
            price: 0.5,
            usd_value,
            outcome: "Yes".to_string(),
            transaction_hash: tx_hash.to_string(),
        }
    }
}
