//! Crate-wide error type

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("unexpected payload: {0}")]
    Payload(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("alert {0} already delivered")]
    AlreadyDelivered(i64),
}

pub type Result<T> = std::result::Result<T, ScanError>;
