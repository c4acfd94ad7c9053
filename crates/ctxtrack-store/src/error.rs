//! Store and row-level error types

use rusqlite::ErrorCode;
use std::path::PathBuf;
use thiserror::Error;

/// Failure opening or querying the chat store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("chat store not found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("chat store is corrupt or not a database: {0}")]
    Corrupt(#[source] rusqlite::Error),

    #[error("chat store is busy or locked: {0}")]
    Busy(#[source] rusqlite::Error),

    #[error("chat store query failed: {0}")]
    Sqlite(#[source] rusqlite::Error),
}

impl StoreError {
    /// Corrupt and locked databases are usually the owning application in
    /// the middle of a write; they are worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Corrupt(_) | StoreError::Busy(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase) => StoreError::Corrupt(err),
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => StoreError::Busy(err),
            _ => StoreError::Sqlite(err),
        }
    }
}

/// Failure decoding a single key/value row
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unexpected key format: {0}")]
    InvalidKey(String),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
