//! Core types for change tracking

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of filesystem change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileEventKind {
    Create,
    Modify,
    Delete,
}

impl fmt::Display for FileEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileEventKind::Create => "create",
            FileEventKind::Modify => "modify",
            FileEventKind::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// A single observed filesystem change (timestamp in epoch milliseconds)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEvent {
    pub path: String,
    pub timestamp: i64,
    pub kind: FileEventKind,
}

impl FileEvent {
    pub fn new(path: impl Into<String>, timestamp: i64, kind: FileEventKind) -> Self {
        Self {
            path: path.into(),
            timestamp,
            kind,
        }
    }
}

/// Snapshot of ledger size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LedgerStats {
    pub tracked_path_count: usize,
    pub total_event_count: usize,
    pub oldest_event_timestamp: Option<i64>,
}

/// Replace Windows separators so the same file always maps to one key
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Millisecond duration as a signed offset, clamped to `i64::MAX`
pub(crate) fn millis(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}
