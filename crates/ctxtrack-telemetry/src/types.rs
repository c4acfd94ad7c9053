//! Persisted record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One assistant response and the files edited around it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributionRecord {
    pub message_id: String,
    pub conversation_id: String,
    /// When the assistant responded, epoch milliseconds
    pub response_at: i64,
    pub recorded_at: DateTime<Utc>,
    #[serde(default)]
    pub prompt_preview: Option<String>,
    #[serde(default)]
    pub response_preview: String,
    #[serde(default)]
    pub files: Vec<String>,
}

/// Poller state carried across `watch` restarts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchState {
    #[serde(default)]
    pub last_processed_message_id: Option<String>,
}
