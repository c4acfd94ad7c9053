//! Change ledger: recent filesystem events per path with age-based eviction

use crate::config::IgnoreSet;
use crate::types::{millis, normalize_path, FileEvent, LedgerStats};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone)]
pub struct ChangeLedger {
    entries: HashMap<String, Vec<FileEvent>>,
    ignore: IgnoreSet,
    retention_ms: i64,
}

impl ChangeLedger {
    pub fn new(ignore: IgnoreSet, retention_ms: u64) -> Self {
        Self {
            entries: HashMap::new(),
            ignore,
            retention_ms: millis(retention_ms),
        }
    }

    /// Record an event. Returns false when the path is ignored.
    pub fn record(&mut self, event: FileEvent) -> bool {
        let key = normalize_path(&event.path);
        if self.ignore.is_ignored(&key) {
            tracing::trace!(path = %key, "ignored change");
            return false;
        }

        let event = FileEvent {
            path: key.clone(),
            ..event
        };
        self.entries.entry(key).or_default().push(event);
        true
    }

    /// Drop events older than the retention horizon. Returns how many paths
    /// were removed entirely.
    pub fn purge_expired(&mut self, now: i64) -> usize {
        let cutoff = now.saturating_sub(self.retention_ms);
        let before = self.entries.len();

        self.entries.retain(|_, events| {
            events.retain(|e| e.timestamp >= cutoff);
            !events.is_empty()
        });

        let removed = before - self.entries.len();
        if removed > 0 {
            tracing::debug!(removed, "purged expired change entries");
        }
        removed
    }

    /// Paths with at least one event in `[center - radius, center + radius]`
    pub fn query(&self, center: i64, radius: u64) -> BTreeSet<String> {
        let radius = millis(radius);
        let start = center.saturating_sub(radius);
        let end = center.saturating_add(radius);

        self.entries
            .iter()
            .filter_map(|(path, events)| {
                let hit = events
                    .iter()
                    .find(|e| e.timestamp >= start && e.timestamp <= end)?;
                tracing::debug!(path = %path, timestamp = hit.timestamp, kind = %hit.kind, "window match");
                Some(path.clone())
            })
            .collect()
    }

    pub fn stats(&self) -> LedgerStats {
        LedgerStats {
            tracked_path_count: self.entries.len(),
            total_event_count: self.entries.values().map(Vec::len).sum(),
            oldest_event_timestamp: self.entries.values().flatten().map(|e| e.timestamp).min(),
        }
    }

    pub fn recent_changes(&self) -> &HashMap<String, Vec<FileEvent>> {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
