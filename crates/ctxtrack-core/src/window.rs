//! Active response window and the tracker that owns the change ledger

use crate::config::{Config, ConfigError};
use crate::ledger::ChangeLedger;
use crate::types::{millis, FileEvent, LedgerStats};
use serde::{Deserialize, Serialize};

/// Interval during which file edits are attributed to the latest response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveWindow {
    pub start: i64,
    pub end: i64,
}

impl ActiveWindow {
    pub fn around(center: i64, radius: u64) -> Self {
        let radius = millis(radius);
        Self {
            start: center.saturating_sub(radius),
            end: center.saturating_add(radius),
        }
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        (self.start..=self.end).contains(&timestamp)
    }
}

/// Owns the change ledger plus the optional active window.
///
/// Scheduling the window's expiry is left to the caller; see
/// `ctxtrack_detect::Context`.
#[derive(Debug, Clone)]
pub struct FileChangeTracker {
    ledger: ChangeLedger,
    active_window: Option<ActiveWindow>,
}

impl FileChangeTracker {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            ledger: ChangeLedger::new(config.ignore_set()?, config.retention_ms),
            active_window: None,
        })
    }

    pub fn record(&mut self, event: FileEvent) -> bool {
        let in_window = self
            .active_window
            .is_some_and(|w| w.contains(event.timestamp));
        let path = event.path.clone();
        let kind = event.kind;

        let kept = self.ledger.record(event);
        if kept {
            tracing::debug!(path = %path, kind = %kind, in_window, "recorded change");
        }
        kept
    }

    pub fn set_active_window(&mut self, center: i64, radius: u64) -> ActiveWindow {
        let window = ActiveWindow::around(center, radius);
        tracing::debug!(start = window.start, end = window.end, "active window set");
        self.active_window = Some(window);
        window
    }

    pub fn clear_active_window(&mut self) {
        if self.active_window.take().is_some() {
            tracing::debug!("active window cleared");
        }
    }

    pub fn active_window(&self) -> Option<ActiveWindow> {
        self.active_window
    }

    /// Sorted paths changed within `radius` of `center`
    pub fn changed_files(&self, center: i64, radius: u64) -> Vec<String> {
        let files: Vec<String> = self.ledger.query(center, radius).into_iter().collect();
        tracing::debug!(center, radius, count = files.len(), "window query");
        files
    }

    pub fn purge_expired(&mut self, now: i64) -> usize {
        self.ledger.purge_expired(now)
    }

    pub fn stats(&self) -> LedgerStats {
        self.ledger.stats()
    }

    pub fn ledger(&self) -> &ChangeLedger {
        &self.ledger
    }

    /// Drop every tracked change and the active window
    pub fn clear(&mut self) {
        self.ledger.clear();
        self.active_window = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileEventKind;

    #[test]
    fn test_window_around() {
        let window = ActiveWindow::around(10_000, 5_000);
        assert_eq!(window.start, 5_000);
        assert_eq!(window.end, 15_000);
        assert!(window.contains(5_000));
        assert!(window.contains(15_000));
        assert!(!window.contains(15_001));
    }

    #[test]
    fn test_window_around_saturates() {
        let window = ActiveWindow::around(i64::MAX - 1, u64::MAX);
        assert_eq!(window.end, i64::MAX);
        assert_eq!(window.start, -1);

        let window = ActiveWindow::around(i64::MIN + 1, 10);
        assert_eq!(window.start, i64::MIN);
        assert!(window.contains(i64::MIN));
    }

    #[test]
    fn test_tracker_window_lifecycle() {
        let mut tracker = FileChangeTracker::new(&Config::new()).unwrap();
        assert!(tracker.active_window().is_none());

        tracker.set_active_window(20_000, 5_000);
        assert_eq!(
            tracker.active_window(),
            Some(ActiveWindow {
                start: 15_000,
                end: 25_000
            })
        );

        tracker.clear_active_window();
        assert!(tracker.active_window().is_none());
    }

    #[test]
    fn test_changed_files_sorted() {
        let mut tracker = FileChangeTracker::new(&Config::new()).unwrap();
        tracker.record(FileEvent::new("src/b.ts", 1_000, FileEventKind::Modify));
        tracker.record(FileEvent::new("src/a.ts", 1_200, FileEventKind::Create));

        assert_eq!(tracker.changed_files(1_000, 1_000), vec!["src/a.ts", "src/b.ts"]);
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut tracker = FileChangeTracker::new(&Config::new()).unwrap();
        tracker.record(FileEvent::new("a.ts", 1_000, FileEventKind::Modify));
        tracker.set_active_window(1_000, 5_000);

        tracker.clear();
        assert_eq!(tracker.stats().tracked_path_count, 0);
        assert!(tracker.active_window().is_none());
    }
}
