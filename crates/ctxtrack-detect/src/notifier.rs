//! Notification sinks for correlated responses

use crate::poller::Correlation;
use chrono::Utc;
use ctxtrack_telemetry::append_jsonl;
use std::path::PathBuf;

/// Receives every correlation the poller produces
pub trait Notifier {
    /// Name used in logs
    fn name(&self) -> &str;

    fn notify(&mut self, correlation: &Correlation) -> anyhow::Result<()>;
}

/// Fans a correlation out to every registered notifier
#[derive(Default)]
pub struct NotifierRegistry {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl NotifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, notifier: Box<dyn Notifier>) {
        self.notifiers.push(notifier);
    }

    /// Returns how many notifiers accepted the correlation. Failures are
    /// logged and do not stop the others.
    pub fn notify_all(&mut self, correlation: &Correlation) -> usize {
        let mut delivered = 0;
        for notifier in &mut self.notifiers {
            match notifier.notify(correlation) {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!(notifier = notifier.name(), "notification failed: {e:#}"),
            }
        }
        delivered
    }

    pub fn names(&self) -> Vec<&str> {
        self.notifiers.iter().map(|n| n.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

/// Logs the human-readable summary
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    fn notify(&mut self, correlation: &Correlation) -> anyhow::Result<()> {
        tracing::info!(message_id = %correlation.message.id, "{}", correlation.summary());
        for file in &correlation.files {
            tracing::info!(path = %file, "attributed change");
        }
        Ok(())
    }
}

/// Appends an attribution record per correlation to a JSONL file
pub struct AttributionLog {
    path: PathBuf,
}

impl AttributionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Notifier for AttributionLog {
    fn name(&self) -> &str {
        "attribution-log"
    }

    fn notify(&mut self, correlation: &Correlation) -> anyhow::Result<()> {
        append_jsonl(&self.path, &correlation.to_record(Utc::now()))?;
        Ok(())
    }
}
