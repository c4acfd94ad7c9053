//! Process-wide context wiring the tracker, the poller and their timers

use crate::notifier::{Notifier, NotifierRegistry};
use crate::poller::{CycleOutcome, PollerState, ResponsePoller};
use ctxtrack_core::{
    ActiveWindow, Config, ConfigError, FileChangeTracker, FileEvent, LedgerStats, Task, TimerId,
    TimerQueue,
};
use ctxtrack_store::StoreSource;
use serde::Serialize;

/// Snapshot for status output
#[derive(Debug, Clone, Serialize)]
pub struct ContextStatus {
    pub polling: bool,
    pub poller: PollerState,
    pub retry_pending: bool,
    pub last_processed_message_id: Option<String>,
    pub ledger: LedgerStats,
    pub active_window: Option<ActiveWindow>,
    pub pending_timers: usize,
}

/// Owns every component. Built once at startup and torn down with
/// [`Context::shutdown`]. All methods take the current time in epoch
/// milliseconds so the whole thing runs on a simulated clock in tests.
pub struct Context {
    config: Config,
    timers: TimerQueue,
    tracker: FileChangeTracker,
    poller: ResponsePoller,
    notifiers: NotifierRegistry,
    purge_timer: Option<TimerId>,
    window_timer: Option<TimerId>,
}

impl Context {
    pub fn new(config: Config, source: Box<dyn StoreSource>) -> Result<Self, ConfigError> {
        let tracker = FileChangeTracker::new(&config)?;
        let poller = ResponsePoller::new(source, &config);
        Ok(Self {
            config,
            timers: TimerQueue::new(),
            tracker,
            poller,
            notifiers: NotifierRegistry::new(),
            purge_timer: None,
            window_timer: None,
        })
    }

    pub fn register_notifier(&mut self, notifier: Box<dyn Notifier>) {
        self.notifiers.register(notifier);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tracker(&self) -> &FileChangeTracker {
        &self.tracker
    }

    pub fn poller(&self) -> &ResponsePoller {
        &self.poller
    }

    pub fn poller_mut(&mut self) -> &mut ResponsePoller {
        &mut self.poller
    }

    /// Arm the purge timer
    pub fn start_tracking(&mut self, now: i64) {
        if self.purge_timer.is_some() {
            return;
        }
        tracing::info!(
            retention_ms = self.config.retention_ms,
            purge_interval_ms = self.config.purge_interval_ms,
            "change tracking started"
        );
        self.purge_timer =
            Some(self.timers.schedule_repeating(now, self.config.purge_interval_ms, Task::Purge));
    }

    /// Arm the poll interval and run the first check immediately
    pub fn start_polling(&mut self, now: i64) -> CycleOutcome {
        if !self.poller.start(&mut self.timers, now) {
            return CycleOutcome::Busy;
        }
        self.check_now(now)
    }

    pub fn start(&mut self, now: i64) -> CycleOutcome {
        self.start_tracking(now);
        self.start_polling(now)
    }

    pub fn stop_polling(&mut self) {
        self.poller.stop(&mut self.timers);
    }

    pub fn reset(&mut self) {
        self.poller.reset();
    }

    /// Stop everything, drop pending timers and tracked changes
    pub fn shutdown(&mut self) {
        self.poller.stop(&mut self.timers);
        self.timers.cancel_all();
        self.purge_timer = None;
        self.window_timer = None;
        self.tracker.clear();
        tracing::info!("context shut down");
    }

    pub fn record(&mut self, event: FileEvent) -> bool {
        self.tracker.record(event)
    }

    /// External hint that the chat store was written
    pub fn store_changed(&mut self, now: i64) {
        self.poller.store_changed(&mut self.timers, now);
    }

    /// Run a check now unless one is already in flight
    pub fn check_now(&mut self, now: i64) -> CycleOutcome {
        let outcome = self.poller.trigger(&self.tracker, &mut self.timers, now);
        self.apply(&outcome, now);
        outcome
    }

    pub fn next_deadline(&self) -> Option<i64> {
        self.timers.next_deadline()
    }

    /// Run every task due at or before `now`. Tasks run at the current
    /// time, so anything they schedule is relative to `now` even after a
    /// late wakeup. Returns how many ran.
    pub fn run_due(&mut self, now: i64) -> usize {
        let mut ran = 0;
        while let Some((deadline, id, task)) = self.timers.pop_due(now) {
            tracing::trace!(?task, deadline, late_ms = now.saturating_sub(deadline), "timer fired");
            self.dispatch(task, id, now);
            ran += 1;
        }
        ran
    }

    fn dispatch(&mut self, task: Task, id: TimerId, now: i64) {
        match task {
            Task::Poll => {
                self.check_now(now);
            }
            Task::DebouncedCheck => {
                self.poller.debounce_fired();
                tracing::debug!("chat store changed, checking for new responses");
                self.check_now(now);
            }
            Task::RetryCheck => {
                let outcome = self.poller.resume(&self.tracker, &mut self.timers, now);
                self.apply(&outcome, now);
            }
            Task::Purge => {
                self.tracker.purge_expired(now);
            }
            Task::ClearActiveWindow => {
                if self.window_timer == Some(id) {
                    self.window_timer = None;
                    self.tracker.clear_active_window();
                }
            }
        }
    }

    fn apply(&mut self, outcome: &CycleOutcome, now: i64) {
        let CycleOutcome::Correlated(correlation) = outcome else {
            return;
        };

        let radius = self.poller.window_radius_ms();
        self.tracker
            .set_active_window(correlation.message.created_at, radius);
        if let Some(previous) = self.window_timer.take() {
            self.timers.cancel(previous);
        }
        self.window_timer = Some(self.timers.schedule_once(
            now,
            radius.saturating_mul(2),
            Task::ClearActiveWindow,
        ));

        let stats = self.tracker.stats();
        tracing::info!(
            tracked_paths = stats.tracked_path_count,
            total_events = stats.total_event_count,
            "ledger stats"
        );
        self.notifiers.notify_all(correlation);
    }

    pub fn status(&self) -> ContextStatus {
        ContextStatus {
            polling: self.poller.is_running(),
            poller: self.poller.state(),
            retry_pending: self.poller.retry_pending(),
            last_processed_message_id: self.poller.last_processed().map(str::to_string),
            ledger: self.tracker.stats(),
            active_window: self.tracker.active_window(),
            pending_timers: self.timers.len(),
        }
    }
}
