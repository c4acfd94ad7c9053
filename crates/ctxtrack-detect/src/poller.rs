//! Response poller: detects new assistant messages and correlates them with
//! recent file changes

use chrono::{DateTime, Utc};
use ctxtrack_core::{ActiveWindow, Config, FileChangeTracker, Task, TimerId, TimerQueue};
use ctxtrack_store::{ChatStore, Message, StoreError, StoreSource};
use ctxtrack_telemetry::AttributionRecord;
use serde::Serialize;

const PREVIEW_CHARS: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PollerState {
    Idle,
    /// Reading the store; `attempt` starts at 1
    Checking { attempt: u32 },
    Processing,
}

/// A new assistant message and the files edited around it
#[derive(Debug, Clone)]
pub struct Correlation {
    pub message: Message,
    /// Latest user message of the same conversation, when it could be read
    pub prompt: Option<Message>,
    pub window: ActiveWindow,
    pub files: Vec<String>,
}

impl Correlation {
    pub fn summary(&self) -> String {
        format!("AI response: {} file(s) changed", self.files.len())
    }

    pub fn to_record(&self, recorded_at: DateTime<Utc>) -> AttributionRecord {
        AttributionRecord {
            message_id: self.message.id.clone(),
            conversation_id: self.message.conversation_id.clone(),
            response_at: self.message.created_at,
            recorded_at,
            prompt_preview: self.prompt.as_ref().map(|p| p.preview(PREVIEW_CHARS)),
            response_preview: self.message.preview(PREVIEW_CHARS),
            files: self.files.clone(),
        }
    }
}

/// Result of one trigger or retry
#[derive(Debug)]
pub enum CycleOutcome {
    /// A cycle is already in flight; the trigger was dropped
    Busy,
    /// Polling is stopped; nothing was read
    Stopped,
    NoAssistantMessage,
    AlreadyProcessed,
    Correlated(Correlation),
    /// Transient store error; another attempt is scheduled
    RetryScheduled { attempt: u32, delay_ms: u64 },
    Failed(StoreError),
}

#[derive(Debug, Clone, Copy)]
struct PollerSettings {
    poll_interval_ms: u64,
    debounce_ms: u64,
    max_attempts: u32,
    retry_step_ms: u64,
    window_radius_ms: u64,
    match_radius_ms: u64,
}

impl From<&Config> for PollerSettings {
    fn from(config: &Config) -> Self {
        Self {
            poll_interval_ms: config.poll_interval_ms,
            debounce_ms: config.debounce_ms,
            max_attempts: config.max_attempts.max(1),
            retry_step_ms: config.retry_step_ms,
            window_radius_ms: config.window_radius_ms,
            match_radius_ms: config.match_radius_ms,
        }
    }
}

enum Fetch {
    Nothing,
    Seen,
    New {
        message: Message,
        prompt: Option<Message>,
    },
}

pub struct ResponsePoller {
    source: Box<dyn StoreSource>,
    settings: PollerSettings,
    state: PollerState,
    running: bool,
    last_processed: Option<String>,
    interval_timer: Option<TimerId>,
    debounce_timer: Option<TimerId>,
    retry_timer: Option<TimerId>,
}

impl ResponsePoller {
    pub fn new(source: Box<dyn StoreSource>, config: &Config) -> Self {
        Self {
            source,
            settings: PollerSettings::from(config),
            state: PollerState::Idle,
            running: false,
            last_processed: None,
            interval_timer: None,
            debounce_timer: None,
            retry_timer: None,
        }
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn retry_pending(&self) -> bool {
        self.retry_timer.is_some()
    }

    pub fn last_processed(&self) -> Option<&str> {
        self.last_processed.as_deref()
    }

    /// Seed the last processed id, e.g. from a previous run
    pub fn set_last_processed(&mut self, id: Option<String>) {
        self.last_processed = id;
    }

    pub fn window_radius_ms(&self) -> u64 {
        self.settings.window_radius_ms
    }

    /// Arm the poll interval. The caller runs the first check.
    pub fn start(&mut self, timers: &mut TimerQueue, now: i64) -> bool {
        if self.running {
            return false;
        }
        tracing::info!(
            interval_ms = self.settings.poll_interval_ms,
            store = %self.source.describe(),
            "polling started"
        );
        self.running = true;
        self.interval_timer =
            Some(timers.schedule_repeating(now, self.settings.poll_interval_ms, Task::Poll));
        true
    }

    /// Cancel the poll interval and any pending debounce. An in-flight check
    /// keeps its retry timer and finishes as a no-op.
    pub fn stop(&mut self, timers: &mut TimerQueue) {
        if !self.running {
            return;
        }
        tracing::info!("polling stopped");
        self.running = false;
        for id in [self.interval_timer.take(), self.debounce_timer.take()]
            .into_iter()
            .flatten()
        {
            timers.cancel(id);
        }
    }

    pub fn reset(&mut self) {
        tracing::info!("resetting last processed message id");
        self.last_processed = None;
    }

    /// The store file changed; check again once writes settle
    pub fn store_changed(&mut self, timers: &mut TimerQueue, now: i64) {
        if !self.running {
            return;
        }
        if let Some(id) = self.debounce_timer.take() {
            timers.cancel(id);
        }
        self.debounce_timer =
            Some(timers.schedule_once(now, self.settings.debounce_ms, Task::DebouncedCheck));
    }

    pub fn debounce_fired(&mut self) {
        self.debounce_timer = None;
    }

    /// Start a cycle if none is in flight
    pub fn trigger(
        &mut self,
        tracker: &FileChangeTracker,
        timers: &mut TimerQueue,
        now: i64,
    ) -> CycleOutcome {
        if !self.running {
            return CycleOutcome::Stopped;
        }
        if self.state != PollerState::Idle {
            tracing::debug!(state = ?self.state, "check already in flight, skipping");
            return CycleOutcome::Busy;
        }
        self.attempt(1, tracker, timers, now)
    }

    /// Continue a cycle after its backoff elapsed
    pub fn resume(
        &mut self,
        tracker: &FileChangeTracker,
        timers: &mut TimerQueue,
        now: i64,
    ) -> CycleOutcome {
        self.retry_timer = None;
        let PollerState::Checking { attempt } = self.state else {
            return CycleOutcome::Busy;
        };
        if !self.running {
            self.state = PollerState::Idle;
            return CycleOutcome::Stopped;
        }
        self.attempt(attempt, tracker, timers, now)
    }

    fn attempt(
        &mut self,
        attempt: u32,
        tracker: &FileChangeTracker,
        timers: &mut TimerQueue,
        now: i64,
    ) -> CycleOutcome {
        self.state = PollerState::Checking { attempt };

        match self.fetch() {
            Ok(Fetch::Nothing) => {
                tracing::debug!("no assistant messages found");
                self.state = PollerState::Idle;
                CycleOutcome::NoAssistantMessage
            }
            Ok(Fetch::Seen) => {
                self.state = PollerState::Idle;
                CycleOutcome::AlreadyProcessed
            }
            Ok(Fetch::New { message, prompt }) => {
                self.state = PollerState::Processing;
                let correlation = self.correlate(message, prompt, tracker);
                self.last_processed = Some(correlation.message.id.clone());
                self.state = PollerState::Idle;
                CycleOutcome::Correlated(correlation)
            }
            Err(e) if e.is_transient() && attempt < self.settings.max_attempts => {
                let delay_ms = u64::from(attempt) * self.settings.retry_step_ms;
                tracing::warn!(
                    attempt,
                    max_attempts = self.settings.max_attempts,
                    delay_ms,
                    "chat store unavailable, retrying: {e}"
                );
                self.state = PollerState::Checking {
                    attempt: attempt + 1,
                };
                self.retry_timer = Some(timers.schedule_once(now, delay_ms, Task::RetryCheck));
                CycleOutcome::RetryScheduled { attempt, delay_ms }
            }
            Err(e) => {
                tracing::error!(attempt, "checking for new responses failed: {e}");
                self.state = PollerState::Idle;
                CycleOutcome::Failed(e)
            }
        }
    }

    /// Open the store, read what is needed, and release it on every path
    fn fetch(&self) -> Result<Fetch, StoreError> {
        let store = self.source.open()?;
        let Some(message) = store.latest_assistant_message()? else {
            return Ok(Fetch::Nothing);
        };
        if self.last_processed.as_deref() == Some(message.id.as_str()) {
            return Ok(Fetch::Seen);
        }

        tracing::info!(
            message_id = %message.id,
            previous = ?self.last_processed,
            "new assistant response detected"
        );
        let prompt = latest_prompt(store.as_ref(), &message.conversation_id);
        Ok(Fetch::New { message, prompt })
    }

    fn correlate(
        &self,
        message: Message,
        prompt: Option<Message>,
        tracker: &FileChangeTracker,
    ) -> Correlation {
        let window = ActiveWindow::around(message.created_at, self.settings.window_radius_ms);
        let files = tracker.changed_files(message.created_at, self.settings.match_radius_ms);

        tracing::info!(
            message_id = %message.id,
            response_at = message.created_at,
            preview = %message.preview(PREVIEW_CHARS),
            files = files.len(),
            "correlated response with file changes"
        );
        Correlation {
            message,
            prompt,
            window,
            files,
        }
    }
}

/// Best effort: a prompt that cannot be read does not fail the cycle
fn latest_prompt(store: &dyn ChatStore, conversation_id: &str) -> Option<Message> {
    match store.latest_user_message(conversation_id) {
        Ok(prompt) => prompt,
        Err(e) => {
            tracing::warn!(conversation_id, "failed to read user prompt: {e}");
            None
        }
    }
}
