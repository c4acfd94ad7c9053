//! Timer queue driven by an external clock.
//!
//! Nothing here sleeps: the owner asks for the next deadline, waits however it
//! likes (a tokio sleep, or a simulated clock in tests) and then pops the due
//! tasks. Timestamps are epoch milliseconds.

use crate::types::millis;
use serde::{Deserialize, Serialize};

/// Work items the context knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Task {
    /// Regular poll of the chat store
    Poll,
    /// Store-changed hint after the debounce delay
    DebouncedCheck,
    /// Next attempt of a check that hit a transient store error
    RetryCheck,
    /// Evict expired ledger entries
    Purge,
    /// Expire the active window
    ClearActiveWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug, Clone)]
struct Timer {
    id: TimerId,
    deadline: i64,
    interval: Option<i64>,
    task: Task,
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    next_id: u64,
    timers: Vec<Timer>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` once, `delay_ms` after `now`
    pub fn schedule_once(&mut self, now: i64, delay_ms: u64, task: Task) -> TimerId {
        self.push(now.saturating_add(millis(delay_ms)), None, task)
    }

    /// Run `task` every `interval_ms`, first firing one interval after `now`
    pub fn schedule_repeating(&mut self, now: i64, interval_ms: u64, task: Task) -> TimerId {
        let interval = millis(interval_ms).max(1);
        self.push(now.saturating_add(interval), Some(interval), task)
    }

    fn push(&mut self, deadline: i64, interval: Option<i64>, task: Task) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.timers.push(Timer {
            id,
            deadline,
            interval,
            task,
        });
        id
    }

    /// Returns false if the timer already fired or was cancelled
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.id != id);
        self.timers.len() != before
    }

    pub fn cancel_all(&mut self) {
        self.timers.clear();
    }

    pub fn is_scheduled(&self, id: TimerId) -> bool {
        self.timers.iter().any(|t| t.id == id)
    }

    pub fn next_deadline(&self) -> Option<i64> {
        self.timers.iter().map(|t| t.deadline).min()
    }

    /// Pop the earliest task due at or before `now`, with the deadline it was
    /// due at. Repeating timers are re-armed at their next tick after `now`;
    /// ticks missed while the owner was not polling are skipped, not replayed.
    pub fn pop_due(&mut self, now: i64) -> Option<(i64, TimerId, Task)> {
        let idx = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.deadline <= now)
            .min_by_key(|(_, t)| (t.deadline, t.id))
            .map(|(i, _)| i)?;

        let timer = &self.timers[idx];
        let fired = (timer.deadline, timer.id, timer.task);
        match timer.interval {
            Some(interval) => {
                let missed = now.saturating_sub(fired.0) / interval;
                self.timers[idx].deadline =
                    fired.0.saturating_add(interval.saturating_mul(missed + 1));
            }
            None => {
                self.timers.swap_remove(idx);
            }
        }
        Some(fired)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}
