//! Change ledger, response windows and timer scheduling

mod config;
mod ledger;
mod timers;
mod types;
mod window;

pub use config::{Config, ConfigError, IgnoreSet, DEFAULT_IGNORE_PATTERNS};
pub use ledger::ChangeLedger;
pub use timers::{Task, TimerId, TimerQueue};
pub use types::{normalize_path, FileEvent, FileEventKind, LedgerStats};
pub use window::{ActiveWindow, FileChangeTracker};
