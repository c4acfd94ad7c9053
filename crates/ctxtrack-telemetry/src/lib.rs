//! Paths, attribution records and JSONL persistence

mod io;
mod paths;
mod types;

pub use io::{append_jsonl, atomic_write, read_jsonl, JsonlRecords};
pub use paths::Paths;
pub use types::{AttributionRecord, WatchState};
