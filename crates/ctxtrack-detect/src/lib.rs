//! Detects new assistant responses and attributes nearby file changes

mod context;
mod notifier;
mod poller;

#[cfg(test)]
mod fake;

pub use context::{Context, ContextStatus};
pub use notifier::{AttributionLog, LogNotifier, Notifier, NotifierRegistry};
pub use poller::{Correlation, CycleOutcome, PollerState, ResponsePoller};
