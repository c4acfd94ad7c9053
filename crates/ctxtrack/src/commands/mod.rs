pub mod conversations;
pub mod history;
pub mod latest;
pub mod status;
pub mod version;
pub mod watch;

use anyhow::Context as _;
use ctxtrack_core::Config;
use ctxtrack_telemetry::Paths;
use std::path::{Path, PathBuf};

/// Load `config.json`, falling back to defaults when missing or unreadable
pub fn load_config(path: &Path) -> Config {
    if !path.exists() {
        return Config::new();
    }

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(path = %path.display(), "failed to read config: {e}");
            return Config::new();
        }
    };

    match serde_json::from_str::<Config>(&content) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = %path.display(), "invalid config, using defaults: {e}");
            Config::new()
        }
    }
}

/// Chat store location from `--db` or the platform default
pub fn resolve_store(paths: &Paths, explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    paths
        .resolve_state_db(explicit)
        .context("could not determine the chat store location; pass --db")
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Epoch milliseconds as local time, for display
pub fn format_ms(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| {
            dt.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| ms.to_string())
}
