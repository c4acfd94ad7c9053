//! Configuration for change tracking and response polling

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Paths matching any of these are never recorded
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    r"node_modules",
    r"\.git",
    r"\.vscode",
    r"dist",
    r"out",
    r"build",
    r"\.next",
    r"coverage",
    r"\.DS_Store",
    r"\.env",
    r"package-lock\.json",
    r"yarn\.lock",
    r"\.lock$",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid ignore pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Compiled ignore pattern set
#[derive(Debug, Clone)]
pub struct IgnoreSet {
    patterns: Vec<Regex>,
}

impl IgnoreSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ConfigError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p.as_ref()).map_err(|source| ConfigError::InvalidPattern {
                    pattern: p.as_ref().to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// `path` must already be normalized
    pub fn is_ignored(&self, path: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(path))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Tracker and poller configuration. All durations are in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How long recorded changes are kept
    pub retention_ms: u64,

    /// How often expired changes are purged
    pub purge_interval_ms: u64,

    /// How often the chat store is polled
    pub poll_interval_ms: u64,

    /// Delay applied to store-changed hints
    pub debounce_ms: u64,

    /// Radius of the active window set for each response
    pub window_radius_ms: u64,

    /// Radius used when matching changed files against a response
    pub match_radius_ms: u64,

    /// Total attempts for a check when the store is corrupt or locked
    pub max_attempts: u32,

    /// Backoff step; attempt N waits N * step
    pub retry_step_ms: u64,

    /// Regular expressions for paths that are never recorded
    pub ignore_patterns: Vec<String>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            retention_ms: 30_000,
            purge_interval_ms: 5_000,
            poll_interval_ms: 5_000,
            debounce_ms: 500,
            window_radius_ms: 10_000,
            match_radius_ms: 10_000,
            max_attempts: 3,
            retry_step_ms: 200,
            ignore_patterns: DEFAULT_IGNORE_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }

    pub fn ignore_set(&self) -> Result<IgnoreSet, ConfigError> {
        IgnoreSet::new(&self.ignore_patterns)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::new();
        assert_eq!(config.retention_ms, 30_000);
        assert_eq!(config.purge_interval_ms, 5_000);
        assert_eq!(config.debounce_ms, 500);
        assert_eq!(config.window_radius_ms, 10_000);
        assert_eq!(config.match_radius_ms, 10_000);
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn test_partial_config_file() {
        let config: Config = serde_json::from_str(r#"{"poll_interval_ms": 1000}"#).unwrap();
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.retention_ms, 30_000);
        assert_eq!(config.ignore_patterns.len(), DEFAULT_IGNORE_PATTERNS.len());
    }

    #[test]
    fn test_default_ignore_set() {
        let ignore = Config::new().ignore_set().unwrap();
        assert!(ignore.is_ignored("/work/node_modules/foo.js"));
        assert!(ignore.is_ignored("/work/.git/HEAD"));
        assert!(ignore.is_ignored("/work/Cargo.lock"));
        assert!(ignore.is_ignored("/work/package-lock.json"));
        assert!(!ignore.is_ignored("/work/src/main.ts"));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let err = IgnoreSet::new(&["valid", "(unclosed"]).unwrap_err();
        assert!(err.to_string().contains("(unclosed"));
    }
}
