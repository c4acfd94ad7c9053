//! Path resolution for the chat store and ctxtrack's own files

use std::path::{Path, PathBuf};

/// Location of the editor state database relative to the platform config dir
const STATE_DB_RELATIVE: [&str; 4] = ["Cursor", "User", "globalStorage", "state.vscdb"];

/// Resolves standard paths
#[derive(Debug, Clone)]
pub struct Paths {
    /// `~/.ctxtrack`
    pub data_dir: PathBuf,
    /// Platform config dir (`%APPDATA%`, `~/Library/Application Support`, `~/.config`)
    pub app_config_dir: Option<PathBuf>,
}

impl Paths {
    pub fn new() -> std::io::Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "home directory not found")
        })?;

        Ok(Self {
            data_dir: home.join(".ctxtrack"),
            app_config_dir: dirs::config_dir(),
        })
    }

    /// Paths rooted somewhere other than HOME
    pub fn with_dirs(data_dir: impl Into<PathBuf>, app_config_dir: Option<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            app_config_dir,
        }
    }

    /// Default editor state database, if the platform has a config dir
    pub fn state_db_path(&self) -> Option<PathBuf> {
        self.app_config_dir
            .as_deref()
            .map(|dir| STATE_DB_RELATIVE.iter().fold(dir.to_path_buf(), |p, c| p.join(c)))
    }

    /// `--db` override wins over the platform default
    pub fn resolve_state_db(&self, explicit: Option<&Path>) -> Option<PathBuf> {
        explicit.map(Path::to_path_buf).or_else(|| self.state_db_path())
    }

    pub fn config_file(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }

    pub fn attributions_file(&self) -> PathBuf {
        self.data_dir.join("attributions.jsonl")
    }

    pub fn watch_state_file(&self) -> PathBuf {
        self.data_dir.join("watch_state.json")
    }
}
