use super::load_config;
use ctxtrack_store::{ChatStore, CursorDb};
use ctxtrack_telemetry::{read_jsonl, AttributionRecord, Paths, WatchState};
use serde_json::{json, Value};
use std::path::Path;

pub fn run() -> anyhow::Result<()> {
    let paths = Paths::new()?;
    println!("{}", collect(&paths));
    Ok(())
}

fn collect(paths: &Paths) -> Value {
    let config = load_config(&paths.config_file());
    let store = paths.state_db_path();

    let watch_state: Option<WatchState> = std::fs::read_to_string(paths.watch_state_file())
        .ok()
        .and_then(|c| serde_json::from_str(&c).ok());
    let attributions = read_jsonl::<AttributionRecord>(&paths.attributions_file())
        .map(|r| r.records.len())
        .unwrap_or(0);

    json!({
        "data_dir": paths.data_dir.display().to_string(),
        "config": config,
        "store": store.as_deref().map(store_summary),
        "last_processed_message_id": watch_state.and_then(|s| s.last_processed_message_id),
        "attributions": attributions,
    })
}

fn store_summary(path: &Path) -> Value {
    let mut out = json!({
        "path": path.display().to_string(),
        "exists": path.exists(),
    });
    if !path.exists() {
        return out;
    }
    match CursorDb::open(path).and_then(|db| db.list_conversations()) {
        Ok(conversations) => out["conversations"] = json!(conversations.len()),
        Err(e) => out["error"] = json!(e.to_string()),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_empty_data_dir() {
        let temp = TempDir::new().unwrap();
        let paths = Paths::with_dirs(temp.path().join(".ctxtrack"), Some(temp.path().to_path_buf()));

        let status = collect(&paths);
        assert_eq!(status["attributions"], 0);
        assert_eq!(status["store"]["exists"], false);
        assert!(status["last_processed_message_id"].is_null());
        assert_eq!(status["config"]["retention_ms"], 30_000);
    }

    #[test]
    fn test_collect_reads_watch_state() {
        let temp = TempDir::new().unwrap();
        let paths = Paths::with_dirs(temp.path(), None);
        std::fs::write(
            paths.watch_state_file(),
            r#"{"last_processed_message_id": "m7"}"#,
        )
        .unwrap();

        let status = collect(&paths);
        assert_eq!(status["last_processed_message_id"], "m7");
        assert!(status["store"].is_null());
    }

    #[test]
    fn test_store_summary_reports_errors() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.vscdb");
        std::fs::write(&path, vec![0x5au8; 8192]).unwrap();

        let summary = store_summary(&path);
        assert_eq!(summary["exists"], true);
        assert!(summary["error"].is_string());
    }
}
