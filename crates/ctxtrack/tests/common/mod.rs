#![allow(dead_code)]

use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

/// Scratch `state.vscdb` with an empty `cursorDiskKV` table
pub fn create_store(dir: &Path) -> PathBuf {
    let path = dir.join("state.vscdb");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE cursorDiskKV (key TEXT UNIQUE ON CONFLICT REPLACE, value BLOB)",
    )
    .unwrap();
    path
}

pub fn put(path: &Path, key: &str, value: &serde_json::Value) {
    let conn = Connection::open(path).unwrap();
    conn.execute(
        "INSERT INTO cursorDiskKV (key, value) VALUES (?1, ?2)",
        params![key, value.to_string()],
    )
    .unwrap();
}

pub fn add_conversation(path: &Path, id: &str) {
    put(
        path,
        &format!("composerData:{id}"),
        &serde_json::json!({ "composerId": id }),
    );
}

/// `role` uses the store's codes: 1 user, 2 assistant
pub fn add_message(path: &Path, conversation: &str, id: &str, role: i64, text: &str, at: i64) {
    put(
        path,
        &format!("bubbleId:{conversation}:{id}"),
        &serde_json::json!({ "type": role, "text": text, "createdAt": at }),
    );
}
