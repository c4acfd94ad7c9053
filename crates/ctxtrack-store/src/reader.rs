//! Read-only access to the editor's key/value state database

use crate::error::{DecodeError, StoreError};
use crate::types::{
    decode_conversation, decode_message, Conversation, Message, Role, CONVERSATION_PREFIX,
    MESSAGE_PREFIX,
};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_millis(100);

/// Read contract of a chat history store
pub trait ChatStore {
    fn list_conversations(&self) -> Result<Vec<Conversation>, StoreError>;

    fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, StoreError>;

    /// Newest assistant message across every conversation. Scans all
    /// conversations; ties keep the first message seen.
    fn latest_assistant_message(&self) -> Result<Option<Message>, StoreError> {
        let conversations = self.list_conversations()?;
        let mut latest: Option<Message> = None;
        let mut with_replies = 0usize;

        for conversation in &conversations {
            let mut replies = self
                .list_messages(&conversation.id)?
                .into_iter()
                .filter(Message::is_assistant)
                .peekable();
            if replies.peek().is_some() {
                with_replies += 1;
            }
            for msg in replies {
                if latest.as_ref().map_or(true, |l| msg.created_at > l.created_at) {
                    latest = Some(msg);
                }
            }
        }

        tracing::debug!(
            conversations = conversations.len(),
            with_replies,
            "scanned conversations for assistant replies"
        );
        Ok(latest)
    }

    /// Newest user message in one conversation
    fn latest_user_message(&self, conversation_id: &str) -> Result<Option<Message>, StoreError> {
        Ok(self
            .list_messages(conversation_id)?
            .into_iter()
            .filter(|m| m.role == Role::User)
            .max_by_key(|m| m.created_at))
    }
}

/// Opens a fresh store handle per polling cycle
pub trait StoreSource {
    fn open(&self) -> Result<Box<dyn ChatStore>, StoreError>;

    /// Human-readable location, for logs
    fn describe(&self) -> String;
}

/// `state.vscdb` reader over the `cursorDiskKV` table
pub struct CursorDb {
    conn: Connection,
    path: PathBuf,
}

impl CursorDb {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Err(StoreError::NotFound(path.to_path_buf()));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        tracing::debug!(path = %path.display(), "chat store opened");

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn close(self) -> Result<(), StoreError> {
        let path = self.path;
        self.conn.close().map_err(|(_, e)| StoreError::from(e))?;
        tracing::debug!(path = %path.display(), "chat store closed");
        Ok(())
    }

    /// Every row whose key starts with `prefix`, decoded with `decode`.
    /// Rows that fail to decode are logged and skipped.
    fn scan<T>(
        &self,
        prefix: &str,
        decode: impl Fn(&str, &str) -> Result<T, DecodeError>,
    ) -> Result<Vec<T>, StoreError> {
        let pattern = format!("{}%", escape_like(prefix));
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM cursorDiskKV WHERE key LIKE ?1 ESCAPE '\\'")?;
        let rows = stmt.query_map(params![pattern], |row| {
            let key: String = row.get(0)?;
            let value = match row.get_ref(1)? {
                ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                    std::str::from_utf8(bytes).ok().map(str::to_string)
                }
                _ => None,
            };
            Ok((key, value))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (key, value) = row?;
            let Some(value) = value else {
                tracing::debug!(key = %key, "skipping non-text value");
                continue;
            };
            match decode(&key, &value) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(key = %key, "skipping malformed row: {e}"),
            }
        }
        Ok(records)
    }
}

impl ChatStore for CursorDb {
    fn list_conversations(&self) -> Result<Vec<Conversation>, StoreError> {
        let conversations = self.scan(CONVERSATION_PREFIX, decode_conversation)?;
        tracing::debug!(count = conversations.len(), "listed conversations");
        Ok(conversations)
    }

    fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, StoreError> {
        let prefix = format!("{MESSAGE_PREFIX}{conversation_id}:");
        self.scan(&prefix, decode_message)
    }
}

/// Opens [`CursorDb`] at a fixed path
#[derive(Debug, Clone)]
pub struct CursorDbSource {
    path: PathBuf,
}

impl CursorDbSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StoreSource for CursorDbSource {
    fn open(&self) -> Result<Box<dyn ChatStore>, StoreError> {
        Ok(Box::new(CursorDb::open(&self.path)?))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Escape LIKE wildcards so ids are matched literally
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_store(dir: &TempDir, rows: &[(&str, &str)]) -> PathBuf {
        let path = dir.path().join("state.vscdb");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE cursorDiskKV (key TEXT UNIQUE ON CONFLICT REPLACE, value BLOB)")
            .unwrap();
        for (key, value) in rows {
            conn.execute(
                "INSERT INTO cursorDiskKV (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .unwrap();
        }
        path
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("bubbleId:a_b%c:"), "bubbleId:a\\_b\\%c:");
    }

    #[test]
    fn test_missing_store_not_found() {
        let dir = TempDir::new().unwrap();
        let err = CursorDb::open(&dir.path().join("missing.vscdb")).err().unwrap();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_list_conversations_and_messages() {
        let dir = TempDir::new().unwrap();
        let path = create_store(
            &dir,
            &[
                ("composerData:c1", r#"{"createdAt": 100}"#),
                ("composerData:c2", r#"{"conversationId": "other"}"#),
                ("bubbleId:c1:m1", r#"{"type": 1, "text": "fix it", "createdAt": 1000}"#),
                ("bubbleId:c1:m2", r#"{"type": 2, "text": "done", "createdAt": 2000}"#),
                ("bubbleId:c2:m3", r#"{"type": 2, "text": "other", "createdAt": 3000}"#),
                ("unrelated:key", "{}"),
            ],
        );

        let db = CursorDb::open(&path).unwrap();
        let mut conversations = db.list_conversations().unwrap();
        conversations.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(conversations.len(), 2);
        assert_eq!(conversations[1].conversation_id, "other");

        let messages = db.list_messages("c1").unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| m.conversation_id == "c1"));
        db.close().unwrap();
    }

    #[test]
    fn test_malformed_rows_skipped() {
        let dir = TempDir::new().unwrap();
        let path = create_store(
            &dir,
            &[
                ("composerData:c1", "{}"),
                ("composerData:broken", "{not json"),
                ("bubbleId:c1:m1", "garbage"),
                ("bubbleId:c1:m2", r#"{"type": 2, "text": "ok", "createdAt": 10}"#),
            ],
        );

        let db = CursorDb::open(&path).unwrap();
        assert_eq!(db.list_conversations().unwrap().len(), 1);
        let messages = db.list_messages("c1").unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "m2");
    }

    #[test]
    fn test_underscore_ids_matched_literally() {
        let dir = TempDir::new().unwrap();
        let path = create_store(
            &dir,
            &[
                ("bubbleId:a_b:m1", r#"{"createdAt": 1}"#),
                ("bubbleId:axb:m2", r#"{"createdAt": 2}"#),
            ],
        );

        let db = CursorDb::open(&path).unwrap();
        let messages = db.list_messages("a_b").unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "m1");
    }

    #[test]
    fn test_latest_assistant_across_conversations() {
        let dir = TempDir::new().unwrap();
        let path = create_store(
            &dir,
            &[
                ("composerData:c1", "{}"),
                ("composerData:c2", "{}"),
                ("bubbleId:c1:m1", r#"{"type": 2, "text": "older", "createdAt": 1000}"#),
                ("bubbleId:c2:m2", r#"{"type": 2, "text": "newest", "createdAt": 5000}"#),
                ("bubbleId:c2:m3", r#"{"type": 1, "text": "later prompt", "createdAt": 9000}"#),
            ],
        );

        let db = CursorDb::open(&path).unwrap();
        let latest = db.latest_assistant_message().unwrap().unwrap();
        assert_eq!(latest.id, "m2");
        assert_eq!(latest.text, "newest");

        let prompt = db.latest_user_message("c2").unwrap().unwrap();
        assert_eq!(prompt.id, "m3");
    }

    #[test]
    fn test_out_of_range_timestamp_skipped() {
        let dir = TempDir::new().unwrap();
        let path = create_store(
            &dir,
            &[
                ("composerData:c1", "{}"),
                ("bubbleId:c1:m1", r#"{"type": 2, "text": "far future", "createdAt": 9.3e18}"#),
                ("bubbleId:c1:m2", r#"{"type": 2, "text": "real", "createdAt": 5000}"#),
            ],
        );

        let db = CursorDb::open(&path).unwrap();
        let latest = db.latest_assistant_message().unwrap().unwrap();
        assert_eq!(latest.id, "m2");
    }

    #[test]
    fn test_no_assistant_messages() {
        let dir = TempDir::new().unwrap();
        let path = create_store(
            &dir,
            &[
                ("composerData:c1", "{}"),
                ("bubbleId:c1:m1", r#"{"type": 1, "text": "hi", "createdAt": 1}"#),
            ],
        );

        let db = CursorDb::open(&path).unwrap();
        assert!(db.latest_assistant_message().unwrap().is_none());
    }

    #[test]
    fn test_garbage_file_is_transient() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.vscdb");
        std::fs::write(&path, vec![0x5au8; 8192]).unwrap();

        let err = CursorDb::open(&path)
            .and_then(|db| db.list_conversations().map(|_| ()))
            .unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)), "got {err:?}");
        assert!(err.is_transient());
    }

    #[test]
    fn test_missing_table_not_transient() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.vscdb");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE ItemTable (key TEXT, value BLOB)")
            .unwrap();

        let db = CursorDb::open(&path).unwrap();
        let err = db.list_conversations().unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn test_source_opens_fresh_handles() {
        let dir = TempDir::new().unwrap();
        let path = create_store(&dir, &[("composerData:c1", "{}")]);

        let source = CursorDbSource::new(&path);
        assert_eq!(source.describe(), path.display().to_string());
        for _ in 0..2 {
            let store = source.open().unwrap();
            assert_eq!(store.list_conversations().unwrap().len(), 1);
        }
    }
}
