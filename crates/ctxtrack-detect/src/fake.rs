//! Scripted in-memory chat store

use ctxtrack_store::{ChatStore, Conversation, Message, Role, StoreError, StoreSource};
use rusqlite::ffi;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Default)]
pub struct FakeState {
    pub messages: Vec<Message>,
    /// Returned by the next `open` calls, in order
    pub open_failures: VecDeque<StoreError>,
    pub opens: usize,
    pub live_handles: usize,
}

#[derive(Clone, Default)]
pub struct FakeSource {
    pub state: Rc<RefCell<FakeState>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, id: &str, conversation: &str, role: Role, created_at: i64) {
        self.state.borrow_mut().messages.push(Message {
            id: id.to_string(),
            conversation_id: conversation.to_string(),
            role,
            text: format!("text of {id}"),
            created_at,
        });
    }

    pub fn fail_next(&self, err: StoreError) {
        self.state.borrow_mut().open_failures.push_back(err);
    }

    pub fn opens(&self) -> usize {
        self.state.borrow().opens
    }

    pub fn live_handles(&self) -> usize {
        self.state.borrow().live_handles
    }
}

pub fn corrupt() -> StoreError {
    StoreError::from(rusqlite::Error::SqliteFailure(
        ffi::Error::new(ffi::SQLITE_CORRUPT),
        None,
    ))
}

pub fn fatal() -> StoreError {
    StoreError::from(rusqlite::Error::SqliteFailure(
        ffi::Error::new(ffi::SQLITE_ERROR),
        Some("no such table: cursorDiskKV".to_string()),
    ))
}

impl StoreSource for FakeSource {
    fn open(&self) -> Result<Box<dyn ChatStore>, StoreError> {
        let mut state = self.state.borrow_mut();
        state.opens += 1;
        if let Some(err) = state.open_failures.pop_front() {
            return Err(err);
        }
        state.live_handles += 1;
        Ok(Box::new(FakeStore {
            state: self.state.clone(),
        }))
    }

    fn describe(&self) -> String {
        "fake".to_string()
    }
}

struct FakeStore {
    state: Rc<RefCell<FakeState>>,
}

impl Drop for FakeStore {
    fn drop(&mut self) {
        self.state.borrow_mut().live_handles -= 1;
    }
}

impl ChatStore for FakeStore {
    fn list_conversations(&self) -> Result<Vec<Conversation>, StoreError> {
        let mut ids: Vec<String> = Vec::new();
        for msg in &self.state.borrow().messages {
            if !ids.contains(&msg.conversation_id) {
                ids.push(msg.conversation_id.clone());
            }
        }
        Ok(ids
            .into_iter()
            .map(|id| Conversation {
                conversation_id: id.clone(),
                id,
                created_at: None,
                updated_at: None,
            })
            .collect())
    }

    fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, StoreError> {
        Ok(self
            .state
            .borrow()
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect())
    }
}
