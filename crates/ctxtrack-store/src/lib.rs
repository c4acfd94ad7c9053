//! Read-only access to the editor's chat history database

mod error;
mod reader;
mod types;

pub use error::{DecodeError, StoreError};
pub use reader::{ChatStore, CursorDb, CursorDbSource, StoreSource};
pub use types::{decode_conversation, decode_message, Conversation, Message, Role};
