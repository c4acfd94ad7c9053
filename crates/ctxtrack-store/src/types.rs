//! Conversation and message records, and their decoders

use crate::error::DecodeError;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const CONVERSATION_PREFIX: &str = "composerData:";
pub const MESSAGE_PREFIX: &str = "bubbleId:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// The store encodes roles as integers; only 2 means assistant.
    pub fn from_code(code: Option<i64>) -> Self {
        match code {
            Some(2) => Role::Assistant,
            _ => Role::User,
        }
    }
}

/// A chat thread ("composer" in the store)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub conversation_id: String,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

/// A single chat message ("bubble" in the store)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub role: Role,
    pub text: String,
    /// Epoch milliseconds
    pub created_at: i64,
}

impl Message {
    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    /// First `max_chars` characters on a single line
    pub fn preview(&self, max_chars: usize) -> String {
        self.text
            .chars()
            .take(max_chars)
            .collect::<String>()
            .replace('\n', " ")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConversation {
    conversation_id: Option<String>,
    created_at: Option<Value>,
    updated_at: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    #[serde(rename = "type")]
    kind: Option<i64>,
    text: Option<Value>,
    content: Option<Value>,
    created_at: Option<Value>,
}

/// Timestamps appear both as epoch milliseconds and as RFC 3339 strings
/// Epoch milliseconds from a number, an RFC 3339 string or a numeric string.
/// Values outside the range a calendar date can represent are rejected.
fn parse_timestamp(value: &Value) -> Result<i64, DecodeError> {
    let invalid = || DecodeError::InvalidTimestamp(value.to_string());
    let ms = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .ok_or_else(invalid)?,
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.timestamp_millis())
            .or_else(|_| s.parse::<i64>())
            .map_err(|_| invalid())?,
        _ => return Err(invalid()),
    };

    match DateTime::from_timestamp_millis(ms) {
        Some(_) => Ok(ms),
        None => Err(invalid()),
    }
}

fn optional_timestamp(value: Option<&Value>) -> Result<Option<i64>, DecodeError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => parse_timestamp(v).map(Some),
    }
}

/// Decode a `composerData:<id>` row
pub fn decode_conversation(key: &str, value: &str) -> Result<Conversation, DecodeError> {
    let id = key
        .strip_prefix(CONVERSATION_PREFIX)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| DecodeError::InvalidKey(key.to_string()))?;
    let raw: RawConversation = serde_json::from_str(value)?;

    Ok(Conversation {
        id: id.to_string(),
        conversation_id: raw.conversation_id.unwrap_or_else(|| id.to_string()),
        created_at: optional_timestamp(raw.created_at.as_ref())?,
        updated_at: optional_timestamp(raw.updated_at.as_ref())?,
    })
}

/// Decode a `bubbleId:<conversation>:<message>` row. Segments after the
/// message id are ignored.
pub fn decode_message(key: &str, value: &str) -> Result<Message, DecodeError> {
    let mut parts = key
        .strip_prefix(MESSAGE_PREFIX)
        .ok_or_else(|| DecodeError::InvalidKey(key.to_string()))?
        .split(':');
    let (conversation_id, id) = match (parts.next(), parts.next()) {
        (Some(c), Some(m)) if !c.is_empty() && !m.is_empty() => (c, m),
        _ => return Err(DecodeError::InvalidKey(key.to_string())),
    };

    let raw: RawMessage = serde_json::from_str(value)?;
    let created_at = optional_timestamp(raw.created_at.as_ref())?
        .ok_or(DecodeError::MissingField("createdAt"))?;

    let text = [raw.text.as_ref(), raw.content.as_ref()]
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string();

    Ok(Message {
        id: id.to_string(),
        conversation_id: conversation_id.to_string(),
        role: Role::from_code(raw.kind),
        text,
        created_at,
    })
}
