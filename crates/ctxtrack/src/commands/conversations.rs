use super::{format_ms, resolve_store};
use ctxtrack_store::{ChatStore, Conversation, CursorDb};
use ctxtrack_telemetry::Paths;
use std::path::Path;

struct Row {
    conversation: Conversation,
    messages: usize,
    replies: usize,
    last_activity: Option<i64>,
}

pub fn run(db: Option<&Path>) -> anyhow::Result<()> {
    let paths = Paths::new()?;
    let store = CursorDb::open(&resolve_store(&paths, db)?)?;

    let mut rows = Vec::new();
    for conversation in store.list_conversations()? {
        let messages = store.list_messages(&conversation.id)?;
        let last_activity = messages
            .iter()
            .map(|m| m.created_at)
            .max()
            .or(conversation.updated_at)
            .or(conversation.created_at);
        rows.push(Row {
            replies: messages.iter().filter(|m| m.is_assistant()).count(),
            messages: messages.len(),
            last_activity,
            conversation,
        });
    }
    store.close()?;

    if rows.is_empty() {
        println!("No conversations found");
        return Ok(());
    }

    sort_recent_first(&mut rows);
    println!("Conversations ({})", rows.len());
    println!("======================");
    for row in &rows {
        println!(
            "  {} | {} | messages:{} replies:{}",
            row.last_activity.map(format_ms).unwrap_or_else(|| "-".to_string()),
            row.conversation.id,
            row.messages,
            row.replies,
        );
    }
    Ok(())
}

fn sort_recent_first(rows: &mut [Row]) {
    rows.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, last_activity: Option<i64>) -> Row {
        Row {
            conversation: Conversation {
                id: id.to_string(),
                conversation_id: id.to_string(),
                created_at: None,
                updated_at: None,
            },
            messages: 0,
            replies: 0,
            last_activity,
        }
    }

    #[test]
    fn test_sort_recent_first() {
        let mut rows = vec![row("a", Some(1)), row("b", None), row("c", Some(5))];
        sort_recent_first(&mut rows);
        let ids: Vec<_> = rows.iter().map(|r| r.conversation.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }
}
