use super::{format_ms, resolve_store};
use ctxtrack_store::{ChatStore, CursorDb, Message};
use ctxtrack_telemetry::Paths;
use std::path::Path;

const PREVIEW_CHARS: usize = 200;

pub fn run(db: Option<&Path>) -> anyhow::Result<()> {
    let paths = Paths::new()?;
    let store = CursorDb::open(&resolve_store(&paths, db)?)?;

    let Some(message) = store.latest_assistant_message()? else {
        println!("No assistant responses found");
        return Ok(());
    };
    let prompt = store.latest_user_message(&message.conversation_id)?;
    store.close()?;

    print!("{}", render(&message, prompt.as_ref()));
    Ok(())
}

fn render(message: &Message, prompt: Option<&Message>) -> String {
    let mut out = format!(
        "Conversation: {}\nMessage:      {}\nCreated:      {}\n",
        message.conversation_id,
        message.id,
        format_ms(message.created_at)
    );
    if let Some(prompt) = prompt {
        out.push_str(&format!("Prompt:       {}\n", prompt.preview(PREVIEW_CHARS)));
    }
    out.push_str(&format!("Response:     {}\n", message.preview(PREVIEW_CHARS)));
    out
}
