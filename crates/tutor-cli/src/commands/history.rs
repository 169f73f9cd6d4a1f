use anyhow::{Context, Result};
use console::style;
use tutor::store::JsonFileStore;

use crate::render::print_transcript;

pub fn run(store: &JsonFileStore, show: Option<String>) -> Result<()> {
    let mut conversations = store.conversations()?;

    if let Some(id) = show {
        let conversation = conversations
            .into_iter()
            .find(|conversation| conversation.id == id)
            .with_context(|| format!("No saved conversation with id {}", id))?;
        println!("{}", style(&conversation.title).bold());
        println!();
        return print_transcript(&conversation.messages);
    }

    if conversations.is_empty() {
        println!("No saved conversations.");
        return Ok(());
    }

    conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    for conversation in conversations {
        println!(
            "{}  {}  {} {}",
            style(&conversation.id).dim(),
            conversation.updated_at.format("%Y-%m-%d %H:%M"),
            conversation.title,
            style(format!("({} messages)", conversation.messages.len())).dim()
        );
    }
    println!(
        "{}",
        style("Resume one with `tutor chat --resume <id>`").dim()
    );
    Ok(())
}
