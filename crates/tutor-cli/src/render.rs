use std::io::{self, Write};

use anyhow::Result;
use bat::WrappingMode;
use console::style;
use tutor::models::message::ConversationMessage;
use tutor::models::role::Role;

const THEME: &str = "zenburn";

pub fn print_markdown(content: &str) -> Result<()> {
    bat::PrettyPrinter::new()
        .input_from_bytes(content.as_bytes())
        .theme(THEME)
        .language("Markdown")
        .wrapping_mode(WrappingMode::Character)
        .print()?;
    Ok(())
}

pub fn print_setup_guidance() {
    println!();
    println!("{}", style("The model server is not reachable.").yellow().bold());
    println!("  1. Install Ollama from https://ollama.com");
    println!("  2. Start it with `ollama serve`");
    println!("  3. Pull the models: `ollama pull llama3.2` and `ollama pull llava`");
    println!("  4. Make sure `tutord` is running and can reach it");
}

/// Print a stored transcript, one block per turn
pub fn print_transcript(messages: &[ConversationMessage]) -> Result<()> {
    for message in messages {
        match message.role {
            Role::User => {
                println!("{}", style("you").cyan().bold());
                println!("{}", message.text);
                if let Some(attachment) = &message.attachment {
                    println!("{}", style(format!("[attached {}]", attachment.name)).dim());
                }
            }
            Role::Assistant => {
                println!("{}", style("tutor").magenta().bold());
                print_markdown(&message.text)?;
            }
        }
        println!();
    }
    Ok(())
}

/// Writes the unseen tail of a growing reply to stdout
#[derive(Debug, Default)]
pub struct ReplyView {
    printed: usize,
}

impl ReplyView {
    pub fn update(&mut self, reply: &ConversationMessage) {
        let delta = self.delta(&reply.text);
        print!("{}", delta);
        let _ = io::stdout().flush();
    }

    fn delta<'a>(&mut self, text: &'a str) -> &'a str {
        let delta = text.get(self.printed..).unwrap_or(text);
        self.printed = text.len();
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_view_prints_only_new_text() {
        let mut view = ReplyView::default();
        assert_eq!(view.delta(""), "");
        assert_eq!(view.delta("x = "), "x = ");
        assert_eq!(view.delta("x = $2$"), "$2$");
        assert_eq!(view.delta("x = $2$\n\nError: Stream interrupted"), "\n\nError: Stream interrupted");
    }

    #[test]
    fn test_reply_view_restarts_on_shorter_text() {
        let mut view = ReplyView::default();
        view.delta("partial reply");
        assert_eq!(view.delta("Error: x"), "Error: x");
    }
}
