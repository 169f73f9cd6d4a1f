use std::path::PathBuf;

use anyhow::{Context, Result};
use console::style;
use futures::future::AbortHandle;
use rustyline::error::ReadlineError;
use tutor::client::TutorClient;
use tutor::models::message::{Attachment, ConversationMessage};
use tutor::session::{ChatSession, Outcome};
use tutor::store::{JsonFileStore, SavedConversation};

use crate::attachment::load_attachment;
use crate::render::{print_setup_guidance, print_transcript, ReplyView};

const PROMPT: &str = "\x1b[1m\x1b[38;5;30mtutor> \x1b[0m";

#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Message(String),
    Attach(PathBuf),
    Regenerate,
    Help,
    Exit,
    Empty,
}

pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    if line.eq_ignore_ascii_case("/exit") || line.eq_ignore_ascii_case("/quit") {
        return Input::Exit;
    }
    if line.eq_ignore_ascii_case("/regenerate") {
        return Input::Regenerate;
    }
    if line.eq_ignore_ascii_case("/?") || line.eq_ignore_ascii_case("/help") {
        return Input::Help;
    }
    if line == "/attach" {
        return Input::Help;
    }
    if let Some(path) = line.strip_prefix("/attach ") {
        return Input::Attach(PathBuf::from(path.trim()));
    }
    Input::Message(line.to_string())
}

fn print_help() {
    println!("Commands:");
    println!("/attach <path> - Attach a file or image to your next message");
    println!("/regenerate - Ask again for the last reply");
    println!("/exit - Exit the session");
    println!("/? | /help - Display this help message");
    println!("Ctrl+C - Stop the reply that is streaming");
}

enum Turn {
    Send(ConversationMessage),
    Regenerate,
}

/// Run one exchange, letting Ctrl-C abort it
async fn exchange(
    session: &mut ChatSession,
    client: &TutorClient,
    turn: Turn,
) -> Outcome {
    let (handle, registration) = AbortHandle::new_pair();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.abort();
        }
    });

    let mut view = ReplyView::default();
    let on_update = |reply: &ConversationMessage| view.update(reply);
    let outcome = match turn {
        Turn::Send(message) => session.send(client, message, registration, on_update).await,
        Turn::Regenerate => session.regenerate(client, registration, on_update).await,
    };
    interrupt.abort();
    println!();

    outcome
}

pub async fn run(client: TutorClient, store: &mut JsonFileStore, resume: Option<String>) -> Result<()> {
    let mut saved = match resume {
        Some(id) => store
            .conversations()?
            .into_iter()
            .find(|conversation| conversation.id == id)
            .with_context(|| format!("No saved conversation with id {}", id))?,
        None => SavedConversation::new(),
    };

    let mut session = ChatSession::from_messages(saved.messages.clone());
    if !saved.messages.is_empty() {
        println!("{}", style(format!("Resuming \"{}\"", saved.title)).dim());
        print_transcript(&saved.messages)?;
    }
    println!(
        "{}",
        style(format!("Saving conversations to {}", store.path().display())).dim()
    );
    println!(
        "Math tutor {}",
        style("- type /help for commands, /exit to leave").dim()
    );

    let mut editor = rustyline::DefaultEditor::new()?;
    let mut pending: Option<Attachment> = None;

    loop {
        let line = match editor.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        let turn = match parse_input(&line) {
            Input::Empty => continue,
            Input::Exit => break,
            Input::Help => {
                print_help();
                continue;
            }
            Input::Attach(path) => {
                match load_attachment(&path) {
                    Ok(attachment) => {
                        println!(
                            "{}",
                            style(format!("Attached {} to your next message", attachment.name)).dim()
                        );
                        pending = Some(attachment);
                    }
                    Err(e) => eprintln!("{}", style(format!("{:#}", e)).red()),
                }
                continue;
            }
            Input::Regenerate => {
                if session.messages().is_empty() {
                    continue;
                }
                Turn::Regenerate
            }
            Input::Message(text) => {
                let _ = editor.add_history_entry(text.as_str());
                let message = ConversationMessage::user(text);
                Turn::Send(match pending.take() {
                    Some(attachment) => message.with_attachment(attachment),
                    None => message,
                })
            }
        };

        match exchange(&mut session, &client, turn).await {
            Outcome::Completed => {}
            // Abandoned replies are not saved
            Outcome::Cancelled => {
                println!("{}", style("[stopped]").dim());
                continue;
            }
            Outcome::Failed { setup_required, .. } => {
                if setup_required {
                    print_setup_guidance();
                }
            }
        }

        saved.update(session.messages());
        store.save_conversation(&saved)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("  "), Input::Empty);
        assert_eq!(parse_input("/EXIT"), Input::Exit);
        assert_eq!(parse_input("/quit"), Input::Exit);
        assert_eq!(parse_input("/regenerate"), Input::Regenerate);
        assert_eq!(parse_input("/?"), Input::Help);
        assert_eq!(
            parse_input("/attach ./homework page.png "),
            Input::Attach(PathBuf::from("./homework page.png"))
        );
        assert_eq!(parse_input("/attach"), Input::Help);
        assert_eq!(
            parse_input(" what is 2 + 2? "),
            Input::Message("what is 2 + 2?".to_string())
        );
    }
}
