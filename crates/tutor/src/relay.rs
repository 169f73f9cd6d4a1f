use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::fmt::Display;

use crate::codec::DelimitedBuffer;
use crate::errors::RelayError;
use crate::markup;
use crate::models::event::RelayEvent;
use crate::models::message::{AttachmentKind, ConversationMessage};
use crate::models::role::Role;
use crate::models::wire::{ModelMessage, ModelOptions, ModelRequest, ModelRole, StreamFrame};
use crate::ollama::OllamaConfig;
use crate::prompt_template::SYSTEM_PROMPT;

/// Build the model server request for a conversation.
///
/// The vision model is chosen when any user turn carries an image; the choice
/// covers the whole request.
pub fn build_chat_request(
    conversation: &[ConversationMessage],
    config: &OllamaConfig,
) -> ModelRequest {
    let mut messages = vec![ModelMessage::new(ModelRole::System, SYSTEM_PROMPT)];
    let needs_vision = conversation.iter().any(ConversationMessage::has_image);

    for message in conversation {
        let turn = match (message.role, &message.attachment) {
            (Role::User, Some(attachment)) => match attachment.kind {
                AttachmentKind::Image => ModelMessage::new(ModelRole::User, message.text.as_str())
                    .with_image(attachment.image_data()),
                AttachmentKind::Text => ModelMessage::new(
                    ModelRole::User,
                    format!(
                        "{}\n\n[Attached file: {}]\n```\n{}\n```",
                        message.text, attachment.name, attachment.payload
                    ),
                ),
            },
            (role, _) => ModelMessage::new(role.into(), message.text.as_str()),
        };
        messages.push(turn);
    }

    let model = if needs_vision {
        &config.vision_model
    } else {
        &config.text_model
    };

    ModelRequest {
        model: model.clone(),
        messages,
        stream: true,
        options: ModelOptions::CHAT,
    }
}

fn parse_frame(line: &[u8]) -> Option<StreamFrame> {
    let text = std::str::from_utf8(line).ok()?.trim();
    if text.is_empty() {
        return None;
    }
    match serde_json::from_str(text) {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::debug!("Skipping malformed model server line: {}", e);
            None
        }
    }
}

/// Events for one frame, in the order they must be emitted
fn frame_events(mut frame: StreamFrame) -> Vec<RelayEvent> {
    let mut events = Vec::new();
    if let Some(error) = frame.error.take() {
        events.push(RelayEvent::Error(error));
        return events;
    }
    if let Some(content) = frame.content() {
        events.push(RelayEvent::Token(markup::clean(content)));
    }
    if frame.done {
        events.push(RelayEvent::Done);
    }
    events
}

/// Turn the model server's newline-delimited JSON body into relay events.
///
/// Each content fragment is cleaned and yielded as soon as its line is
/// complete. The stream ends after a terminal event, or quietly when the
/// upstream body closes without one.
pub fn relay_events<S, E>(upstream: S) -> impl Stream<Item = RelayEvent>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    async_stream::stream! {
        let mut upstream = Box::pin(upstream);
        let mut lines = DelimitedBuffer::lines();
        let mut closed = false;

        while !closed {
            let segments = match upstream.next().await {
                Some(Ok(chunk)) => {
                    lines.push(&chunk);
                    lines.drain_segments()
                }
                Some(Err(e)) => {
                    tracing::error!("Model server stream failed: {}", e);
                    yield RelayEvent::Error(RelayError::StreamInterrupted.to_string());
                    return;
                }
                None => {
                    closed = true;
                    lines.take_remainder().into_iter().collect()
                }
            };

            for frame in segments.iter().filter_map(|segment| parse_frame(segment)) {
                for event in frame_events(frame) {
                    let terminal = event.is_terminal();
                    yield event;
                    if terminal {
                        return;
                    }
                }
            }
        }
    }
}
