//! Client side of a chat exchange: sends the conversation to the relay and
//! grows the assistant's reply in place as event frames arrive.
use bytes::Bytes;
use futures::future::{AbortRegistration, Abortable};
use futures::{Stream, StreamExt};
use std::fmt::Display;

use crate::client::TutorClient;
use crate::codec::DelimitedBuffer;
use crate::errors::{needs_setup, ClientError};
use crate::models::event::RelayEvent;
use crate::models::message::ConversationMessage;
use crate::models::role::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    Idle,
    Sending,
    Streaming,
    Done,
    Failed,
    Cancelled,
}

impl ChatState {
    pub fn is_busy(self) -> bool {
        matches!(self, ChatState::Sending | ChatState::Streaming)
    }
}

/// How a send ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Cancelled,
    Failed { message: String, setup_required: bool },
}

// Marks the slot cancelled if the exchange is dropped before it settles
struct InFlight<'a> {
    state: &'a mut ChatState,
}

impl<'a> InFlight<'a> {
    fn begin(state: &'a mut ChatState) -> Self {
        *state = ChatState::Sending;
        InFlight { state }
    }

    fn finish(self, state: ChatState) {
        *self.state = state;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.state.is_busy() {
            *self.state = ChatState::Cancelled;
        }
    }
}

/// One conversation slot and the state of its current exchange
#[derive(Debug, Clone)]
pub struct ChatSession {
    messages: Vec<ConversationMessage>,
    state: ChatState,
    setup_required: bool,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self::from_messages(Vec::new())
    }

    pub fn from_messages(messages: Vec<ConversationMessage>) -> Self {
        ChatSession {
            messages,
            state: ChatState::Idle,
            setup_required: false,
        }
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn state(&self) -> ChatState {
        self.state
    }

    /// Set when the last failure looked like the model server is not running
    pub fn setup_required(&self) -> bool {
        self.setup_required
    }

    /// Append a user message and stream the assistant's reply.
    ///
    /// `on_update` sees the reply after every fragment. Aborting through the
    /// handle paired with `abort` stops the exchange and keeps whatever text
    /// already arrived.
    ///
    /// The exchange holds `&mut self` until it settles, so a slot never has
    /// two sends in flight. Dropping the future leaves the slot `Cancelled`.
    pub async fn send<F>(
        &mut self,
        client: &TutorClient,
        message: ConversationMessage,
        abort: AbortRegistration,
        on_update: F,
    ) -> Outcome
    where
        F: FnMut(&ConversationMessage),
    {
        self.messages.push(message);
        self.exchange(client, abort, on_update).await
    }

    /// Drop the trailing assistant reply, if any, and ask again
    pub async fn regenerate<F>(
        &mut self,
        client: &TutorClient,
        abort: AbortRegistration,
        on_update: F,
    ) -> Outcome
    where
        F: FnMut(&ConversationMessage),
    {
        while self
            .messages
            .last()
            .is_some_and(|message| message.role == Role::Assistant)
        {
            self.messages.pop();
        }
        self.exchange(client, abort, on_update).await
    }

    async fn exchange<F>(
        &mut self,
        client: &TutorClient,
        abort: AbortRegistration,
        mut on_update: F,
    ) -> Outcome
    where
        F: FnMut(&ConversationMessage),
    {
        let ChatSession {
            messages,
            state,
            setup_required,
        } = self;
        let mut in_flight = InFlight::begin(state);
        *setup_required = false;

        let result = Abortable::new(
            stream_reply(client, messages, &mut in_flight, &mut on_update),
            abort,
        )
        .await;

        match result {
            Ok(Ok(())) => {
                in_flight.finish(ChatState::Done);
                Outcome::Completed
            }
            Ok(Err(err)) => {
                let message = err.to_string();
                tracing::warn!("Chat exchange failed: {}", message);
                *setup_required = needs_setup(&message);
                show_failure(messages, &message);
                if let Some(reply) = messages.last() {
                    on_update(reply);
                }
                in_flight.finish(ChatState::Failed);
                Outcome::Failed {
                    message,
                    setup_required: *setup_required,
                }
            }
            Err(_aborted) => {
                in_flight.finish(ChatState::Cancelled);
                Outcome::Cancelled
            }
        }
    }
}

async fn stream_reply<F>(
    client: &TutorClient,
    messages: &mut Vec<ConversationMessage>,
    in_flight: &mut InFlight<'_>,
    on_update: &mut F,
) -> Result<(), ClientError>
where
    F: FnMut(&ConversationMessage),
{
    let body = client.open_chat(messages).await?;

    *in_flight.state = ChatState::Streaming;
    messages.push(ConversationMessage::assistant(""));
    let reply = messages
        .last_mut()
        .ok_or_else(|| ClientError::Decode("missing reply placeholder".to_string()))?;
    on_update(reply);

    consume_events(body, reply, on_update).await
}

/// Read event frames from `body`, appending each token to `reply`.
///
/// Returns once the stream signals completion or closes.
pub async fn consume_events<S, E, F>(
    body: S,
    reply: &mut ConversationMessage,
    on_update: &mut F,
) -> Result<(), ClientError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
    F: FnMut(&ConversationMessage),
{
    let mut body = Box::pin(body);
    let mut frames = DelimitedBuffer::events();
    let mut closed = false;

    while !closed {
        let segments = match body.next().await {
            Some(Ok(chunk)) => {
                frames.push(&chunk);
                frames.drain_segments()
            }
            Some(Err(e)) => return Err(ClientError::Interrupted(e.to_string())),
            None => {
                closed = true;
                frames.take_remainder().into_iter().collect()
            }
        };

        for segment in segments {
            let frame = String::from_utf8_lossy(&segment);
            match RelayEvent::from_frame(&frame) {
                Some(RelayEvent::Token(token)) => {
                    reply.text.push_str(&token);
                    on_update(reply);
                }
                Some(RelayEvent::Error(error)) => return Err(ClientError::Relay(error)),
                Some(RelayEvent::Done) => return Ok(()),
                None => {}
            }
        }
    }
    Ok(())
}

/// Put a diagnostic into the transcript, keeping any partial reply
fn show_failure(messages: &mut Vec<ConversationMessage>, message: &str) {
    let diagnostic = format!("Error: {}", message);
    match messages.last_mut() {
        Some(reply) if reply.role == Role::Assistant && !reply.text.is_empty() => {
            reply.text.push_str("\n\n");
            reply.text.push_str(&diagnostic);
        }
        Some(reply) if reply.role == Role::Assistant => reply.text = diagnostic,
        _ => messages.push(ConversationMessage::assistant(diagnostic)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::AbortHandle;
    use futures::stream;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token(text: &str) -> String {
        RelayEvent::Token(text.to_string()).to_frame()
    }

    fn chunks(parts: &[String]) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
        let parts: Vec<_> = parts.iter().map(|part| Ok(Bytes::from(part.clone()))).collect();
        stream::iter(parts)
    }

    #[tokio::test]
    async fn test_consume_accumulates_tokens() {
        let body = [token("Hello"), token(", "), token("$x$"), RelayEvent::Done.to_frame()].concat();
        let bytes = body.as_bytes();
        let parts: Vec<String> = vec![
            String::from_utf8(bytes[..10].to_vec()).unwrap(),
            String::from_utf8(bytes[10..].to_vec()).unwrap(),
        ];

        let mut reply = ConversationMessage::assistant("");
        let mut seen = Vec::new();
        consume_events(chunks(&parts), &mut reply, &mut |message: &ConversationMessage| {
            seen.push(message.text.clone())
        })
        .await
        .unwrap();

        assert_eq!(reply.text, "Hello, $x$");
        assert_eq!(seen, vec!["Hello", "Hello, ", "Hello, $x$"]);
    }

    #[tokio::test]
    async fn test_consume_error_event() {
        let parts = vec![token("partial"), RelayEvent::Error("Stream interrupted".into()).to_frame()];
        let mut reply = ConversationMessage::assistant("");
        let err = consume_events(chunks(&parts), &mut reply, &mut |_: &ConversationMessage| {})
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Stream interrupted");
        assert_eq!(reply.text, "partial");
    }

    #[tokio::test]
    async fn test_consume_transport_drop() {
        let body = stream::iter(vec![
            Ok(Bytes::from(token("half"))),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer")),
        ]);
        let mut reply = ConversationMessage::assistant("");
        let err = consume_events(body, &mut reply, &mut |_: &ConversationMessage| {})
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Interrupted(_)));
        assert_eq!(err.to_string(), "Connection to the tutor server dropped: reset by peer");
        assert_eq!(reply.text, "half");
    }

    #[tokio::test]
    async fn test_send_streams_reply() {
        let mock_server = MockServer::start().await;
        let body = [token("x = "), token("1"), RelayEvent::Done.to_frame()].concat();
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&mock_server)
            .await;

        let client = TutorClient::new(mock_server.uri()).unwrap();
        let mut session = ChatSession::new();
        let (_handle, registration) = AbortHandle::new_pair();
        let mut updates = 0;
        let outcome = session
            .send(
                &client,
                ConversationMessage::user("Solve x + 1 = 2"),
                registration,
                |_| updates += 1,
            )
            .await;

        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(session.state(), ChatState::Done);
        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.messages()[1], ConversationMessage::assistant("x = 1"));
        // placeholder plus two tokens
        assert_eq!(updates, 3);
    }

    #[tokio::test]
    async fn test_send_surfaces_upstream_detail() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(502)
                    .set_body_json(json!({"error": "Model server returned 500: oom"})),
            )
            .mount(&mock_server)
            .await;

        let client = TutorClient::new(mock_server.uri()).unwrap();
        let mut session = ChatSession::new();
        let (_handle, registration) = AbortHandle::new_pair();
        let outcome = session
            .send(&client, ConversationMessage::user("hi"), registration, |_| {})
            .await;

        assert_eq!(
            outcome,
            Outcome::Failed {
                message: "Model server returned 500: oom".to_string(),
                setup_required: false
            }
        );
        assert_eq!(session.state(), ChatState::Failed);
        assert_eq!(session.messages().len(), 2);
        assert!(session.messages()[1].text.contains("oom"));
        assert!(!session.setup_required());
    }

    #[tokio::test]
    async fn test_send_flags_setup_required() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "error": "Cannot connect to the model server at http://localhost:11434. Is Ollama running?"
            })))
            .mount(&mock_server)
            .await;

        let client = TutorClient::new(mock_server.uri()).unwrap();
        let mut session = ChatSession::new();
        let (_handle, registration) = AbortHandle::new_pair();
        let outcome = session
            .send(&client, ConversationMessage::user("hi"), registration, |_| {})
            .await;

        assert!(matches!(outcome, Outcome::Failed { setup_required: true, .. }));
        assert!(session.setup_required());
    }

    #[tokio::test]
    async fn test_cancel_keeps_partial_text() {
        let n = 3;
        let parts: Vec<Result<Bytes, std::io::Error>> = (0..n)
            .map(|i| Ok(Bytes::from(token(&format!("t{i} ")))))
            .collect();
        let body = stream::iter(parts).chain(stream::pending());

        let (handle, registration) = AbortHandle::new_pair();
        let mut reply = ConversationMessage::assistant("");
        let mut received = 0;
        let result = Abortable::new(
            consume_events(body, &mut reply, &mut |_: &ConversationMessage| {
                received += 1;
                if received == n {
                    handle.abort();
                }
            }),
            registration,
        )
        .await;

        assert!(result.is_err(), "exchange should be aborted");
        assert_eq!(reply.text, "t0 t1 t2 ");
    }

    #[tokio::test]
    async fn test_cancel_before_response() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(30)))
            .mount(&mock_server)
            .await;

        let client = TutorClient::new(mock_server.uri()).unwrap();
        let mut session = ChatSession::new();
        let (handle, registration) = AbortHandle::new_pair();
        handle.abort();
        let outcome = session
            .send(&client, ConversationMessage::user("hi"), registration, |_| {})
            .await;

        assert_eq!(outcome, Outcome::Cancelled);
        assert_eq!(session.state(), ChatState::Cancelled);
        assert_eq!(session.messages(), &[ConversationMessage::user("hi")]);
    }

    #[tokio::test]
    async fn test_dropped_send_frees_slot() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(30)))
            .mount(&mock_server)
            .await;

        let client = TutorClient::new(mock_server.uri()).unwrap();
        let mut session = ChatSession::new();
        let (_handle, registration) = AbortHandle::new_pair();
        let timed_out = tokio::time::timeout(
            std::time::Duration::from_millis(100),
            session.send(&client, ConversationMessage::user("hi"), registration, |_| {}),
        )
        .await;

        assert!(timed_out.is_err());
        assert_eq!(session.state(), ChatState::Cancelled);
        assert!(!session.state().is_busy());
        assert_eq!(session.messages(), &[ConversationMessage::user("hi")]);
    }

    #[test]
    fn test_show_failure_appends_to_partial_reply() {
        let mut messages = vec![
            ConversationMessage::user("hi"),
            ConversationMessage::assistant("Half an ans"),
        ];
        show_failure(&mut messages, "Stream interrupted");
        assert_eq!(messages[1].text, "Half an ans\n\nError: Stream interrupted");

        let mut empty = vec![ConversationMessage::user("hi"), ConversationMessage::assistant("")];
        show_failure(&mut empty, "boom");
        assert_eq!(empty[1].text, "Error: boom");
    }
}
