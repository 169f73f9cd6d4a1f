use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use futures::{stream::StreamExt, Stream};
use serde::Deserialize;
use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tutor::models::event::RelayEvent;
use tutor::models::message::ConversationMessage;
use tutor::relay::{build_chat_request, relay_events};

#[derive(Debug, Deserialize)]
struct ChatRequest {
    messages: Vec<ConversationMessage>,
}

// Server-sent event body fed from the relay task
pub struct SseResponse {
    rx: ReceiverStream<String>,
}

impl SseResponse {
    fn new(rx: ReceiverStream<String>) -> Self {
        Self { rx }
    }
}

impl Stream for SseResponse {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx)
            .poll_next(cx)
            .map(|opt| opt.map(|s| Ok(Bytes::from(s))))
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> Response {
        let body = axum::body::Body::from_stream(self);

        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/event-stream"),
                (header::CACHE_CONTROL, "no-cache"),
                (header::CONNECTION, "keep-alive"),
            ],
            body,
        )
            .into_response()
    }
}

/// Pass relay events to the client as frames until the stream ends or the
/// client goes away. Returning drops `events` and with it the upstream body.
async fn forward<S>(events: S, tx: mpsc::Sender<String>)
where
    S: Stream<Item = RelayEvent>,
{
    let mut events = Box::pin(events);

    loop {
        tokio::select! {
            _ = tx.closed() => {
                tracing::debug!("client disconnected, abandoning upstream");
                break;
            }
            event = events.next() => {
                let Some(event) = event else { break };
                if let Err(e) = tx.send(event.to_frame()).await {
                    tracing::debug!("Error sending event through channel: {}", e);
                    break;
                }
            }
        }
    }
}

async fn handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<SseResponse, ApiError> {
    let model_request = build_chat_request(&request.messages, state.ollama.config());
    tracing::info!(
        model = %model_request.model,
        turns = request.messages.len(),
        "relaying chat"
    );

    // Connect before answering so upstream failures come back as JSON
    let upstream = state.ollama.chat_stream(&model_request).await?;

    // Create channel for streaming
    let (tx, rx) = mpsc::channel(100);

    tokio::spawn(forward(relay_events(upstream), tx));

    Ok(SseResponse::new(ReceiverStream::new(rx)))
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(handler))
        .with_state(state)
}
