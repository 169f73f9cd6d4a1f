use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use reqwest::{Client, Response};
use serde_json::Value;

use crate::errors::{RelayError, RelayResult};
use crate::models::wire::{ModelRequest, StreamFrame};

pub const OLLAMA_HOST: &str = "http://localhost:11434";
pub const OLLAMA_TEXT_MODEL: &str = "llama3.2";
pub const OLLAMA_VISION_MODEL: &str = "llava";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OllamaConfig {
    pub host: String,
    pub text_model: String,
    pub vision_model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        OllamaConfig {
            host: OLLAMA_HOST.to_string(),
            text_model: OLLAMA_TEXT_MODEL.to_string(),
            vision_model: OLLAMA_VISION_MODEL.to_string(),
        }
    }
}

/// HTTP client for the model server's chat endpoint.
///
/// No request timeout is set: a model server that stops sending keeps the
/// call waiting until the caller drops it.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    config: OllamaConfig,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> RelayResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| RelayError::Internal(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.config.host.trim_end_matches('/'))
    }

    async fn post(&self, request: &ModelRequest) -> RelayResult<Response> {
        let response = self
            .client
            .post(self.chat_url())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Model server unreachable at {}: {}", self.config.host, e);
                RelayError::UpstreamUnavailable {
                    host: self.config.host.clone(),
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = error_detail(&body)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());
        tracing::warn!("Model server returned {}: {}", status, detail);
        Err(RelayError::UpstreamProtocol {
            status: status.as_u16(),
            detail,
        })
    }

    /// Open a streaming chat call and hand back the raw response body
    pub async fn chat_stream(
        &self,
        request: &ModelRequest,
    ) -> RelayResult<BoxStream<'static, reqwest::Result<Bytes>>> {
        let response = self.post(request).await?;
        Ok(response.bytes_stream().boxed())
    }

    /// Make a non-streaming chat call and return the reply's content
    pub async fn chat(&self, request: &ModelRequest) -> RelayResult<String> {
        let response = self.post(request).await?;
        let frame: StreamFrame = response
            .json()
            .await
            .map_err(|e| RelayError::InvalidResponse(e.to_string()))?;

        if let Some(error) = frame.error {
            return Err(RelayError::InvalidResponse(error));
        }
        Ok(frame.message.map(|message| message.content).unwrap_or_default())
    }
}

/// Pull a human readable cause out of an error body
fn error_detail(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|value| {
        ["error", "detail", "message"]
            .iter()
            .find_map(|key| value.get(key).and_then(Value::as_str).map(String::from))
    });
    Some(from_json.unwrap_or_else(|| body.to_string()))
}
