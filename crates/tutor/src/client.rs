use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;

use crate::errors::ClientError;
use crate::models::message::ConversationMessage;
use crate::practice::{Difficulty, Grade, PracticeProblem, PracticeRequest};

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// HTTP client for the tutor server's chat and practice endpoints
#[derive(Debug, Clone)]
pub struct TutorClient {
    http: Client,
    base_url: String,
}

impl TutorClient {
    pub fn new<S: Into<String>>(base_url: S) -> Result<Self, ClientError> {
        let http = Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Response, ClientError> {
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ClientError::Unreachable {
                        url: self.base_url.clone(),
                    }
                } else {
                    ClientError::Http(e)
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => body.error,
            Err(_) if text.trim().is_empty() => status.to_string(),
            Err(_) => text,
        };
        Err(ClientError::Server {
            status: status.as_u16(),
            message,
        })
    }

    async fn post_json<T: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<R, ClientError> {
        self.post(path, body)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Start a chat exchange and return the event stream body
    pub async fn open_chat(
        &self,
        messages: &[ConversationMessage],
    ) -> Result<BoxStream<'static, reqwest::Result<Bytes>>, ClientError> {
        let response = self
            .post("/api/chat", &json!({ "messages": messages }))
            .await?;
        Ok(response.bytes_stream().boxed())
    }

    pub async fn generate_problem(
        &self,
        topic: Option<&str>,
        difficulty: Difficulty,
    ) -> Result<PracticeProblem, ClientError> {
        let request = PracticeRequest::Generate {
            topic: topic.map(String::from),
            difficulty,
        };
        self.post_json("/api/practice", &request).await
    }

    pub async fn check_answer(
        &self,
        problem: &str,
        user_answer: &str,
        correct_answer: &str,
    ) -> Result<Grade, ClientError> {
        let request = PracticeRequest::Check {
            problem: problem.to_string(),
            user_answer: user_answer.to_string(),
            correct_answer: correct_answer.to_string(),
        };
        self.post_json("/api/practice", &request).await
    }
}
