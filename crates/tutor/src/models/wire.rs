use serde::{Deserialize, Serialize};

use super::role::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelRole {
    System,
    User,
    Assistant,
}

impl From<Role> for ModelRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => ModelRole::User,
            Role::Assistant => ModelRole::Assistant,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelMessage {
    pub role: ModelRole,
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl ModelMessage {
    pub fn new<S: Into<String>>(role: ModelRole, content: S) -> Self {
        ModelMessage {
            role,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn with_image<S: Into<String>>(mut self, data: S) -> Self {
        self.images.push(data.into());
        self
    }
}

/// Generation parameters, fixed per kind of request
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelOptions {
    pub temperature: f32,
    #[serde(rename = "num_predict")]
    pub max_tokens: u32,
}

impl ModelOptions {
    pub const CHAT: ModelOptions = ModelOptions {
        temperature: 0.3,
        max_tokens: 2048,
    };

    pub const PRACTICE_GENERATE: ModelOptions = ModelOptions {
        temperature: 0.7,
        max_tokens: 512,
    };

    pub const PRACTICE_CHECK: ModelOptions = ModelOptions {
        temperature: 0.1,
        max_tokens: 512,
    };
}

/// Body of `POST {host}/api/chat`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelRequest {
    pub model: String,
    pub messages: Vec<ModelMessage>,
    pub stream: bool,
    pub options: ModelOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FrameMessage {
    #[serde(default)]
    pub content: String,
}

/// One newline-delimited JSON object from the model server.
///
/// A non-streaming reply has the same shape, delivered as a single object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StreamFrame {
    #[serde(default)]
    pub message: Option<FrameMessage>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl StreamFrame {
    /// The content fragment, if the frame carries a non-empty one
    pub fn content(&self) -> Option<&str> {
        self.message
            .as_ref()
            .map(|message| message.content.as_str())
            .filter(|content| !content.is_empty())
    }
}
