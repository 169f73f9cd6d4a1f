use super::role::Role;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Text,
}

/// A file the user attached to one of their messages.
///
/// `payload` holds a base64 data URI for images and the decoded file text otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub kind: AttachmentKind,
    pub payload: String,
}

impl Attachment {
    pub fn image<S: Into<String>, T: Into<String>>(name: S, payload: T) -> Self {
        Attachment {
            name: name.into(),
            kind: AttachmentKind::Image,
            payload: payload.into(),
        }
    }

    pub fn text<S: Into<String>, T: Into<String>>(name: S, payload: T) -> Self {
        Attachment {
            name: name.into(),
            kind: AttachmentKind::Text,
            payload: payload.into(),
        }
    }

    pub fn is_image(&self) -> bool {
        self.kind == AttachmentKind::Image
    }

    /// The payload without any `data:<mime>;base64,` prefix
    pub fn image_data(&self) -> &str {
        if self.payload.starts_with("data:") {
            if let Some((_, data)) = self.payload.split_once(',') {
                return data;
            }
        }
        &self.payload
    }
}

/// One turn of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

impl ConversationMessage {
    pub fn user<S: Into<String>>(text: S) -> Self {
        ConversationMessage {
            role: Role::User,
            text: text.into(),
            attachment: None,
        }
    }

    pub fn assistant<S: Into<String>>(text: S) -> Self {
        ConversationMessage {
            role: Role::Assistant,
            text: text.into(),
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    pub fn has_image(&self) -> bool {
        self.role == Role::User && self.attachment.as_ref().is_some_and(Attachment::is_image)
    }
}
