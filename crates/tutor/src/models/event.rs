use serde::Deserialize;
use serde_json::json;

pub const DONE_SENTINEL: &str = "[DONE]";

/// A unit of the relay's outbound event stream.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayEvent {
    /// A transformed content fragment
    Token(String),
    /// Terminal failure
    Error(String),
    /// End of stream
    #[serde(skip)]
    Done,
}

impl RelayEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RelayEvent::Token(_))
    }

    /// Encode as a `data: ...` frame terminated by a blank line
    pub fn to_frame(&self) -> String {
        let data = match self {
            RelayEvent::Token(token) => json!({ "token": token }).to_string(),
            RelayEvent::Error(error) => json!({ "error": error }).to_string(),
            RelayEvent::Done => DONE_SENTINEL.to_string(),
        };
        format!("data: {}\n\n", data)
    }

    /// Decode one frame (without its trailing blank line).
    ///
    /// Empty and unparseable frames yield `None`.
    pub fn from_frame(frame: &str) -> Option<RelayEvent> {
        let data = frame
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(|data| data.strip_prefix(' ').unwrap_or(data))
            .collect::<Vec<_>>()
            .join("\n");
        let data = data.trim();

        if data.is_empty() {
            return None;
        }
        if data == DONE_SENTINEL {
            return Some(RelayEvent::Done);
        }
        match serde_json::from_str(data) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::debug!("Skipping undecodable event frame: {}", e);
                None
            }
        }
    }
}
