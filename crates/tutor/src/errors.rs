use thiserror::Error;

/// Failures on the path between the relay and the model server.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("Cannot connect to the model server at {host}. Is Ollama running?")]
    UpstreamUnavailable { host: String },

    #[error("Model server returned {status}: {detail}")]
    UpstreamProtocol { status: u16, detail: String },

    #[error("Stream interrupted")]
    StreamInterrupted,

    #[error("Invalid model server response: {0}")]
    InvalidResponse(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, RelayError::UpstreamUnavailable { .. })
    }
}

pub type RelayResult<T> = Result<T, RelayError>;

/// Failures seen by a client talking to the relay server.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Cannot connect to the tutor server at {url}")]
    Unreachable { url: String },

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message}")]
    Server { status: u16, message: String },

    /// An error event delivered inside the event stream
    #[error("{0}")]
    Relay(String),

    /// The event stream broke off after it had started
    #[error("Connection to the tutor server dropped: {0}")]
    Interrupted(String),

    #[error("Could not decode server response: {0}")]
    Decode(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store contents are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// Matched case-insensitively against failure text.
const SETUP_PATTERNS: &[&str] = &[
    "econnrefused",
    "connection refused",
    "cannot connect",
    "is ollama running",
    "fetch failed",
];

/// True when a failure message means the model server could not be reached,
/// so the user needs setup guidance rather than a generic error.
pub fn needs_setup(message: &str) -> bool {
    let lower = message.to_lowercase();
    SETUP_PATTERNS.iter().any(|pattern| lower.contains(pattern))
}
