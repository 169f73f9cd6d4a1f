use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tutor::errors::RelayError;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },
    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

// Helper function to format environment variable names
pub fn to_env_var(field_path: &str) -> String {
    // Handle nested fields by converting dots to double underscores
    format!("TUTOR_{}", field_path.replace('.', "__").to_uppercase())
}

/// A failed request, answered as `{"error": ...}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        let status = if err.is_unavailable() {
            StatusCode::SERVICE_UNAVAILABLE
        } else if matches!(err, RelayError::UpstreamProtocol { .. }) {
            StatusCode::BAD_GATEWAY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_env_var() {
        assert_eq!(to_env_var("model.host"), "TUTOR_MODEL__HOST");
        assert_eq!(to_env_var("server.port"), "TUTOR_SERVER__PORT");
    }

    #[test]
    fn test_relay_error_status() {
        let unavailable = ApiError::from(RelayError::UpstreamUnavailable {
            host: "http://localhost:11434".to_string(),
        });
        assert_eq!(unavailable.status, StatusCode::SERVICE_UNAVAILABLE);

        let protocol = ApiError::from(RelayError::UpstreamProtocol {
            status: 500,
            detail: "oom".to_string(),
        });
        assert_eq!(protocol.status, StatusCode::BAD_GATEWAY);
        assert_eq!(protocol.message, "Model server returned 500: oom");

        let other = ApiError::from(RelayError::StreamInterrupted);
        assert_eq!(other.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
