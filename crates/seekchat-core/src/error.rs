use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Failure talking to the chat, upload or balance endpoints.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The service explained what went wrong.
    #[error("{0}")]
    Api(String),
    #[error("request failed with status {status}")]
    Status { status: StatusCode, body: String },
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl ApiError {
    /// Build from a non-success response, lifting the service's own message
    /// out of an OpenAI-style `{"error": {"message": ...}}` body when present.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(envelope) if !envelope.error.message.is_empty() => {
                ApiError::Api(format!("{} ({})", envelope.error.message, status.as_u16()))
            }
            _ => ApiError::Status { status, body },
        }
    }

    /// Message fit for a notification, or `None` when the error carries no
    /// description worth showing and a generic fallback should be used.
    pub fn description(&self) -> Option<String> {
        match self {
            ApiError::Api(message) => Some(message.clone()),
            ApiError::Status { status, .. } => match *status {
                StatusCode::UNAUTHORIZED => Some("Invalid API key".to_string()),
                StatusCode::PAYMENT_REQUIRED => Some("Insufficient balance".to_string()),
                StatusCode::TOO_MANY_REQUESTS => Some("Rate limit reached, slow down".to_string()),
                _ => None,
            },
            ApiError::Transport(e) if e.is_timeout() => Some("Request timed out".to_string()),
            ApiError::Transport(e) if e.is_connect() => {
                Some("Could not connect to the API".to_string())
            }
            ApiError::Transport(_) | ApiError::Decode(_) => None,
        }
    }
}
