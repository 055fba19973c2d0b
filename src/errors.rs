use reqwest::StatusCode;
use thiserror::Error;

use crate::models::ChatEvent;

const BODY_EXCERPT_CHARS: usize = 400;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("missing API credential for provider {0}")]
    MissingCredential(String),
    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },
    #[error("response body is empty")]
    EmptyBody,
    #[error("network error: {0}")]
    Network(String),
    #[error("exchange cancelled")]
    Cancelled,
    #[error("malformed payload: {0}")]
    Parse(String),
    #[error("local runtime error: {0}")]
    Runtime(String),
    #[error("{0}")]
    Exchange(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ChatError {
    pub fn http_status(status: StatusCode, body: &str) -> Self {
        let reason = status.canonical_reason().unwrap_or("unknown status");
        let excerpt = body.trim().chars().take(BODY_EXCERPT_CHARS).collect::<String>();
        let message = if excerpt.is_empty() {
            reason.to_owned()
        } else {
            format!("{reason} - {excerpt}")
        };
        ChatError::HttpStatus {
            status: status.as_u16(),
            message,
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ChatError::Network(format!("timed out: {error}"))
        } else {
            ChatError::Network(error.to_string())
        }
    }
}

impl From<ChatError> for ChatEvent {
    fn from(error: ChatError) -> Self {
        ChatEvent::Error(error.to_string())
    }
}
