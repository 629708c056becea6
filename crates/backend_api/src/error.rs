use std::fmt;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Error as JsonError;

/// Transport error taxonomy for backend requests.
///
/// `Unauthorized` is deliberately separate from every transient variant:
/// callers remove credentials only on an explicit unauthorized response,
/// never on a timeout or connection failure.
#[derive(Debug)]
pub enum BackendApiError {
    MissingToken,
    InvalidBaseUrl(String),
    Request(reqwest::Error),
    Status(StatusCode, String),
    Unauthorized(String),
    Serde(JsonError),
    RetryExhausted {
        status: Option<StatusCode>,
        last_error: Option<String>,
    },
    StreamFailed {
        message: String,
    },
    Cancelled,
    Unknown(String),
}

impl BackendApiError {
    /// True for failures that must not mutate persisted credential or
    /// session state (timeouts, refused connections, aborted transfers).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Request(_) | Self::RetryExhausted { .. } | Self::StreamFailed { .. }
        )
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayload {
    #[serde(rename = "error")]
    pub value: Option<ErrorPayloadFields>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayloadFields {
    pub message: Option<String>,
}

impl fmt::Display for BackendApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingToken => write!(f, "backend token is required"),
            Self::InvalidBaseUrl(value) => write!(f, "invalid base URL: {value}"),
            Self::Request(error) => write!(f, "request error: {error}"),
            Self::Status(status, message) => write!(f, "HTTP {status} {message}"),
            Self::Unauthorized(message) => write!(f, "unauthorized: {message}"),
            Self::Serde(error) => write!(f, "serialization error: {error}"),
            Self::RetryExhausted { status, last_error } => {
                let status = status
                    .map(|status| status.as_u16().to_string())
                    .unwrap_or_else(|| "n/a".to_owned());
                write!(
                    f,
                    "retry exhausted after max attempts (status: {status}, last_error: {last_error:?})"
                )
            }
            Self::StreamFailed { message } => write!(f, "stream failed: {message}"),
            Self::Cancelled => write!(f, "request was cancelled"),
            Self::Unknown(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for BackendApiError {}

impl From<reqwest::Error> for BackendApiError {
    fn from(error: reqwest::Error) -> Self {
        Self::Request(error)
    }
}

impl From<JsonError> for BackendApiError {
    fn from(error: JsonError) -> Self {
        Self::Serde(error)
    }
}

/// Extract a human-readable message from an error response body.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorPayload>(body) {
        if let Some(message) = parsed.value.and_then(|fields| fields.message) {
            if !message.trim().is_empty() {
                return message;
            }
        }
    }

    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::{parse_error_message, BackendApiError};

    #[test]
    fn parse_error_message_prefers_payload_message() {
        let body = r#"{"error":{"message":"token expired"}}"#;
        assert_eq!(
            parse_error_message(StatusCode::UNAUTHORIZED, body),
            "token expired"
        );
    }

    #[test]
    fn parse_error_message_falls_back_to_body_then_reason() {
        assert_eq!(
            parse_error_message(StatusCode::BAD_GATEWAY, "upstream gone"),
            "upstream gone"
        );
        assert_eq!(
            parse_error_message(StatusCode::BAD_GATEWAY, ""),
            "Bad Gateway"
        );
    }

    #[test]
    fn unauthorized_is_not_transient() {
        assert!(!BackendApiError::Unauthorized("401".to_string()).is_transient());
        assert!(BackendApiError::RetryExhausted {
            status: None,
            last_error: None,
        }
        .is_transient());
    }
}
