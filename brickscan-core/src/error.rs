use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable classification of a failed recognition attempt.
///
/// This is the value presentation code should branch on; the full
/// [`RecognitionError`] carries the diagnostic payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Endpoint configuration is malformed. No request was sent.
    InvalidUrl,
    /// Transport failure (timeout, connection, TLS).
    Network,
    /// The service answered with a non-2xx status.
    ServerError,
    /// The response body did not match the expected schema.
    Decoding,
    /// Well-formed response with zero candidates.
    NoResults,
}

impl ErrorKind {
    /// Whether this kind indicates a system fault.
    ///
    /// `NoResults` is a legitimate outcome ("nothing found") and should be
    /// presented differently from real failures.
    pub fn is_fault(self) -> bool {
        !matches!(self, Self::NoResults)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidUrl => write!(f, "invalid-url"),
            Self::Network => write!(f, "network"),
            Self::ServerError => write!(f, "server-error"),
            Self::Decoding => write!(f, "decoding"),
            Self::NoResults => write!(f, "no-results"),
        }
    }
}

/// Transport-level failure, independent of the HTTP stack in use.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("timed out after {after:?} waiting for {phase}")]
    Timeout { phase: TimeoutPhase, after: Duration },

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to read response body: {0}")]
    Body(String),
}

/// Which of the two timeouts expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    /// Connection plus response headers (`request_timeout`).
    Response,
    /// The full exchange including the body (`total_timeout`).
    Transfer,
}

impl std::fmt::Display for TimeoutPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Response => write!(f, "response"),
            Self::Transfer => write!(f, "transfer"),
        }
    }
}

/// Every way a single `recognize` call can fail.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecognitionError {
    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    Network(#[source] TransportError),

    #[error("{}", server_error_message(.status, .body))]
    ServerError { status: u16, body: String },

    #[error("Failed to read API response: {}", .body.trim())]
    Decoding { body: String },

    #[error("No results returned by the recognition service.")]
    NoResults,
}

impl RecognitionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUrl(_) => ErrorKind::InvalidUrl,
            Self::Network(_) => ErrorKind::Network,
            Self::ServerError { .. } => ErrorKind::ServerError,
            Self::Decoding { .. } => ErrorKind::Decoding,
            Self::NoResults => ErrorKind::NoResults,
        }
    }

    /// Whether a caller may retry the same input unchanged.
    ///
    /// Transport failures and 5xx responses qualify. 4xx responses need a
    /// different input, decoding failures need a schema fix.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::ServerError { status, .. } => (500..600).contains(status),
            _ => false,
        }
    }

    /// Human-readable message for the history viewer / capture surface.
    pub fn user_message(&self) -> String {
        match self {
            Self::NoResults => "Nothing found. Try another angle or better lighting.".to_string(),
            other => other.to_string(),
        }
    }
}

fn server_error_message(status: &u16, body: &str) -> String {
    let snippet = body.trim();
    if snippet.is_empty() {
        format!("Server error (status: {status}).")
    } else {
        format!("Server error (status: {status}): {snippet}")
    }
}

pub type Result<T> = std::result::Result<T, RecognitionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_message_trims_body() {
        let err = RecognitionError::ServerError {
            status: 503,
            body: "  down for maintenance \n".into(),
        };
        assert_eq!(
            err.to_string(),
            "Server error (status: 503): down for maintenance"
        );
    }

    #[test]
    fn test_server_error_message_without_body() {
        let err = RecognitionError::ServerError {
            status: 404,
            body: String::new(),
        };
        assert_eq!(err.to_string(), "Server error (status: 404).");
    }

    #[test]
    fn test_network_message_includes_cause() {
        let err = RecognitionError::Network(TransportError::Timeout {
            phase: TimeoutPhase::Response,
            after: Duration::from_secs(30),
        });
        assert_eq!(
            err.to_string(),
            "Network error: timed out after 30s waiting for response"
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(RecognitionError::Network(TransportError::Connect("refused".into())).is_retryable());
        assert!(RecognitionError::ServerError {
            status: 502,
            body: String::new()
        }
        .is_retryable());
        assert!(!RecognitionError::ServerError {
            status: 400,
            body: String::new()
        }
        .is_retryable());
        assert!(!RecognitionError::NoResults.is_retryable());
        assert!(!RecognitionError::Decoding { body: "x".into() }.is_retryable());
    }

    #[test]
    fn test_no_results_is_not_a_fault() {
        assert!(!RecognitionError::NoResults.kind().is_fault());
        assert!(RecognitionError::InvalidUrl(String::new()).kind().is_fault());
        assert_ne!(
            RecognitionError::NoResults.user_message(),
            RecognitionError::Decoding { body: String::new() }.user_message()
        );
    }
}
