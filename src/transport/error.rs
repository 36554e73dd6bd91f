//! Transport Error Types
//!
//! Error handling for backend calls and the push channel

use thiserror::Error;

/// Transport-specific errors
#[derive(Error, Debug)]
pub enum TransportError {
    // Connection errors
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out after {0}ms")]
    ConnectionTimeout(u64),

    #[error("No session id received within {0}ms")]
    SessionUnavailable(u64),

    // HTTP errors
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Request error: {0}")]
    Request(String),

    // Protocol errors
    #[error("Callback '{name}' is not advertised by the server (available: {advertised:?})")]
    UnadvertisedCallback {
        name: String,
        advertised: Vec<String>,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid push frame: {0}")]
    InvalidFrame(String),

    #[error("Request {0} was abandoned before it finished")]
    Abandoned(String),

    // Configuration errors
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Timeouts are mapped by the client, which knows the configured limit
impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            TransportError::ConnectionFailed(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

impl From<url::ParseError> for TransportError {
    fn from(err: url::ParseError) -> Self {
        TransportError::InvalidUrl(err.to_string())
    }
}

/// Result type alias for transport operations
pub type TransportResult<T> = Result<T, TransportError>;
