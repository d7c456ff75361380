//! Error types for the chat-room client

use thiserror::Error;

/// Result type alias for chat-room client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the chat-room client
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The payload segment of a stored credential could not be decoded
    #[error("Malformed credential: {0}")]
    MalformedCredential(String),

    /// The call was never dispatched because its credential could not be renewed
    #[error("Call abandoned: access credential could not be renewed")]
    CallAbandoned,

    #[error("Call cancelled")]
    Cancelled,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map a non-success HTTP status to an error
    pub fn from_status(status: reqwest::StatusCode, message: String) -> Self {
        match status {
            reqwest::StatusCode::UNAUTHORIZED => Error::Unauthorized(message),
            _ => Error::Api {
                status: status.as_u16(),
                message,
            },
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_unauthorized() {
        let err = Error::from_status(reqwest::StatusCode::UNAUTHORIZED, "nope".to_string());
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[test]
    fn test_from_status_other() {
        let err = Error::from_status(reqwest::StatusCode::CONFLICT, "taken".to_string());
        match err {
            Error::Api { status, message } => {
                assert_eq!(status, 409);
                assert_eq!(message, "taken");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validation_display() {
        let err = Error::Validation(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(err.to_string(), "Validation failed: a; b");
    }
}
