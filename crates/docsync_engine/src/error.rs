//! Error types for the reconciliation engine.

use docsync_protocol::ProtocolError;
use std::sync::Arc;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors reported by an [`crate::HttpClient`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    /// The server answered with a non-success status.
    #[error("http status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),
}

impl HttpError {
    /// Creates a status error.
    pub fn status_error(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Returns the HTTP status code, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            HttpError::Network(_) => None,
        }
    }
}

/// Errors that can occur while replaying a pending operation.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Transport or server error.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// No usable token could be obtained for a partition.
    #[error("token exchange failed for partition '{partition}': {source}")]
    TokenExchange {
        /// Partition the token was requested for.
        partition: String,
        /// Underlying failure.
        #[source]
        source: Box<EngineError>,
    },

    /// The server reported success with a payload of the wrong shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// A request body could not be encoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl EngineError {
    /// Creates a malformed response error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse(message.into())
    }

    /// Returns the underlying HTTP error, looking through token exchange
    /// failures.
    pub fn http_error(&self) -> Option<&HttpError> {
        match self {
            EngineError::Http(err) => Some(err),
            EngineError::TokenExchange { source, .. } => source.http_error(),
            _ => None,
        }
    }

    /// Returns the HTTP status code of the underlying failure, if any.
    pub fn status(&self) -> Option<u16> {
        self.http_error().and_then(HttpError::status)
    }
}

/// Failure of one pending operation, as surfaced to listeners.
///
/// The transport or exchange failure is preserved as the error source.
/// Cloning is cheap; the cause is shared.
#[derive(Error, Debug, Clone)]
#[error("document operation failed: {cause}")]
pub struct DocumentError {
    #[source]
    cause: Arc<EngineError>,
}

impl DocumentError {
    /// Wraps an engine error.
    pub fn new(cause: EngineError) -> Self {
        Self {
            cause: Arc::new(cause),
        }
    }

    /// Returns the underlying error.
    pub fn cause(&self) -> &EngineError {
        &self.cause
    }

    /// Returns the HTTP status code of the underlying failure, if any.
    pub fn status(&self) -> Option<u16> {
        self.cause.status()
    }
}

impl From<EngineError> for DocumentError {
    fn from(cause: EngineError) -> Self {
        Self::new(cause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn http_status_accessors() {
        let err = HttpError::status_error(409, "Conflict");
        assert_eq!(err.status(), Some(409));
        assert_eq!(err.to_string(), "http status 409: Conflict");

        assert_eq!(HttpError::Network("reset".into()).status(), None);
    }

    #[test]
    fn token_exchange_status_is_visible() {
        let err = EngineError::TokenExchange {
            partition: "user-1".into(),
            source: Box::new(HttpError::status_error(401, "denied").into()),
        };
        assert_eq!(err.status(), Some(401));
        assert!(err.to_string().contains("user-1"));
        assert!(err.source().is_some());
    }

    #[test]
    fn document_error_keeps_cause() {
        let cause = HttpError::status_error(500, "You failed!");
        let err = DocumentError::new(cause.clone().into());

        assert_eq!(err.status(), Some(500));
        assert_eq!(err.cause().http_error(), Some(&cause));
        assert_eq!(
            err.source().map(|s| s.to_string()),
            Some("http status 500: You failed!".to_string())
        );
    }

    #[test]
    fn malformed_has_no_status() {
        let err = EngineError::malformed("missing _etag");
        assert_eq!(err.status(), None);
        assert_eq!(err.to_string(), "malformed response: missing _etag");
    }
}
