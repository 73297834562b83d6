//! Error types for protocol decoding.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding or decoding wire types.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The payload is not valid JSON for the expected type.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A document payload is missing required fields.
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    /// A token exchange payload is missing required fields.
    #[error("malformed tokens response: {0}")]
    MalformedTokens(String),
}

impl ProtocolError {
    /// Creates a malformed document error.
    pub fn malformed_document(message: impl Into<String>) -> Self {
        Self::MalformedDocument(message.into())
    }

    /// Creates a malformed tokens error.
    pub fn malformed_tokens(message: impl Into<String>) -> Self {
        Self::MalformedTokens(message.into())
    }
}
