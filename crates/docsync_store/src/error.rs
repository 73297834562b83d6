//! Error types for store operations.

use docsync_protocol::OperationKey;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A value could not be serialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The snapshot file exists but cannot be decoded.
    #[error("store corrupted: {0}")]
    Corrupted(String),

    /// Another process holds the store lock.
    #[error("store locked by another process: {}", .0.display())]
    Locked(PathBuf),

    /// The row to update does not exist.
    #[error("row not found: {0}")]
    NotFound(OperationKey),

    /// The row was rewritten after it was read for replay.
    #[error("row changed since it was read: {0}")]
    Superseded(OperationKey),
}
