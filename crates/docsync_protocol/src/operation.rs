//! Pending operations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of an offline mutation.
///
/// The wire form is an upper-case string. Strings outside the known set
/// decode to [`OperationKind::Unknown`] and keep their raw value so that a
/// store written by another client version survives a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperationKind {
    /// Document was created locally.
    Create,
    /// Document was replaced locally.
    Replace,
    /// Document was deleted locally.
    Delete,
    /// Unrecognized kind. Never replayed.
    Unknown(String),
}

impl OperationKind {
    /// Wire value for [`OperationKind::Create`].
    pub const CREATE: &'static str = "CREATE";
    /// Wire value for [`OperationKind::Replace`].
    pub const REPLACE: &'static str = "REPLACE";
    /// Wire value for [`OperationKind::Delete`].
    pub const DELETE: &'static str = "DELETE";

    /// Parses a wire value.
    pub fn parse(value: &str) -> Self {
        match value {
            Self::CREATE => OperationKind::Create,
            Self::REPLACE => OperationKind::Replace,
            Self::DELETE => OperationKind::Delete,
            other => OperationKind::Unknown(other.to_string()),
        }
    }

    /// Returns the wire value.
    pub fn as_str(&self) -> &str {
        match self {
            OperationKind::Create => Self::CREATE,
            OperationKind::Replace => Self::REPLACE,
            OperationKind::Delete => Self::DELETE,
            OperationKind::Unknown(raw) => raw,
        }
    }

    /// Returns true for kinds that can be replayed against the remote store.
    pub fn is_supported(&self) -> bool {
        !matches!(self, OperationKind::Unknown(_))
    }

    /// Returns true for kinds replayed as an upsert.
    pub fn is_upsert(&self) -> bool {
        matches!(self, OperationKind::Create | OperationKind::Replace)
    }
}

impl From<String> for OperationKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            Self::CREATE => OperationKind::Create,
            Self::REPLACE => OperationKind::Replace,
            Self::DELETE => OperationKind::Delete,
            _ => OperationKind::Unknown(value),
        }
    }
}

impl From<OperationKind> for String {
    fn from(kind: OperationKind) -> Self {
        match kind {
            OperationKind::Unknown(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a locally cached document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationKey {
    /// Table name.
    pub table: String,
    /// Partition name.
    pub partition: String,
    /// Document ID.
    pub document_id: String,
}

impl OperationKey {
    /// Creates a new key.
    pub fn new(
        table: impl Into<String>,
        partition: impl Into<String>,
        document_id: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            partition: partition.into(),
            document_id: document_id.into(),
        }
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.table, self.partition, self.document_id)
    }
}

/// A locally cached document, possibly carrying an offline mutation.
///
/// # Fields
///
/// - `table`, `partition`, `document_id`: identity, never changed
/// - `operation`: pending mutation, `None` once replayed
/// - `document`: JSON payload as last known locally
/// - `etag`: remote version marker of the cached copy
/// - `expiration_time`: epoch millis after which the operation is abandoned
/// - `downloaded_at`: epoch millis when the cached copy was last refreshed
/// - `operation_time`: epoch millis when the local mutation was recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOperation {
    /// Table name.
    pub table: String,
    /// Pending mutation, if any.
    #[serde(default)]
    pub operation: Option<OperationKind>,
    /// Partition name.
    pub partition: String,
    /// Document ID.
    pub document_id: String,
    /// Serialized document.
    #[serde(default)]
    pub document: String,
    /// Remote version marker.
    #[serde(default, rename = "eTag", skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Expiration time (epoch millis).
    pub expiration_time: i64,
    /// Last refresh time of the cached copy (epoch millis).
    #[serde(default)]
    pub downloaded_at: i64,
    /// Time of the local mutation (epoch millis).
    #[serde(default)]
    pub operation_time: i64,
}

impl PendingOperation {
    /// Creates a pending operation with an empty document and no expiration.
    pub fn new(
        table: impl Into<String>,
        partition: impl Into<String>,
        document_id: impl Into<String>,
        operation: OperationKind,
    ) -> Self {
        Self {
            table: table.into(),
            operation: Some(operation),
            partition: partition.into(),
            document_id: document_id.into(),
            document: String::new(),
            etag: None,
            expiration_time: i64::MAX,
            downloaded_at: 0,
            operation_time: 0,
        }
    }

    /// Sets the serialized document.
    pub fn with_document(mut self, document: impl Into<String>) -> Self {
        self.document = document.into();
        self
    }

    /// Sets the etag of the cached copy.
    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    /// Sets the expiration time.
    pub fn with_expiration_time(mut self, expiration_time: i64) -> Self {
        self.expiration_time = expiration_time;
        self
    }

    /// Sets the bookkeeping timestamps.
    pub fn with_timestamps(mut self, downloaded_at: i64, operation_time: i64) -> Self {
        self.downloaded_at = downloaded_at;
        self.operation_time = operation_time;
        self
    }

    /// Returns the identity of this row.
    pub fn key(&self) -> OperationKey {
        OperationKey::new(&self.table, &self.partition, &self.document_id)
    }

    /// Returns true if this row still carries a mutation.
    pub fn is_pending(&self) -> bool {
        self.operation.is_some()
    }

    /// Returns true if `expiration_time < now_millis`.
    pub fn is_expired(&self, now_millis: i64) -> bool {
        self.expiration_time < now_millis
    }

    /// Records a successful replay: refreshes the cached copy and clears the
    /// mutation so the row is not replayed again.
    pub fn mark_synced(&mut self, document: String, etag: Option<String>, now_millis: i64) {
        self.document = document;
        self.etag = etag;
        self.operation = None;
        self.downloaded_at = now_millis;
    }
}
