//! Remote document payloads and metadata.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};

/// Identity and version of a document after a successful replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    /// Document ID.
    pub document_id: String,
    /// Partition name.
    pub partition: String,
    /// Fresh etag. Absent for deletes.
    #[serde(default, rename = "eTag", skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl DocumentMetadata {
    /// Creates metadata for a document that still exists remotely.
    pub fn new(
        document_id: impl Into<String>,
        partition: impl Into<String>,
        etag: impl Into<String>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            partition: partition.into(),
            etag: Some(etag.into()),
        }
    }

    /// Creates metadata for a deleted document.
    pub fn deleted(document_id: impl Into<String>, partition: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            partition: partition.into(),
            etag: None,
        }
    }
}

/// Success payload returned by the remote store for creates and replaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEnvelope {
    /// Document ID.
    #[serde(default)]
    pub id: String,
    /// Partition name.
    #[serde(rename = "PartitionKey", default)]
    pub partition: String,
    /// Version marker.
    #[serde(rename = "_etag", default)]
    pub etag: String,
    /// Server timestamp (epoch seconds).
    #[serde(rename = "_ts", default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// Document body.
    #[serde(default)]
    pub document: serde_json::Value,
}

impl DocumentEnvelope {
    /// Parses and validates a response body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not JSON or lacks a non-empty `id`,
    /// `PartitionKey` or `_etag`.
    pub fn parse(body: &str) -> ProtocolResult<Self> {
        let envelope: DocumentEnvelope = serde_json::from_str(body)?;

        if envelope.id.is_empty() {
            return Err(ProtocolError::malformed_document("missing id"));
        }
        if envelope.partition.is_empty() {
            return Err(ProtocolError::malformed_document("missing PartitionKey"));
        }
        if envelope.etag.is_empty() {
            return Err(ProtocolError::malformed_document("missing _etag"));
        }
        Ok(envelope)
    }

    /// Returns the metadata reported to listeners.
    pub fn metadata(&self) -> DocumentMetadata {
        DocumentMetadata::new(&self.id, &self.partition, &self.etag)
    }
}
