//! Remote document service client.

use crate::config::ReconcileConfig;
use crate::error::{EngineError, EngineResult};
use crate::http::{HttpClient, HttpRequest};
use docsync_protocol::{DocumentEnvelope, DocumentMetadata, PendingOperation, TokenResult};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

/// Header asking the document service to create or replace.
pub const UPSERT_HEADER: &str = "Upsert";

/// Result of a successful create or replace.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteWrite {
    /// Identity and new etag of the stored document.
    pub metadata: DocumentMetadata,
    /// Raw response body, cached locally as the synced document.
    pub body: String,
}

/// Client for document writes against the remote service.
pub struct RemoteDocumentClient<C: HttpClient> {
    endpoint: String,
    timeout: Duration,
    http: Arc<C>,
}

impl<C: HttpClient> RemoteDocumentClient<C> {
    /// Creates a client from the engine configuration.
    pub fn new(config: &ReconcileConfig, http: Arc<C>) -> Self {
        Self {
            endpoint: config.document_endpoint.trim_end_matches('/').to_string(),
            timeout: config.timeout,
            http,
        }
    }

    /// Creates or replaces the document of `operation`.
    ///
    /// # Errors
    ///
    /// Returns the HTTP error for non-2xx answers and
    /// [`EngineError::MalformedResponse`] when a 2xx body is not a document
    /// envelope for this document.
    pub fn upsert(&self, token: &TokenResult, operation: &PendingOperation) -> EngineResult<RemoteWrite> {
        let url = format!(
            "{}/{}/{}",
            self.endpoint,
            encode_segment(&operation.table),
            encode_segment(&operation.partition)
        );
        let request = HttpRequest::post(url)
            .bearer(&token.token)
            .header(UPSERT_HEADER, "true")
            .json(operation.document.clone())
            .timeout(self.timeout);

        let response = self.http.call(request)?.error_for_status()?;
        let envelope = DocumentEnvelope::parse(&response.body)
            .map_err(|e| EngineError::malformed(e.to_string()))?;
        if envelope.id != operation.document_id {
            return Err(EngineError::malformed(format!(
                "expected document '{}', got '{}'",
                operation.document_id, envelope.id
            )));
        }

        Ok(RemoteWrite {
            metadata: envelope.metadata(),
            body: response.body,
        })
    }

    /// Deletes the document of `operation`.
    ///
    /// # Errors
    ///
    /// Returns the HTTP error for non-2xx answers.
    pub fn delete(&self, token: &TokenResult, operation: &PendingOperation) -> EngineResult<()> {
        let url = format!(
            "{}/{}/{}/{}",
            self.endpoint,
            encode_segment(&operation.table),
            encode_segment(&operation.partition),
            encode_segment(&operation.document_id)
        );
        let request = HttpRequest::delete(url)
            .bearer(&token.token)
            .timeout(self.timeout);

        self.http.call(request)?.error_for_status()?;
        Ok(())
    }
}

/// Percent-encodes one URL path segment. Only RFC 3986 unreserved
/// characters pass through.
fn encode_segment(segment: &str) -> String {
    let mut encoded = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            encoded.push(char::from(byte));
        } else {
            let _ = write!(encoded, "%{byte:02X}");
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HttpError;
    use crate::http::{Method, MockHttpClient, AUTHORIZATION};
    use docsync_protocol::OperationKind;

    const PAYLOAD: &str =
        r#"{"id":"doc-1","PartitionKey":"user-1","_etag":"e1","_ts":1,"document":{"a":1}}"#;

    fn client() -> (RemoteDocumentClient<MockHttpClient>, Arc<MockHttpClient>) {
        let http = Arc::new(MockHttpClient::new());
        let config = ReconcileConfig::new("s").with_document_endpoint("https://d/data/");
        (RemoteDocumentClient::new(&config, Arc::clone(&http)), http)
    }

    fn op(kind: OperationKind) -> PendingOperation {
        PendingOperation::new("user", "user-1", "doc-1", kind).with_document(r#"{"a":1}"#)
    }

    #[test]
    fn upsert_posts_document() {
        let (client, http) = client();
        http.respond_with(Method::Post, "/data/user/user-1", 201, PAYLOAD);

        let write = client
            .upsert(&TokenResult::new("user-1", "tok", 1), &op(OperationKind::Create))
            .unwrap();
        assert_eq!(write.metadata, DocumentMetadata::new("doc-1", "user-1", "e1"));
        assert_eq!(write.body, PAYLOAD);

        let request = &http.requests()[0];
        assert_eq!(request.url, "https://d/data/user/user-1");
        assert_eq!(request.header_value(UPSERT_HEADER), Some("true"));
        assert_eq!(request.header_value(AUTHORIZATION), Some("Bearer tok"));
        assert_eq!(request.body.as_deref(), Some(r#"{"a":1}"#));
    }

    #[test]
    fn upsert_rejects_malformed_success() {
        let (client, http) = client();
        http.respond_with(Method::Post, "/data/user", 200, r#"{"id":"doc-1"}"#);

        let err = client
            .upsert(&TokenResult::new("user-1", "tok", 1), &op(OperationKind::Replace))
            .unwrap_err();
        assert!(matches!(err, EngineError::MalformedResponse(_)));
    }

    #[test]
    fn upsert_rejects_other_document() {
        let (client, http) = client();
        http.respond_with(Method::Post, "/data/user", 200, PAYLOAD.replace("doc-1", "doc-2"));

        let err = client
            .upsert(&TokenResult::new("user-1", "tok", 1), &op(OperationKind::Replace))
            .unwrap_err();
        assert!(matches!(err, EngineError::MalformedResponse(_)));
    }

    #[test]
    fn delete_targets_document_url() {
        let (client, http) = client();
        http.respond_with(Method::Delete, "/data/user/user-1/doc-1", 204, "");

        client
            .delete(&TokenResult::new("user-1", "tok", 1), &op(OperationKind::Delete))
            .unwrap();
        let request = &http.requests()[0];
        assert_eq!(request.method, Method::Delete);
        assert!(request.body.is_none());
    }

    #[test]
    fn path_segments_are_percent_encoded() {
        let (client, http) = client();
        http.respond_with(Method::Delete, "/data/", 204, "");

        let operation = PendingOperation::new("user", "user 1", "a/b?c#d%é", OperationKind::Delete);
        client
            .delete(&TokenResult::new("user 1", "tok", 1), &operation)
            .unwrap();
        assert_eq!(
            http.requests()[0].url,
            "https://d/data/user/user%201/a%2Fb%3Fc%23d%25%C3%A9"
        );
    }

    #[test]
    fn encode_segment_keeps_unreserved() {
        assert_eq!(encode_segment("Doc-1_v2.~"), "Doc-1_v2.~");
        assert_eq!(encode_segment(""), "");
    }

    #[test]
    fn non_success_status_is_an_http_error() {
        let (client, http) = client();
        http.respond_with(Method::Delete, "/doc-1", 409, "Conflict");

        let err = client
            .delete(&TokenResult::new("user-1", "tok", 1), &op(OperationKind::Delete))
            .unwrap_err();
        assert_eq!(err.http_error(), Some(&HttpError::status_error(409, "Conflict")));
    }
}
