//! Partition tokens.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};

/// Outcome reported by the token exchange service for one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
    /// Token was issued.
    Succeed,
    /// Token was refused.
    Failed,
}

/// A short-lived authorization token scoped to one partition.
///
/// A token is usable only while `now < ttl`. Expired tokens are never
/// evicted eagerly; callers check [`TokenResult::is_valid_at`] on read.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResult {
    /// Partition the token grants access to.
    #[serde(default)]
    pub partition: String,
    /// Bearer token.
    #[serde(default)]
    pub token: String,
    /// Exchange status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TokenStatus>,
    /// Absolute expiry (epoch millis).
    #[serde(default)]
    pub ttl: i64,
}

impl TokenResult {
    /// Creates a successful token.
    pub fn new(partition: impl Into<String>, token: impl Into<String>, ttl: i64) -> Self {
        Self {
            partition: partition.into(),
            token: token.into(),
            status: Some(TokenStatus::Succeed),
            ttl,
        }
    }

    /// Sets the partition.
    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = partition.into();
        self
    }

    /// Sets the bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    /// Sets the absolute expiry.
    pub fn with_ttl(mut self, ttl: i64) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the status.
    pub fn with_status(mut self, status: TokenStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Returns true if the token can still be used at `now_millis`.
    pub fn is_valid_at(&self, now_millis: i64) -> bool {
        now_millis < self.ttl
    }

    /// Returns true if the exchange service reported success.
    pub fn is_succeeded(&self) -> bool {
        self.status == Some(TokenStatus::Succeed)
    }
}

/// Body of a token exchange request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokensRequest {
    /// Partitions to obtain tokens for.
    pub partitions: Vec<String>,
}

impl TokensRequest {
    /// Creates a request for a single partition.
    pub fn single(partition: impl Into<String>) -> Self {
        Self {
            partitions: vec![partition.into()],
        }
    }

    /// Encodes to JSON.
    pub fn to_json(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Body of a token exchange response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokensResponse {
    /// Issued tokens, one per requested partition.
    #[serde(default)]
    pub tokens: Vec<TokenResult>,
}

impl TokensResponse {
    /// Creates a response with the given tokens.
    pub fn new(tokens: Vec<TokenResult>) -> Self {
        Self { tokens }
    }

    /// Decodes from JSON.
    pub fn from_json(body: &str) -> ProtocolResult<Self> {
        Ok(serde_json::from_str(body)?)
    }

    /// Encodes to JSON.
    pub fn to_json(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Returns the first token if it was issued successfully.
    pub fn into_first_token(self) -> ProtocolResult<TokenResult> {
        let token = self
            .tokens
            .into_iter()
            .next()
            .ok_or_else(|| ProtocolError::malformed_tokens("no tokens in response"))?;

        if !token.is_succeeded() {
            return Err(ProtocolError::malformed_tokens(format!(
                "token for partition '{}' was not issued: {:?}",
                token.partition, token.status
            )));
        }
        if token.token.is_empty() {
            return Err(ProtocolError::malformed_tokens("empty token"));
        }
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validity_is_strict() {
        let token = TokenResult::new("read-only", "mock", 1_000);
        assert!(token.is_valid_at(999));
        assert!(!token.is_valid_at(1_000));
        assert!(!token.is_valid_at(1_001));
    }

    #[test]
    fn response_json_shape() {
        let body = r#"{"tokens":[{"partition":"user-1","token":"abc","status":"Succeed","ttl":42}]}"#;
        let response = TokensResponse::from_json(body).unwrap();
        let token = response.into_first_token().unwrap();

        assert_eq!(token.partition, "user-1");
        assert_eq!(token.token, "abc");
        assert_eq!(token.ttl, 42);
    }

    #[test]
    fn cached_token_without_status_decodes() {
        let body = r#"{"partition":"read-only","token":"mock","ttl":10}"#;
        let token: TokenResult = serde_json::from_str(body).unwrap();
        assert!(token.status.is_none());
        assert!(token.is_valid_at(9));
    }

    #[test]
    fn first_token_rejects_failures() {
        let empty = TokensResponse::default();
        assert!(empty.into_first_token().is_err());

        let failed = TokensResponse::new(vec![
            TokenResult::new("p", "t", 1).with_status(TokenStatus::Failed)
        ]);
        assert!(matches!(
            failed.into_first_token(),
            Err(ProtocolError::MalformedTokens(_))
        ));

        let blank = TokensResponse::new(vec![TokenResult::new("p", "", 1)]);
        assert!(blank.into_first_token().is_err());
    }

    #[test]
    fn request_json() {
        let json = TokensRequest::single("user-1").to_json().unwrap();
        assert_eq!(json, r#"{"partitions":["user-1"]}"#);
    }
}
