//! Configuration for the reconciliation engine.

use std::time::Duration;

/// Default token exchange endpoint.
pub const DEFAULT_TOKEN_EXCHANGE_URL: &str = "https://tokens.docsync.example/data/tokens";
/// Default document endpoint.
pub const DEFAULT_DOCUMENT_ENDPOINT: &str = "https://documents.docsync.example/data";

/// Configuration for reconciliation passes.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Application secret sent with every token exchange.
    pub app_secret: String,
    /// Token exchange endpoint.
    pub token_exchange_url: String,
    /// Base URL of the document service.
    pub document_endpoint: String,
    /// Number of tables reconciled at the same time.
    pub table_parallelism: usize,
    /// Request timeout hint passed to the HTTP client.
    pub timeout: Duration,
}

impl ReconcileConfig {
    /// Creates a configuration for the given application secret using the
    /// default endpoints.
    pub fn new(app_secret: impl Into<String>) -> Self {
        Self {
            app_secret: app_secret.into(),
            token_exchange_url: DEFAULT_TOKEN_EXCHANGE_URL.to_string(),
            document_endpoint: DEFAULT_DOCUMENT_ENDPOINT.to_string(),
            table_parallelism: 1,
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the token exchange endpoint.
    pub fn with_token_exchange_url(mut self, url: impl Into<String>) -> Self {
        self.token_exchange_url = url.into();
        self
    }

    /// Sets the document endpoint.
    pub fn with_document_endpoint(mut self, url: impl Into<String>) -> Self {
        self.document_endpoint = url.into();
        self
    }

    /// Sets how many tables may be reconciled concurrently. Zero is treated
    /// as one.
    pub fn with_table_parallelism(mut self, tables: usize) -> Self {
        self.table_parallelism = tables.max(1);
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self::new("")
    }
}
