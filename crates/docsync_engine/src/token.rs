//! Partition token exchange and caching.

use crate::config::ReconcileConfig;
use crate::error::{EngineError, EngineResult};
use crate::http::{HttpClient, HttpRequest};
use docsync_protocol::{TokenResult, TokensRequest, TokensResponse};
use docsync_store::TokenStore;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Header carrying the application secret on token exchange requests.
pub const APP_SECRET_HEADER: &str = "App-Secret";

/// Client for the token exchange endpoint.
pub struct TokenExchangeClient<C: HttpClient> {
    url: String,
    app_secret: String,
    timeout: Duration,
    http: Arc<C>,
}

impl<C: HttpClient> TokenExchangeClient<C> {
    /// Creates a client from the engine configuration.
    pub fn new(config: &ReconcileConfig, http: Arc<C>) -> Self {
        Self {
            url: config.token_exchange_url.clone(),
            app_secret: config.app_secret.clone(),
            timeout: config.timeout,
            http,
        }
    }

    /// Requests a token for one partition.
    ///
    /// `account_token` is sent as a bearer credential when present; without
    /// it the request is anonymous.
    ///
    /// # Errors
    ///
    /// Returns the transport error, or [`EngineError::MalformedResponse`] if
    /// the first token in the answer was not issued.
    pub fn exchange(&self, partition: &str, account_token: Option<&str>) -> EngineResult<TokenResult> {
        let body = TokensRequest::single(partition).to_json()?;
        let mut request = HttpRequest::post(&self.url)
            .header(APP_SECRET_HEADER, &self.app_secret)
            .json(body)
            .timeout(self.timeout);
        if let Some(account_token) = account_token {
            request = request.bearer(account_token);
        }

        let response = self.http.call(request)?.error_for_status()?;
        let mut token = TokensResponse::from_json(&response.body)
            .and_then(TokensResponse::into_first_token)
            .map_err(|e| EngineError::malformed(e.to_string()))?;

        if token.partition.is_empty() {
            token.partition = partition.to_string();
        }
        Ok(token)
    }
}

/// Cache-then-exchange token source.
///
/// A cached token is returned while it is valid. Otherwise one exchange is
/// performed and its result written back to the cache. The cache is best
/// effort: read and write failures are logged and never fail a lookup.
pub struct TokenProvider<K: TokenStore, C: HttpClient> {
    cache: Arc<K>,
    exchange: TokenExchangeClient<C>,
    account_token: RwLock<Option<String>>,
}

impl<K: TokenStore, C: HttpClient> TokenProvider<K, C> {
    /// Creates a provider backed by `cache`.
    pub fn new(config: &ReconcileConfig, cache: Arc<K>, http: Arc<C>) -> Self {
        Self {
            cache,
            exchange: TokenExchangeClient::new(config, http),
            account_token: RwLock::new(None),
        }
    }

    /// Sets or clears the account authorization used for exchanges.
    pub fn set_account_token(&self, token: Option<String>) {
        *self.account_token.write() = token;
    }

    /// Returns a token for `partition` that is valid at `now_millis`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TokenExchange`] if the cache has no valid
    /// token and the exchange fails.
    pub fn get_token(&self, partition: &str, now_millis: i64) -> EngineResult<TokenResult> {
        match self.cache.load(partition) {
            Ok(Some(token)) if token.is_valid_at(now_millis) => {
                debug!(partition, "using cached token");
                return Ok(token);
            }
            Ok(Some(token)) => {
                debug!(partition, ttl = token.ttl, "cached token expired");
            }
            Ok(None) => {}
            Err(e) => {
                warn!(partition, error = %e, "failed to read token cache");
            }
        }

        let account_token = self.account_token.read().clone();
        let token = self
            .exchange
            .exchange(partition, account_token.as_deref())
            .map_err(|e| EngineError::TokenExchange {
                partition: partition.to_string(),
                source: Box::new(e),
            })?;

        if let Err(e) = self.cache.save(&token) {
            warn!(partition, error = %e, "failed to cache token");
        }
        debug!(partition, ttl = token.ttl, "exchanged token");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HttpError;
    use crate::http::{Method, MockHttpClient, AUTHORIZATION};
    use docsync_protocol::TokenStatus;
    use docsync_store::MemoryTokenStore;

    const NOW: i64 = 1_000_000;

    fn tokens_body(token: TokenResult) -> String {
        TokensResponse::new(vec![token]).to_json().unwrap()
    }

    fn provider(
        cache: MemoryTokenStore,
    ) -> (TokenProvider<MemoryTokenStore, MockHttpClient>, Arc<MockHttpClient>) {
        let http = Arc::new(MockHttpClient::new());
        let config = ReconcileConfig::new("app-secret").with_token_exchange_url("https://t/tokens");
        (
            TokenProvider::new(&config, Arc::new(cache), Arc::clone(&http)),
            http,
        )
    }

    #[test]
    fn exchanges_when_cache_is_empty() {
        let (provider, http) = provider(MemoryTokenStore::new());
        http.respond_with(
            Method::Post,
            "/tokens",
            200,
            tokens_body(TokenResult::default().with_status(TokenStatus::Succeed).with_token("mock")),
        );

        let token = provider.get_token("read-only", NOW).unwrap();
        assert_eq!(token.token, "mock");
        assert_eq!(token.partition, "read-only");

        let requests = http.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].header_value(APP_SECRET_HEADER), Some("app-secret"));
        assert_eq!(requests[0].header_value(AUTHORIZATION), None);
        assert_eq!(requests[0].body.as_deref(), Some(r#"{"partitions":["read-only"]}"#));

        let cached = provider.cache.load("read-only").unwrap().unwrap();
        assert_eq!(cached.token, "mock");
    }

    #[test]
    fn valid_cached_token_skips_exchange() {
        let cached = TokenResult::default()
            .with_partition("read-only")
            .with_token("mock")
            .with_ttl(NOW + 1_000);
        let (provider, http) = provider(MemoryTokenStore::with_token(cached));

        let token = provider.get_token("read-only", NOW).unwrap();
        assert_eq!(token.token, "mock");
        assert_eq!(http.request_count(), 0);
    }

    #[test]
    fn expired_cached_token_is_replaced() {
        let cached = TokenResult::new("read-only", "invalid", NOW - 1_000);
        let (provider, http) = provider(MemoryTokenStore::with_token(cached));
        http.respond_with(
            Method::Post,
            "/tokens",
            200,
            tokens_body(TokenResult::new("read-only", "mock", NOW + 60_000)),
        );

        let token = provider.get_token("read-only", NOW).unwrap();
        assert_eq!(token.token, "mock");
        assert_eq!(http.request_count(), 1);

        provider.get_token("read-only", NOW + 1).unwrap();
        assert_eq!(http.request_count(), 1);
    }

    #[test]
    fn account_token_is_sent_as_bearer() {
        let (provider, http) = provider(MemoryTokenStore::new());
        http.respond_with(
            Method::Post,
            "/tokens",
            200,
            tokens_body(TokenResult::new("user-1", "t", NOW + 1)),
        );
        provider.set_account_token(Some("account".into()));

        provider.get_token("user-1", NOW).unwrap();
        assert_eq!(
            http.requests()[0].header_value(AUTHORIZATION),
            Some("Bearer account")
        );
    }

    #[test]
    fn exchange_failure_is_not_cached() {
        let (provider, http) = provider(MemoryTokenStore::new());
        http.fail_with(Method::Post, "/tokens", HttpError::status_error(500, "down"));

        let err = provider.get_token("user-1", NOW).unwrap_err();
        assert!(matches!(err, EngineError::TokenExchange { .. }));
        assert_eq!(err.status(), Some(500));
        assert!(provider.cache.list().unwrap().is_empty());
    }

    #[test]
    fn failed_token_status_is_an_exchange_error() {
        let (provider, http) = provider(MemoryTokenStore::new());
        http.respond_with(
            Method::Post,
            "/tokens",
            200,
            tokens_body(TokenResult::new("user-1", "t", NOW + 1).with_status(TokenStatus::Failed)),
        );

        let err = provider.get_token("user-1", NOW).unwrap_err();
        match err {
            EngineError::TokenExchange { source, .. } => {
                assert!(matches!(*source, EngineError::MalformedResponse(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
