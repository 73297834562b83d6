//! Token store trait definition.

use crate::error::StoreResult;
use docsync_protocol::TokenResult;

/// Persistent cache of partition tokens, keyed by partition.
///
/// The store does not check expiry; callers decide whether a loaded token
/// is still usable.
pub trait TokenStore: Send + Sync {
    /// Loads the token cached for `partition`.
    fn load(&self, partition: &str) -> StoreResult<Option<TokenResult>>;

    /// Caches `token` under its partition, replacing any previous one.
    fn save(&self, token: &TokenResult) -> StoreResult<()>;

    /// Removes the token cached for `partition`.
    fn remove(&self, partition: &str) -> StoreResult<()>;

    /// Returns every cached token.
    fn list(&self) -> StoreResult<Vec<TokenResult>>;
}

impl<S: TokenStore + ?Sized> TokenStore for std::sync::Arc<S> {
    fn load(&self, partition: &str) -> StoreResult<Option<TokenResult>> {
        (**self).load(partition)
    }

    fn save(&self, token: &TokenResult) -> StoreResult<()> {
        (**self).save(token)
    }

    fn remove(&self, partition: &str) -> StoreResult<()> {
        (**self).remove(partition)
    }

    fn list(&self) -> StoreResult<Vec<TokenResult>> {
        (**self).list()
    }
}
