//! In-memory stores for testing.

use crate::document_store::DocumentStore;
use crate::error::StoreResult;
use crate::table::Tables;
use crate::token_store::TokenStore;
use docsync_protocol::{OperationKey, PendingOperation, TokenResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// A [`DocumentStore`] trait call recorded by [`MemoryDocumentStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    /// `pending_tables()`.
    PendingTables,
    /// `get_pending_operations(table)`.
    GetPendingOperations(String),
    /// `update_pending_operation(replayed, synced)`, with the synced row.
    UpdatePendingOperation(PendingOperation),
    /// `delete_online(replayed)`, with the identity of the row.
    DeleteOnline(OperationKey),
}

/// An in-memory document store.
///
/// This store keeps all rows in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral caches that don't need persistence
///
/// Every [`DocumentStore`] call is journaled so tests can assert on the
/// exact interactions of a reconciliation pass.
///
/// # Example
///
/// ```rust
/// use docsync_protocol::{OperationKind, PendingOperation};
/// use docsync_store::{DocumentStore, MemoryDocumentStore, StoreCall};
///
/// let store = MemoryDocumentStore::new();
/// let op = PendingOperation::new("user", "p", "d", OperationKind::Delete);
/// store.write_offline(op.clone());
/// store.delete_online(&op).unwrap();
/// assert_eq!(store.len(), 0);
/// assert_eq!(store.calls().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    tables: RwLock<Tables>,
    calls: RwLock<Vec<StoreCall>>,
}

impl MemoryDocumentStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the given rows.
    #[must_use]
    pub fn with_rows(rows: Vec<PendingOperation>) -> Self {
        Self {
            tables: RwLock::new(Tables::from_rows(rows)),
            calls: RwLock::new(Vec::new()),
        }
    }

    /// Records a local write made while offline.
    pub fn write_offline(&self, operation: PendingOperation) {
        self.tables.write().upsert(operation);
    }

    /// Returns the row with the given identity.
    pub fn get(&self, key: &OperationKey) -> Option<PendingOperation> {
        self.tables.read().get(key)
    }

    /// Returns every row of `table`, pending or not.
    pub fn rows(&self, table: &str) -> Vec<PendingOperation> {
        self.tables.read().rows(table)
    }

    /// Removes pending rows that expired before `now_millis`.
    pub fn purge_expired(&self, now_millis: i64) -> Vec<OperationKey> {
        self.tables.write().purge_expired(now_millis)
    }

    /// Returns the total number of rows.
    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    /// Returns true if the store holds no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the journal of trait calls.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.read().clone()
    }

    /// Returns only the mutating trait calls.
    pub fn mutations(&self) -> Vec<StoreCall> {
        self.calls
            .read()
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    StoreCall::UpdatePendingOperation(_) | StoreCall::DeleteOnline(_)
                )
            })
            .cloned()
            .collect()
    }

    fn record(&self, call: StoreCall) {
        self.calls.write().push(call);
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn pending_tables(&self) -> StoreResult<Vec<String>> {
        self.record(StoreCall::PendingTables);
        Ok(self.tables.read().pending_tables())
    }

    fn get_pending_operations(&self, table: &str) -> StoreResult<Vec<PendingOperation>> {
        self.record(StoreCall::GetPendingOperations(table.to_string()));
        Ok(self.tables.read().pending(table))
    }

    fn update_pending_operation(
        &self,
        replayed: &PendingOperation,
        synced: &PendingOperation,
    ) -> StoreResult<()> {
        self.record(StoreCall::UpdatePendingOperation(synced.clone()));
        self.tables.write().replace(replayed, synced)
    }

    fn delete_online(&self, replayed: &PendingOperation) -> StoreResult<()> {
        self.record(StoreCall::DeleteOnline(replayed.key()));
        self.tables.write().remove(replayed).map(|_| ())
    }
}

/// An in-memory token store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<BTreeMap<String, TokenResult>>,
}

impl MemoryTokenStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with one cached token.
    #[must_use]
    pub fn with_token(token: TokenResult) -> Self {
        let store = Self::new();
        store.tokens.write().insert(token.partition.clone(), token);
        store
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self, partition: &str) -> StoreResult<Option<TokenResult>> {
        Ok(self.tokens.read().get(partition).cloned())
    }

    fn save(&self, token: &TokenResult) -> StoreResult<()> {
        self.tokens
            .write()
            .insert(token.partition.clone(), token.clone());
        Ok(())
    }

    fn remove(&self, partition: &str) -> StoreResult<()> {
        self.tokens.write().remove(partition);
        Ok(())
    }

    fn list(&self) -> StoreResult<Vec<TokenResult>> {
        Ok(self.tokens.read().values().cloned().collect())
    }
}
