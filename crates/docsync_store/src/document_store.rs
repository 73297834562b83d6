//! Local operation store trait definition.

use crate::error::StoreResult;
use docsync_protocol::PendingOperation;

/// Local cache of documents and their pending offline mutations.
///
/// Rows are keyed by (table, partition, document id). A row whose
/// `operation` is `None` is a plain cached document and is not returned by
/// [`DocumentStore::get_pending_operations`].
///
/// # Invariants
///
/// - `get_pending_operations` returns rows in persisted order
/// - `update_pending_operation` never changes a row's identity
/// - `update_pending_operation` and `delete_online` only touch a row that
///   still equals the copy read for replay; a row rewritten by a newer
///   offline write is left alone and reported as
///   [`crate::StoreError::Superseded`]
/// - `delete_online` of a missing row succeeds
/// - Stores must be `Send + Sync` so one table can be reconciled per thread
///
/// # Implementors
///
/// - [`super::MemoryDocumentStore`] - For testing
/// - [`super::FileDocumentStore`] - For persistent storage
pub trait DocumentStore: Send + Sync {
    /// Returns every table holding at least one pending operation.
    fn pending_tables(&self) -> StoreResult<Vec<String>>;

    /// Returns the pending operations of `table`, in persisted order.
    fn get_pending_operations(&self, table: &str) -> StoreResult<Vec<PendingOperation>>;

    /// Replaces the row `replayed` with `synced`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::NotFound`] if no such row exists and
    /// [`crate::StoreError::Superseded`] if it no longer equals `replayed`.
    fn update_pending_operation(
        &self,
        replayed: &PendingOperation,
        synced: &PendingOperation,
    ) -> StoreResult<()>;

    /// Removes the row `replayed` after the remote state made it obsolete.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::Superseded`] if the row no longer equals
    /// `replayed`.
    fn delete_online(&self, replayed: &PendingOperation) -> StoreResult<()>;
}

impl<S: DocumentStore + ?Sized> DocumentStore for std::sync::Arc<S> {
    fn pending_tables(&self) -> StoreResult<Vec<String>> {
        (**self).pending_tables()
    }

    fn get_pending_operations(&self, table: &str) -> StoreResult<Vec<PendingOperation>> {
        (**self).get_pending_operations(table)
    }

    fn update_pending_operation(
        &self,
        replayed: &PendingOperation,
        synced: &PendingOperation,
    ) -> StoreResult<()> {
        (**self).update_pending_operation(replayed, synced)
    }

    fn delete_online(&self, replayed: &PendingOperation) -> StoreResult<()> {
        (**self).delete_online(replayed)
    }
}
