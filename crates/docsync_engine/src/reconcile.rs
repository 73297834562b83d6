//! Reconciliation of pending offline operations.
//!
//! When connectivity returns, every table with pending rows is replayed
//! against the remote document service. Each operation is handled to
//! completion (remote call, local store update, notification) before the
//! next one of the same table starts. Tables are independent: they may run
//! on separate threads and a failure in one never affects another.

use crate::clock::{Clock, SystemClock};
use crate::config::ReconcileConfig;
use crate::error::{DocumentError, EngineError, EngineResult};
use crate::http::HttpClient;
use crate::listener::{OperationListener, OperationResult};
use crate::remote::{RemoteDocumentClient, RemoteWrite};
use crate::token::TokenProvider;
use docsync_protocol::{DocumentMetadata, OperationKind, PendingOperation, TokenResult};
use docsync_store::{DocumentStore, StoreError, TokenStore};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Counters for one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Tables visited.
    pub tables: u64,
    /// Operations with a supported kind that were attempted.
    pub processed: u64,
    /// Operations the server accepted.
    pub succeeded: u64,
    /// Operations that failed (token exchange, transport, server or payload).
    pub failed: u64,
    /// Operations skipped for an unsupported kind.
    pub skipped: u64,
    /// Rows rewritten as synced.
    pub rows_updated: u64,
    /// Rows removed from the local store.
    pub rows_deleted: u64,
    /// Rows left alone because a newer offline write replaced them
    /// while their operation was being replayed.
    pub superseded: u64,
    /// Local store calls that failed.
    pub store_errors: u64,
    /// Wall time of the pass.
    pub duration: Duration,
}

impl ReconcileReport {
    fn for_table() -> Self {
        Self {
            tables: 1,
            ..Self::default()
        }
    }

    /// Adds the counters of `other` to this report.
    pub fn merge(&mut self, other: &ReconcileReport) {
        self.tables += other.tables;
        self.processed += other.processed;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.rows_updated += other.rows_updated;
        self.rows_deleted += other.rows_deleted;
        self.superseded += other.superseded;
        self.store_errors += other.store_errors;
    }
}

/// Cumulative statistics across passes.
#[derive(Debug, Clone, Default)]
pub struct ReconcileStats {
    /// Completed passes triggered by connectivity or [`Reconciler::reconcile`].
    pub passes: u64,
    /// Total operations the server accepted.
    pub operations_succeeded: u64,
    /// Total failed operations.
    pub operations_failed: u64,
    /// Total skipped operations.
    pub operations_skipped: u64,
    /// Total rows removed locally.
    pub rows_deleted: u64,
    /// Time the last pass finished.
    pub last_pass_at: Option<Instant>,
    /// Message of the most recent operation failure.
    pub last_error: Option<String>,
}

/// Per-table mutual exclusion.
#[derive(Debug, Default)]
struct TableLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TableLocks {
    fn lock_for(&self, table: &str) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.lock().entry(table.to_string()).or_default())
    }

    /// Drops the entry of `table` once no pass holds or waits on it.
    fn release(&self, table: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock();
        drop(lock);
        if locks
            .get(table)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(table);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

/// Replays pending offline operations against the remote service.
///
/// # Example
///
/// ```rust
/// use docsync_engine::{MockHttpClient, ReconcileConfig, Reconciler};
/// use docsync_store::{MemoryDocumentStore, MemoryTokenStore};
/// use std::sync::Arc;
///
/// let reconciler = Reconciler::new(
///     ReconcileConfig::new("app-secret"),
///     Arc::new(MemoryDocumentStore::new()),
///     Arc::new(MemoryTokenStore::new()),
///     Arc::new(MockHttpClient::new()),
/// );
/// let report = reconciler.on_network_state_changed(true);
/// assert_eq!(report.processed, 0);
/// ```
pub struct Reconciler<S: DocumentStore, K: TokenStore, C: HttpClient> {
    config: ReconcileConfig,
    store: Arc<S>,
    tokens: TokenProvider<K, C>,
    remote: RemoteDocumentClient<C>,
    listener: Option<Arc<dyn OperationListener>>,
    clock: Arc<dyn Clock>,
    online: AtomicBool,
    locks: TableLocks,
    stats: RwLock<ReconcileStats>,
}

impl<S: DocumentStore, K: TokenStore, C: HttpClient> Reconciler<S, K, C> {
    /// Creates a reconciler with no listener, using the system clock.
    pub fn new(config: ReconcileConfig, store: Arc<S>, token_store: Arc<K>, http: Arc<C>) -> Self {
        Self {
            tokens: TokenProvider::new(&config, token_store, Arc::clone(&http)),
            remote: RemoteDocumentClient::new(&config, http),
            config,
            store,
            listener: None,
            clock: Arc::new(SystemClock),
            online: AtomicBool::new(false),
            locks: TableLocks::default(),
            stats: RwLock::new(ReconcileStats::default()),
        }
    }

    /// Sets the listener notified of each operation result.
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn OperationListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Sets the clock used for expiration and token checks.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets or clears the account authorization used for token exchange.
    pub fn set_account_token(&self, token: Option<String>) {
        self.tokens.set_account_token(token);
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Returns the local store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the last reported connectivity.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Returns cumulative statistics.
    pub fn stats(&self) -> ReconcileStats {
        self.stats.read().clone()
    }

    /// Handles a connectivity change.
    ///
    /// Going offline only records the state; nothing is read or sent.
    /// Coming online runs a full pass over every table with pending rows.
    pub fn on_network_state_changed(&self, connected: bool) -> ReconcileReport {
        self.online.store(connected, Ordering::SeqCst);
        if !connected {
            debug!("network lost, nothing to reconcile");
            return ReconcileReport::default();
        }
        self.reconcile()
    }

    /// Runs a pass over every table with pending rows.
    pub fn reconcile(&self) -> ReconcileReport {
        let start = Instant::now();
        let mut report = ReconcileReport::default();

        let tables = match self.store.pending_tables() {
            Ok(tables) => tables,
            Err(e) => {
                warn!(error = %e, "failed to list tables with pending operations");
                report.store_errors += 1;
                report.duration = start.elapsed();
                self.record_pass(&report);
                return report;
            }
        };

        let parallelism = self.config.table_parallelism.max(1);
        if parallelism == 1 || tables.len() <= 1 {
            for table in &tables {
                report.merge(&self.reconcile_table(table));
            }
        } else {
            for chunk in tables.chunks(parallelism) {
                let reports: Vec<ReconcileReport> = std::thread::scope(|scope| {
                    let handles: Vec<_> = chunk
                        .iter()
                        .map(|table| scope.spawn(move || self.reconcile_table(table)))
                        .collect();
                    handles
                        .into_iter()
                        .filter_map(|handle| match handle.join() {
                            Ok(report) => Some(report),
                            Err(_) => {
                                warn!("table reconciliation thread panicked");
                                None
                            }
                        })
                        .collect()
                });
                for table_report in &reports {
                    report.merge(table_report);
                }
            }
        }

        report.duration = start.elapsed();
        self.record_pass(&report);
        info!(
            tables = report.tables,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            duration_ms = u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX),
            "reconciliation pass finished"
        );
        report
    }

    /// Replays the pending operations of one table.
    ///
    /// Blocks while another pass holds the same table.
    pub fn reconcile_table(&self, table: &str) -> ReconcileReport {
        let lock = self.locks.lock_for(table);
        let report = {
            let _guard = lock.lock();
            self.replay_table(table)
        };
        self.locks.release(table, lock);
        report
    }

    fn replay_table(&self, table: &str) -> ReconcileReport {
        let start = Instant::now();
        let mut report = ReconcileReport::for_table();

        let operations = match self.store.get_pending_operations(table) {
            Ok(operations) => operations,
            Err(e) => {
                warn!(table, error = %e, "failed to read pending operations");
                report.store_errors += 1;
                return report;
            }
        };
        debug!(table, count = operations.len(), "replaying pending operations");

        let mut pass_tokens = HashMap::new();
        for operation in operations {
            self.process_operation(operation, &mut pass_tokens, &mut report);
        }

        report.duration = start.elapsed();
        report
    }

    fn process_operation(
        &self,
        operation: PendingOperation,
        pass_tokens: &mut HashMap<String, TokenResult>,
        report: &mut ReconcileReport,
    ) {
        let Some(kind) = operation.operation.clone() else {
            return;
        };
        if !kind.is_supported() {
            debug!(
                table = %operation.table,
                document_id = %operation.document_id,
                kind = %kind,
                "skipping unsupported pending operation"
            );
            report.skipped += 1;
            return;
        }
        report.processed += 1;

        let token = match self.token_for(&operation.partition, pass_tokens) {
            Ok(token) => token,
            Err(e) => {
                warn!(
                    table = %operation.table,
                    partition = %operation.partition,
                    document_id = %operation.document_id,
                    error = %e,
                    "token exchange failed, leaving operation pending"
                );
                report.failed += 1;
                self.notify(&kind, &Err(self.record_failure(e)));
                return;
            }
        };

        let outcome = if kind.is_upsert() {
            self.remote.upsert(&token, &operation).map(Some)
        } else {
            self.remote.delete(&token, &operation).map(|()| None)
        };

        let now = self.clock.now_millis();
        let expired = operation.is_expired(now);
        let result = match outcome {
            Ok(write) => {
                report.succeeded += 1;
                Ok(self.apply_success(&operation, write, expired, now, report))
            }
            Err(e) => {
                report.failed += 1;
                self.apply_failure(&operation, &kind, &e, expired, report);
                Err(self.record_failure(e))
            }
        };
        self.notify(&kind, &result);
    }

    fn token_for(
        &self,
        partition: &str,
        pass_tokens: &mut HashMap<String, TokenResult>,
    ) -> EngineResult<TokenResult> {
        let now = self.clock.now_millis();
        if let Some(token) = pass_tokens.get(partition) {
            if token.is_valid_at(now) {
                return Ok(token.clone());
            }
        }
        let token = self.tokens.get_token(partition, now)?;
        pass_tokens.insert(partition.to_string(), token.clone());
        Ok(token)
    }

    fn apply_success(
        &self,
        operation: &PendingOperation,
        write: Option<RemoteWrite>,
        expired: bool,
        now: i64,
        report: &mut ReconcileReport,
    ) -> DocumentMetadata {
        match write {
            Some(write) => {
                debug!(
                    table = %operation.table,
                    document_id = %operation.document_id,
                    expired,
                    "remote write accepted"
                );
                if expired {
                    self.delete_row(operation, report);
                } else {
                    let mut synced = operation.clone();
                    synced.mark_synced(write.body, write.metadata.etag.clone(), now);
                    match self.store.update_pending_operation(operation, &synced) {
                        Ok(()) => report.rows_updated += 1,
                        Err(e) => self.settle_failed(operation, &e, report),
                    }
                }
                write.metadata
            }
            None => {
                debug!(
                    table = %operation.table,
                    document_id = %operation.document_id,
                    "remote delete accepted"
                );
                self.delete_row(operation, report);
                DocumentMetadata::deleted(&operation.document_id, &operation.partition)
            }
        }
    }

    fn apply_failure(
        &self,
        operation: &PendingOperation,
        kind: &OperationKind,
        error: &EngineError,
        expired: bool,
        report: &mut ReconcileReport,
    ) {
        let gone = *kind == OperationKind::Delete && matches!(error.status(), Some(404 | 409));
        warn!(
            table = %operation.table,
            partition = %operation.partition,
            document_id = %operation.document_id,
            kind = %kind,
            status = ?error.status(),
            expired,
            error = %error,
            "pending operation failed"
        );
        if expired || gone {
            self.delete_row(operation, report);
        }
    }

    fn delete_row(&self, operation: &PendingOperation, report: &mut ReconcileReport) {
        match self.store.delete_online(operation) {
            Ok(()) => report.rows_deleted += 1,
            Err(e) => self.settle_failed(operation, &e, report),
        }
    }

    fn settle_failed(
        &self,
        operation: &PendingOperation,
        error: &StoreError,
        report: &mut ReconcileReport,
    ) {
        if let StoreError::Superseded(_) = error {
            debug!(
                table = %operation.table,
                document_id = %operation.document_id,
                "row rewritten during replay, keeping newer write"
            );
            report.superseded += 1;
            return;
        }
        warn!(
            table = %operation.table,
            document_id = %operation.document_id,
            error = %error,
            "failed to settle local row"
        );
        report.store_errors += 1;
    }

    fn record_failure(&self, error: EngineError) -> DocumentError {
        self.stats.write().last_error = Some(error.to_string());
        DocumentError::new(error)
    }

    fn notify(&self, kind: &OperationKind, result: &OperationResult) {
        if let Some(listener) = &self.listener {
            listener.on_operation_result(kind, result);
        }
    }

    fn record_pass(&self, report: &ReconcileReport) {
        let mut stats = self.stats.write();
        stats.passes += 1;
        stats.operations_succeeded += report.succeeded;
        stats.operations_failed += report.failed;
        stats.operations_skipped += report.skipped;
        stats.rows_deleted += report.rows_deleted;
        stats.last_pass_at = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::HttpError;
    use crate::http::{Method, MockHttpClient};
    use crate::listener::RecordingListener;
    use docsync_store::{MemoryDocumentStore, MemoryTokenStore, StoreCall};
    use proptest::prelude::*;

    const NOW: i64 = 1_000_000;
    const PAYLOAD: &str =
        r#"{"id":"doc-1","PartitionKey":"user-1","_etag":"e1","_ts":1,"document":{"a":1}}"#;

    type TestReconciler = Reconciler<MemoryDocumentStore, MemoryTokenStore, MockHttpClient>;

    fn setup(rows: Vec<PendingOperation>) -> (TestReconciler, Arc<MockHttpClient>, Arc<RecordingListener>) {
        let http = Arc::new(MockHttpClient::new());
        let listener = Arc::new(RecordingListener::new());
        let tokens = MemoryTokenStore::with_token(TokenResult::new("user-1", "tok", NOW + 60_000));
        let reconciler = Reconciler::new(
            ReconcileConfig::new("secret"),
            Arc::new(MemoryDocumentStore::with_rows(rows)),
            Arc::new(tokens),
            Arc::clone(&http),
        )
        .with_clock(Arc::new(ManualClock::new(NOW)))
        .with_listener(listener.clone());
        (reconciler, http, listener)
    }

    fn op(id: &str, kind: OperationKind) -> PendingOperation {
        PendingOperation::new("user", "user-1", id, kind)
            .with_document("{}")
            .with_expiration_time(NOW + 86_400_000)
    }

    #[test]
    fn offline_does_nothing() {
        let (reconciler, http, listener) = setup(vec![op("doc-1", OperationKind::Create)]);
        let report = reconciler.on_network_state_changed(false);

        assert_eq!(report, ReconcileReport::default());
        assert!(!reconciler.is_online());
        assert!(reconciler.store().calls().is_empty());
        assert_eq!(http.request_count(), 0);
        assert!(listener.is_empty());
        assert_eq!(reconciler.stats().passes, 0);
    }

    #[test]
    fn unknown_kind_is_skipped_silently() {
        let (reconciler, http, listener) =
            setup(vec![op("doc-1", OperationKind::parse("Order a coffee"))]);
        let report = reconciler.on_network_state_changed(true);

        assert_eq!(report.skipped, 1);
        assert_eq!(report.processed, 0);
        assert_eq!(http.request_count(), 0);
        assert!(reconciler.store().mutations().is_empty());
        assert!(listener.is_empty());
    }

    #[test]
    fn create_success_marks_row_synced() {
        let (reconciler, http, listener) = setup(vec![op("doc-1", OperationKind::Create)]);
        http.respond_with(Method::Post, "/user/user-1", 201, PAYLOAD);

        let report = reconciler.on_network_state_changed(true);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.rows_updated, 1);

        let row = reconciler.store().rows("user").remove(0);
        assert!(row.operation.is_none());
        assert_eq!(row.etag.as_deref(), Some("e1"));
        assert_eq!(row.document, PAYLOAD);

        let events = listener.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].metadata(), Some(&DocumentMetadata::new("doc-1", "user-1", "e1")));
    }

    #[test]
    fn delete_conflict_removes_row() {
        let (reconciler, http, listener) = setup(vec![op("doc-1", OperationKind::Delete)]);
        http.respond_with(Method::Delete, "/doc-1", 409, "Conflict");

        let report = reconciler.on_network_state_changed(true);
        assert_eq!(report.failed, 1);
        assert_eq!(report.rows_deleted, 1);
        assert!(reconciler.store().is_empty());
        assert_eq!(listener.events()[0].error().and_then(DocumentError::status), Some(409));
    }

    #[test]
    fn stats_accumulate_across_passes() {
        let (reconciler, http, _listener) = setup(vec![op("doc-1", OperationKind::Replace)]);
        http.respond_with(Method::Post, "/user/user-1", 500, "You failed!");

        reconciler.on_network_state_changed(true);
        reconciler.on_network_state_changed(true);

        let stats = reconciler.stats();
        assert_eq!(stats.passes, 2);
        assert_eq!(stats.operations_failed, 2);
        assert!(stats.last_error.unwrap().contains("You failed!"));
        assert!(stats.last_pass_at.is_some());
        assert_eq!(reconciler.store().len(), 1);
    }

    #[test]
    fn token_shared_within_pass() {
        let http = Arc::new(MockHttpClient::new());
        http.respond_with(
            Method::Post,
            "/tokens",
            200,
            docsync_protocol::TokensResponse::new(vec![TokenResult::new("user-1", "fresh", 0)])
                .to_json()
                .unwrap(),
        );
        http.respond_with(Method::Delete, "/user/user-1", 204, "");

        let reconciler = Reconciler::new(
            ReconcileConfig::new("secret"),
            Arc::new(MemoryDocumentStore::with_rows(vec![
                op("doc-1", OperationKind::Delete),
                op("doc-2", OperationKind::Delete),
            ])),
            Arc::new(MemoryTokenStore::new()),
            Arc::clone(&http),
        )
        .with_clock(Arc::new(ManualClock::new(-1)));

        let report = reconciler.on_network_state_changed(true);
        assert_eq!(report.succeeded, 2);
        assert_eq!(http.requests_to("/tokens").len(), 1);
    }

    #[test]
    fn table_locks_are_released_after_pass() {
        let (reconciler, http, _listener) = setup(vec![op("doc-1", OperationKind::Delete)]);
        http.respond_with(Method::Delete, "/doc-1", 204, "");

        reconciler.on_network_state_changed(true);
        reconciler.reconcile_table("orders");
        assert_eq!(reconciler.locks.len(), 0);
    }

    #[test]
    fn report_merge_adds_counters() {
        let mut total = ReconcileReport::default();
        let part = ReconcileReport {
            tables: 1,
            processed: 2,
            succeeded: 1,
            failed: 1,
            rows_deleted: 1,
            superseded: 1,
            ..ReconcileReport::default()
        };
        total.merge(&part);
        total.merge(&part);
        assert_eq!(total.tables, 2);
        assert_eq!(total.processed, 4);
        assert_eq!(total.rows_deleted, 2);
        assert_eq!(total.superseded, 2);
    }

    #[test]
    fn network_failure_leaves_row_pending() {
        let (reconciler, http, listener) = setup(vec![op("doc-1", OperationKind::Delete)]);
        http.fail_with(Method::Delete, "/doc-1", HttpError::Network("reset".into()));

        let report = reconciler.on_network_state_changed(true);
        assert_eq!(report.failed, 1);
        assert_eq!(report.rows_deleted, 0);
        assert_eq!(
            reconciler.store().calls(),
            vec![
                StoreCall::PendingTables,
                StoreCall::GetPendingOperations("user".into()),
            ]
        );
        assert_eq!(listener.len(), 1);
    }

    proptest! {
        #[test]
        fn failed_row_removed_only_when_expired_or_gone(
            status in prop::sample::select(vec![400u16, 401, 404, 409, 412, 429, 500, 503]),
            delete in any::<bool>(),
            expired in any::<bool>(),
        ) {
            let (kind, method) = if delete {
                (OperationKind::Delete, Method::Delete)
            } else {
                (OperationKind::Replace, Method::Post)
            };
            let expiration = if expired { NOW - 1 } else { NOW + 1 };
            let (reconciler, http, listener) =
                setup(vec![op("doc-1", kind).with_expiration_time(expiration)]);
            http.respond_with(method, "/user/user-1", status, "nope");

            reconciler.on_network_state_changed(true);

            let removed = expired || (delete && matches!(status, 404 | 409));
            prop_assert_eq!(reconciler.store().is_empty(), removed);
            prop_assert_eq!(listener.len(), 1);
        }
    }
}
