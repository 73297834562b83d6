//! File-backed stores for persistent caches.

use crate::document_store::DocumentStore;
use crate::error::{StoreError, StoreResult};
use crate::snapshot::SnapshotFile;
use crate::table::Tables;
use crate::token_store::TokenStore;
use docsync_protocol::{OperationKey, PendingOperation, TokenResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Default file name of the document store inside a data directory.
pub const DOCUMENTS_FILE: &str = "pending.json";
/// Default file name of the token store inside a data directory.
pub const TOKENS_FILE: &str = "tokens.json";

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Default, Deserialize)]
struct DocumentSnapshot {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    operations: Vec<PendingOperation>,
}

/// Borrowed form of [`DocumentSnapshot`], written without copying rows.
#[derive(Serialize)]
struct DocumentSnapshotRef<'a> {
    version: u32,
    operations: Vec<&'a PendingOperation>,
}

#[derive(Debug, Default, Deserialize)]
struct TokenSnapshot {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    tokens: BTreeMap<String, TokenResult>,
}

#[derive(Serialize)]
struct TokenSnapshotRef<'a> {
    version: u32,
    tokens: &'a BTreeMap<String, TokenResult>,
}

fn check_version(version: u32, path: &Path) -> StoreResult<()> {
    if version > SNAPSHOT_VERSION {
        return Err(StoreError::Corrupted(format!(
            "{}: unsupported snapshot version {}",
            path.display(),
            version
        )));
    }
    Ok(())
}

/// A document store persisted as a JSON snapshot.
///
/// The whole table set is held in memory and written through on every
/// mutation. Mutations apply in place; if the snapshot cannot be written,
/// memory is reloaded from the last snapshot on disk.
///
/// # Example
///
/// ```no_run
/// use docsync_store::{DocumentStore, FileDocumentStore};
/// use std::path::Path;
///
/// let store = FileDocumentStore::open_dir(Path::new("data")).unwrap();
/// for table in store.pending_tables().unwrap() {
///     println!("{table}");
/// }
/// ```
#[derive(Debug)]
pub struct FileDocumentStore {
    file: SnapshotFile,
    tables: RwLock<Tables>,
}

impl FileDocumentStore {
    /// Opens or creates a store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is locked by another process, cannot be
    /// read, or holds an unreadable snapshot.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let file = SnapshotFile::open(path)?;
        let snapshot: DocumentSnapshot = file.read()?;
        check_version(snapshot.version, path)?;
        debug!(
            path = %path.display(),
            rows = snapshot.operations.len(),
            "opened document store"
        );

        Ok(Self {
            file,
            tables: RwLock::new(Tables::from_rows(snapshot.operations)),
        })
    }

    /// Opens or creates the store file inside `dir`.
    pub fn open_dir(dir: &Path) -> StoreResult<Self> {
        Self::open(&dir.join(DOCUMENTS_FILE))
    }

    /// Returns the path of the snapshot file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Records a local write made while offline.
    pub fn write_offline(&self, operation: PendingOperation) -> StoreResult<()> {
        self.mutate(|tables| {
            tables.upsert(operation);
            Ok(())
        })
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
    pub fn purge_expired(&self, now_millis: i64) -> StoreResult<Vec<OperationKey>> {
        self.mutate(|tables| Ok(tables.purge_expired(now_millis)))
    }

    /// Returns the total number of rows.
    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    /// Returns true if the store holds no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut Tables) -> StoreResult<R>) -> StoreResult<R> {
        let mut tables = self.tables.write();
        let result = f(&mut *tables)?;

        let written = self.file.write(&DocumentSnapshotRef {
            version: SNAPSHOT_VERSION,
            operations: tables.iter().collect(),
        });
        if let Err(e) = written {
            *tables = self.reload()?;
            return Err(e);
        }
        Ok(result)
    }

    fn reload(&self) -> StoreResult<Tables> {
        let snapshot: DocumentSnapshot = self.file.read()?;
        Ok(Tables::from_rows(snapshot.operations))
    }
}

impl DocumentStore for FileDocumentStore {
    fn pending_tables(&self) -> StoreResult<Vec<String>> {
        Ok(self.tables.read().pending_tables())
    }

    fn get_pending_operations(&self, table: &str) -> StoreResult<Vec<PendingOperation>> {
        Ok(self.tables.read().pending(table))
    }

    fn update_pending_operation(
        &self,
        replayed: &PendingOperation,
        synced: &PendingOperation,
    ) -> StoreResult<()> {
        self.mutate(|tables| tables.replace(replayed, synced))
    }

    fn delete_online(&self, replayed: &PendingOperation) -> StoreResult<()> {
        self.mutate(|tables| tables.remove(replayed).map(|_| ()))
    }
}

/// A token store persisted as a JSON snapshot keyed by partition.
#[derive(Debug)]
pub struct FileTokenStore {
    file: SnapshotFile,
    tokens: RwLock<BTreeMap<String, TokenResult>>,
}

impl FileTokenStore {
    /// Opens or creates a store at `path`.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let file = SnapshotFile::open(path)?;
        let snapshot: TokenSnapshot = file.read()?;
        check_version(snapshot.version, path)?;

        Ok(Self {
            file,
            tokens: RwLock::new(snapshot.tokens),
        })
    }

    /// Opens or creates the store file inside `dir`.
    pub fn open_dir(dir: &Path) -> StoreResult<Self> {
        Self::open(&dir.join(TOKENS_FILE))
    }

    fn mutate(&self, f: impl FnOnce(&mut BTreeMap<String, TokenResult>)) -> StoreResult<()> {
        let mut tokens = self.tokens.write();
        f(&mut *tokens);

        let written = self.file.write(&TokenSnapshotRef {
            version: SNAPSHOT_VERSION,
            tokens: &*tokens,
        });
        if let Err(e) = written {
            let snapshot: TokenSnapshot = self.file.read()?;
            *tokens = snapshot.tokens;
            return Err(e);
        }
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self, partition: &str) -> StoreResult<Option<TokenResult>> {
        Ok(self.tokens.read().get(partition).cloned())
    }

    fn save(&self, token: &TokenResult) -> StoreResult<()> {
        self.mutate(|tokens| {
            tokens.insert(token.partition.clone(), token.clone());
        })
    }

    fn remove(&self, partition: &str) -> StoreResult<()> {
        self.mutate(|tokens| {
            tokens.remove(partition);
        })
    }

    fn list(&self) -> StoreResult<Vec<TokenResult>> {
        Ok(self.tokens.read().values().cloned().collect())
    }
}
