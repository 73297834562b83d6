//! Purge-expired command implementation.

use super::{open_documents, CommandResult};
use docsync_engine::{Clock, SystemClock};
use docsync_protocol::OperationKey;
use docsync_store::{DocumentStore, FileDocumentStore};
use std::path::Path;
use tracing::info;

/// Runs the purge-expired command.
pub fn run(path: &Path, dry_run: bool) -> CommandResult<()> {
    let store = open_documents(path)?;
    let now = SystemClock.now_millis();

    println!("Purging expired operations at {:?}", path);
    if dry_run {
        println!("(dry run - no changes will be made)");
    }

    let keys = if dry_run {
        expired_keys(&store, now)?
    } else {
        let purged = store.purge_expired(now)?;
        info!(count = purged.len(), "purged expired pending operations");
        purged
    };

    for key in &keys {
        println!("  {}", key);
    }
    println!("Expired operations: {}", keys.len());

    Ok(())
}

/// Returns the pending operations that expired before `now_millis`.
pub fn expired_keys(store: &FileDocumentStore, now_millis: i64) -> CommandResult<Vec<OperationKey>> {
    let mut keys = Vec::new();
    for table in store.pending_tables()? {
        keys.extend(
            store
                .get_pending_operations(&table)?
                .iter()
                .filter(|op| op.is_expired(now_millis))
                .map(|op| op.key()),
        );
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_protocol::{OperationKind, PendingOperation};
    use tempfile::tempdir;

    #[test]
    fn dry_run_matches_purge() {
        let dir = tempdir().unwrap();
        let store = FileDocumentStore::open_dir(dir.path()).unwrap();
        store
            .write_offline(
                PendingOperation::new("user", "p", "old", OperationKind::Create)
                    .with_expiration_time(10),
            )
            .unwrap();
        store
            .write_offline(
                PendingOperation::new("user", "p", "new", OperationKind::Create)
                    .with_expiration_time(1_000),
            )
            .unwrap();

        let expected = expired_keys(&store, 500).unwrap();
        assert_eq!(expected, vec![OperationKey::new("user", "p", "old")]);
        assert_eq!(store.len(), 2);

        assert_eq!(store.purge_expired(500).unwrap(), expected);
        assert_eq!(store.len(), 1);
    }
}
