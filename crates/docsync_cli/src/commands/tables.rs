//! Tables command implementation.

use super::{open_documents, CommandResult};
use docsync_store::{DocumentStore, FileDocumentStore};
use serde::Serialize;
use std::path::Path;

/// Pending work of one table.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct TableSummary {
    /// Table name.
    pub table: String,
    /// Rows waiting to be replayed.
    pub pending: usize,
    /// All rows, synced or not.
    pub rows: usize,
}

/// Runs the tables command.
pub fn run(path: &Path, format: &str) -> CommandResult<()> {
    let store = open_documents(path)?;
    let summaries = collect(&store)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        _ => {
            if summaries.is_empty() {
                println!("No pending operations");
                return Ok(());
            }
            println!("{:<24} {:>8} {:>8}", "TABLE", "PENDING", "ROWS");
            for summary in &summaries {
                println!(
                    "{:<24} {:>8} {:>8}",
                    summary.table, summary.pending, summary.rows
                );
            }
        }
    }

    Ok(())
}

/// Summarizes every table with pending operations.
pub fn collect(store: &FileDocumentStore) -> CommandResult<Vec<TableSummary>> {
    let mut summaries = Vec::new();
    for table in store.pending_tables()? {
        let pending = store.get_pending_operations(&table)?.len();
        let rows = store.rows(&table).len();
        summaries.push(TableSummary {
            table,
            pending,
            rows,
        });
    }
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_protocol::{OperationKind, PendingOperation};
    use tempfile::tempdir;

    #[test]
    fn summarizes_pending_tables() {
        let dir = tempdir().unwrap();
        let store = FileDocumentStore::open_dir(dir.path()).unwrap();
        store
            .write_offline(PendingOperation::new("user", "p", "a", OperationKind::Create))
            .unwrap();
        store
            .write_offline(PendingOperation::new("user", "p", "b", OperationKind::Delete))
            .unwrap();
        store
            .write_offline(PendingOperation::new("settings", "p", "c", OperationKind::Replace))
            .unwrap();

        let summaries = collect(&store).unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(
            summaries[1],
            TableSummary {
                table: "user".into(),
                pending: 2,
                rows: 2,
            }
        );
    }
}
