//! Pending command implementation.

use super::{open_documents, CommandResult};
use docsync_engine::{Clock, SystemClock};
use docsync_protocol::PendingOperation;
use docsync_store::DocumentStore;
use serde::Serialize;
use std::path::Path;

/// One pending operation as listed by the CLI.
#[derive(Debug, Serialize)]
pub struct PendingEntry {
    /// Operation kind as stored.
    pub kind: String,
    /// Partition name.
    pub partition: String,
    /// Document ID.
    pub document_id: String,
    /// Expiration time (epoch millis).
    pub expiration_time: i64,
    /// Whether the operation has already expired.
    pub expired: bool,
}

impl PendingEntry {
    fn from_operation(operation: &PendingOperation, now_millis: i64) -> Self {
        Self {
            kind: operation
                .operation
                .as_ref()
                .map(|k| k.as_str().to_string())
                .unwrap_or_default(),
            partition: operation.partition.clone(),
            document_id: operation.document_id.clone(),
            expiration_time: operation.expiration_time,
            expired: operation.is_expired(now_millis),
        }
    }
}

/// Runs the pending command.
pub fn run(path: &Path, table: &str, format: &str) -> CommandResult<()> {
    let store = open_documents(path)?;
    let now = SystemClock.now_millis();
    let entries: Vec<PendingEntry> = store
        .get_pending_operations(table)?
        .iter()
        .map(|op| PendingEntry::from_operation(op, now))
        .collect();

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        _ => {
            println!("Pending operations in '{}': {}", table, entries.len());
            for entry in &entries {
                println!(
                    "  {:<8} {}/{}{}",
                    entry.kind,
                    entry.partition,
                    entry.document_id,
                    if entry.expired { " (expired)" } else { "" }
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_protocol::OperationKind;

    #[test]
    fn entry_flags_expiration() {
        let op = PendingOperation::new("user", "p", "d", OperationKind::parse("Order a coffee"))
            .with_expiration_time(100);

        let entry = PendingEntry::from_operation(&op, 200);
        assert_eq!(entry.kind, "Order a coffee");
        assert!(entry.expired);
        assert!(!PendingEntry::from_operation(&op, 50).expired);
    }
}
