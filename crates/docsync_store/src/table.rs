//! Ordered in-memory rows shared by the memory and file stores.

use crate::error::{StoreError, StoreResult};
use docsync_protocol::{OperationKey, PendingOperation};
use std::collections::BTreeMap;

/// Rows grouped by table. Within a table rows keep insertion order, which
/// is the order pending operations are replayed in.
#[derive(Debug, Clone, Default)]
pub(crate) struct Tables {
    tables: BTreeMap<String, Vec<PendingOperation>>,
}

impl Tables {
    pub(crate) fn from_rows(rows: Vec<PendingOperation>) -> Self {
        let mut tables = Self::default();
        for row in rows {
            tables.upsert(row);
        }
        tables
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &PendingOperation> {
        self.tables.values().flatten()
    }

    /// Inserts a row, replacing one with the same identity in place.
    pub(crate) fn upsert(&mut self, row: PendingOperation) {
        let rows = self.tables.entry(row.table.clone()).or_default();
        match rows.iter_mut().find(|r| same_row(r, &row)) {
            Some(existing) => *existing = row,
            None => rows.push(row),
        }
    }

    /// Replaces `replayed` with `synced`, provided the stored row still
    /// equals `replayed`.
    pub(crate) fn replace(
        &mut self,
        replayed: &PendingOperation,
        synced: &PendingOperation,
    ) -> StoreResult<()> {
        if replayed.key() != synced.key() {
            return Err(StoreError::NotFound(synced.key()));
        }
        let existing = self
            .find_mut(replayed)
            .ok_or_else(|| StoreError::NotFound(replayed.key()))?;
        if existing != replayed {
            return Err(StoreError::Superseded(replayed.key()));
        }
        *existing = synced.clone();
        Ok(())
    }

    /// Removes the row of `replayed` unless it was rewritten since.
    /// Returns true if a row was removed.
    pub(crate) fn remove(&mut self, replayed: &PendingOperation) -> StoreResult<bool> {
        let Some(rows) = self.tables.get_mut(&replayed.table) else {
            return Ok(false);
        };
        let Some(index) = rows.iter().position(|r| same_row(r, replayed)) else {
            return Ok(false);
        };
        if rows[index] != *replayed {
            return Err(StoreError::Superseded(replayed.key()));
        }
        rows.remove(index);
        if rows.is_empty() {
            self.tables.remove(&replayed.table);
        }
        Ok(true)
    }

    fn find_mut(&mut self, row: &PendingOperation) -> Option<&mut PendingOperation> {
        self.tables
            .get_mut(&row.table)
            .and_then(|rows| rows.iter_mut().find(|r| same_row(r, row)))
    }

    pub(crate) fn get(&self, key: &OperationKey) -> Option<PendingOperation> {
        self.tables.get(&key.table).and_then(|rows| {
            rows.iter()
                .find(|r| r.partition == key.partition && r.document_id == key.document_id)
                .cloned()
        })
    }

    pub(crate) fn rows(&self, table: &str) -> Vec<PendingOperation> {
        self.tables.get(table).cloned().unwrap_or_default()
    }

    pub(crate) fn pending(&self, table: &str) -> Vec<PendingOperation> {
        self.tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| r.is_pending()).cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn pending_tables(&self) -> Vec<String> {
        self.tables
            .iter()
            .filter(|(_, rows)| rows.iter().any(PendingOperation::is_pending))
            .map(|(table, _)| table.clone())
            .collect()
    }

    /// Removes every pending row that expired before `now_millis`.
    pub(crate) fn purge_expired(&mut self, now_millis: i64) -> Vec<OperationKey> {
        let mut purged = Vec::new();
        for rows in self.tables.values_mut() {
            rows.retain(|r| {
                let expired = r.is_pending() && r.is_expired(now_millis);
                if expired {
                    purged.push(r.key());
                }
                !expired
            });
        }
        self.tables.retain(|_, rows| !rows.is_empty());
        purged
    }

    pub(crate) fn len(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }
}

fn same_row(a: &PendingOperation, b: &PendingOperation) -> bool {
    a.partition == b.partition && a.document_id == b.document_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_protocol::OperationKind;

    fn row(table: &str, id: &str, kind: Option<OperationKind>) -> PendingOperation {
        let mut op = PendingOperation::new(table, "p", id, OperationKind::Create);
        op.operation = kind;
        op
    }

    #[test]
    fn upsert_keeps_position() {
        let mut tables = Tables::default();
        tables.upsert(row("t", "a", Some(OperationKind::Create)));
        tables.upsert(row("t", "b", Some(OperationKind::Create)));
        tables.upsert(row("t", "a", Some(OperationKind::Delete)));

        let rows = tables.rows("t");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].document_id, "a");
        assert_eq!(rows[0].operation, Some(OperationKind::Delete));
    }

    #[test]
    fn pending_filters_cleared_rows() {
        let mut tables = Tables::default();
        tables.upsert(row("t", "a", None));
        tables.upsert(row("t", "b", Some(OperationKind::Replace)));
        tables.upsert(row("u", "c", None));

        assert_eq!(tables.pending("t").len(), 1);
        assert_eq!(tables.pending_tables(), vec!["t".to_string()]);
        assert_eq!(tables.len(), 3);
    }

    #[test]
    fn replace_missing_row_fails() {
        let mut tables = Tables::default();
        let op = row("t", "a", Some(OperationKind::Create));
        let result = tables.replace(&op, &op);
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn replace_refuses_rewritten_row() {
        let mut tables = Tables::default();
        let replayed = row("t", "a", Some(OperationKind::Create));
        tables.upsert(replayed.clone());
        tables.upsert(row("t", "a", Some(OperationKind::Replace)));

        let result = tables.replace(&replayed, &row("t", "a", None));
        assert!(matches!(result, Err(StoreError::Superseded(_))));
        assert_eq!(tables.rows("t")[0].operation, Some(OperationKind::Replace));
    }

    #[test]
    fn remove_drops_empty_table() {
        let mut tables = Tables::default();
        let op = row("t", "a", Some(OperationKind::Create));
        tables.upsert(op.clone());

        assert!(tables.remove(&op).unwrap());
        assert!(!tables.remove(&op).unwrap());
        assert!(tables.pending_tables().is_empty());
        assert_eq!(tables.len(), 0);
    }

    #[test]
    fn remove_keeps_rewritten_row() {
        let mut tables = Tables::default();
        let replayed = row("t", "a", Some(OperationKind::Delete));
        tables.upsert(replayed.clone());
        tables.upsert(row("t", "a", Some(OperationKind::Create)));

        assert!(matches!(
            tables.remove(&replayed),
            Err(StoreError::Superseded(_))
        ));
        assert_eq!(tables.len(), 1);
    }

    #[test]
    fn purge_only_touches_pending_rows() {
        let mut tables = Tables::default();
        tables.upsert(row("t", "a", Some(OperationKind::Create)).with_expiration_time(10));
        tables.upsert(row("t", "b", None).with_expiration_time(10));
        tables.upsert(row("t", "c", Some(OperationKind::Create)).with_expiration_time(100));

        let purged = tables.purge_expired(50);
        assert_eq!(purged, vec![OperationKey::new("t", "p", "a")]);
        assert_eq!(tables.len(), 2);
    }
}
