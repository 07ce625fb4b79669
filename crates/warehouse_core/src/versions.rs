//! crates/warehouse_core/src/versions.rs
//!
//! The append-only version ledger: one JSON snapshot per successful mutation.

use crate::domain::{Document, VersionSnapshot};
use crate::layout::{data_rows, version_from_row, version_row};
use crate::ports::{PortError, PortResult, RowStore, TableRef};

pub struct VersionLedger<'a> {
    store: &'a dyn RowStore,
    table: &'a TableRef,
}

impl<'a> VersionLedger<'a> {
    pub fn new(store: &'a dyn RowStore, table: &'a TableRef) -> Self {
        Self { store, table }
    }

    /// Every readable snapshot in the table. Rows with a non-numeric version are skipped.
    pub async fn all(&self) -> PortResult<Vec<VersionSnapshot>> {
        let rows = self.store.read_rows(self.table).await?;
        Ok(data_rows(&rows)
            .filter_map(|(_, row)| version_from_row(row))
            .collect())
    }

    /// Every snapshot for `code`, in append order.
    pub async fn history(&self, code: &str) -> PortResult<Vec<VersionSnapshot>> {
        Ok(self
            .all()
            .await?
            .into_iter()
            .filter(|snapshot| snapshot.code == code)
            .collect())
    }

    /// `max(existing versions for code) + 1`, or 1 when there are none.
    pub async fn next_version(&self, code: &str) -> PortResult<u32> {
        let latest = self
            .history(code)
            .await?
            .into_iter()
            .map(|snapshot| snapshot.version)
            .max();
        Ok(latest.map_or(1, |v| v + 1))
    }

    /// Serializes `doc` and appends it as `version`.
    pub async fn append(
        &self,
        doc: &Document,
        version: u32,
        timestamp: &str,
        user: &str,
    ) -> PortResult<VersionSnapshot> {
        let data = serde_json::to_string(doc).map_err(|e| PortError::Malformed(e.to_string()))?;
        let snapshot = VersionSnapshot {
            code: doc.code.clone(),
            version,
            timestamp: timestamp.to_string(),
            user: user.to_string(),
            data,
            slug: doc.slug.clone().unwrap_or_default(),
        };
        self.store
            .append_rows(self.table, &[version_row(&snapshot)])
            .await?;
        Ok(snapshot)
    }
}
