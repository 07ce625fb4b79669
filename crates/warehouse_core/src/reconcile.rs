//! crates/warehouse_core/src/reconcile.rs
//!
//! The document repository over the primary table. A document is the set of rows
//! whose code column equals its code; this module is the only place that turns a
//! new line list into row-level overwrites, appends and deletes.

use crate::domain::Document;
use crate::error::{DocumentError, DocumentResult};
use crate::layout::{data_rows, document_from_rows, document_rows, group_documents, row_code};
use crate::ports::{PortResult, Row, RowStore, TableRef};
use tracing::debug;

/// Sorts row numbers highest first so positional deletes do not shift pending targets.
pub fn descending(mut row_numbers: Vec<usize>) -> Vec<usize> {
    row_numbers.sort_unstable_by(|a, b| b.cmp(a));
    row_numbers.dedup();
    row_numbers
}

//=========================================================================================
// Planning
//=========================================================================================

/// The row operations that turn M matched rows into N new rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// `(absolute row number, new contents)` for positions `0..min(M, N)`.
    pub overwrites: Vec<(usize, Row)>,
    /// New rows past the old count, appended at the end of the table.
    pub appends: Vec<Row>,
    /// Row numbers of match-positions `N..M`, descending.
    pub deletions: Vec<usize>,
}

/// Pairs matched rows with new rows by position.
pub fn plan_reconciliation(matched: &[usize], new_rows: Vec<Row>) -> ReconcilePlan {
    let common = matched.len().min(new_rows.len());
    let mut new_rows = new_rows.into_iter();

    let overwrites = matched[..common]
        .iter()
        .copied()
        .zip(new_rows.by_ref().take(common))
        .collect();
    let appends = new_rows.collect();
    let deletions = descending(matched[common..].to_vec());

    ReconcilePlan {
        overwrites,
        appends,
        deletions,
    }
}

/// What a reconciliation actually did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub overwritten: usize,
    pub appended: usize,
    pub deleted: usize,
}

//=========================================================================================
// Table Snapshot
//=========================================================================================

/// One full read of the primary table, header included.
#[derive(Debug, Clone, Default)]
pub struct TableSnapshot {
    rows: Vec<Row>,
}

impl TableSnapshot {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    /// Absolute row numbers of every row for `code`, in sheet order.
    pub fn matched(&self, code: &str) -> Vec<usize> {
        data_rows(&self.rows)
            .filter(|(_, row)| row_code(row) == code)
            .map(|(row_number, _)| row_number)
            .collect()
    }

    pub fn document(&self, code: &str) -> Option<Document> {
        document_from_rows(
            data_rows(&self.rows)
                .filter(|(_, row)| row_code(row) == code)
                .map(|(_, row)| row),
        )
    }

    pub fn documents(&self) -> Vec<Document> {
        group_documents(&self.rows)
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        data_rows(&self.rows).map(|(_, row)| row_code(row))
    }
}

//=========================================================================================
// Repository
//=========================================================================================

pub struct DocumentRows<'a> {
    store: &'a dyn RowStore,
    table: &'a TableRef,
}

impl<'a> DocumentRows<'a> {
    pub fn new(store: &'a dyn RowStore, table: &'a TableRef) -> Self {
        Self { store, table }
    }

    pub async fn snapshot(&self) -> PortResult<TableSnapshot> {
        Ok(TableSnapshot::new(self.store.read_rows(self.table).await?))
    }

    pub async fn load_by_code(&self, code: &str) -> PortResult<Option<Document>> {
        Ok(self.snapshot().await?.document(code))
    }

    /// Appends every line of a new document at the end of the table.
    pub async fn append(&self, doc: &Document) -> PortResult<()> {
        self.store
            .append_rows(self.table, &document_rows(doc))
            .await
    }

    /// Rewrites the rows of `doc.code` so they hold exactly `doc.lines`.
    ///
    /// `snapshot` must be the current state of the table; rows of other codes are
    /// never written or deleted.
    pub async fn save_reconciled(
        &self,
        snapshot: &TableSnapshot,
        doc: &Document,
    ) -> DocumentResult<ReconcileReport> {
        let matched = snapshot.matched(&doc.code);
        if matched.is_empty() {
            return Err(DocumentError::CodeNotFound(doc.code.clone()));
        }

        let plan = plan_reconciliation(&matched, document_rows(doc));
        let report = ReconcileReport {
            overwritten: plan.overwrites.len(),
            appended: plan.appends.len(),
            deleted: plan.deletions.len(),
        };
        debug!(
            code = %doc.code,
            old = matched.len(),
            new = doc.lines.len(),
            ?report,
            "Reconciling document rows"
        );

        let span = self.table.full_span();
        for (row_number, row) in &plan.overwrites {
            self.store
                .write_row(self.table, *row_number, span, row)
                .await?;
        }
        if !plan.appends.is_empty() {
            self.store.append_rows(self.table, &plan.appends).await?;
        }
        if !plan.deletions.is_empty() {
            self.store.delete_rows(self.table, &plan.deletions).await?;
        }

        Ok(report)
    }

    /// Deletes the entire matched set for `code`. Returns the number of rows removed.
    pub async fn delete_by_code(&self, code: &str) -> DocumentResult<usize> {
        let snapshot = self.snapshot().await?;
        let targets = descending(snapshot.matched(code));
        if targets.is_empty() {
            return Err(DocumentError::CodeNotFound(code.to_string()));
        }
        self.store.delete_rows(self.table, &targets).await?;
        Ok(targets.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Line;
    use crate::layout::PRIMARY_WIDTH;
    use crate::memory::{MemoryRowStore, StoreOp};

    fn line(code: &str, qty: f64) -> Line {
        Line {
            product_code: code.into(),
            product_name: String::new(),
            unit: "Kg".into(),
            qty,
            memo: String::new(),
        }
    }

    fn doc(code: &str, lines: Vec<Line>) -> Document {
        Document {
            code: code.into(),
            date: "10/10/2025".into(),
            time: "08:00".into(),
            warehouse: "Kho Tổng".into(),
            created_by: "an".into(),
            receiver: String::new(),
            description: String::new(),
            source: String::new(),
            lines,
            slug: None,
        }
    }

    fn rows_for(n: usize) -> Vec<Row> {
        (0..n).map(|i| vec![format!("r{}", i)]).collect()
    }

    async fn seeded(docs: &[Document]) -> (MemoryRowStore, TableRef) {
        let store = MemoryRowStore::new();
        let table = TableRef::new("NhapKho", PRIMARY_WIDTH);
        store.create_table("NhapKho", vec!["Mã phiếu".into()]).await;
        let repo = DocumentRows::new(&store, &table);
        for d in docs {
            repo.append(d).await.unwrap();
        }
        store.take_ops().await;
        (store, table)
    }

    #[test]
    fn plan_counts_follow_min_and_difference() {
        for m in 0..5usize {
            for n in 0..5usize {
                let matched: Vec<usize> = (0..m).map(|i| 2 + i * 3).collect();
                let plan = plan_reconciliation(&matched, rows_for(n));
                assert_eq!(plan.overwrites.len(), m.min(n));
                assert_eq!(plan.appends.len(), n.saturating_sub(m));
                assert_eq!(plan.deletions.len(), m.saturating_sub(n));
            }
        }
    }

    #[test]
    fn plan_deletes_the_tail_of_the_matched_set_highest_first() {
        let plan = plan_reconciliation(&[3, 7, 9, 12], rows_for(1));
        assert_eq!(plan.overwrites[0].0, 3);
        assert_eq!(plan.deletions, vec![12, 9, 7]);
    }

    #[tokio::test]
    async fn growing_a_document_overwrites_then_appends() {
        let a = doc("A", vec![line("SP01", 1.0)]);
        let b = doc("B", vec![line("SP09", 9.0)]);
        let (store, table) = seeded(&[a.clone(), b]).await;
        let repo = DocumentRows::new(&store, &table);

        let grown = doc("A", vec![line("SP01", 2.0), line("SP02", 3.0)]);
        let snapshot = repo.snapshot().await.unwrap();
        let report = repo.save_reconciled(&snapshot, &grown).await.unwrap();

        assert_eq!(
            report,
            ReconcileReport {
                overwritten: 1,
                appended: 1,
                deleted: 0
            }
        );
        let rows = store.rows("NhapKho").await;
        let codes: Vec<_> = rows.iter().skip(1).map(|r| r[0].as_str()).collect();
        // The new line lands after B, not next to A's first row.
        assert_eq!(codes, vec!["A", "B", "A"]);
        assert_eq!(rows[1][6], "2");
    }

    #[tokio::test]
    async fn shrinking_a_document_deletes_only_its_tail() {
        let a = doc("A", vec![line("SP01", 1.0), line("SP02", 2.0), line("SP03", 3.0)]);
        let b = doc("B", vec![line("SP09", 9.0)]);
        let (store, table) = seeded(&[a, b.clone()]).await;
        let repo = DocumentRows::new(&store, &table);

        let shrunk = doc("A", vec![line("SP05", 5.0)]);
        let snapshot = repo.snapshot().await.unwrap();
        repo.save_reconciled(&snapshot, &shrunk).await.unwrap();

        assert_eq!(
            store.take_ops().await,
            vec![
                StoreOp::Write {
                    sheet: "NhapKho".into(),
                    row_number: 2
                },
                StoreOp::Delete {
                    sheet: "NhapKho".into(),
                    row_numbers: vec![4, 3]
                },
            ]
        );
        let after = repo.snapshot().await.unwrap();
        assert_eq!(after.document("A").unwrap().lines, shrunk.lines);
        assert_eq!(after.document("B").unwrap(), b);
    }

    #[tokio::test]
    async fn unknown_code_is_not_found() {
        let (store, table) = seeded(&[]).await;
        let repo = DocumentRows::new(&store, &table);
        let snapshot = repo.snapshot().await.unwrap();

        let err = repo
            .save_reconciled(&snapshot, &doc("Z", vec![line("SP01", 1.0)]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CODE_NOT_FOUND");

        let err = repo.delete_by_code("Z").await.unwrap_err();
        assert_eq!(err.code(), "CODE_NOT_FOUND");
    }

    #[tokio::test]
    async fn delete_by_code_removes_the_whole_matched_set() {
        let a = doc("A", vec![line("SP01", 1.0), line("SP02", 2.0)]);
        let b = doc("B", vec![line("SP09", 9.0)]);
        let (store, table) = seeded(&[a, b.clone()]).await;
        let repo = DocumentRows::new(&store, &table);

        assert_eq!(repo.delete_by_code("A").await.unwrap(), 2);
        let after = repo.snapshot().await.unwrap();
        assert!(after.matched("A").is_empty());
        assert_eq!(after.documents(), vec![b]);
    }
}
