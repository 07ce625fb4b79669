//! crates/warehouse_core/src/memory.rs
//!
//! In-process implementations of the ports: a `RowStore` backed by vectors and a
//! fixed clock. Used by the test suites and by the `memory` row-store backend.

use crate::layout::DocumentTables;
use crate::ports::{CellSpan, Clock, PortError, PortResult, Row, RowStore, TableRef};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

/// A structural or content change recorded by `MemoryRowStore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Write { sheet: String, row_number: usize },
    Append { sheet: String, count: usize },
    Delete { sheet: String, row_numbers: Vec<usize> },
}

#[derive(Default)]
struct Inner {
    tables: HashMap<String, Vec<Row>>,
    failing: HashSet<String>,
    glitches: HashMap<String, usize>,
    ops: Vec<StoreOp>,
}

/// A `RowStore` holding every table in memory.
///
/// Tables must be created before use; reading an unknown sheet yields
/// `PortError::TabNotFound`, like a missing tab in a real spreadsheet.
#[derive(Default)]
pub struct MemoryRowStore {
    inner: Mutex<Inner>,
}

impl MemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the four tables of each set with their header rows.
    pub async fn with_tables<'a, I>(sets: I) -> Self
    where
        I: IntoIterator<Item = &'a DocumentTables>,
    {
        let store = Self::new();
        for set in sets {
            for (table, header) in set.with_headers() {
                store.create_table(&table.sheet, header).await;
            }
        }
        store
    }

    pub async fn create_table(&self, sheet: &str, header: Row) {
        self.inner
            .lock()
            .await
            .tables
            .insert(sheet.to_string(), vec![header]);
    }

    /// Current rows of a sheet, header included.
    pub async fn rows(&self, sheet: &str) -> Vec<Row> {
        self.inner
            .lock()
            .await
            .tables
            .get(sheet)
            .cloned()
            .unwrap_or_default()
    }

    /// Makes every operation on `sheet` fail with `PortError::Unavailable`.
    pub async fn fail_table(&self, sheet: &str) {
        self.inner.lock().await.failing.insert(sheet.to_string());
    }

    pub async fn heal_table(&self, sheet: &str) {
        let mut inner = self.inner.lock().await;
        inner.failing.remove(sheet);
        inner.glitches.remove(sheet);
    }

    /// Lets `after` operations on `sheet` succeed, fails the next one, then recovers.
    pub async fn glitch_table(&self, sheet: &str, after: usize) {
        self.inner
            .lock()
            .await
            .glitches
            .insert(sheet.to_string(), after);
    }

    /// Changes recorded since the last `take_ops`.
    pub async fn take_ops(&self) -> Vec<StoreOp> {
        std::mem::take(&mut self.inner.lock().await.ops)
    }
}

impl Inner {
    fn table_mut(&mut self, table: &TableRef) -> PortResult<&mut Vec<Row>> {
        if self.failing.contains(&table.sheet) {
            return Err(PortError::Unavailable(format!(
                "simulated outage on {}",
                table.sheet
            )));
        }
        if let Some(left) = self.glitches.get_mut(&table.sheet) {
            if *left == 0 {
                self.glitches.remove(&table.sheet);
                return Err(PortError::Unavailable(format!(
                    "simulated glitch on {}",
                    table.sheet
                )));
            }
            *left -= 1;
        }
        self.tables
            .get_mut(&table.sheet)
            .ok_or_else(|| PortError::TabNotFound(table.sheet.clone()))
    }
}

#[async_trait]
impl RowStore for MemoryRowStore {
    async fn read_rows(&self, table: &TableRef) -> PortResult<Vec<Row>> {
        let mut inner = self.inner.lock().await;
        Ok(inner.table_mut(table)?.clone())
    }

    async fn write_row(
        &self,
        table: &TableRef,
        row_number: usize,
        span: CellSpan,
        cells: &[String],
    ) -> PortResult<()> {
        let mut inner = self.inner.lock().await;
        let rows = inner.table_mut(table)?;
        if row_number == 0 {
            return Err(PortError::Malformed("row numbers start at 1".to_string()));
        }
        if rows.len() < row_number {
            rows.resize(row_number, Vec::new());
        }

        let row = &mut rows[row_number - 1];
        let end = span.first_column + span.width;
        if row.len() < end {
            row.resize(end, String::new());
        }
        for offset in 0..span.width {
            row[span.first_column + offset] = cells.get(offset).cloned().unwrap_or_default();
        }

        inner.ops.push(StoreOp::Write {
            sheet: table.sheet.clone(),
            row_number,
        });
        Ok(())
    }

    async fn append_rows(&self, table: &TableRef, new_rows: &[Row]) -> PortResult<()> {
        let mut inner = self.inner.lock().await;
        let width = table.width;
        let rows = inner.table_mut(table)?;
        rows.extend(
            new_rows
                .iter()
                .map(|r| r.iter().take(width).cloned().collect::<Row>()),
        );

        inner.ops.push(StoreOp::Append {
            sheet: table.sheet.clone(),
            count: new_rows.len(),
        });
        Ok(())
    }

    async fn delete_rows(&self, table: &TableRef, row_numbers: &[usize]) -> PortResult<()> {
        let mut inner = self.inner.lock().await;
        let rows = inner.table_mut(table)?;
        // Requests apply in order, so each one sees the table already shortened.
        let mut remaining = rows.len();
        for &n in row_numbers {
            if n == 0 || n > remaining {
                return Err(PortError::Malformed(format!(
                    "row {} is outside {} ({} rows)",
                    n, table.sheet, remaining
                )));
            }
            remaining -= 1;
        }
        for &n in row_numbers {
            rows.remove(n - 1);
        }

        inner.ops.push(StoreOp::Delete {
            sheet: table.sheet.clone(),
            row_numbers: row_numbers.to_vec(),
        });
        Ok(())
    }
}

//=========================================================================================
// Fixed Clock
//=========================================================================================

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<FixedOffset>);

impl FixedClock {
    /// Parses an RFC 3339 instant, e.g. `2025-10-10T08:30:00+07:00`.
    pub fn at(rfc3339: &str) -> Result<Self, chrono::ParseError> {
        DateTime::parse_from_rfc3339(rfc3339).map(Self)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}
