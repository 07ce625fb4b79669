//! crates/warehouse_core/src/ports.rs
//!
//! Defines the service contracts (traits) the core depends on.
//! The row store is the only persistence boundary: every other component talks to
//! the spreadsheet through `RowStore`, so the core stays independent of the
//! concrete Google Sheets client.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all row-store operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Tab not found: {0}")]
    TabNotFound(String),
    #[error("Row store unavailable: {0}")]
    Unavailable(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Malformed row store response: {0}")]
    Malformed(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Row Store
//=========================================================================================

/// One physical row, as an ordered list of string cells.
pub type Row = Vec<String>;

/// A named table (sheet tab) and the number of columns it declares, starting at column A.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub sheet: String,
    pub width: usize,
}

impl TableRef {
    pub fn new(sheet: impl Into<String>, width: usize) -> Self {
        Self {
            sheet: sheet.into(),
            width,
        }
    }

    /// The span covering every declared column.
    pub fn full_span(&self) -> CellSpan {
        CellSpan {
            first_column: 0,
            width: self.width,
        }
    }
}

/// A horizontal slice of one row: zero-based first column and a column count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellSpan {
    pub first_column: usize,
    pub width: usize,
}

impl CellSpan {
    pub fn column(index: usize) -> Self {
        Self {
            first_column: index,
            width: 1,
        }
    }
}

/// Row-level access to a spreadsheet-like store.
///
/// Row numbers are 1-based absolute positions; row 1 is the header.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Reads every row of the table, header included. An empty table yields an empty list.
    async fn read_rows(&self, table: &TableRef) -> PortResult<Vec<Row>>;

    /// Overwrites `span` of exactly one existing row. `cells` is padded with empty
    /// strings or truncated to `span.width`.
    async fn write_row(
        &self,
        table: &TableRef,
        row_number: usize,
        span: CellSpan,
        cells: &[String],
    ) -> PortResult<()>;

    /// Adds rows after the last existing row.
    async fn append_rows(&self, table: &TableRef, rows: &[Row]) -> PortResult<()>;

    /// Structurally removes rows by position, applied in the given order.
    ///
    /// Deleting a row shifts every row below it, so callers pass row numbers sorted
    /// descending (see `reconcile::descending`).
    async fn delete_rows(&self, table: &TableRef, row_numbers: &[usize]) -> PortResult<()>;
}

//=========================================================================================
// Clock
//=========================================================================================

/// Source of the local wall-clock time used for codes, `time` and log timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// The system clock shifted to a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}
