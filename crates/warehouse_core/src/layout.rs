//! crates/warehouse_core/src/layout.rs
//!
//! Physical row layouts of the four tables and the conversions between rows and
//! domain values. Nothing outside this module knows a column index.

use crate::domain::{Document, DocumentKind, Line, LogEntry, SlugLink, VersionSnapshot};
use crate::ports::{Row, TableRef};
use chrono::{DateTime, FixedOffset, NaiveDate};

//=========================================================================================
// Primary Table Columns
//=========================================================================================

pub const PRIMARY_WIDTH: usize = 14;
pub const LINK_WIDTH: usize = 2;
pub const LOG_WIDTH: usize = 6;
pub const VERSION_WIDTH: usize = 6;

const COL_CODE: usize = 0;
const COL_DATE: usize = 1;
const COL_TIME: usize = 2;
const COL_WAREHOUSE: usize = 3;
const COL_PRODUCT_CODE: usize = 4;
const COL_PRODUCT_NAME: usize = 5;
const COL_QTY: usize = 6;
const COL_UNIT: usize = 7;
const COL_CREATED_BY: usize = 8;
const COL_DESCRIPTION: usize = 9;
const COL_MEMO: usize = 10;
const COL_SOURCE: usize = 11;
const COL_RECEIVER: usize = 12;
// Column 13 is the reserved slug column. It is always written empty.

/// Link table: the slug lives in column B.
pub const LINK_SLUG_COLUMN: usize = 1;

pub const PRIMARY_HEADER: [&str; PRIMARY_WIDTH] = [
    "Mã phiếu",
    "Ngày",
    "Giờ",
    "Kho",
    "Mã SP",
    "Tên SP",
    "Số lượng",
    "ĐVT",
    "Người tạo",
    "Diễn giải",
    "Ghi chú",
    "Nguồn",
    "Người nhận",
    "Slug",
];
pub const LINK_HEADER: [&str; LINK_WIDTH] = ["Mã phiếu", "Slug"];
pub const LOG_HEADER: [&str; LOG_WIDTH] = [
    "Thời gian",
    "Mã phiếu",
    "Người dùng",
    "Hành động",
    "Chi tiết",
    "Slug",
];
pub const VERSION_HEADER: [&str; VERSION_WIDTH] = [
    "Mã phiếu",
    "Phiên bản",
    "Thời gian",
    "Người dùng",
    "Dữ liệu",
    "Slug",
];

//=========================================================================================
// Table Sets
//=========================================================================================

/// The four tables backing one document kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTables {
    pub primary: TableRef,
    pub links: TableRef,
    pub log: TableRef,
    pub versions: TableRef,
}

impl DocumentTables {
    pub fn new(primary: &str, links: &str, log: &str, versions: &str) -> Self {
        Self {
            primary: TableRef::new(primary, PRIMARY_WIDTH),
            links: TableRef::new(links, LINK_WIDTH),
            log: TableRef::new(log, LOG_WIDTH),
            versions: TableRef::new(versions, VERSION_WIDTH),
        }
    }

    /// Each table paired with its header row, for provisioning empty stores.
    pub fn with_headers(&self) -> [(&TableRef, Row); 4] {
        fn header(cells: &[&str]) -> Row {
            cells.iter().map(|c| c.to_string()).collect()
        }
        [
            (&self.primary, header(&PRIMARY_HEADER)),
            (&self.links, header(&LINK_HEADER)),
            (&self.log, header(&LOG_HEADER)),
            (&self.versions, header(&VERSION_HEADER)),
        ]
    }

    /// The tab names used by the deployed spreadsheet.
    pub fn defaults(kind: DocumentKind) -> Self {
        let base = match kind {
            DocumentKind::Inbound => "NhapKho",
            DocumentKind::Outbound => "XuatKho",
        };
        Self::new(
            base,
            &format!("{}_Link", base),
            &format!("{}_Log", base),
            &format!("{}_Version", base),
        )
    }
}

//=========================================================================================
// Cells
//=========================================================================================

/// Returns the cell at `index`, or "" when the row is shorter (the API trims trailing blanks).
pub fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map(String::as_str).unwrap_or("")
}

/// Iterates data rows with their 1-based absolute row numbers, skipping the header.
pub fn data_rows(rows: &[Row]) -> impl Iterator<Item = (usize, &Row)> {
    rows.iter().enumerate().skip(1).map(|(i, row)| (i + 1, row))
}

pub fn parse_qty(raw: &str) -> f64 {
    raw.trim().parse::<f64>().unwrap_or(0.0)
}

pub fn format_qty(qty: f64) -> String {
    format!("{}", qty)
}

//=========================================================================================
// Dates and Timestamps
//=========================================================================================

/// Accepts `YYYY-MM-DD` (form input) or `DD/MM/YYYY` (stored form).
pub fn parse_request_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .ok()
}

pub fn format_sheet_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

pub fn format_time(now: &DateTime<FixedOffset>) -> String {
    now.format("%H:%M").to_string()
}

/// `HH:MM - DD/MM/YYYY`, used by the log and version tables.
pub fn format_timestamp(now: &DateTime<FixedOffset>) -> String {
    now.format("%H:%M - %d/%m/%Y").to_string()
}

/// Checks an `HH:MM` time string.
pub fn is_valid_time(raw: &str) -> bool {
    chrono::NaiveTime::parse_from_str(raw.trim(), "%H:%M").is_ok()
}

//=========================================================================================
// Primary Rows <-> Documents
//=========================================================================================

/// Flattens a document into one denormalized row per line.
pub fn document_rows(doc: &Document) -> Vec<Row> {
    doc.lines
        .iter()
        .map(|line| {
            vec![
                doc.code.clone(),
                doc.date.clone(),
                doc.time.clone(),
                doc.warehouse.clone(),
                line.product_code.clone(),
                line.product_name.clone(),
                format_qty(line.qty),
                line.unit.clone(),
                doc.created_by.clone(),
                doc.description.clone(),
                line.memo.clone(),
                doc.source.clone(),
                doc.receiver.clone(),
                String::new(),
            ]
        })
        .collect()
}

pub fn row_code(row: &[String]) -> &str {
    cell(row, COL_CODE).trim()
}

fn line_from_row(row: &[String]) -> Line {
    Line {
        product_code: cell(row, COL_PRODUCT_CODE).to_string(),
        product_name: cell(row, COL_PRODUCT_NAME).to_string(),
        unit: cell(row, COL_UNIT).to_string(),
        qty: parse_qty(cell(row, COL_QTY)),
        memo: cell(row, COL_MEMO).to_string(),
    }
}

/// Rebuilds a document from its rows. Header fields come from the first row.
/// Returns `None` for an empty row group.
pub fn document_from_rows<'a, I>(rows: I) -> Option<Document>
where
    I: IntoIterator<Item = &'a Row>,
{
    let mut rows = rows.into_iter();
    let first = rows.next()?;
    let mut lines = vec![line_from_row(first)];
    lines.extend(rows.map(|r| line_from_row(r)));

    Some(Document {
        code: row_code(first).to_string(),
        date: cell(first, COL_DATE).to_string(),
        time: cell(first, COL_TIME).to_string(),
        warehouse: cell(first, COL_WAREHOUSE).to_string(),
        created_by: cell(first, COL_CREATED_BY).to_string(),
        receiver: cell(first, COL_RECEIVER).to_string(),
        description: cell(first, COL_DESCRIPTION).to_string(),
        source: cell(first, COL_SOURCE).to_string(),
        lines,
        slug: None,
    })
}

/// Groups the data rows of a primary table by code, in order of first appearance.
pub fn group_documents(rows: &[Row]) -> Vec<Document> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: std::collections::HashMap<&str, Vec<&Row>> = Default::default();

    for (_, row) in data_rows(rows) {
        let code = row_code(row);
        if code.is_empty() {
            continue;
        }
        groups
            .entry(code)
            .or_insert_with(|| {
                order.push(code);
                Vec::new()
            })
            .push(row);
    }

    order
        .into_iter()
        .filter_map(|code| groups.remove(code))
        .filter_map(document_from_rows)
        .collect()
}

//=========================================================================================
// Side Table Rows
//=========================================================================================

pub fn link_from_row(row: &[String]) -> SlugLink {
    SlugLink {
        code: cell(row, 0).trim().to_string(),
        slug: cell(row, LINK_SLUG_COLUMN).trim().to_string(),
    }
}

pub fn log_entry_row(entry: &LogEntry) -> Row {
    vec![
        entry.timestamp.clone(),
        entry.code.clone(),
        entry.user.clone(),
        entry.action.clone(),
        entry.details.clone(),
        entry.slug.clone(),
    ]
}

pub fn log_entry_from_row(row: &[String]) -> LogEntry {
    LogEntry {
        timestamp: cell(row, 0).to_string(),
        code: cell(row, 1).trim().to_string(),
        user: cell(row, 2).to_string(),
        action: cell(row, 3).to_string(),
        details: cell(row, 4).to_string(),
        slug: cell(row, 5).to_string(),
    }
}

pub fn version_row(snapshot: &VersionSnapshot) -> Row {
    vec![
        snapshot.code.clone(),
        snapshot.version.to_string(),
        snapshot.timestamp.clone(),
        snapshot.user.clone(),
        snapshot.data.clone(),
        snapshot.slug.clone(),
    ]
}

/// Parses a version row. Rows whose version cell is not an integer are skipped by callers.
pub fn version_from_row(row: &[String]) -> Option<VersionSnapshot> {
    let version = cell(row, 1).trim().parse::<u32>().ok()?;
    Some(VersionSnapshot {
        code: cell(row, 0).trim().to_string(),
        version,
        timestamp: cell(row, 2).to_string(),
        user: cell(row, 3).to_string(),
        data: cell(row, 4).to_string(),
        slug: cell(row, 5).to_string(),
    })
}
