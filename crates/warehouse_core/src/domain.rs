//! crates/warehouse_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of the spreadsheet layout; the mapping to and
//! from physical rows lives in `layout.rs`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

//=========================================================================================
// Document Kind
//=========================================================================================

/// The two receipt tables. Each kind owns its own primary, link, log and version tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Inbound,
    Outbound,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 2] = [DocumentKind::Inbound, DocumentKind::Outbound];

    /// The 3-letter code prefix: `PNK` (phiếu nhập kho) or `PXK` (phiếu xuất kho).
    pub fn prefix(self) -> &'static str {
        match self {
            DocumentKind::Inbound => "PNK",
            DocumentKind::Outbound => "PXK",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Inbound => "inbound",
            DocumentKind::Outbound => "outbound",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inbound" => Ok(DocumentKind::Inbound),
            "outbound" => Ok(DocumentKind::Outbound),
            other => Err(format!("unknown document kind '{}'", other)),
        }
    }
}

//=========================================================================================
// Documents and Lines
//=========================================================================================

/// One product/quantity entry of a receipt. It has no identity beyond its position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    pub product_code: String,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub unit: String,
    pub qty: f64,
    #[serde(default)]
    pub memo: String,
}

/// A logical inbound or outbound receipt.
///
/// `date` is kept in the stored `DD/MM/YYYY` form because documents are always
/// materialized from sheet cells; request dates are normalized before they get here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub code: String,
    pub date: String,
    pub time: String,
    pub warehouse: String,
    pub created_by: String,
    pub receiver: String,
    pub description: String,
    pub source: String,
    pub lines: Vec<Line>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

impl Document {
    /// Number of lines (`items` in the list endpoint).
    pub fn items(&self) -> usize {
        self.lines.len()
    }

    /// Sum of line quantities (`quantity` in the list endpoint).
    pub fn quantity(&self) -> f64 {
        self.lines.iter().map(|l| l.qty).sum()
    }
}

//=========================================================================================
// Side Tables
//=========================================================================================

/// A `{code, slug}` row of the link table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlugLink {
    pub code: String,
    pub slug: String,
}

/// The fixed set of audit actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogAction {
    Create,
    Update,
}

impl LogAction {
    pub fn as_str(self) -> &'static str {
        match self {
            LogAction::Create => "Tạo phiếu",
            LogAction::Update => "Cập nhật phiếu",
        }
    }
}

impl fmt::Display for LogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable audit record. Never mutated or deleted once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub code: String,
    pub user: String,
    pub action: String,
    pub details: String,
    pub slug: String,
}

/// An immutable, numbered JSON copy of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSnapshot {
    pub code: String,
    pub version: u32,
    pub timestamp: String,
    pub user: String,
    /// The JSON-serialized `Document` as it was written.
    pub data: String,
    pub slug: String,
}

impl VersionSnapshot {
    /// Decodes the stored JSON back into a document.
    pub fn document(&self) -> serde_json::Result<Document> {
        serde_json::from_str(&self.data)
    }
}

/// Everything the append-only tables know about one code.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DocumentHistory {
    pub entries: Vec<LogEntry>,
    pub versions: Vec<VersionSnapshot>,
}

//=========================================================================================
// Actor and Commands
//=========================================================================================

/// The request-scoped identity that stamps `createdBy`, log and version entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(pub String);

impl Actor {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

/// Input for creating a receipt. `date` accepts `YYYY-MM-DD` or `DD/MM/YYYY`.
#[derive(Debug, Clone, Default)]
pub struct CreateDocument {
    pub date: String,
    pub time: Option<String>,
    pub warehouse: String,
    pub created_by: Option<String>,
    pub receiver: String,
    pub description: String,
    pub source: String,
    pub lines: Vec<Line>,
    /// Free-text detail for the creation log entry.
    pub log_entry: Option<String>,
}

/// Input for rewriting a receipt. Header fields left as `None` keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct UpdateDocument {
    pub code: String,
    pub date: Option<String>,
    pub time: Option<String>,
    pub warehouse: Option<String>,
    pub created_by: Option<String>,
    pub receiver: Option<String>,
    pub description: Option<String>,
    pub source: Option<String>,
    pub lines: Vec<Line>,
}
