//! services/api/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged with the receipt REST API. Request field
//! names follow the camelCase form used by the warehouse front end.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use warehouse_core::service::{DriftReport, SideEffectFailure};
use warehouse_core::{
    CreateDocument, Document, DocumentKind, Line, LogEntry, UpdateDocument, VersionSnapshot,
};

//=========================================================================================
// Requests
//=========================================================================================

/// Quantities arrive either as JSON numbers or as the text typed into a form.
fn qty_from_number_or_text<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("qty is out of range")),
        Value::String(s) if s.trim().is_empty() => Ok(0.0),
        Value::String(s) => s
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("qty '{}' is not a number", s))),
        Value::Null => Ok(0.0),
        other => Err(serde::de::Error::custom(format!("qty {} is not a number", other))),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LinePayload {
    pub product_code: String,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub unit: String,
    #[serde(deserialize_with = "qty_from_number_or_text")]
    #[schema(value_type = f64)]
    pub qty: f64,
    #[serde(default)]
    pub memo: String,
}

impl From<LinePayload> for Line {
    fn from(p: LinePayload) -> Self {
        Line {
            product_code: p.product_code,
            product_name: p.product_name,
            unit: p.unit,
            qty: p.qty,
            memo: p.memo,
        }
    }
}

impl From<Line> for LinePayload {
    fn from(line: Line) -> Self {
        LinePayload {
            product_code: line.product_code,
            product_name: line.product_name,
            unit: line.unit,
            qty: line.qty,
            memo: line.memo,
        }
    }
}

/// Body of `POST /api/{kind}`. The acting user comes from the `x-actor` header.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDocumentRequest {
    /// `YYYY-MM-DD` or `DD/MM/YYYY`.
    pub date: String,
    /// `HH:MM`; defaults to the current local time.
    pub time: Option<String>,
    pub warehouse: String,
    pub created_by: Option<String>,
    #[serde(default)]
    pub receiver: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source: String,
    pub lines: Vec<LinePayload>,
    /// Free text recorded as the creation log detail.
    pub log_entry: Option<String>,
}

impl From<CreateDocumentRequest> for CreateDocument {
    fn from(r: CreateDocumentRequest) -> Self {
        CreateDocument {
            date: r.date,
            time: r.time,
            warehouse: r.warehouse,
            created_by: r.created_by,
            receiver: r.receiver,
            description: r.description,
            source: r.source,
            lines: r.lines.into_iter().map(Line::from).collect(),
            log_entry: r.log_entry,
        }
    }
}

/// Body of `PUT /api/{kind}`. Omitted header fields keep their stored values;
/// `lines` always replaces the full line list.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDocumentRequest {
    pub code: String,
    pub date: Option<String>,
    pub time: Option<String>,
    pub warehouse: Option<String>,
    pub created_by: Option<String>,
    pub receiver: Option<String>,
    pub description: Option<String>,
    pub source: Option<String>,
    pub lines: Vec<LinePayload>,
}

impl From<UpdateDocumentRequest> for UpdateDocument {
    fn from(r: UpdateDocumentRequest) -> Self {
        UpdateDocument {
            code: r.code,
            date: r.date,
            time: r.time,
            warehouse: r.warehouse,
            created_by: r.created_by,
            receiver: r.receiver,
            description: r.description,
            source: r.source,
            lines: r.lines.into_iter().map(Line::from).collect(),
        }
    }
}

//=========================================================================================
// Responses
//=========================================================================================

/// One receipt with its lines and aggregates.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentView {
    pub code: String,
    pub date: String,
    pub time: String,
    pub warehouse: String,
    pub created_by: String,
    pub receiver: String,
    pub description: String,
    pub source: String,
    pub lines: Vec<LinePayload>,
    /// Number of lines.
    pub items: usize,
    /// Sum of line quantities.
    pub quantity: f64,
    pub slug: Option<String>,
}

impl From<Document> for DocumentView {
    fn from(doc: Document) -> Self {
        let items = doc.items();
        let quantity = doc.quantity();
        DocumentView {
            code: doc.code,
            date: doc.date,
            time: doc.time,
            warehouse: doc.warehouse,
            created_by: doc.created_by,
            receiver: doc.receiver,
            description: doc.description,
            source: doc.source,
            lines: doc.lines.into_iter().map(LinePayload::from).collect(),
            items,
            quantity,
            slug: doc.slug,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ListResponse {
    pub ok: bool,
    pub documents: Vec<DocumentView>,
}

#[derive(Serialize, ToSchema)]
pub struct DocumentResponse {
    pub ok: bool,
    pub document: DocumentView,
}

/// Returned after a create or update. Side-table outcomes are not reported here.
#[derive(Serialize, ToSchema)]
pub struct MutationResponse {
    pub ok: bool,
    pub code: String,
    pub document: DocumentView,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub ok: bool,
    pub code: String,
    pub rows_deleted: usize,
}

#[derive(Serialize, ToSchema)]
pub struct LogEntryView {
    pub timestamp: String,
    pub code: String,
    pub user: String,
    pub action: String,
    pub details: String,
    pub slug: String,
}

impl From<LogEntry> for LogEntryView {
    fn from(e: LogEntry) -> Self {
        LogEntryView {
            timestamp: e.timestamp,
            code: e.code,
            user: e.user,
            action: e.action,
            details: e.details,
            slug: e.slug,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct VersionView {
    pub code: String,
    pub version: u32,
    pub timestamp: String,
    pub user: String,
    /// The snapshot as JSON, or the raw cell text when it does not parse.
    #[schema(value_type = Object)]
    pub data: Value,
    pub slug: String,
}

impl From<VersionSnapshot> for VersionView {
    fn from(v: VersionSnapshot) -> Self {
        let data = serde_json::from_str(&v.data).unwrap_or(Value::String(v.data));
        VersionView {
            code: v.code,
            version: v.version,
            timestamp: v.timestamp,
            user: v.user,
            data,
            slug: v.slug,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct HistoryResponse {
    pub ok: bool,
    pub entries: Vec<LogEntryView>,
    pub versions: Vec<VersionView>,
}

#[derive(Serialize, ToSchema)]
pub struct PreviewResponse {
    pub ok: bool,
    #[schema(value_type = String, example = "inbound")]
    pub kind: DocumentKind,
    /// `{PUBLIC_BASE_URL}/p/{slug}`.
    pub url: String,
    pub document: DocumentView,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DriftView {
    #[schema(value_type = String, example = "outbound")]
    pub kind: DocumentKind,
    pub code: String,
    pub missing_slug: bool,
    pub missing_version: bool,
}

impl From<DriftReport> for DriftView {
    fn from(r: DriftReport) -> Self {
        DriftView {
            kind: r.kind,
            code: r.code,
            missing_slug: r.missing_slug,
            missing_version: r.missing_version,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct DriftResponse {
    pub ok: bool,
    pub drift: Vec<DriftView>,
}

#[derive(Serialize, ToSchema)]
pub struct RepairFailureView {
    pub step: String,
    pub message: String,
}

impl From<SideEffectFailure> for RepairFailureView {
    fn from(f: SideEffectFailure) -> Self {
        RepairFailureView {
            step: f.step.to_string(),
            message: f.message,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct RepairResponse {
    pub ok: bool,
    pub repaired: Vec<DriftView>,
    pub failures: Vec<RepairFailureView>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub ok: bool,
    pub row_store: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qty_accepts_numbers_and_form_text() {
        let parse = |json: &str| serde_json::from_str::<LinePayload>(json).map(|l| l.qty);
        assert_eq!(parse(r#"{"productCode":"SP01","qty":5}"#).unwrap(), 5.0);
        assert_eq!(parse(r#"{"productCode":"SP01","qty":"2,5"}"#).unwrap(), 2.5);
        assert_eq!(parse(r#"{"productCode":"SP01","qty":""}"#).unwrap(), 0.0);
        assert!(parse(r#"{"productCode":"SP01","qty":"nhiều"}"#).is_err());
    }

    #[test]
    fn document_view_carries_aggregates() {
        let request: CreateDocumentRequest = serde_json::from_str(
            r#"{"date":"2025-10-10","warehouse":"Kho Tổng","user":"ignored",
                "lines":[{"productCode":"SP01","qty":5,"unit":"Kg"},
                         {"productCode":"SP02","qty":"2.5"}]}"#,
        )
        .unwrap();
        let cmd = CreateDocument::from(request);
        let doc = Document {
            code: "PNK10102501".into(),
            date: "10/10/2025".into(),
            time: "08:30".into(),
            warehouse: cmd.warehouse,
            created_by: "an".into(),
            receiver: cmd.receiver,
            description: cmd.description,
            source: cmd.source,
            lines: cmd.lines,
            slug: None,
        };

        let view = serde_json::to_value(DocumentView::from(doc)).unwrap();
        assert_eq!(view["items"], 2);
        assert_eq!(view["quantity"], 7.5);
        assert_eq!(view["createdBy"], "an");
        assert!(view["slug"].is_null());
    }
}
