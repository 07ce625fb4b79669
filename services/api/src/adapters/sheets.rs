//! services/api/src/adapters/sheets.rs
//!
//! The Google Sheets v4 implementation of the `RowStore` port. Each `TableRef`
//! names a tab of a single spreadsheet; rows are addressed with A1 ranges.

use crate::adapters::token::ServiceAccountTokens;
use crate::config::SheetsConfig;
use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::{Method, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use warehouse_core::ports::{CellSpan, PortError, PortResult, Row, RowStore, TableRef};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";

//=========================================================================================
// A1 Notation
//=========================================================================================

/// `0 -> A`, `25 -> Z`, `26 -> AA`.
fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Quoted tab name, with embedded quotes doubled.
fn quoted_sheet(sheet: &str) -> String {
    format!("'{}'", sheet.replace('\'', "''"))
}

/// Every column of the table, from the header row down.
fn table_range(table: &TableRef) -> String {
    format!(
        "{}!A1:{}",
        quoted_sheet(&table.sheet),
        column_letter(table.width.saturating_sub(1))
    )
}

fn row_range(table: &TableRef, row_number: usize, span: CellSpan) -> String {
    format!(
        "{}!{}{}:{}{}",
        quoted_sheet(&table.sheet),
        column_letter(span.first_column),
        row_number,
        column_letter(span.first_column + span.width.saturating_sub(1)),
        row_number
    )
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Maps a failed Sheets response onto the port taxonomy.
fn classify(status: StatusCode, body: &str, sheet: &str) -> PortError {
    if status == StatusCode::BAD_REQUEST && body.contains("Unable to parse range") {
        return PortError::TabNotFound(sheet.to_string());
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            PortError::Unauthorized(format!("{}: {}", status, body))
        }
        StatusCode::TOO_MANY_REQUESTS => PortError::Unavailable(format!("rate limited: {}", body)),
        s if s.is_server_error() => PortError::Unavailable(format!("{}: {}", status, body)),
        _ => PortError::Malformed(format!("{}: {}", status, body)),
    }
}

//=========================================================================================
// Response Payloads
//=========================================================================================

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

pub struct GoogleSheetsAdapter {
    client: reqwest::Client,
    spreadsheet_id: String,
    tokens: ServiceAccountTokens,
    /// Numeric tab ids by title, needed for row deletion.
    sheet_ids: DashMap<String, i64>,
}

impl GoogleSheetsAdapter {
    pub fn new(config: &SheetsConfig) -> PortResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PortError::Unavailable(format!("could not build HTTP client: {}", e)))?;
        let tokens = ServiceAccountTokens::new(
            client.clone(),
            &config.service_account_email,
            &config.private_key,
        )?;
        Ok(Self {
            client,
            spreadsheet_id: config.spreadsheet_id.clone(),
            tokens,
            sheet_ids: DashMap::new(),
        })
    }

    /// `{SHEETS_API}/{segments...}` with each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> PortResult<Url> {
        let mut url =
            Url::parse(SHEETS_API).map_err(|e| PortError::Malformed(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| PortError::Malformed("Sheets API base cannot hold a path".to_string()))?
            .extend(segments);
        Ok(url)
    }

    fn values_url(&self, range: &str) -> PortResult<Url> {
        self.url(&[self.spreadsheet_id.as_str(), "values", range])
    }

    /// Sends an authorized request and decodes the JSON response body.
    async fn call<T>(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, &str)],
        body: Option<Value>,
        sheet: &str,
    ) -> PortResult<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let token = self.tokens.access_token().await?;
        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(token)
            .query(query);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| {
            PortError::Unavailable(format!("Sheets request for {} failed: {}", sheet, e))
        })?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let err = classify(status, &text, sheet);
            warn!(%sheet, %status, error = %err, "Sheets request rejected");
            return Err(err);
        }
        response
            .json::<T>()
            .await
            .map_err(|e| PortError::Malformed(format!("unexpected Sheets response: {}", e)))
    }

    async fn sheet_id(&self, sheet: &str) -> PortResult<i64> {
        if let Some(id) = self.sheet_ids.get(sheet) {
            return Ok(*id);
        }
        let meta: SpreadsheetMeta = self
            .call(
                Method::GET,
                self.url(&[self.spreadsheet_id.as_str()])?,
                &[("fields", "sheets.properties(sheetId,title)")],
                None,
                sheet,
            )
            .await?;
        for entry in meta.sheets {
            self.sheet_ids
                .insert(entry.properties.title, entry.properties.sheet_id);
        }
        self.sheet_ids
            .get(sheet)
            .map(|id| *id)
            .ok_or_else(|| PortError::TabNotFound(sheet.to_string()))
    }
}

//=========================================================================================
// RowStore Implementation
//=========================================================================================

#[async_trait]
impl RowStore for GoogleSheetsAdapter {
    async fn read_rows(&self, table: &TableRef) -> PortResult<Vec<Row>> {
        let range = table_range(table);
        let values: ValueRange = self
            .call(
                Method::GET,
                self.values_url(&range)?,
                &[
                    ("majorDimension", "ROWS"),
                    ("valueRenderOption", "FORMATTED_VALUE"),
                ],
                None,
                &table.sheet,
            )
            .await?;

        Ok(values
            .values
            .iter()
            .map(|row| {
                let mut cells: Row = row.iter().map(cell_text).collect();
                cells.resize(table.width.max(cells.len()), String::new());
                cells
            })
            .collect())
    }

    async fn write_row(
        &self,
        table: &TableRef,
        row_number: usize,
        span: CellSpan,
        values: &[String],
    ) -> PortResult<()> {
        let range = row_range(table, row_number, span);
        let cells: Vec<&str> = (0..span.width)
            .map(|i| values.get(i).map(String::as_str).unwrap_or(""))
            .collect();
        let _: Value = self
            .call(
                Method::PUT,
                self.values_url(&range)?,
                &[("valueInputOption", "RAW")],
                Some(json!({ "range": range, "majorDimension": "ROWS", "values": [cells] })),
                &table.sheet,
            )
            .await?;
        Ok(())
    }

    async fn append_rows(&self, table: &TableRef, rows: &[Row]) -> PortResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let range = table_range(table);
        let _: Value = self
            .call(
                Method::POST,
                self.values_url(&format!("{}:append", range))?,
                &[
                    ("valueInputOption", "RAW"),
                    ("insertDataOption", "INSERT_ROWS"),
                ],
                Some(json!({ "majorDimension": "ROWS", "values": rows })),
                &table.sheet,
            )
            .await?;
        debug!(sheet = %table.sheet, count = rows.len(), "Rows appended");
        Ok(())
    }

    async fn delete_rows(&self, table: &TableRef, row_numbers: &[usize]) -> PortResult<()> {
        if row_numbers.is_empty() {
            return Ok(());
        }
        let sheet_id = self.sheet_id(&table.sheet).await?;
        // One batchUpdate applies its requests in order, so the caller's
        // descending order keeps each index valid.
        let requests: Vec<Value> = row_numbers
            .iter()
            .map(|&row_number| {
                json!({
                    "deleteDimension": {
                        "range": {
                            "sheetId": sheet_id,
                            "dimension": "ROWS",
                            "startIndex": row_number - 1,
                            "endIndex": row_number,
                        }
                    }
                })
            })
            .collect();
        let _: Value = self
            .call(
                Method::POST,
                self.url(&[&format!("{}:batchUpdate", self.spreadsheet_id)])?,
                &[],
                Some(json!({ "requests": requests })),
                &table.sheet,
            )
            .await?;
        debug!(sheet = %table.sheet, rows = ?row_numbers, "Rows deleted");
        Ok(())
    }
}
