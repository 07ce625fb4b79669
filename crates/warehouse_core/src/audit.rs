//! crates/warehouse_core/src/audit.rs
//!
//! Human-readable change descriptions and the append-only log table.
//! The diff is informational only; reconciliation always works from the full new line list.

use crate::domain::{Document, Line, LogAction, LogEntry};
use crate::layout::{data_rows, format_qty, log_entry_from_row, log_entry_row};
use crate::ports::{PortResult, RowStore, TableRef};

/// Stored in place of a real newline between diff lines.
pub const DETAIL_SEPARATOR: &str = "\\n";

//=========================================================================================
// Diff
//=========================================================================================

fn field_change(label: &str, old: &str, new: &str) -> Option<String> {
    (old != new).then(|| format!("{}: \"{}\" => \"{}\"", label, old, new))
}

/// Short form of a line used for additions and removals.
fn describe_line(line: &Line) -> String {
    let mut text = line.product_code.clone();
    if !line.product_name.is_empty() {
        text.push_str(" - ");
        text.push_str(&line.product_name);
    }
    text.push_str(&format!(" ({}", format_qty(line.qty)));
    if !line.unit.is_empty() {
        text.push(' ');
        text.push_str(&line.unit);
    }
    text.push(')');
    if !line.memo.is_empty() {
        text.push_str(&format!(" [{}]", line.memo));
    }
    text
}

fn line_changes(old: &Line, new: &Line) -> Vec<String> {
    [
        field_change("Mã", &old.product_code, &new.product_code),
        field_change("Tên", &old.product_name, &new.product_name),
        field_change("SL", &format_qty(old.qty), &format_qty(new.qty)),
        field_change("ĐVT", &old.unit, &new.unit),
        field_change("Ghi chú", &old.memo, &new.memo),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// One entry per changed header field, then one per differing line index.
pub fn diff_lines(old: &Document, new: &Document) -> Vec<String> {
    let mut out: Vec<String> = [
        field_change("Ngày", &old.date, &new.date),
        field_change("Kho", &old.warehouse, &new.warehouse),
        field_change("Người nhận", &old.receiver, &new.receiver),
        field_change("Diễn giải", &old.description, &new.description),
    ]
    .into_iter()
    .flatten()
    .collect();

    let count = old.lines.len().max(new.lines.len());
    for i in 0..count {
        let label = format!("Dòng {}", i + 1);
        match (old.lines.get(i), new.lines.get(i)) {
            (None, Some(added)) => out.push(format!("{}: Thêm -> {}", label, describe_line(added))),
            (Some(removed), None) => {
                out.push(format!("{}: Xóa -> {}", label, describe_line(removed)))
            }
            (Some(before), Some(after)) => {
                let changes = line_changes(before, after);
                if !changes.is_empty() {
                    out.push(format!("{}: {}", label, changes.join("; ")));
                }
            }
            (None, None) => {}
        }
    }
    out
}

/// The `details` cell for an update: the joined diff, or the generic action text.
pub fn describe_update(old: &Document, new: &Document) -> String {
    let lines = diff_lines(old, new);
    if lines.is_empty() {
        LogAction::Update.as_str().to_string()
    } else {
        lines.join(DETAIL_SEPARATOR)
    }
}

/// The `details` cell for a creation: caller text when given, otherwise the action name.
pub fn describe_create(log_entry: Option<&str>) -> String {
    match log_entry.map(str::trim) {
        Some(text) if !text.is_empty() => text.replace('\n', DETAIL_SEPARATOR),
        _ => LogAction::Create.as_str().to_string(),
    }
}

//=========================================================================================
// Log Table
//=========================================================================================

pub struct AuditLog<'a> {
    store: &'a dyn RowStore,
    table: &'a TableRef,
}

impl<'a> AuditLog<'a> {
    pub fn new(store: &'a dyn RowStore, table: &'a TableRef) -> Self {
        Self { store, table }
    }

    pub async fn append(&self, entry: &LogEntry) -> PortResult<()> {
        self.store
            .append_rows(self.table, &[log_entry_row(entry)])
            .await
    }

    /// Every entry for `code`, oldest first.
    pub async fn entries_for(&self, code: &str) -> PortResult<Vec<LogEntry>> {
        let rows = self.store.read_rows(self.table).await?;
        Ok(data_rows(&rows)
            .map(|(_, row)| log_entry_from_row(row))
            .filter(|entry| entry.code == code)
            .collect())
    }
}
