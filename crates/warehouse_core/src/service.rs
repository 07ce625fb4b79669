//! crates/warehouse_core/src/service.rs
//!
//! The document mutation orchestrator.
//!
//! The backing store has no multi-table transaction, so every mutation is a small
//! saga: the primary-row step runs first and is the only one allowed to fail the
//! request. Slug, log and version steps then run one by one; each failure is logged
//! with the step name and returned in the outcome instead of aborting.

use crate::audit::{describe_create, describe_update, AuditLog};
use crate::domain::{
    Actor, CreateDocument, Document, DocumentHistory, DocumentKind, Line, LogAction, LogEntry,
    UpdateDocument, VersionSnapshot,
};
use crate::error::{DocumentError, DocumentResult};
use crate::layout::{
    format_sheet_date, format_time, format_timestamp, is_valid_time, parse_request_date,
    DocumentTables,
};
use crate::links::{generate_slug, SlugLinks};
use crate::locks::KeyedLocks;
use crate::ports::{Clock, PortError, PortResult, RowStore};
use crate::reconcile::{DocumentRows, ReconcileReport};
use crate::sequence::next_code;
use crate::versions::VersionLedger;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, field, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

//=========================================================================================
// Outcomes
//=========================================================================================

/// A best-effort step that runs after the primary write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffect {
    SlugUpsert,
    SlugLookup,
    SlugDelete,
    LogAppend,
    VersionAppend,
}

impl fmt::Display for SideEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SideEffect::SlugUpsert => "slug_upsert",
            SideEffect::SlugLookup => "slug_lookup",
            SideEffect::SlugDelete => "slug_delete",
            SideEffect::LogAppend => "log_append",
            SideEffect::VersionAppend => "version_append",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SideEffectFailure {
    pub step: SideEffect,
    pub message: String,
}

/// Result of a create or update. The document is what was written to the primary table.
#[derive(Debug, Clone)]
pub struct MutationOutcome {
    pub document: Document,
    pub version: Option<u32>,
    pub rows: ReconcileReport,
    pub failures: Vec<SideEffectFailure>,
}

#[derive(Debug, Clone)]
pub struct DeleteOutcome {
    pub code: String,
    pub rows_deleted: usize,
    pub failures: Vec<SideEffectFailure>,
}

/// A document whose side tables are missing entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftReport {
    pub kind: DocumentKind,
    pub code: String,
    pub missing_slug: bool,
    pub missing_version: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RepairOutcome {
    pub repaired: Vec<DriftReport>,
    pub failures: Vec<SideEffectFailure>,
}

fn side_effect_failed(step: SideEffect, err: PortError) -> SideEffectFailure {
    warn!(%step, error = %err, "Best-effort step failed; primary rows are already written");
    SideEffectFailure {
        step,
        message: err.to_string(),
    }
}

//=========================================================================================
// Validation
//=========================================================================================

fn require_date(raw: &str) -> DocumentResult<NaiveDate> {
    if raw.trim().is_empty() {
        return Err(DocumentError::Validation("date is required".to_string()));
    }
    parse_request_date(raw)
        .ok_or_else(|| DocumentError::Validation(format!("invalid date '{}'", raw)))
}

fn optional_time(raw: Option<&str>) -> DocumentResult<Option<String>> {
    match raw.map(str::trim).filter(|t| !t.is_empty()) {
        None => Ok(None),
        Some(t) if is_valid_time(t) => Ok(Some(t.to_string())),
        Some(t) => Err(DocumentError::Validation(format!(
            "invalid time '{}', expected HH:MM",
            t
        ))),
    }
}

fn non_blank(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Rejects empty line lists, lines without a product code and non-finite or negative quantities.
fn validate_lines(lines: &[Line]) -> DocumentResult<Vec<Line>> {
    if lines.is_empty() {
        return Err(DocumentError::Validation(
            "lines must contain at least one line".to_string(),
        ));
    }
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let product_code = line.product_code.trim();
            if product_code.is_empty() {
                return Err(DocumentError::Validation(format!(
                    "line {} is missing productCode",
                    i + 1
                )));
            }
            if !line.qty.is_finite() || line.qty < 0.0 {
                return Err(DocumentError::Validation(format!(
                    "line {} has an invalid qty",
                    i + 1
                )));
            }
            Ok(Line {
                product_code: product_code.to_string(),
                product_name: line.product_name.trim().to_string(),
                unit: line.unit.trim().to_string(),
                qty: line.qty,
                memo: line.memo.trim().to_string(),
            })
        })
        .collect()
}

//=========================================================================================
// The Orchestrator
//=========================================================================================

pub struct DocumentService {
    store: Arc<dyn RowStore>,
    clock: Arc<dyn Clock>,
    inbound: DocumentTables,
    outbound: DocumentTables,
    locks: KeyedLocks,
}

impl DocumentService {
    pub fn new(
        store: Arc<dyn RowStore>,
        clock: Arc<dyn Clock>,
        inbound: DocumentTables,
        outbound: DocumentTables,
    ) -> Self {
        Self {
            store,
            clock,
            inbound,
            outbound,
            locks: KeyedLocks::new(),
        }
    }

    pub fn tables(&self, kind: DocumentKind) -> &DocumentTables {
        match kind {
            DocumentKind::Inbound => &self.inbound,
            DocumentKind::Outbound => &self.outbound,
        }
    }

    fn rows<'a>(&'a self, tables: &'a DocumentTables) -> DocumentRows<'a> {
        DocumentRows::new(self.store.as_ref(), &tables.primary)
    }

    fn links<'a>(&'a self, tables: &'a DocumentTables) -> SlugLinks<'a> {
        SlugLinks::new(self.store.as_ref(), &tables.links)
    }

    fn ledger<'a>(&'a self, tables: &'a DocumentTables) -> VersionLedger<'a> {
        VersionLedger::new(self.store.as_ref(), &tables.versions)
    }

    fn audit<'a>(&'a self, tables: &'a DocumentTables) -> AuditLog<'a> {
        AuditLog::new(self.store.as_ref(), &tables.log)
    }

    //-------------------------------------------------------------------------------------
    // Create
    //-------------------------------------------------------------------------------------

    pub async fn create(
        &self,
        kind: DocumentKind,
        actor: &Actor,
        cmd: CreateDocument,
    ) -> DocumentResult<MutationOutcome> {
        let date = require_date(&cmd.date)?;
        let warehouse = non_blank(Some(cmd.warehouse.as_str()))
            .ok_or_else(|| DocumentError::Validation("warehouse is required".to_string()))?;
        let time = optional_time(cmd.time.as_deref())?;
        let lines = validate_lines(&cmd.lines)?;

        let span = info_span!(
            "create_document",
            %kind,
            mutation_id = %Uuid::new_v4(),
            code = field::Empty
        );
        async move {
            let tables = self.tables(kind);
            let now = self.clock.now();

            let mut doc = {
                let _guard = self.locks.lock(&tables.primary.sheet).await;
                let rows = self.rows(tables);
                let snapshot = rows.snapshot().await?;
                let doc = Document {
                    code: next_code(kind, date, snapshot.codes()),
                    date: format_sheet_date(date),
                    time: time.unwrap_or_else(|| format_time(&now)),
                    warehouse,
                    created_by: non_blank(cmd.created_by.as_deref())
                        .unwrap_or_else(|| actor.name().to_string()),
                    receiver: cmd.receiver.trim().to_string(),
                    description: cmd.description.trim().to_string(),
                    source: cmd.source.trim().to_string(),
                    lines,
                    slug: None,
                };
                rows.append(&doc).await?;
                doc
            };
            Span::current().record("code", doc.code.as_str());
            info!(lines = doc.lines.len(), "Document rows appended");

            let timestamp = format_timestamp(&now);
            let mut failures = Vec::new();

            let slug = generate_slug();
            match self.upsert_slug(tables, &doc.code, &slug).await {
                Ok(()) => doc.slug = Some(slug),
                Err(e) => failures.push(side_effect_failed(SideEffect::SlugUpsert, e)),
            }

            let version = match self
                .append_version(tables, &doc, Some(1), &timestamp, actor)
                .await
            {
                Ok(snapshot) => Some(snapshot.version),
                Err(e) => {
                    failures.push(side_effect_failed(SideEffect::VersionAppend, e));
                    None
                }
            };

            let entry = LogEntry {
                timestamp,
                code: doc.code.clone(),
                user: actor.name().to_string(),
                action: LogAction::Create.to_string(),
                details: describe_create(cmd.log_entry.as_deref()),
                slug: doc.slug.clone().unwrap_or_default(),
            };
            if let Err(e) = self.audit(tables).append(&entry).await {
                failures.push(side_effect_failed(SideEffect::LogAppend, e));
            }

            Ok(MutationOutcome {
                rows: ReconcileReport {
                    appended: doc.lines.len(),
                    ..ReconcileReport::default()
                },
                document: doc,
                version,
                failures,
            })
        }
        .instrument(span)
        .await
    }

    //-------------------------------------------------------------------------------------
    // Update
    //-------------------------------------------------------------------------------------

    pub async fn update(
        &self,
        kind: DocumentKind,
        actor: &Actor,
        cmd: UpdateDocument,
    ) -> DocumentResult<MutationOutcome> {
        let code = non_blank(Some(cmd.code.as_str()))
            .ok_or_else(|| DocumentError::Validation("code is required".to_string()))?;
        let date = cmd.date.as_deref().map(require_date).transpose()?;
        if matches!(cmd.warehouse.as_deref(), Some(w) if w.trim().is_empty()) {
            return Err(DocumentError::Validation(
                "warehouse must not be blank".to_string(),
            ));
        }
        let time = optional_time(cmd.time.as_deref())?;
        let lines = validate_lines(&cmd.lines)?;

        let span = info_span!(
            "update_document",
            %kind,
            code = %code,
            mutation_id = %Uuid::new_v4()
        );
        async move {
            let tables = self.tables(kind);
            let now = self.clock.now();

            // The primary rewrite never touches the link table; the slug is read up
            // front so it can be stamped on the log and version rows.
            let preserved_slug = match self.links(tables).get(&code).await {
                Ok(slug) => slug,
                Err(e) => {
                    warn!(error = %e, "Could not read the preserved slug");
                    None
                }
            };

            let (previous, mut doc, report) = {
                let _guard = self.locks.lock(&tables.primary.sheet).await;
                let rows = self.rows(tables);
                let snapshot = rows.snapshot().await?;
                let previous = snapshot
                    .document(&code)
                    .ok_or_else(|| DocumentError::CodeNotFound(code.clone()))?;

                let doc = Document {
                    code: code.clone(),
                    date: date.map(format_sheet_date).unwrap_or_else(|| previous.date.clone()),
                    time: time.unwrap_or_else(|| previous.time.clone()),
                    warehouse: non_blank(cmd.warehouse.as_deref())
                        .unwrap_or_else(|| previous.warehouse.clone()),
                    created_by: non_blank(cmd.created_by.as_deref())
                        .or_else(|| non_blank(Some(previous.created_by.as_str())))
                        .unwrap_or_else(|| actor.name().to_string()),
                    receiver: cmd
                        .receiver
                        .as_deref()
                        .map(|s| s.trim().to_string())
                        .unwrap_or_else(|| previous.receiver.clone()),
                    description: cmd
                        .description
                        .as_deref()
                        .map(|s| s.trim().to_string())
                        .unwrap_or_else(|| previous.description.clone()),
                    source: cmd
                        .source
                        .as_deref()
                        .map(|s| s.trim().to_string())
                        .unwrap_or_else(|| previous.source.clone()),
                    lines,
                    slug: None,
                };
                let report = rows.save_reconciled(&snapshot, &doc).await?;
                (previous, doc, report)
            };
            info!(?report, "Document rows reconciled");
            doc.slug = preserved_slug.clone();

            let timestamp = format_timestamp(&now);
            let mut failures = Vec::new();

            let entry = LogEntry {
                timestamp: timestamp.clone(),
                code: code.clone(),
                user: actor.name().to_string(),
                action: LogAction::Update.to_string(),
                details: describe_update(&previous, &doc),
                slug: doc.slug.clone().unwrap_or_default(),
            };
            if let Err(e) = self.audit(tables).append(&entry).await {
                failures.push(side_effect_failed(SideEffect::LogAppend, e));
            }

            match preserved_slug {
                Some(slug) => {
                    if let Err(e) = self.upsert_slug(tables, &code, &slug).await {
                        failures.push(side_effect_failed(SideEffect::SlugUpsert, e));
                    }
                }
                None => debug!("Document has no slug to preserve"),
            }

            let version = match self
                .append_version(tables, &doc, None, &timestamp, actor)
                .await
            {
                Ok(snapshot) => Some(snapshot.version),
                Err(e) => {
                    failures.push(side_effect_failed(SideEffect::VersionAppend, e));
                    None
                }
            };

            Ok(MutationOutcome {
                document: doc,
                version,
                rows: report,
                failures,
            })
        }
        .instrument(span)
        .await
    }

    //-------------------------------------------------------------------------------------
    // Delete
    //-------------------------------------------------------------------------------------

    /// Removes every primary row for `code`, then the slug link. Log and version
    /// tables are append-only and keep their history.
    pub async fn delete(&self, kind: DocumentKind, code: &str) -> DocumentResult<DeleteOutcome> {
        let code = non_blank(Some(code))
            .ok_or_else(|| DocumentError::Validation("code is required".to_string()))?;

        let span = info_span!(
            "delete_document",
            %kind,
            code = %code,
            mutation_id = %Uuid::new_v4()
        );
        async move {
            let tables = self.tables(kind);
            let rows_deleted = {
                let _guard = self.locks.lock(&tables.primary.sheet).await;
                self.rows(tables).delete_by_code(&code).await?
            };
            info!(rows_deleted, "Document rows deleted");

            let mut failures = Vec::new();
            let removed = {
                let _guard = self.locks.lock(&tables.links.sheet).await;
                self.links(tables).delete(&code).await
            };
            match removed {
                Ok(n) => debug!(links_deleted = n, "Slug link removed"),
                Err(e) => failures.push(side_effect_failed(SideEffect::SlugDelete, e)),
            }

            Ok(DeleteOutcome {
                code,
                rows_deleted,
                failures,
            })
        }
        .instrument(span)
        .await
    }

    //-------------------------------------------------------------------------------------
    // Reads
    //-------------------------------------------------------------------------------------

    /// Every document of `kind`, grouped by code and joined with its slug.
    pub async fn list(&self, kind: DocumentKind) -> DocumentResult<Vec<Document>> {
        let tables = self.tables(kind);
        let (rows, links) = (self.rows(tables), self.links(tables));
        let (snapshot, links) = futures::try_join!(rows.snapshot(), links.all())?;

        let mut slugs: HashMap<String, String> = HashMap::new();
        for link in links {
            slugs.entry(link.code).or_insert(link.slug);
        }

        Ok(snapshot
            .documents()
            .into_iter()
            .map(|mut doc| {
                doc.slug = slugs.get(&doc.code).cloned();
                doc
            })
            .collect())
    }

    pub async fn get(&self, kind: DocumentKind, code: &str) -> DocumentResult<Document> {
        let tables = self.tables(kind);
        let (rows, links) = (self.rows(tables), self.links(tables));
        let (doc, slug) = futures::try_join!(rows.load_by_code(code), links.get(code))?;
        let mut doc = doc.ok_or_else(|| DocumentError::CodeNotFound(code.to_string()))?;
        doc.slug = slug;
        Ok(doc)
    }

    /// Resolves a public slug across both kinds. Slugs whose document is gone resolve to `None`.
    pub async fn find_by_slug(
        &self,
        slug: &str,
    ) -> DocumentResult<Option<(DocumentKind, Document)>> {
        for kind in DocumentKind::ALL {
            let tables = self.tables(kind);
            let links = self.links(tables).all().await?;
            let Some(link) = links.into_iter().find(|l| l.slug == slug) else {
                continue;
            };
            if let Some(mut doc) = self.rows(tables).load_by_code(&link.code).await? {
                doc.slug = Some(link.slug);
                return Ok(Some((kind, doc)));
            }
            debug!(code = %link.code, "Slug points at a deleted document");
        }
        Ok(None)
    }

    /// Log entries and version snapshots for `code`, oldest first.
    pub async fn history(&self, kind: DocumentKind, code: &str) -> DocumentResult<DocumentHistory> {
        let tables = self.tables(kind);
        let (audit, ledger) = (self.audit(tables), self.ledger(tables));
        let (entries, versions) =
            futures::try_join!(audit.entries_for(code), ledger.history(code))?;
        Ok(DocumentHistory { entries, versions })
    }

    //-------------------------------------------------------------------------------------
    // Drift
    //-------------------------------------------------------------------------------------

    /// Documents that have primary rows but no slug link or no version snapshot,
    /// the footprint of a best-effort step that failed.
    pub async fn scan_drift(&self, kind: DocumentKind) -> DocumentResult<Vec<DriftReport>> {
        let tables = self.tables(kind);
        let (rows, links, ledger) = (self.rows(tables), self.links(tables), self.ledger(tables));
        let (snapshot, links, versions) =
            futures::try_join!(rows.snapshot(), links.all(), ledger.all())?;

        let linked: HashSet<String> = links.into_iter().map(|l| l.code).collect();
        let versioned: HashSet<String> = versions.into_iter().map(|v| v.code).collect();

        Ok(snapshot
            .documents()
            .into_iter()
            .filter_map(|doc| {
                let report = DriftReport {
                    kind,
                    missing_slug: !linked.contains(&doc.code),
                    missing_version: !versioned.contains(&doc.code),
                    code: doc.code,
                };
                (report.missing_slug || report.missing_version).then_some(report)
            })
            .collect())
    }

    /// Back-fills missing slugs and snapshots. Log entries are not reconstructed.
    pub async fn repair_drift(
        &self,
        kind: DocumentKind,
        actor: &Actor,
    ) -> DocumentResult<RepairOutcome> {
        let tables = self.tables(kind);
        let mut outcome = RepairOutcome::default();
        let timestamp = format_timestamp(&self.clock.now());

        for report in self.scan_drift(kind).await? {
            let Some(mut doc) = self.rows(tables).load_by_code(&report.code).await? else {
                continue;
            };
            let mut repaired = true;

            if report.missing_slug {
                let slug = generate_slug();
                match self.upsert_slug(tables, &doc.code, &slug).await {
                    Ok(()) => doc.slug = Some(slug),
                    Err(e) => {
                        repaired = false;
                        outcome
                            .failures
                            .push(side_effect_failed(SideEffect::SlugUpsert, e));
                    }
                }
            } else {
                match self.links(tables).get(&doc.code).await {
                    Ok(slug) => doc.slug = slug,
                    Err(e) => {
                        // Left drifted; the next pass retries it.
                        outcome
                            .failures
                            .push(side_effect_failed(SideEffect::SlugLookup, e));
                        continue;
                    }
                }
            }

            if report.missing_version {
                if let Err(e) = self
                    .append_version(tables, &doc, None, &timestamp, actor)
                    .await
                {
                    repaired = false;
                    outcome
                        .failures
                        .push(side_effect_failed(SideEffect::VersionAppend, e));
                }
            }

            if repaired {
                info!(%kind, code = %report.code, "Drift repaired");
                outcome.repaired.push(report);
            }
        }
        Ok(outcome)
    }

    //-------------------------------------------------------------------------------------
    // Side-table steps, each under the lock of its sheet
    //-------------------------------------------------------------------------------------

    async fn upsert_slug(&self, tables: &DocumentTables, code: &str, slug: &str) -> PortResult<()> {
        let _guard = self.locks.lock(&tables.links.sheet).await;
        self.links(tables).upsert(code, slug).await
    }

    /// Appends `doc` as `version`, or as `max + 1` when `version` is `None`.
    async fn append_version(
        &self,
        tables: &DocumentTables,
        doc: &Document,
        version: Option<u32>,
        timestamp: &str,
        actor: &Actor,
    ) -> PortResult<VersionSnapshot> {
        let _guard = self.locks.lock(&tables.versions.sheet).await;
        let ledger = self.ledger(tables);
        let version = match version {
            Some(v) => v,
            None => ledger.next_version(&doc.code).await?,
        };
        ledger.append(doc, version, timestamp, actor.name()).await
    }
}
