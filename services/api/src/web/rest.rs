//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::{ApiError, ErrorBody};
use crate::web::protocol::{
    CreateDocumentRequest, DeleteResponse, DocumentResponse, DocumentView, DriftResponse,
    DriftView, HealthResponse, HistoryResponse, LinePayload, ListResponse, LogEntryView,
    MutationResponse, PreviewResponse, RepairFailureView, RepairResponse, UpdateDocumentRequest,
    VersionView,
};
use crate::web::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::OpenApi;
use warehouse_core::{Actor, DocumentKind, MutationOutcome};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        list_documents_handler,
        get_document_handler,
        create_document_handler,
        update_document_handler,
        delete_document_handler,
        history_handler,
        preview_handler,
        drift_handler,
        repair_drift_handler,
    ),
    components(
        schemas(
            CreateDocumentRequest, UpdateDocumentRequest, LinePayload, DocumentView,
            ListResponse, DocumentResponse, MutationResponse, DeleteResponse,
            HistoryResponse, LogEntryView, VersionView, PreviewResponse,
            DriftResponse, DriftView, RepairResponse, RepairFailureView,
            HealthResponse, ErrorBody
        )
    ),
    tags(
        (name = "Warehouse Receipts API", description = "Inbound and outbound warehouse receipts stored in a spreadsheet.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Helpers
//=========================================================================================

fn parse_kind(raw: &str) -> Result<DocumentKind, ApiError> {
    raw.parse::<DocumentKind>().map_err(ApiError::BadRequest)
}

/// Side-table failures are already logged by the service; the response stays `ok`.
fn mutation_response(outcome: MutationOutcome) -> Json<MutationResponse> {
    if !outcome.failures.is_empty() {
        warn!(
            code = %outcome.document.code,
            failed = outcome.failures.len(),
            "Mutation completed with best-effort failures"
        );
    }
    Json(MutationResponse {
        ok: true,
        code: outcome.document.code.clone(),
        document: outcome.document.into(),
    })
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler(State(app_state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        row_store: app_state.config.row_store.name().to_string(),
    })
}

/// List every receipt of one kind, with lines, item count, total quantity and slug.
#[utoipa::path(
    get,
    path = "/api/{kind}",
    params(("kind" = String, Path, description = "`inbound` or `outbound`")),
    responses(
        (status = 200, description = "Receipts in sheet order", body = ListResponse),
        (status = 400, description = "Unknown kind", body = ErrorBody),
        (status = 503, description = "Row store unavailable", body = ErrorBody)
    )
)]
pub async fn list_documents_handler(
    State(app_state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> Result<Json<ListResponse>, ApiError> {
    let kind = parse_kind(&kind)?;
    let documents = app_state.documents.list(kind).await?;
    Ok(Json(ListResponse {
        ok: true,
        documents: documents.into_iter().map(DocumentView::from).collect(),
    }))
}

/// Fetch one receipt by code.
#[utoipa::path(
    get,
    path = "/api/{kind}/{code}",
    params(
        ("kind" = String, Path, description = "`inbound` or `outbound`"),
        ("code" = String, Path, description = "Receipt code, e.g. PNK10102501")
    ),
    responses(
        (status = 200, description = "The receipt", body = DocumentResponse),
        (status = 404, description = "No rows carry this code", body = ErrorBody)
    )
)]
pub async fn get_document_handler(
    State(app_state): State<Arc<AppState>>,
    Path((kind, code)): Path<(String, String)>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let kind = parse_kind(&kind)?;
    let document = app_state.documents.get(kind, &code).await?;
    Ok(Json(DocumentResponse {
        ok: true,
        document: document.into(),
    }))
}

/// Create a receipt. The code, slug and first version are generated by the server.
#[utoipa::path(
    post,
    path = "/api/{kind}",
    request_body = CreateDocumentRequest,
    params(
        ("kind" = String, Path, description = "`inbound` or `outbound`"),
        ("x-actor" = String, Header, description = "The acting user.")
    ),
    responses(
        (status = 201, description = "Receipt created", body = MutationResponse),
        (status = 400, description = "Validation failed", body = ErrorBody),
        (status = 401, description = "Missing x-actor header", body = ErrorBody),
        (status = 503, description = "Row store unavailable", body = ErrorBody)
    )
)]
pub async fn create_document_handler(
    State(app_state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<CreateDocumentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MutationResponse>), ApiError> {
    let kind = parse_kind(&kind)?;
    let Json(request) = payload?;
    let outcome = app_state
        .documents
        .create(kind, &actor, request.into())
        .await?;
    info!(%kind, code = %outcome.document.code, actor = actor.name(), "Receipt created");
    Ok((StatusCode::CREATED, mutation_response(outcome)))
}

/// Rewrite a receipt's header and full line list.
#[utoipa::path(
    put,
    path = "/api/{kind}",
    request_body = UpdateDocumentRequest,
    params(
        ("kind" = String, Path, description = "`inbound` or `outbound`"),
        ("x-actor" = String, Header, description = "The acting user.")
    ),
    responses(
        (status = 200, description = "Receipt updated", body = MutationResponse),
        (status = 400, description = "Validation failed", body = ErrorBody),
        (status = 404, description = "No rows carry this code", body = ErrorBody),
        (status = 503, description = "Row store unavailable", body = ErrorBody)
    )
)]
pub async fn update_document_handler(
    State(app_state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<UpdateDocumentRequest>, JsonRejection>,
) -> Result<Json<MutationResponse>, ApiError> {
    let kind = parse_kind(&kind)?;
    let Json(request) = payload?;
    let outcome = app_state
        .documents
        .update(kind, &actor, request.into())
        .await?;
    info!(%kind, code = %outcome.document.code, actor = actor.name(), "Receipt updated");
    Ok(mutation_response(outcome))
}

/// Delete every row of a receipt and its slug link. History is kept.
#[utoipa::path(
    delete,
    path = "/api/{kind}/{code}",
    params(
        ("kind" = String, Path, description = "`inbound` or `outbound`"),
        ("code" = String, Path, description = "Receipt code"),
        ("x-actor" = String, Header, description = "The acting user.")
    ),
    responses(
        (status = 200, description = "Receipt deleted", body = DeleteResponse),
        (status = 404, description = "No rows carry this code", body = ErrorBody)
    )
)]
pub async fn delete_document_handler(
    State(app_state): State<Arc<AppState>>,
    Path((kind, code)): Path<(String, String)>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let kind = parse_kind(&kind)?;
    let outcome = app_state.documents.delete(kind, &code).await?;
    info!(%kind, code = %outcome.code, actor = actor.name(), "Receipt deleted");
    Ok(Json(DeleteResponse {
        ok: true,
        code: outcome.code,
        rows_deleted: outcome.rows_deleted,
    }))
}

/// Audit log entries and version snapshots of a receipt, oldest first.
#[utoipa::path(
    get,
    path = "/api/{kind}/{code}/history",
    params(
        ("kind" = String, Path, description = "`inbound` or `outbound`"),
        ("code" = String, Path, description = "Receipt code")
    ),
    responses((status = 200, description = "History, possibly empty", body = HistoryResponse))
)]
pub async fn history_handler(
    State(app_state): State<Arc<AppState>>,
    Path((kind, code)): Path<(String, String)>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let kind = parse_kind(&kind)?;
    let history = app_state.documents.history(kind, &code).await?;
    Ok(Json(HistoryResponse {
        ok: true,
        entries: history.entries.into_iter().map(LogEntryView::from).collect(),
        versions: history.versions.into_iter().map(VersionView::from).collect(),
    }))
}

/// Resolve a public slug to its receipt and shareable preview URL.
#[utoipa::path(
    get,
    path = "/api/preview/{slug}",
    params(("slug" = String, Path, description = "12-character public slug")),
    responses(
        (status = 200, description = "The linked receipt", body = PreviewResponse),
        (status = 404, description = "Unknown slug or deleted receipt", body = ErrorBody)
    )
)]
pub async fn preview_handler(
    State(app_state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let (kind, document) = app_state
        .documents
        .find_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::SlugNotFound(slug.clone()))?;
    Ok(Json(PreviewResponse {
        ok: true,
        kind,
        url: app_state.preview_url(&slug),
        document: document.into(),
    }))
}

/// Receipts of either kind that lack a slug link or any version snapshot.
#[utoipa::path(
    get,
    path = "/api/maintenance/drift",
    responses((status = 200, description = "Drifted receipts", body = DriftResponse))
)]
pub async fn drift_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<DriftResponse>, ApiError> {
    let mut drift = Vec::new();
    for kind in DocumentKind::ALL {
        drift.extend(app_state.documents.scan_drift(kind).await?);
    }
    Ok(Json(DriftResponse {
        ok: true,
        drift: drift.into_iter().map(DriftView::from).collect(),
    }))
}

/// Generate missing slugs and append missing version snapshots. Log entries are not back-filled.
#[utoipa::path(
    post,
    path = "/api/maintenance/drift/repair",
    params(("x-actor" = String, Header, description = "The acting user.")),
    responses((status = 200, description = "Repair results", body = RepairResponse))
)]
pub async fn repair_drift_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<RepairResponse>, ApiError> {
    let mut repaired = Vec::new();
    let mut failures = Vec::new();
    for kind in DocumentKind::ALL {
        let outcome = app_state.documents.repair_drift(kind, &actor).await?;
        repaired.extend(outcome.repaired.into_iter().map(DriftView::from));
        failures.extend(outcome.failures.into_iter().map(RepairFailureView::from));
    }
    info!(repaired = repaired.len(), failed = failures.len(), "Drift repair finished");
    Ok(Json(RepairResponse {
        ok: true,
        repaired,
        failures,
    }))
}
