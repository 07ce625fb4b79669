//! Exercises the HTTP surface against the in-memory row store.

use api_lib::config::Config;
use api_lib::web::{router, AppState};
use axum::{
    body::Body,
    http::{HeaderValue, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use warehouse_core::{DocumentService, FixedClock, MemoryRowStore};

const ACTOR: &str = "Nguyễn An";

async fn setup_test_app() -> (Router, Arc<MemoryRowStore>) {
    let config = Config::from_lookup(|key| match key {
        "ROW_STORE" => Some("memory".to_string()),
        "PUBLIC_BASE_URL" => Some("https://kho.example.vn/".to_string()),
        _ => None,
    })
    .unwrap();
    let store = Arc::new(MemoryRowStore::with_tables([&config.inbound, &config.outbound]).await);
    let clock = FixedClock::at("2025-10-10T08:30:00+07:00").unwrap();
    let documents = Arc::new(DocumentService::new(
        store.clone(),
        Arc::new(clock),
        config.inbound.clone(),
        config.outbound.clone(),
    ));
    let state = Arc::new(AppState {
        documents,
        config: Arc::new(config),
    });
    (router(state), store)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    actor: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        request = request.header("x-actor", HeaderValue::from_bytes(actor.as_bytes()).unwrap());
    }
    let request = match body {
        Some(body) => request
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn receipt() -> Value {
    json!({
        "date": "2025-10-10",
        "warehouse": "Kho Tổng",
        "user": "ignored",
        "lines": [{"productCode": "SP01", "productName": "Gạo", "qty": 5, "unit": "Kg"}]
    })
}

#[tokio::test]
async fn create_list_get_and_history() {
    let (app, _store) = setup_test_app().await;

    let (status, created) = send(&app, "POST", "/api/inbound", Some(ACTOR), Some(receipt())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["ok"], true);
    assert_eq!(created["code"], "PNK10102501");
    assert_eq!(created["document"]["createdBy"], ACTOR);
    assert_eq!(created["document"]["slug"].as_str().unwrap().len(), 12);

    let (status, list) = send(&app, "GET", "/api/inbound", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let documents = list["documents"].as_array().unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0]["items"], 1);
    assert_eq!(documents[0]["quantity"], 5.0);
    assert_eq!(documents[0]["date"], "10/10/2025");

    let (status, got) = send(&app, "GET", "/api/inbound/PNK10102501", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(got["document"]["lines"][0]["productName"], "Gạo");

    let (_, history) = send(&app, "GET", "/api/inbound/PNK10102501/history", None, None).await;
    assert_eq!(history["entries"][0]["action"], "Tạo phiếu");
    assert_eq!(history["entries"][0]["user"], ACTOR);
    assert_eq!(history["entries"][0]["timestamp"], "08:30 - 10/10/2025");
    assert_eq!(history["versions"][0]["version"], 1);
    assert_eq!(history["versions"][0]["data"]["code"], "PNK10102501");
}

#[tokio::test]
async fn mutations_require_an_actor() {
    let (app, store) = setup_test_app().await;

    let (status, body) = send(&app, "POST", "/api/inbound", None, Some(receipt())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["ok"], false);
    assert_eq!(body["code"], "ACTOR_REQUIRED");
    assert_eq!(store.rows("NhapKho").await.len(), 1);

    let (status, _) = send(&app, "DELETE", "/api/inbound/PNK10102501", Some("  "), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn failures_carry_machine_codes() {
    let (app, _store) = setup_test_app().await;

    let mut empty = receipt();
    empty["lines"] = json!([]);
    let (status, body) = send(&app, "POST", "/api/outbound", Some(ACTOR), Some(empty)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION");

    let (status, body) = send(
        &app,
        "PUT",
        "/api/outbound",
        Some(ACTOR),
        Some(json!({"code": "PXK01010199", "lines": [{"productCode": "SP01", "qty": 1}]})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "CODE_NOT_FOUND");

    let (status, body) = send(&app, "GET", "/api/returns", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION");

    let (status, body) = send(&app, "POST", "/api/inbound", Some(ACTOR), Some(json!({"date": 1}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);
}

#[tokio::test]
async fn store_outages_fail_only_the_primary_step() {
    let (app, store) = setup_test_app().await;

    store.fail_table("NhapKho_Log").await;
    let (status, body) = send(&app, "POST", "/api/inbound", Some(ACTOR), Some(receipt())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["ok"], true);

    store.fail_table("NhapKho").await;
    let (status, body) = send(&app, "POST", "/api/inbound", Some(ACTOR), Some(receipt())).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "STORE_UNAVAILABLE");
}

#[tokio::test]
async fn update_then_delete_keeps_history() {
    let (app, store) = setup_test_app().await;
    send(&app, "POST", "/api/inbound", Some(ACTOR), Some(receipt())).await;

    let (status, updated) = send(
        &app,
        "PUT",
        "/api/inbound",
        Some("Trần Bình"),
        Some(json!({
            "code": "PNK10102501",
            "warehouse": "Kho B",
            "lines": [
                {"productCode": "SP01", "productName": "Gạo", "qty": 5, "unit": "Kg"},
                {"productCode": "SP02", "qty": "3", "unit": "Bao"}
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["document"]["items"], 2);
    assert_eq!(updated["document"]["createdBy"], ACTOR);

    let (status, deleted) = send(&app, "DELETE", "/api/inbound/PNK10102501", Some(ACTOR), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["rowsDeleted"], 2);
    assert_eq!(store.rows("NhapKho").await.len(), 1);
    assert_eq!(store.rows("NhapKho_Link").await.len(), 1);

    let (status, _) = send(&app, "GET", "/api/inbound/PNK10102501", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, history) = send(&app, "GET", "/api/inbound/PNK10102501/history", None, None).await;
    assert_eq!(history["entries"].as_array().unwrap().len(), 2);
    assert_eq!(history["entries"][1]["user"], "Trần Bình");
    assert_eq!(history["versions"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn preview_resolves_slugs_to_pretty_urls() {
    let (app, _store) = setup_test_app().await;
    let (_, created) = send(&app, "POST", "/api/outbound", Some(ACTOR), Some(receipt())).await;
    let slug = created["document"]["slug"].as_str().unwrap().to_string();

    let (status, preview) = send(&app, "GET", &format!("/api/preview/{}", slug), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preview["kind"], "outbound");
    assert_eq!(preview["url"], format!("https://kho.example.vn/p/{}", slug));
    assert_eq!(preview["document"]["code"], "PXK10102501");

    let (status, body) = send(&app, "GET", "/api/preview/AAAAAAAAAAAA", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "SLUG_NOT_FOUND");
}

#[tokio::test]
async fn drift_is_reported_and_repaired() {
    let (app, store) = setup_test_app().await;
    store.fail_table("XuatKho_Link").await;
    send(&app, "POST", "/api/outbound", Some(ACTOR), Some(receipt())).await;
    store.heal_table("XuatKho_Link").await;

    let (_, drift) = send(&app, "GET", "/api/maintenance/drift", None, None).await;
    assert_eq!(drift["drift"][0]["kind"], "outbound");
    assert_eq!(drift["drift"][0]["missingSlug"], true);
    assert_eq!(drift["drift"][0]["missingVersion"], false);

    let (status, repair) =
        send(&app, "POST", "/api/maintenance/drift/repair", Some(ACTOR), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(repair["repaired"].as_array().unwrap().len(), 1);

    let (_, drift) = send(&app, "GET", "/api/maintenance/drift", None, None).await;
    assert!(drift["drift"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn health_reports_the_backend() {
    let (app, _store) = setup_test_app().await;
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rowStore"], "memory");
}
