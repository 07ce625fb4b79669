pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;

use axum::{
    handler::Handler,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub use middleware::require_actor;
pub use rest::ApiDoc;
pub use state::AppState;

/// Builds the API routes. Mutating routes require the `x-actor` header.
pub fn router(app_state: Arc<AppState>) -> Router {
    let with_actor = || axum_middleware::from_fn(require_actor);

    Router::new()
        .route("/health", get(rest::health_handler))
        .route(
            "/api/{kind}",
            get(rest::list_documents_handler)
                .post(rest::create_document_handler.layer(with_actor()))
                .put(rest::update_document_handler.layer(with_actor())),
        )
        .route(
            "/api/{kind}/{code}",
            get(rest::get_document_handler)
                .delete(rest::delete_document_handler.layer(with_actor())),
        )
        .route("/api/{kind}/{code}/history", get(rest::history_handler))
        .route("/api/preview/{slug}", get(rest::preview_handler))
        .route("/api/maintenance/drift", get(rest::drift_handler))
        .route(
            "/api/maintenance/drift/repair",
            post(rest::repair_drift_handler.layer(with_actor())),
        )
        .with_state(app_state)
}
