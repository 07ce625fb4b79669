//! services/api/src/bin/api.rs

use api_lib::{
    adapters::GoogleSheetsAdapter,
    config::{Config, RowStoreBackend},
    error::ApiError,
    web::{middleware::ACTOR_HEADER, router, ApiDoc, AppState},
};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderName, Method,
};
use axum::Router;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use warehouse_core::{DocumentService, MemoryRowStore, RowStore, SystemClock};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect the Row Store ---
    let store: Arc<dyn RowStore> = match &config.row_store {
        RowStoreBackend::Sheets(sheets) => {
            info!(spreadsheet = %sheets.spreadsheet_id, "Using the Google Sheets row store");
            Arc::new(GoogleSheetsAdapter::new(sheets)?)
        }
        RowStoreBackend::Memory => {
            info!("Using the in-memory row store; data is lost on exit");
            Arc::new(MemoryRowStore::with_tables([&config.inbound, &config.outbound]).await)
        }
    };

    // --- 3. Build the Shared AppState ---
    let documents = Arc::new(DocumentService::new(
        store,
        Arc::new(SystemClock::new(config.utc_offset)),
        config.inbound.clone(),
        config.outbound.clone(),
    ));
    let app_state = Arc::new(AppState {
        documents,
        config: config.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, ACCEPT, HeaderName::from_static(ACTOR_HEADER)]);

    // --- 4. Create the Web Router ---
    let app = Router::new()
        .merge(router(app_state).layer(cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Shutdown signal received");
                    shutdown.cancel();
                }
                Err(e) => warn!(error = %e, "Could not listen for the shutdown signal"),
            }
        }
    });

    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("Server stopped");
    Ok(())
}
